// src/services/metadata.rs

//! Upload metadata extraction.
//!
//! An upload announcement body is a control-file paragraph (`Key: value`
//! lines, continuation lines indented) usually wrapped in a PGP clearsign
//! envelope. Field order is not relied on.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ParseError, ParseOutcome, SkipReason, UploadRecord};
use crate::services::address::last_address;
use crate::services::dates::parse_date;

static FIELD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9-]*):(.*)$").expect("static regex"));

/// Version suffixes typical of NMUs: `-1.1`, `+nmu2`.
static NMU_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-[^-]*\.\d+|\+nmu\d+)$").expect("static regex"));
static NMU_CHANGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(non[- ]?maintainer|\bnmu\b)").expect("static regex")
});

const SIGNATURE_START: &str = "-----BEGIN PGP SIGNATURE-----";

/// Parse an upload announcement body.
pub fn parse_upload(message_id: &str, body: &str) -> ParseOutcome {
    let fields = parse_fields(body);
    let field = |name: &str| fields.get(name).map(String::as_str);

    let Some(source) = field("source").and_then(|s| s.split_whitespace().next()) else {
        return ParseOutcome::Skipped(SkipReason::NoSource);
    };
    let Some(raw_date) = field("date") else {
        return ParseOutcome::Skipped(SkipReason::NoDate);
    };

    match build_record(message_id, source, raw_date, &field) {
        Ok(record) => ParseOutcome::Parsed(record),
        Err(error) => ParseOutcome::Failed(error),
    }
}

fn build_record<'a>(
    message_id: &str,
    source: &str,
    raw_date: &str,
    field: &impl Fn(&str) -> Option<&'a str>,
) -> Result<UploadRecord, ParseError> {
    let required = |name: &'static str, key: &str| {
        field(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ParseError::MissingField(name))
    };

    let version = required("Version", "version")?.trim().to_string();
    let maintainer = fold(required("Maintainer", "maintainer")?);
    let changes = required("Changes", "changes")?.to_string();

    let date = parse_date(raw_date).ok_or_else(|| ParseError::InvalidDate(raw_date.to_string()))?;

    let maintainer_address =
        last_address(&maintainer).ok_or(ParseError::MalformedAddress("Maintainer"))?;

    let changed_by = field("changed-by").map(fold).filter(|v| !v.is_empty());
    let changed_by_address = match &changed_by {
        Some(value) => {
            Some(last_address(value).ok_or(ParseError::MalformedAddress("Changed-By"))?)
        }
        None => None,
    };

    Ok(UploadRecord {
        message_id: message_id.to_string(),
        date,
        source: source.to_string(),
        nmu: is_nmu(&version, &changes),
        version,
        changed_by_name: changed_by_address.as_ref().map(|a| a.name.clone()),
        changed_by_email: changed_by_address.map(|a| a.email),
        changed_by,
        maintainer_name: maintainer_address.name,
        maintainer_email: maintainer_address.email,
        maintainer,
        changes,
    })
}

/// Heuristic: both the version and the changelog must look like an NMU.
pub fn is_nmu(version: &str, changes: &str) -> bool {
    NMU_VERSION.is_match(version) && NMU_CHANGES.is_match(changes)
}

/// Collect fields keyed by lowercased name; the first occurrence wins.
fn parse_fields(body: &str) -> HashMap<String, String> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(SIGNATURE_START) {
            break;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(value) = current.as_ref().and_then(|key| fields.get_mut(key)) {
                let continuation = &line[1..];
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(continuation.trim_end());
            }
            continue;
        }

        current = None;
        if let Some(caps) = FIELD_LINE.captures(line) {
            let key = caps[1].to_ascii_lowercase();
            if !fields.contains_key(&key) {
                fields.insert(key.clone(), caps[2].trim().to_string());
                current = Some(key);
            }
        }
    }
    fields
}

fn fold(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}


#[cfg(test)]
mod tests {
    use super::fixtures::changes_body;
    use super::*;
    use chrono::NaiveDateTime;

    const NMU_CHANGES_TEXT: &str = "   * Non-maintainer upload.\n   * Fix FTBFS.";

    fn parsed(outcome: ParseOutcome) -> UploadRecord {
        match outcome {
            ParseOutcome::Parsed(record) => record,
            other => panic!("expected a parsed record, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_full_record() {
        let body = changes_body("2.10-2", "   * New upstream release.");
        let record = parsed(parse_upload("id@host", &body));

        assert_eq!(record.message_id, "id@host");
        assert_eq!(record.source, "hello");
        assert_eq!(record.version, "2.10-2");
        assert_eq!(
            record.date,
            NaiveDateTime::parse_from_str("2020-06-01 08:00:05", "%Y-%m-%d %H:%M:%S").unwrap()
        );
        assert_eq!(record.maintainer, "Santiago Vila <sanvila@debian.org>");
        assert_eq!(record.maintainer_name, "Santiago Vila");
        assert_eq!(record.maintainer_email, "sanvila@debian.org");
        assert_eq!(record.changed_by_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.changed_by_email.as_deref(), Some("jane@example.org"));
        assert!(record.changes.starts_with("hello (2.10-2) unstable"));
        assert!(record.changes.contains("* New upstream release."));
        assert!(!record.nmu);
    }

    #[test]
    fn test_nmu_requires_version_and_changes() {
        let nmu = parsed(parse_upload("a", &changes_body("1.2-1.1+nmu3", "  * non-maintainer upload")));
        assert!(nmu.nmu);

        let regular = parsed(parse_upload("b", &changes_body("1.2-1", "  * non-maintainer upload")));
        assert!(!regular.nmu);

        let plain = parsed(parse_upload("c", &changes_body("1.2-1.1", "  * New upstream release.")));
        assert!(!plain.nmu);
    }

    #[test]
    fn test_is_nmu() {
        assert!(is_nmu("1.2-1.1+nmu3", "  * non-maintainer upload"));
        assert!(is_nmu("0.9-3.1", NMU_CHANGES_TEXT));
        assert!(is_nmu("4.2+nmu1", "NMU to fix RC bug"));
        assert!(!is_nmu("1.2-1", "  * non-maintainer upload"));
        assert!(!is_nmu("1.2-1.1", "  * Team upload"));
    }

    #[test]
    fn test_missing_source_is_skip() {
        let outcome = parse_upload("x", "Hi all,\n\nplease test the new release.\n");
        assert_eq!(outcome, ParseOutcome::Skipped(SkipReason::NoSource));
    }

    #[test]
    fn test_missing_date_is_skip() {
        let body = changes_body("1.0-1", "  * Initial release.").replace("Date: Mon, 01 Jun 2020 10:00:05 +0200\n", "");
        assert_eq!(parse_upload("x", &body), ParseOutcome::Skipped(SkipReason::NoDate));
    }

    #[test]
    fn test_quirky_date_is_repaired() {
        let body = changes_body("1.0-1", "  * Initial release.").replace(
            "Mon, 01 Jun 2020 10:00:05 +0200",
            "Mon, 15 Mar 1999 24:15:00 +0000",
        );
        let record = parsed(parse_upload("x", &body));
        assert_eq!(record.date.to_string(), "1999-03-15 00:15:00");
    }

    #[test]
    fn test_unparseable_date_fails() {
        let body = changes_body("1.0-1", "  * Initial release.")
            .replace("Mon, 01 Jun 2020 10:00:05 +0200", "the day after tomorrow");
        assert_eq!(
            parse_upload("x", &body),
            ParseOutcome::Failed(ParseError::InvalidDate("the day after tomorrow".into()))
        );
    }

    #[test]
    fn test_missing_changes_fails() {
        let body = "Date: Mon, 01 Jun 2020 10:00:05 +0200\nSource: foo\nVersion: 1\nMaintainer: A <a@b>\n";
        assert_eq!(
            parse_upload("x", body),
            ParseOutcome::Failed(ParseError::MissingField("Changes"))
        );
    }

    #[test]
    fn test_malformed_maintainer_fails() {
        let body = "Date: Mon, 01 Jun 2020 10:00:05 +0200\nSource: foo\nVersion: 1\nMaintainer: ,\nChanges:\n foo (1) unstable\n";
        assert_eq!(
            parse_upload("x", body),
            ParseOutcome::Failed(ParseError::MalformedAddress("Maintainer"))
        );
    }

    #[test]
    fn test_signature_version_is_ignored() {
        let body = changes_body("3.0-1", "  * Initial release.");
        let fields = parse_fields(&body);
        assert_eq!(fields.get("version").map(String::as_str), Some("3.0-1"));
    }

    #[test]
    fn test_fields_are_case_insensitive() {
        let fields = parse_fields("SOURCE: foo\nchanged-by: A <a@b>\n");
        assert_eq!(fields.get("source").map(String::as_str), Some("foo"));
        assert_eq!(fields.get("changed-by").map(String::as_str), Some("A <a@b>"));
    }
}
