//! Defensive RFC 2822 date parsing.
//!
//! Decades of hand-configured mail hosts produced dates no strict parser
//! accepts. Parsing tries the value as-is, then after applying a table of
//! literal substitutions, then once more without the weekday.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;

/// Literal substitutions applied in order before the second parse attempt.
const DATE_QUIRKS: &[(&str, &str)] = &[
    // Timezone names and malformed offsets
    ("MET DST", "+0200"),
    ("METDST", "+0200"),
    ("MEST", "+0200"),
    ("CEST", "+0200"),
    ("EET DST", "+0300"),
    ("MET", "+0100"),
    ("CET", "+0100"),
    ("EET", "+0200"),
    ("WET", "+0000"),
    ("BST", "+0100"),
    ("IST", "+0530"),
    ("JST", "+0900"),
    ("KST", "+0900"),
    ("HKT", "+0800"),
    ("NZST", "+1200"),
    ("NZDT", "+1300"),
    ("AEST", "+1000"),
    ("UTC", "+0000"),
    ("+-0000", "+0000"),
    ("-+0000", "+0000"),
    ("+0000 +0000", "+0000"),
    // Impossible times
    (" 24:", " 00:"),
    (":60 ", ":59 "),
    (":61 ", ":59 "),
    // Impossible days
    ("31 Apr", "30 Apr"),
    ("31 Jun", "30 Jun"),
    ("31 Sep", "30 Sep"),
    ("31 Nov", "30 Nov"),
    ("30 Feb", "28 Feb"),
    ("29 Feb 1997", "28 Feb 1997"),
    ("29 Feb 1998", "28 Feb 1998"),
    ("29 Feb 1999", "28 Feb 1999"),
    (" 0 ", " 1 "),
    // Misspelled and foreign month names
    (" Janv ", " Jan "),
    (" Ene ", " Jan "),
    (" Fev ", " Feb "),
    (" Feb. ", " Feb "),
    (" Mrz ", " Mar "),
    (" Mär ", " Mar "),
    (" Abr ", " Apr "),
    (" Avr ", " Apr "),
    (" Mai ", " May "),
    (" Mei ", " May "),
    (" Juin ", " Jun "),
    (" June ", " Jun "),
    (" Juil ", " Jul "),
    (" July ", " Jul "),
    (" Ago ", " Aug "),
    (" Sept ", " Sep "),
    (" Set ", " Sep "),
    (" Okt ", " Oct "),
    (" Out ", " Oct "),
    (" Dez ", " Dec "),
    (" Dic ", " Dec "),
    // Foreign weekdays
    ("Lun,", "Mon,"),
    ("Mar,", "Tue,"),
    ("Mié,", "Wed,"),
    ("Mer,", "Wed,"),
    ("Jeu,", "Thu,"),
    ("Ven,", "Fri,"),
    ("Sam,", "Sat,"),
    ("Dim,", "Sun,"),
    ("Mo,", "Mon,"),
    ("Di,", "Tue,"),
    ("Mi,", "Wed,"),
    ("Do,", "Thu,"),
    ("Fr,", "Fri,"),
    ("Sa,", "Sat,"),
    ("So,", "Sun,"),
];

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("static regex"));
static WEEKDAY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\p{L}+\.?,?\s+").expect("static regex"));
/// `Mon 12 Jan 1998`, `12 Mon Jan 1998`: weekday without comma or out of place.
static STRAY_WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)\b,?\s*").expect("static regex")
});

/// Parse a `Date:` header value into naive UTC.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(date) = parse_rfc2822(&value) {
        return Some(date);
    }

    let mut fixed = COMMENT.replace_all(&value, "").into_owned();
    for (from, to) in DATE_QUIRKS {
        fixed = fixed.replace(from, to);
    }
    let fixed = fixed.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(date) = parse_rfc2822(&fixed) {
        return Some(date);
    }

    // Weekdays are redundant and often wrong or misplaced.
    let without_weekday = STRAY_WEEKDAY.replace_all(&fixed, "");
    if let Some(date) = parse_rfc2822(&without_weekday) {
        return Some(date);
    }
    let without_prefix = WEEKDAY_PREFIX.replace(&without_weekday, "");
    if without_prefix.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_rfc2822(&without_prefix);
    }
    None
}

fn parse_rfc2822(value: &str) -> Option<NaiveDateTime> {
    DateTime::<FixedOffset>::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_standard_date() {
        assert_eq!(
            parse_date("Mon, 01 Jun 2020 10:00:05 +0200"),
            Some(utc("2020-06-01 08:00:05"))
        );
    }

    #[test]
    fn test_invalid_hour() {
        // 24:15 is not a valid time; the quirk table maps it to 00:15.
        assert!(parse_rfc2822("Mon, 15 Mar 1999 24:15:00 +0000").is_none());
        assert_eq!(
            parse_date("Mon, 15 Mar 1999 24:15:00 +0000"),
            Some(utc("1999-03-15 00:15:00"))
        );
    }

    #[test]
    fn test_named_timezones() {
        assert_eq!(
            parse_date("Tue, 13 Jan 1998 21:05:30 MET DST"),
            Some(utc("1998-01-13 19:05:30"))
        );
        assert_eq!(
            parse_date("Tue, 13 Jan 1998 21:05:30 +0100 (CET)"),
            Some(utc("1998-01-13 20:05:30"))
        );
    }

    #[test]
    fn test_foreign_month_and_weekday() {
        assert_eq!(
            parse_date("Di, 12 Mai 1998 10:00:00 +0200"),
            Some(utc("1998-05-12 08:00:00"))
        );
    }

    #[test]
    fn test_impossible_day() {
        assert_eq!(
            parse_date("31 Apr 2001 12:00:00 +0000"),
            Some(utc("2001-04-30 12:00:00"))
        );
    }

    #[test]
    fn test_wrong_weekday_is_dropped() {
        // 1 Jun 2020 was a Monday.
        assert_eq!(
            parse_date("Fri, 01 Jun 2020 10:00:05 +0000"),
            Some(utc("2020-06-01 10:00:05"))
        );
    }

    #[test]
    fn test_transposed_weekday() {
        assert_eq!(
            parse_date("12 Tue May 1998 10:00:00 +0000"),
            Some(utc("1998-05-12 10:00:00"))
        );
    }

    #[test]
    fn test_garbage() {
        assert_eq!(parse_date("sometime last week"), None);
        assert_eq!(parse_date(""), None);
    }
}
