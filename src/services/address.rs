//! Mail address list parsing for `Maintainer` and `Changed-By` values.

/// A display name and address pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub email: String,
}

/// Split a header value into addresses.
///
/// Accepts `Name <addr>`, `"Quoted, Name" <addr>`, `addr (Name)` and bare
/// `addr` entries separated by commas. Commas inside quotes, angle brackets
/// or parentheses do not split.
pub fn parse_address_list(value: &str) -> Vec<Address> {
    split_top_level(value)
        .into_iter()
        .filter_map(|entry| parse_address(entry.trim()))
        .collect()
}

/// The last address in the list, taken as canonical.
pub fn last_address(value: &str) -> Option<Address> {
    parse_address_list(value).pop()
}

fn split_top_level(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth_angle = 0usize;
    let mut depth_paren = 0usize;
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' if !quoted => depth_angle += 1,
            '>' if !quoted => depth_angle = depth_angle.saturating_sub(1),
            '(' if !quoted => depth_paren += 1,
            ')' if !quoted => depth_paren = depth_paren.saturating_sub(1),
            ',' if !quoted && depth_angle == 0 && depth_paren == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn parse_address(entry: &str) -> Option<Address> {
    if entry.is_empty() {
        return None;
    }

    if let (Some(open), Some(close)) = (entry.rfind('<'), entry.rfind('>')) {
        if open < close {
            let email = entry[open + 1..close].trim().to_string();
            let name = unquote(entry[..open].trim());
            return Some(Address { name, email });
        }
    }

    if let (Some(open), Some(close)) = (entry.find('('), entry.rfind(')')) {
        if open < close {
            let email = entry[..open].trim().to_string();
            let name = entry[open + 1..close].trim().to_string();
            return Some(Address { name, email });
        }
    }

    Some(Address {
        name: String::new(),
        email: unquote(entry),
    })
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str, email: &str) -> Address {
        Address {
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn test_name_and_angle_address() {
        assert_eq!(
            last_address("Santiago Vila <sanvila@debian.org>"),
            Some(addr("Santiago Vila", "sanvila@debian.org"))
        );
    }

    #[test]
    fn test_paren_name() {
        assert_eq!(
            last_address("joey@debian.org (Joey Hess)"),
            Some(addr("Joey Hess", "joey@debian.org"))
        );
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(last_address("root@master"), Some(addr("", "root@master")));
    }

    #[test]
    fn test_unquoted_comma_takes_last() {
        let list = parse_address_list("Debian QA Group, Jane Doe <jane@example.org>");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], addr("Jane Doe", "jane@example.org"));
    }

    #[test]
    fn test_quoted_comma_does_not_split() {
        assert_eq!(
            parse_address_list("\"Doe, Jane\" <jane@example.org>"),
            vec![addr("Doe, Jane", "jane@example.org")]
        );
    }

    #[test]
    fn test_multiple_maintainers() {
        let last = last_address(
            "Debian Perl Group <pkg-perl@lists.alioth.debian.org>, Joe <joe@example.org>",
        );
        assert_eq!(last, Some(addr("Joe", "joe@example.org")));
    }

    #[test]
    fn test_empty() {
        assert_eq!(last_address("   "), None);
        assert_eq!(last_address(", ,"), None);
    }
}
