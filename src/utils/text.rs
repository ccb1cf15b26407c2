use regex::Regex;
use std::collections::HashMap;

/// Placeholder used when a patron name part is unknown.
pub const UNKNOWN_NAME: &str = "ei tietoa";

/// Replaces every run of characters matched by `disallowed` with a single space.
pub fn sanitize_product_name(disallowed: &Regex, name: &str) -> String {
    disallowed.replace_all(name, " ").into_owned()
}

/// Keeps at most `max` characters.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}

/// Keeps at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Splits a patron name into `(first, last)`.
///
/// When the first name is missing, the last name is inspected for either the
/// `Last, First` or the `First Middle Last` form.
pub fn split_patron_name(firstname: &str, lastname: &str) -> (String, String) {
    let firstname = firstname.trim();
    let lastname = lastname.trim();

    let (first, last) = if !firstname.is_empty() {
        (firstname, lastname)
    } else {
        match lastname.find(',') {
            Some(pos) if pos > 0 => {
                let (last, first) = lastname.split_at(pos);
                (first[1..].trim(), last.trim())
            }
            _ => match lastname.rsplit_once(' ') {
                Some((first, last)) => (first.trim(), last.trim()),
                None => ("", lastname),
            },
        }
    };

    let or_unknown = |value: &str| {
        if value.is_empty() {
            UNKNOWN_NAME.to_string()
        } else {
            value.to_string()
        }
    };
    (or_unknown(first), or_unknown(last))
}

/// Parses `key=value:key2=value2` mappings. Items without `=` are skipped.
pub fn parse_code_mappings(raw: &str) -> HashMap<String, String> {
    raw.split(':')
        .filter_map(|item| item.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("äöå", 2), "äö");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundary() {
        // 'ä' is two bytes
        assert_eq!(truncate_bytes("aä", 2), "a");
        assert_eq!(truncate_bytes("abc", 2), "ab");
        assert_eq!(truncate_bytes("abc", 5), "abc");
    }

    #[test]
    fn test_split_patron_name() {
        assert_eq!(
            split_patron_name("Anna", " Virtanen "),
            ("Anna".to_string(), "Virtanen".to_string())
        );
        assert_eq!(
            split_patron_name("", "Virtanen, Anna"),
            ("Anna".to_string(), "Virtanen".to_string())
        );
        assert_eq!(
            split_patron_name("", "Anna Maria Virtanen"),
            ("Anna Maria".to_string(), "Virtanen".to_string())
        );
        assert_eq!(
            split_patron_name("", "Virtanen"),
            (UNKNOWN_NAME.to_string(), "Virtanen".to_string())
        );
        assert_eq!(
            split_patron_name("", ""),
            (UNKNOWN_NAME.to_string(), UNKNOWN_NAME.to_string())
        );
    }

    #[test]
    fn test_parse_code_mappings() {
        let mappings = parse_code_mappings("Overdue = 100:Lost=200:broken");
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["Overdue"], "100");
        assert_eq!(mappings["Lost"], "200");
        assert!(parse_code_mappings("").is_empty());
    }
}
