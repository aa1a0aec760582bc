//! String-aware brace scanning over JSON-ish text.

/// Net count of unclosed `{` in `text`, ignoring braces inside strings.
///
/// Negative when there are more closing than opening braces.
pub(crate) fn open_braces(text: &str) -> i64 {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// The balanced `{...}` object starting at byte offset `start`, if it closes.
pub(crate) fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let tail = text.get(start..)?;
    if !tail.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in tail.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&tail[..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_unclosed_braces() {
        assert_eq!(open_braces(r#"{"a":{"b":{}}"#), 1);
        assert_eq!(open_braces(r#"{"a":"}}}"}"#), 0);
        assert_eq!(open_braces(r#"{"a":"\"{"}"#), 0);
        assert_eq!(open_braces("}"), -1);
    }

    #[test]
    fn finds_balanced_object() {
        let text = r#"Sure: {"a": {"b": "}"}} trailing"#;
        let start = text.find('{').unwrap();
        assert_eq!(balanced_object(text, start), Some(r#"{"a": {"b": "}"}}"#));
    }

    #[test]
    fn unclosed_object_is_none() {
        assert_eq!(balanced_object(r#"{"a": {"#, 0), None);
        assert_eq!(balanced_object("abc", 0), None);
    }
}
