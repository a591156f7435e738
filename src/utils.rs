//! Shared text helpers

/// Safely truncate a string at a UTF-8 boundary
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if max_bytes >= s.len() { return s; }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview of extracted text for log output
pub fn preview(text: &str, max_bytes: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = safe_truncate(&flat, max_bytes);
    if cut.len() < flat.len() {
        format!("{}...", cut)
    } else {
        flat
    }
}

/// Join list fields for a report cell
pub fn join_list(items: &[String]) -> String {
    items.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_multibyte() {
        // 'é' is two bytes; cutting inside it backs off to the boundary
        assert_eq!(safe_truncate("café au lait", 4), "caf");
        assert_eq!(safe_truncate("café", 5), "café");
        assert_eq!(safe_truncate("abc", 10), "abc");
    }

    #[test]
    fn test_preview_flattens_and_marks_cut() {
        assert_eq!(preview("Abstract\n\nWe   study", 100), "Abstract We study");
        assert_eq!(preview("Abstract\nWe study anxiety", 11), "Abstract We...");
    }

    #[test]
    fn test_join_list() {
        assert_eq!(join_list(&["CBT".to_string(), "SSRI".to_string()]), "CBT, SSRI");
        assert_eq!(join_list(&[]), "");
    }
}
