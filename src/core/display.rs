use unicode_width::UnicodeWidthChar;

/// Keep the first `max` chars, appending `...` when something was cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Fit `text` into `width` terminal columns, ending with `…` when cut
pub fn truncate_width(text: &str, width: usize) -> String {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Collapse newlines so an excerpt fits on one line
pub fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 4), "abcd...");
        assert_eq!(truncate_chars("수수료가 부과됨", 3), "수수료...");
    }

    #[test]
    fn test_truncate_width_counts_wide_chars() {
        assert_eq!(truncate_width("hello", 5), "hello");
        assert_eq!(truncate_width("hello world", 6), "hello…");
        // Each Hangul syllable is two columns wide
        assert_eq!(truncate_width("수수료부과", 5), "수수…");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("a\nb\r\nc"), "a b  c");
    }
}
