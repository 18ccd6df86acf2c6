use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|\r?\n").expect("valid line break pattern"));

/// Split label text on newlines and `<br>` tags. Empty input yields no lines.
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    LINE_BREAK_RE
        .split(text)
        .map(|line| line.trim().to_string())
        .collect()
}

/// Width estimate for a single line using a fixed per-character advance.
pub fn estimate_line_width(line: &str, char_width: f32) -> f32 {
    line.chars().count() as f32 * char_width.max(0.0)
}

/// Widest line estimate across all lines.
pub fn estimate_block_width(lines: &[String], char_width: f32) -> f32 {
    lines
        .iter()
        .map(|line| estimate_line_width(line, char_width))
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newlines_and_br_tags() {
        assert_eq!(split_lines("a<br/>b\nc<BR>d"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn block_width_uses_longest_line() {
        let lines = vec!["ab".to_string(), "abcd".to_string()];
        assert_eq!(estimate_block_width(&lines, 7.0), 28.0);
    }
}
