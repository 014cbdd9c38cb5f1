//! Character-offset helpers. Every offset in this crate counts `char`s, not bytes.

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `offset`-th char (clamped to the end of `text`).
pub(crate) fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

pub(crate) fn split_at_char(text: &str, offset: usize) -> (&str, &str) {
    text.split_at(byte_index(text, offset))
}

pub(crate) fn char_prefix(text: &str, offset: usize) -> &str {
    split_at_char(text, offset).0
}

pub(crate) fn insert_at_char(text: &mut String, offset: usize, insert: &str) {
    let idx = byte_index(text, offset);
    text.insert_str(idx, insert);
}

pub(crate) fn remove_char(text: &mut String, offset: usize) {
    let idx = byte_index(text, offset);
    if idx < text.len() {
        text.remove(idx);
    }
}

pub(crate) fn is_tab_or_space(c: char) -> bool {
    c == '\t' || c == ' '
}

pub(crate) fn split_lines_preserve_trailing(text: &str) -> Vec<String> {
    // `str::split('\n')` preserves trailing empty segments (N newlines => N+1 lines).
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_offsets_are_not_bytes() {
        assert_eq!(char_len("中a"), 2);
        assert_eq!(split_at_char("中a", 1), ("中", "a"));
        assert_eq!(split_at_char("ab", 9), ("ab", ""));

        let mut s = "中a".to_string();
        insert_at_char(&mut s, 1, "x");
        assert_eq!(s, "中xa");
        remove_char(&mut s, 0);
        assert_eq!(s, "xa");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines_preserve_trailing("a\r\nb\n"), vec!["a", "b", ""]);
        assert_eq!(split_lines_preserve_trailing(""), vec![""]);
    }
}
