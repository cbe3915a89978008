/// Truncate to at most `max_len` bytes without splitting a UTF-8 character.
#[must_use]
pub fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_at_char_boundary("short", 10), "short");
    }

    #[test]
    fn exact_length_is_untouched() {
        assert_eq!(truncate_at_char_boundary("ten chars!", 10), "ten chars!");
    }

    #[test]
    fn long_ascii_is_cut_at_limit() {
        assert_eq!(truncate_at_char_boundary("0123456789abc", 10), "0123456789");
    }

    #[test]
    fn multibyte_cut_backs_up_to_a_boundary() {
        // Each snowman is three bytes; a cut at byte 4 must back up to 3.
        assert_eq!(truncate_at_char_boundary("☃☃☃", 4), "☃");
    }
}
