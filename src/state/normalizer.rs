//! Capitalization and word counting for submitted chunks.

/// Punctuation that closes a sentence (or introduces one) and therefore
/// makes the next chunk start with a capital letter.
const SENTENCE_BREAKS: [char; 4] = ['.', '!', '?', ':'];

/// Normalize `text` relative to the previous story segment.
///
/// The chunk is trimmed, then its first character is uppercased when it opens
/// the story or follows a sentence break, and lowercased otherwise.
pub fn normalize_segment(previous: Option<&str>, text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let head: String = if starts_sentence(previous) {
        first.to_uppercase().collect()
    } else {
        first.to_lowercase().collect()
    };

    head + chars.as_str()
}

fn starts_sentence(previous: Option<&str>) -> bool {
    match previous.map(str::trim) {
        None | Some("") => true,
        Some(previous) => previous.ends_with(SENTENCE_BREAKS),
    }
}

/// Count words in `text`.
///
/// Tokens are split on whitespace; a token counts only if something remains
/// after stripping its leading and trailing non-word characters.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| !token.trim_matches(|c: char| !is_word_char(c)).is_empty())
        .count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_segment_is_capitalized() {
        assert_eq!(normalize_segment(None, "  once  "), "Once");
        assert_eq!(normalize_segment(Some("   "), "once"), "Once");
    }

    #[test]
    fn follows_sentence_breaks() {
        assert_eq!(normalize_segment(Some("Hello."), "world"), "World");
        assert_eq!(normalize_segment(Some("Really?  "), "yes"), "Yes");
        assert_eq!(normalize_segment(Some("Wow!"), "ok"), "Ok");
        assert_eq!(normalize_segment(Some("He said:"), "run"), "Run");
    }

    #[test]
    fn lowercases_mid_sentence() {
        assert_eq!(normalize_segment(Some("world"), "Jumps"), "jumps");
        assert_eq!(normalize_segment(Some("Once,"), "Upon a"), "upon a");
    }

    #[test]
    fn only_the_first_character_changes() {
        assert_eq!(normalize_segment(Some("and"), "NASA rocks"), "nASA rocks");
        assert_eq!(normalize_segment(None, "\"quoted\" Words"), "\"quoted\" Words");
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            (None, "once upon"),
            (Some("Hello."), "world"),
            (Some("world"), "Jumps"),
            (Some("x"), "  Élan vital "),
            (Some("end!"), "émile"),
        ];
        for (previous, input) in cases {
            let once = normalize_segment(previous, input);
            assert_eq!(normalize_segment(previous, &once), once);
        }
    }

    #[test]
    fn blank_input_normalizes_to_empty() {
        assert_eq!(normalize_segment(Some("a."), "   "), "");
    }

    #[test]
    fn counts_words_ignoring_bare_punctuation() {
        assert_eq!(count_words("once upon a"), 3);
        assert_eq!(count_words("  hello,   world! "), 2);
        assert_eq!(count_words("- ... !"), 0);
        assert_eq!(count_words("well — fine"), 2);
        assert_eq!(count_words("snake_case"), 1);
        assert_eq!(count_words(""), 0);
    }
}
