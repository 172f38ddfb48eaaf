// Merchant name canonicalization
// The normalized form is the key for both the cache and the classifier.

/// Lower-case, keep only `[a-z0-9 ]`, collapse whitespace, trim.
///
/// Total and idempotent: `normalize_merchant(normalize_merchant(x)) == normalize_merchant(x)`.
pub fn normalize_merchant(raw: &str) -> String {
    let kept: String = raw
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if is_ascii_space(c) {
                Some(' ')
            } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ASCII whitespace only; NBSP, em space and friends are stripped like any other symbol
fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_punctuation_and_collapses_spaces() {
        assert_eq!(normalize_merchant("Whole  Foods #12!"), "whole foods 12");
        assert_eq!(normalize_merchant("  STARBUCKS*4521  "), "starbucks4521");
        assert_eq!(normalize_merchant("Uber\tEats\nIndia"), "uber eats india");
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(normalize_merchant("Café Zürich"), "caf zrich");
        assert_eq!(normalize_merchant("Ｓｗｉｇｇｙ"), "");
    }

    #[test]
    fn test_unicode_spaces_are_stripped_not_split() {
        assert_eq!(normalize_merchant("Whole\u{00A0}Foods"), "wholefoods");
        assert_eq!(normalize_merchant("Big\u{2003}Bazaar"), "bigbazaar");
        assert_eq!(normalize_merchant("Big\x0BBazaar\x0C 7"), "big bazaar 7");
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        assert_eq!(normalize_merchant(""), "");
        assert_eq!(normalize_merchant("#*!! --"), "");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "Whole  Foods #12!",
            "AMAZON.COM MARKETPLACE",
            "  dmart -- Reliance Fresh  ",
            "Café Zürich",
        ] {
            let once = normalize_merchant(raw);
            assert_eq!(normalize_merchant(&once), once, "not idempotent for {:?}", raw);
        }
    }
}
