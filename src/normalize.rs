//! Canonicalization of raw corpus phrases into two-word lookup keys

use crate::Key;
use unicode_normalization::UnicodeNormalization;

/// Part-of-speech tags that the corpus glues to words, plus leftover cruft
const GRAMMAR_TAGS: [&str; 12] = [
    "_adj", "_verb", "_noun", "_adv", "_pron", "_det", "_adp", "_num", "_conj", "_prt", "_x",
    "__",
];

/// Turn a raw corpus phrase into a canonical two-word key
///
/// Returns `None` if the phrase should not make it into the dictionary:
/// because it contains digits, or because nothing that looks like two words
/// remains once punctuation and grammar tags have been stripped.
///
/// Applying this function to its own output yields the same key.
pub fn normalize(raw: &str) -> Option<Key> {
    // Decompose accented characters so that their base letter survives
    let mut kept = String::with_capacity(raw.len());
    for c in raw.nfkd().flat_map(char::to_lowercase) {
        match c {
            '0'..='9' => {
                log::trace!("Rejected phrase {raw:?} because it contains digits");
                return None;
            }
            'a'..='z' | ' ' | '_' => kept.push(c),
            _ => {}
        }
    }

    // Tag removal can splice together a new tag, so iterate to a fixed point
    loop {
        let stripped = GRAMMAR_TAGS
            .iter()
            .fold(kept.clone(), |acc, tag| acc.replace(tag, ""));
        if stripped == kept {
            break;
        }
        kept = stripped;
    }

    // Exactly two proper words must remain
    let mut words = kept.split_whitespace();
    let (Some(first), Some(second), None) = (words.next(), words.next(), words.next()) else {
        log::trace!("Rejected phrase {raw:?} because it doesn't reduce to two words");
        return None;
    };
    if [first, second]
        .iter()
        .any(|word| word.chars().all(|c| c == '_'))
    {
        log::trace!("Rejected phrase {raw:?} because a word is only made of underscores");
        return None;
    }
    Some(format!("{first} {second}").into())
}

/// Lowercase a word and drop everything that isn't an ASCII letter
///
/// An empty result means that the input is punctuation or otherwise not a
/// word at all.
pub fn strip_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_case_and_punctuation() {
        assert_eq!(normalize("Cat_NOUN sat_VERB").as_deref(), Some("cat sat"));
        assert_eq!(normalize("don't stop").as_deref(), Some("dont stop"));
        assert_eq!(normalize("  café   au ").as_deref(), Some("cafe au"));
        assert_eq!(normalize("_START_ the").as_deref(), Some("_start_ the"));
    }

    #[test]
    fn rejects_non_bigrams() {
        assert_eq!(normalize("route 66"), None);
        assert_eq!(normalize("cat ,"), None);
        assert_eq!(normalize("lonely"), None);
        assert_eq!(normalize("one two three"), None);
        assert_eq!(normalize("cat _"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn is_idempotent() {
        for raw in [
            "Cat_NOUN sat",
            "_ad_xj word",
            "Hello_X__ World_ADJ",
            "naïve approach",
            "_START_ the",
        ] {
            if let Some(key) = normalize(raw) {
                assert_eq!(normalize(&key).as_deref(), Some(&*key), "for {raw:?}");
            }
        }
    }

    #[test]
    fn tag_fixed_point() {
        // Removing "_x" leaves "_adj" behind, which must go too
        assert_eq!(normalize("_ad_xjcat dog").as_deref(), Some("cat dog"));
    }

    #[test]
    fn word_stripping() {
        assert_eq!(strip_word("Hello,"), "hello");
        assert_eq!(strip_word("--"), "");
        assert_eq!(strip_word("R2D2"), "rd");
    }
}
