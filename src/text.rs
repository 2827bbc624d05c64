//! Splitting of a text into words to be scored

use crate::{
    normalize::strip_word,
    score::{FamiliarityReport, Scorer},
    Result,
};
use rayon::prelude::*;

/// Word of a text, along with what surrounds it
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Word<'text> {
    /// Word as it appears in the text
    pub text: &'text str,

    /// Punctuation and other non-words that follow this word
    pub fragment: Option<String>,

    /// Truth that this word is the last of its line
    pub line_end: bool,
}

/// Extract the words of a text
///
/// Whitespace-separated tokens without any letter are not words. They are
/// attached to the word before them, or dropped if they come before the
/// first word.
pub fn scan(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::<Word>::new();
    for line in text.lines() {
        let line_start = words.len();
        for token in line.split_whitespace() {
            if !strip_word(token).is_empty() {
                words.push(Word {
                    text: token,
                    ..Default::default()
                });
            } else if let Some(last) = words.last_mut() {
                match &mut last.fragment {
                    Some(fragment) => {
                        fragment.push(' ');
                        fragment.push_str(token);
                    }
                    None => last.fragment = Some(token.to_owned()),
                }
            } else {
                log::debug!("Ignored leading non-word {token:?}");
            }
        }
        if words.len() > line_start {
            if let Some(last) = words.last_mut() {
                last.line_end = true;
            }
        }
    }
    words
}

/// Rate every word of a text against its neighbors
///
/// Words are processed in parallel, reports come out in text order.
pub fn score_words(scorer: &Scorer, words: &[Word<'_>]) -> Result<Vec<FamiliarityReport>> {
    (0..words.len())
        .into_par_iter()
        .map(|idx| {
            let before = idx.checked_sub(1).map_or("", |prev| words[prev].text);
            let after = words.get(idx + 1).map_or("", |next| next.text);
            scorer.score(before, words[idx].text, after)
        })
        .collect()
}
