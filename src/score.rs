//! Familiarity rating of a word from the word pairs around it

use crate::{
    config::ScoreConfig, lookup::Dictionary, normalize::normalize, whitelist::Whitelist, Count,
    Result,
};
use std::{num::NonZeroU64, sync::Arc};

/// Tenths of the maximal frequency granted to a word on the side where it
/// has no neighbor
const EDGE_FREQUENCY_TENTHS: u128 = 7;

/// Familiarity rating of a word
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FamiliarityReport {
    /// Frequency of the word pair formed with the previous word, if known
    pub frequency_before: Option<Count>,

    /// Frequency of the word pair formed with the next word, if known
    pub frequency_after: Option<Count>,

    /// Familiarity score, from 0 (never seen) to 100 (very common)
    pub score: u8,
}

/// Word familiarity rating engine
#[derive(Debug)]
pub struct Scorer {
    /// Scoring configuration
    config: Arc<ScoreConfig>,

    /// Word pair frequencies
    dictionary: Dictionary,

    /// Exempt words
    whitelist: Whitelist,
}
//
impl Scorer {
    /// Set up the scoring engine
    pub fn new(config: Arc<ScoreConfig>, dictionary: Dictionary, whitelist: Whitelist) -> Self {
        Self {
            config,
            dictionary,
            whitelist,
        }
    }

    /// Rate the familiarity of `center`, knowing its neighbors
    ///
    /// Use an empty string as a neighbor at the start or the end of a text.
    pub fn score(&self, before: &str, center: &str, after: &str) -> Result<FamiliarityReport> {
        let max = self.config.max_frequency;
        if self.whitelist.is_whitelisted(center) {
            return Ok(FamiliarityReport {
                frequency_before: Some(max.get()),
                frequency_after: Some(max.get()),
                score: 100,
            });
        }
        let frequency_before = if self.whitelist.is_whitelisted(before) {
            Some(max.get())
        } else {
            self.pair_frequency(before, center)?
        };
        let frequency_after = if self.whitelist.is_whitelisted(after) {
            Some(max.get())
        } else {
            self.pair_frequency(center, after)?
        };
        Ok(FamiliarityReport {
            frequency_before,
            frequency_after,
            score: familiarity(
                frequency_before,
                frequency_after,
                max,
                self.config.missing_hit_pct,
            ),
        })
    }

    /// Look up the frequency of a pair of words from a text
    fn pair_frequency(&self, first: &str, second: &str) -> Result<Option<Count>> {
        match normalize(&format!("{first} {second}")) {
            Some(key) => self.dictionary.lookup(&key),
            None => Ok(None),
        }
    }
}

/// Combine the frequencies of the word pairs around a word into a score
///
/// When only one of the word pairs is unknown, the word is assumed to be at
/// the edge of the text and that side gets an artificial frequency of 70% of
/// `max`. When both are unknown, there is no data at all. Frequencies are
/// capped to `max`, and a true zero on either side costs `missing_hit_pct`
/// percent of the score.
///
/// Computations are carried out exactly in tenths of occurences, then the
/// final percentage is rounded down.
pub fn familiarity(
    before: Option<Count>,
    after: Option<Count>,
    max: NonZeroU64,
    missing_hit_pct: u8,
) -> u8 {
    let max10 = u128::from(max.get()) * 10;
    let edge10 = u128::from(max.get()) * EDGE_FREQUENCY_TENTHS;
    let (before10, after10) = match (before, after) {
        (None, None) => (0, 0),
        (before, after) => (
            before.map_or(edge10, |f| u128::from(f) * 10),
            after.map_or(edge10, |f| u128::from(f) * 10),
        ),
    };
    let (before10, after10) = (before10.min(max10), after10.min(max10));
    let kept_pct = if before10 == 0 || after10 == 0 {
        100 - u128::from(missing_hit_pct.min(100))
    } else {
        100
    };
    let score = (before10 + after10) * kept_pct / (2 * max10);
    u8::try_from(score).expect("capped frequencies should score at most 100")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::tests::score_config, whitelist::tests::in_memory};
    use tempfile::tempdir;

    fn max() -> NonZeroU64 {
        NonZeroU64::new(20_000).unwrap()
    }

    #[test]
    fn score_scale() {
        assert_eq!(familiarity(Some(20_000), Some(20_000), max(), 55), 100);
        assert_eq!(familiarity(Some(1_000_000), Some(50_000), max(), 55), 100);
        assert_eq!(familiarity(Some(10_000), Some(5_000), max(), 55), 37);
        assert_eq!(familiarity(Some(1), Some(1), max(), 55), 0);
    }

    #[test]
    fn edge_substitution() {
        // 14000 + 10000 out of 40000, no penalty
        assert_eq!(familiarity(None, Some(10_000), max(), 55), 60);
        assert_eq!(familiarity(Some(10_000), None, max(), 55), 60);
        // The edge frequency itself is never a miss
        assert_eq!(familiarity(None, Some(20_000), max(), 100), 85);
    }

    #[test]
    fn small_maximum_is_exact() {
        let max = |m| NonZeroU64::new(m).unwrap();
        // 2.1 + 0 out of 6
        assert_eq!(familiarity(None, Some(0), max(3), 0), 35);
        // 2.1 + 3 out of 6
        assert_eq!(familiarity(None, Some(3), max(3), 55), 85);
        // 4.2 + 3 out of 12
        assert_eq!(familiarity(None, Some(3), max(6), 0), 60);
        // 0.7 + 1 out of 2
        assert_eq!(familiarity(Some(1), None, max(1), 55), 85);
        assert_eq!(familiarity(None, Some(u64::MAX), max(u64::MAX), 0), 85);
    }

    #[test]
    fn no_data_at_all() {
        assert_eq!(familiarity(None, None, max(), 0), 0);
        assert_eq!(familiarity(None, None, max(), 55), 0);
    }

    #[test]
    fn missing_hit_penalty() {
        // 20000 out of 40000, minus 55%
        assert_eq!(familiarity(Some(0), Some(20_000), max(), 55), 22);
        assert_eq!(familiarity(Some(20_000), Some(0), max(), 0), 50);
        assert_eq!(familiarity(Some(20_000), Some(0), max(), 100), 0);
        // 14000 edge + true zero
        assert_eq!(familiarity(None, Some(0), max(), 50), 17);
    }

    fn scorer(root: &std::path::Path, whitelist: &[&str]) -> Scorer {
        std::fs::create_dir_all(root.join("t")).unwrap();
        std::fs::write(root.join("t/the.txt"), "the cat\t30000\nthe dog\t9000\n").unwrap();
        std::fs::create_dir_all(root.join("c")).unwrap();
        std::fs::write(root.join("c/cat.txt"), "cat sat\t5000\ncat purred\t0\n").unwrap();
        Scorer::new(
            score_config(root),
            Dictionary::open(root).unwrap(),
            in_memory(whitelist),
        )
    }

    #[test]
    fn whitelisted_words() {
        let dir = tempdir().unwrap();
        let scorer = scorer(dir.path(), &["Frodo"]);
        let full = FamiliarityReport {
            frequency_before: Some(20_000),
            frequency_after: Some(20_000),
            score: 100,
        };
        assert_eq!(scorer.score("xyzzy", "Frodo,", "plugh").unwrap(), full);
        assert_eq!(scorer.score("", "42", "").unwrap(), full);

        // Whitelisted neighbors count as a perfect match on their side
        let report = scorer.score("Frodo", "cat", "sat").unwrap();
        assert_eq!(report.frequency_before, Some(20_000));
        assert_eq!(report.frequency_after, Some(5_000));
        assert_eq!(report.score, 62);
    }

    #[test]
    fn dictionary_lookups() {
        let dir = tempdir().unwrap();
        let scorer = scorer(dir.path(), &[]);

        // Frequencies are reported raw, but capped in the score
        let report = scorer.score("The", "cat", "sat.").unwrap();
        assert_eq!(
            report,
            FamiliarityReport {
                frequency_before: Some(30_000),
                frequency_after: Some(5_000),
                score: 62,
            }
        );

        // First word of a text
        let report = scorer.score("", "the", "dog").unwrap();
        assert_eq!(report.frequency_before, None);
        assert_eq!(report.frequency_after, Some(9_000));
        assert_eq!(report.score, 57);

        // Both word pairs unknown
        let report = scorer.score("a", "zebra", "ate").unwrap();
        assert_eq!(report.frequency_before, None);
        assert_eq!(report.frequency_after, None);
        assert_eq!(report.score, 0);

        // One word pair known with a zero count
        let report = scorer.score("the", "cat", "purred").unwrap();
        assert_eq!(report.frequency_after, Some(0));
        assert_eq!(report.score, 22);
    }
}
