//! Reduction of yearly corpus records into per-word-pair totals

use crate::{config::BuildConfig, normalize, tsv::Entry, Count, Key};
use std::sync::Arc;

/// Accumulated knowledge about one run of records sharing a canonical key
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateEntry {
    /// Canonical word pair
    pub key: Key,

    /// Number of occurences within the configured year range
    pub total_count: Count,

    /// Number of publications with occurences, across all years
    pub total_publications: Count,
}
//
impl AggregateEntry {
    /// Start accumulating data from the first record of a word pair
    fn new(key: Key, entry: &Entry, config: &BuildConfig) -> Self {
        let mut result = Self {
            key,
            total_count: 0,
            total_publications: 0,
        };
        result.add_year(entry, config);
        result
    }

    /// Fold another yearly record of the same word pair into the totals
    ///
    /// Publication counts are summed regardless of the year, as they measure
    /// how widespread a word pair is rather than how much it is used within
    /// the period of interest.
    fn add_year(&mut self, entry: &Entry, config: &BuildConfig) {
        if config.years.contains(&entry.year) {
            self.total_count += entry.occurrence_count;
        }
        self.total_publications += entry.publication_count;
    }
}

/// Accumulator for the records of a single source file
///
/// Records must come grouped by phrase, as they do in the corpus files. No
/// global sorting is performed, so if case-equivalent or otherwise
/// equivalent phrases are not contiguous, the same key will be emitted
/// several times. Merging these duplicates is the job of consolidation.
#[derive(Debug)]
pub struct Aggregator {
    /// Data collection configuration
    config: Arc<BuildConfig>,

    /// Word pair that is currently being accumulated, if any
    current: Option<AggregateEntry>,
}
//
impl Aggregator {
    /// Set up the accumulator
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self {
            config,
            current: None,
        }
    }

    /// Integrate a new corpus record
    ///
    /// If this record starts a new word pair, the previous word pair is
    /// finalized and returned, provided that it is frequent enough to make it
    /// into the dictionary.
    pub fn add_record(&mut self, entry: Entry) -> Option<AggregateEntry> {
        // Records that don't normalize to a word pair are ignored entirely
        let key = normalize::normalize(&entry.phrase)?;

        // If the record is about the current word pair, merge it into the
        // current word pair's totals
        if let Some(current) = &mut self.current {
            if current.key == key {
                current.add_year(&entry, &self.config);
                return None;
            }
        }

        // Otherwise, flush the current word pair and make this record the
        // start of a new one
        let next = AggregateEntry::new(key, &entry, &self.config);
        self.switch_key(Some(next))
    }

    /// Finalize the last word pair at the end of the source file
    pub fn finish(mut self) -> Option<AggregateEntry> {
        self.switch_key(None)
    }

    /// Replace the current word pair, and tell if the former one is kept
    ///
    /// This should be done when it is established that no other record for
    /// this word pair will come, either because we just moved to a different
    /// word pair or because we reached the end of the source file.
    fn switch_key(&mut self, next: Option<AggregateEntry>) -> Option<AggregateEntry> {
        let former = std::mem::replace(&mut self.current, next)?;
        if self
            .config
            .is_acceptable(former.total_count, former.total_publications)
        {
            log::trace!("Accepted {former:?} into the dictionary");
            Some(former)
        } else {
            log::trace!("Rejected {former:?} from the dictionary due to insufficient occurences");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::build_config;
    use std::path::Path;

    fn record(phrase: &str, year: i16, occurrence_count: u64, publication_count: u64) -> Entry {
        Entry {
            phrase: phrase.into(),
            year,
            occurrence_count,
            publication_count,
        }
    }

    fn aggregate(records: impl IntoIterator<Item = Entry>) -> Vec<AggregateEntry> {
        let mut aggregator = Aggregator::new(build_config(Path::new("in"), Path::new("out")));
        let mut result = records
            .into_iter()
            .filter_map(|record| aggregator.add_record(record))
            .collect::<Vec<_>>();
        result.extend(aggregator.finish());
        result
    }

    #[test]
    fn single_record() {
        assert_eq!(
            aggregate([record("cat sat", 2000, 300, 3)]),
            [AggregateEntry {
                key: "cat sat".into(),
                total_count: 300,
                total_publications: 3,
            }]
        );
        assert!(aggregate([record("cat sat", 2000, 10, 3)]).is_empty());
        assert!(aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn years_gate_counts_but_not_publications() {
        let entries = aggregate([
            record("cat_NOUN sat", 1950, 1000, 1),
            record("cat_NOUN sat", 1980, 200, 1),
            record("Cat sat", 2000, 100, 1),
            record("cat sat", 2013, 5000, 1),
        ]);
        assert_eq!(
            entries,
            [AggregateEntry {
                key: "cat sat".into(),
                total_count: 300,
                total_publications: 4,
            }]
        );
    }

    #[test]
    fn thresholds() {
        let entries = aggregate([
            // Frequent enough, but in a single publication
            record("rare bird", 2000, 1000, 1),
            // Widespread, but not frequent enough within the year range
            record("old news", 1900, 1000, 50),
            record("old news", 2000, 249, 50),
            // Just enough of both
            record("good enough", 1999, 125, 1),
            record("good enough", 2000, 125, 1),
        ]);
        let keys = entries.iter().map(|e| &*e.key).collect::<Vec<_>>();
        assert_eq!(keys, ["good enough"]);
    }

    #[test]
    fn rejected_records_are_ignored_entirely() {
        let entries = aggregate([
            record("dog ran", 2000, 200, 1),
            // Rejected records do not split or feed the surrounding run
            record("dog 66", 2000, 1_000_000, 1000),
            record("dog ran", 2001, 50, 1),
            record("dog", 2000, 1_000_000, 1000),
        ]);
        assert_eq!(
            entries,
            [AggregateEntry {
                key: "dog ran".into(),
                total_count: 250,
                total_publications: 2,
            }]
        );
    }

    #[test]
    fn non_contiguous_runs_are_emitted_separately() {
        let entries = aggregate([
            record("Big deal", 2000, 300, 2),
            record("big cat", 2000, 300, 2),
            record("big deal", 2000, 400, 2),
        ]);
        let totals = entries
            .iter()
            .map(|e| (&*e.key, e.total_count))
            .collect::<Vec<_>>();
        assert_eq!(totals, [("big deal", 300), ("big cat", 300), ("big deal", 400)]);
    }
}
