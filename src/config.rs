//! Processing configuration

use crate::{render::OutputFormat, shard::SourceId, BuildArgs, Count, ScoreArgs, Year};
use std::{
    num::{NonZeroU64, NonZeroUsize},
    ops::RangeInclusive,
    path::PathBuf,
    sync::Arc,
};

/// Dictionary construction configuration
///
/// This is the result of digesting [`BuildArgs`]. Please refer to it to know
/// more about individual fields.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BuildConfig {
    pub input_dir: PathBuf,
    pub input_base: Box<str>,
    pub output: PathBuf,
    pub years: RangeInclusive<Year>,
    pub min_frequency: NonZeroU64,
    pub min_publications: NonZeroU64,
    pub jobs: NonZeroUsize,
}
//
impl BuildConfig {
    /// Determine build configuration from CLI arguments
    pub(crate) fn new(args: BuildArgs) -> Arc<Self> {
        let BuildArgs {
            input_dir,
            input_base,
            output,
            start_year,
            end_year,
            min_frequency,
            min_publications,
            jobs,
        } = args;
        Arc::new(Self {
            input_dir,
            input_base,
            output,
            years: start_year..=end_year,
            min_frequency,
            min_publications,
            jobs,
        })
    }

    /// Location of the compressed source file with a certain identifier
    pub fn source_path(&self, source: SourceId) -> PathBuf {
        self.input_dir.join(format!("{}{source}.gz", self.input_base))
    }

    /// Truth that a word pair with these totals belongs in the dictionary
    pub fn is_acceptable(&self, total_count: Count, total_publications: Count) -> bool {
        total_count >= self.min_frequency.get() && total_publications >= self.min_publications.get()
    }
}

/// Text scoring configuration
///
/// This is the result of digesting [`ScoreArgs`]. Please refer to it to know
/// more about individual fields.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ScoreConfig {
    pub dictionary: PathBuf,
    pub format: OutputFormat,
    pub max_frequency: NonZeroU64,
    pub missing_hit_pct: u8,
}
//
impl ScoreConfig {
    /// Determine scoring configuration from CLI arguments
    pub(crate) fn new(args: ScoreArgs) -> Arc<Self> {
        let ScoreArgs {
            input: _,
            out: _,
            format,
            dictionary,
            max_frequency,
            missing_hit,
        } = args;
        Arc::new(Self {
            dictionary,
            format,
            max_frequency,
            missing_hit_pct: missing_hit,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    /// Build configuration used across unit tests
    pub fn build_config(input_dir: &Path, output: &Path) -> Arc<BuildConfig> {
        Arc::new(BuildConfig {
            input_dir: input_dir.into(),
            input_base: "2gram-".into(),
            output: output.into(),
            years: 1972..=2012,
            min_frequency: NonZeroU64::new(250).unwrap(),
            min_publications: NonZeroU64::new(2).unwrap(),
            jobs: NonZeroUsize::new(1).unwrap(),
        })
    }

    /// Scoring configuration used across unit tests
    pub fn score_config(dictionary: &Path) -> Arc<ScoreConfig> {
        Arc::new(ScoreConfig {
            dictionary: dictionary.into(),
            format: OutputFormat::Text,
            max_frequency: NonZeroU64::new(20_000).unwrap(),
            missing_hit_pct: 55,
        })
    }

    #[test]
    fn thresholds_are_inclusive() {
        let config = build_config(Path::new("in"), Path::new("out"));
        assert!(config.is_acceptable(250, 2));
        assert!(!config.is_acceptable(249, 2));
        assert!(!config.is_acceptable(250, 1));
    }

    #[test]
    fn source_naming() {
        let config = build_config(Path::new("in"), Path::new("out"));
        let source = SourceId::all().find(|s| s.to_string() == "ca").unwrap();
        assert_eq!(config.source_path(source), Path::new("in/2gram-ca.gz"));
    }
}
