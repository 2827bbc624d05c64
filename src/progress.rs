//! Progress reporting infrastructure

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{
    borrow::Cow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// CLI progress report of ongoing operations
///
/// To avoid corrupted terminal output, you should not write anything to stdout
/// or stderr yourself as long as a report is being displayed. Please use logs
/// for debug messages.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Track progress without displaying anything
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self(MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::hidden(),
        ))
    }

    /// Prepare to report on a new operation
    pub fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        config: ProgressConfig,
    ) -> ProgressTracker {
        let ProgressConfig {
            initial_work,
            show_rate,
            can_add_work,
        } = config;
        let style_trailer = match (initial_work, show_rate) {
            (Work::Steps(_), false) => "{pos}/{len}",
            (Work::Steps(_), true) => "{pos}/{len} ({per_sec})",
            (Work::Bytes(_), false) => "{decimal_bytes}/{decimal_total_bytes}",
            (Work::Bytes(_), true) => {
                "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec}, ~{eta} left)"
            }
        };
        let bar = ProgressBar::new(initial_work.into())
            .with_prefix(what.into())
            .with_style(
                ProgressStyle::with_template(&format!("{{prefix}} {{wide_bar}} {style_trailer}"))
                    .expect("all styles above should be valid indicatif styles"),
            );
        let added = u64::from(initial_work) > 0;
        if added {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
            added: Arc::new(AtomicBool::new(added)),
            upcoming: Arc::new(AtomicBool::new(can_add_work)),
        }
    }
}

/// Progress bar configuration
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Initial length of the progress bar
    initial_work: Work,

    /// Show the completion rate
    show_rate: bool,

    /// Can add more work after initial configuration
    can_add_work: bool,
}
//
impl ProgressConfig {
    /// Default configuration, with some initial amount of work
    pub fn new(initial_work: Work) -> Self {
        Self {
            initial_work,
            show_rate: true,
            can_add_work: false,
        }
    }

    /// Disable display of the completion rate
    pub fn dont_show_rate(self) -> Self {
        Self {
            show_rate: false,
            ..self
        }
    }

    /// Enable addition of work after initial configuration
    pub fn allow_adding_work(self) -> Self {
        Self {
            can_add_work: true,
            ..self
        }
    }
}

/// Work whose progression can be tracked
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Steps to be taken, with a precise count display
    Steps(usize),

    /// Bytes to be processed
    Bytes(usize),
}
//
impl From<Work> for u64 {
    fn from(value: Work) -> Self {
        let (Work::Steps(inner) | Work::Bytes(inner)) = value;
        inner as u64
    }
}

/// Mechanism to track progress
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Progress bar for this specific process
    bar: ProgressBar,

    /// Underlying process report
    report: MultiProgress,

    /// Truth that the progress bar has already been added to the report
    added: Arc<AtomicBool>,

    /// Truth that more work can still be added to this progress bar
    upcoming: Arc<AtomicBool>,
}
//
impl ProgressTracker {
    /// Show that a certain amount of progress has been made
    ///
    /// Returns truth that the progress bar has reached its maximum value
    pub fn make_progress(&self, progress: u64) -> bool {
        // Track progress
        self.bar.inc(progress);
        let current = self.bar.position();
        let max = self.bar.length().unwrap_or(0);
        assert!(current <= max, "recorded more progress than expected");

        // Hide progress bar once done
        let finished = current == max && !self.upcoming.load(Ordering::Acquire);
        if finished {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }

    /// Increment the amount of progress that remains to be done
    ///
    /// Note that this operation is disabled by default, and you must enable it
    /// in [`ProgressConfig`]. If you use it, call `done_adding_work()` once you
    /// know no further work will be coming.
    pub fn add_work(&self, remaining: u64) {
        assert!(
            self.upcoming.load(Ordering::Acquire),
            "should not increment remaining progress after done_adding_work"
        );
        if !self.added.swap(true, Ordering::AcqRel) && remaining > 0 {
            self.report.add(self.bar.clone());
        }
        self.bar.inc_length(remaining);
    }

    /// Promise that add_work will not be called anymore
    ///
    /// This allows for the progress bar to be hidden once full.
    pub fn done_adding_work(&self) {
        assert!(
            self.upcoming.swap(false, Ordering::Release),
            "should only need to freeze remaining progress once"
        );
        if self.bar.position() == self.bar.length().unwrap_or(0) {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
    }
}

/// Progress of a dictionary build
///
/// Source files are claimed one after another, their compressed bytes are
/// tracked as they are read, and then their shards are consolidated.
#[derive(Clone, Debug)]
pub struct BuildProgress {
    /// Source files that have been claimed or skipped
    sources: ProgressTracker,

    /// Compressed bytes read from claimed source files
    bytes: ProgressTracker,

    /// Shards of claimed source files that have been consolidated
    shards: ProgressTracker,
}
//
impl BuildProgress {
    /// Start tracking the build of a certain number of source files
    pub fn new(report: &ProgressReport, num_sources: usize) -> Self {
        let sources = report.add(
            "Claiming source files",
            ProgressConfig::new(Work::Steps(num_sources)).dont_show_rate(),
        );
        let bytes = report.add(
            "Reducing source files",
            ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
        );
        let shards = report.add(
            "Consolidating shards",
            ProgressConfig::new(Work::Steps(0)).allow_adding_work(),
        );
        if num_sources == 0 {
            bytes.done_adding_work();
            shards.done_adding_work();
        }
        Self {
            sources,
            bytes,
            shards,
        }
    }

    /// Record that a source file was claimed, with some shards to consolidate
    ///
    /// This must be done before calling `source_done()` for that source.
    pub fn source_claimed(&self, num_shards: usize) {
        self.shards.add_work(num_shards as u64);
    }

    /// Tracker for the bytes of a claimed source file
    ///
    /// Source sizes must be added to it before calling `source_done()`.
    pub fn bytes(&self) -> ProgressTracker {
        self.bytes.clone()
    }

    /// Record that a source file has been claimed or skipped
    pub fn source_done(&self) {
        if self.sources.make_progress(1) {
            self.bytes.done_adding_work();
            self.shards.done_adding_work();
        }
    }

    /// Record that some shards are consolidated, or won't be
    pub fn shards_done(&self, num_shards: usize) {
        self.shards.make_progress(num_shards as u64);
    }
}
