//! Construction of the dictionary from corpus source files
//!
//! Each source file is processed independently: its records are reduced into
//! per-word-pair totals, which are appended to the shards that the source
//! owns, and then these shards are consolidated. Source files are claimed
//! using progress markers, so several processes can build the same
//! dictionary without stepping on each other's toes.

use crate::{
    aggregate::Aggregator,
    config::BuildConfig,
    consolidate::consolidate,
    progress::{BuildProgress, ProgressReport},
    shard::{self, Completion, Marker, ShardWriter, SourceId, BUCKET_CHARS},
    tsv, Result,
};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    path::PathBuf,
    pin::pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

/// Result of processing a single source file
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceOutcome {
    /// The source file was reduced into its shards
    Built {
        /// Number of records read from the source file
        records: usize,

        /// Number of distinct word pairs across the source's shards
        entries: usize,

        /// Processing time
        elapsed: Duration,
    },

    /// The source file was already processed
    AlreadyBuilt,

    /// Another worker has claimed the source file
    Claimed,

    /// Our progress marker vanished, someone else finished or cleaned up
    MarkerVanished,

    /// The build is winding down, the source file was not looked at
    Stopped,
}

/// Summary of a dictionary build
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BuildSummary {
    /// Source files found in the input directory
    pub found: usize,

    /// Source files that were processed by this run
    pub built: usize,

    /// Source files that had been processed or claimed before
    pub skipped: usize,

    /// Distinct word pairs written by this run
    pub entries: usize,
}
//
impl Display for BuildSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.found == 0 {
            write!(f, "Note: no source file found")
        } else {
            write!(
                f,
                "Processed {} of {} source files ({} skipped), recording {} word pairs.",
                self.built, self.found, self.skipped, self.entries
            )
        }
    }
}

/// Shared state of the workers of one build
#[derive(Debug)]
struct BuildContext {
    /// Build configuration
    config: Arc<BuildConfig>,

    /// Progress tracking
    progress: BuildProgress,

    /// Sources currently claimed by this process
    claims: Mutex<HashSet<SourceId>>,

    /// Truth that no new source should be started
    stopping: AtomicBool,
}
//
impl BuildContext {
    /// Access the set of claimed sources
    fn claims(&self) -> std::sync::MutexGuard<'_, HashSet<SourceId>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Find the source files that are present in the input directory
pub fn discover_sources(config: &BuildConfig) -> Vec<(SourceId, PathBuf)> {
    SourceId::all()
        .map(|source| (source, config.source_path(source)))
        .filter(|(_, path)| path.is_file())
        .collect()
}

/// Build the dictionary from every available source file
///
/// A failed source does not stop the others, but makes the build fail once
/// everything else is done. If the build is interrupted with Ctrl+C, the
/// partial output of all sources claimed by this process is removed.
pub async fn build_all(config: Arc<BuildConfig>, report: &ProgressReport) -> Result<BuildSummary> {
    let sources = discover_sources(&config);
    let mut summary = BuildSummary {
        found: sources.len(),
        ..Default::default()
    };
    if sources.is_empty() {
        log::warn!(
            "No source file named {}<id>.gz found in {}",
            config.input_base,
            config.input_dir.display()
        );
        return Ok(summary);
    }
    let context = Arc::new(BuildContext {
        config: config.clone(),
        progress: BuildProgress::new(report, sources.len()),
        claims: Mutex::new(HashSet::new()),
        stopping: AtomicBool::new(false),
    });

    // Process source files, up to the configured number at once
    let mut outcomes = Box::pin(
        stream::iter(sources)
            .map(|(source, path)| {
                let context = context.clone();
                async move {
                    let outcome = build_source(&context, source, path).await;
                    (source, outcome)
                }
            })
            .buffer_unordered(config.jobs.get()),
    );
    let mut failures = 0;
    loop {
        let next = tokio::select! {
            next = outcomes.next() => Some(next),
            interrupt = tokio::signal::ctrl_c() => {
                interrupt.context("listening for Ctrl+C")?;
                None
            }
        };
        let Some(next) = next else {
            // Cancel in-flight work before removing its output
            drop(outcomes);
            return Err(abort(&context).await);
        };
        let Some((source, outcome)) = next else {
            break;
        };
        match outcome {
            Ok(SourceOutcome::Built {
                records,
                entries,
                elapsed,
            }) => {
                log::info!(
                    "Reduced [{source}] from {records} records to {entries} entries in {:.1}s",
                    elapsed.as_secs_f32()
                );
                summary.built += 1;
                summary.entries += entries;
            }
            Ok(SourceOutcome::AlreadyBuilt | SourceOutcome::Claimed) => summary.skipped += 1,
            Ok(SourceOutcome::MarkerVanished) => {
                log::info!(
                    "Progress marker of [{source}] not found, stopping with [{source}] completed"
                );
                context.stopping.store(true, Ordering::Release);
            }
            Ok(SourceOutcome::Stopped) => {}
            Err(e) => {
                log::error!(
                    "Failed to process [{source}], its partial output is left for cleanup: {e:#}"
                );
                failures += 1;
            }
        }
    }
    anyhow::ensure!(
        failures == 0,
        "failed to process {failures} source file(s), run the cleanup mode before retrying"
    );
    Ok(summary)
}

/// Remove the partial output of the sources claimed by this process
async fn abort(context: &BuildContext) -> anyhow::Error {
    log::warn!("Canceling, removing partial files");
    let claimed = context.claims().drain().collect::<Vec<_>>();
    for source in claimed {
        if let Err(e) = shard::purge(&context.config.output, source).await {
            return e.context(format!("removing partial files of [{source}] after Ctrl+C"));
        }
    }
    anyhow::format_err!("interrupted by Ctrl+C, partial files were removed")
}

/// Process a single source file, unless it's already done or claimed
async fn build_source(
    context: &BuildContext,
    source: SourceId,
    path: PathBuf,
) -> Result<SourceOutcome> {
    let root = &context.config.output;
    if context.stopping.load(Ordering::Acquire) {
        context.progress.source_done();
        return Ok(SourceOutcome::Stopped);
    }
    let built = shard::is_built(root, source).await;
    if built.inspect_err(|_| context.progress.source_done())? {
        log::debug!("Source [{source}] was already processed");
        context.progress.source_done();
        return Ok(SourceOutcome::AlreadyBuilt);
    }

    // Claim the source file
    let claim = ShardWriter::begin(root, source).await;
    let Some(mut writer) = claim.inspect_err(|_| context.progress.source_done())? else {
        context.progress.source_done();
        return Ok(SourceOutcome::Claimed);
    };
    context.claims().insert(source);
    context.progress.source_claimed(BUCKET_CHARS.len());
    log::info!("Processing [{source}]");
    let start = Instant::now();

    // Reduce the records of the source file into the shards
    let records = tsv::read_source(&path, context.progress.bytes()).await;
    context.progress.source_done();
    let mut records = pin!(records?);
    let mut aggregator = Aggregator::new(context.config.clone());
    let mut num_records = 0;
    while let Some(record) = records.next().await {
        num_records += 1;
        if let Some(entry) = aggregator.add_record(record?) {
            writer.write(&entry).await?;
        }
    }
    if let Some(entry) = aggregator.finish() {
        writer.write(&entry).await?;
    }
    let marker = writer.close().await?;
    finish_source(context, marker, num_records, start).await
}

/// Consolidate the shards of a reduced source file, then release it
///
/// Stops early without an error if the progress marker vanishes, as this
/// means that someone else finished or cleaned up this source file.
async fn finish_source(
    context: &BuildContext,
    marker: Marker,
    records: usize,
    start: Instant,
) -> Result<SourceOutcome> {
    // Merge duplicates and sort shards by decreasing frequency
    let source = marker.source();
    let shard_paths = marker.shard_paths().collect::<Vec<_>>();
    let mut entries = 0;
    for (idx, shard_path) in shard_paths.iter().enumerate() {
        if !marker.is_present().await? {
            context.progress.shards_done(shard_paths.len() - idx);
            context.claims().remove(&source);
            return Ok(SourceOutcome::MarkerVanished);
        }
        entries += consolidate(shard_path).await?;
        context.progress.shards_done(1);
    }

    // Release the source file
    let completion = marker.complete().await?;
    context.claims().remove(&source);
    Ok(match completion {
        Completion::Done => SourceOutcome::Built {
            records,
            entries,
            elapsed: start.elapsed(),
        },
        Completion::Vanished => SourceOutcome::MarkerVanished,
    })
}
