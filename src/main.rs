//! This program is based on the Google Books Ngram dataset, whose general
//! documentation you can find at
//! <http://storage.googleapis.com/books/ngrams/books/datasetsv2.html>.
//!
//! It reduces the 2-gram files of that dataset into a compact dictionary of
//! word pairs sharded by prefix, then uses that dictionary to rate how
//! familiar each word of a text sounds next to its neighbors.

mod aggregate;
mod build;
mod config;
mod consolidate;
mod lookup;
mod normalize;
mod progress;
mod render;
mod score;
mod shard;
mod text;
mod tsv;
mod whitelist;

use crate::{
    config::{BuildConfig, ScoreConfig},
    lookup::Dictionary,
    progress::ProgressReport,
    render::OutputFormat,
    score::Scorer,
    whitelist::Whitelist,
};
use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;
use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Build a word pair dictionary from the Google Books Ngram corpus, then use
/// it to highlight unusual word associations in a text
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Operating modes
#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce 2-gram source files into a frequency-sorted dictionary
    Build(BuildArgs),

    /// Remove partial dictionary files left behind by an interrupted build
    ///
    /// Don't run this while a build is running in another process, or its
    /// work in progress will be destroyed.
    Cleanup(CleanupArgs),

    /// Rate the familiarity of every word of a text
    Score(ScoreArgs),

    /// Edit the list of words which always get a passing grade
    Whitelist(WhitelistArgs),
}

/// Dictionary construction parameters
#[derive(ClapArgs, Debug)]
struct BuildArgs {
    /// Directory where the gzipped 2-gram source files are located
    #[arg(short, long, default_value = ".")]
    input_dir: PathBuf,

    /// Common file name prefix of the source files
    ///
    /// Source files are expected to be called <INPUT_BASE><ab>.gz, where "a"
    /// is a letter and "b" is either a letter or an underscore.
    #[arg(long, default_value = "googlebooks-eng-us-all-2gram-20120701-")]
    input_base: Box<str>,

    /// Directory where the dictionary will be created
    #[arg(short, long, default_value = "dictionary/")]
    output: PathBuf,

    /// Earliest year whose occurences count towards a word pair's frequency
    ///
    /// Old books may not reflect modern language usage, so by default we
    /// only look at the last 40 years of the dataset.
    #[arg(short, long, default_value_t = DATASET_PUBLICATION_YEAR - 40)]
    start_year: Year,

    /// Latest year whose occurences count towards a word pair's frequency
    #[arg(short, long, default_value_t = DATASET_PUBLICATION_YEAR)]
    end_year: Year,

    /// Minimal number of occurences within the year range
    ///
    /// Word pairs that are seen less often than this are not recorded.
    #[arg(short = 'f', long, default_value = "250")]
    min_frequency: NonZeroU64,

    /// Minimal number of publications, over all years
    ///
    /// A word pair that only appears in a single book may be an OCR error or
    /// an author's quirk, so we require it to be seen in several books.
    #[arg(short = 'p', long, default_value = "2")]
    min_publications: NonZeroU64,

    /// Number of source files processed concurrently by this process
    ///
    /// Independent processes can also work on the same dictionary, each
    /// source file being claimed by a single process.
    #[arg(short, long, default_value = "1")]
    jobs: NonZeroUsize,
}

/// Cleanup parameters
#[derive(ClapArgs, Debug)]
struct CleanupArgs {
    /// Directory of the dictionary to be cleaned up
    #[arg(short, long, default_value = "dictionary/")]
    output: PathBuf,
}

/// Text scoring parameters
#[derive(ClapArgs, Debug)]
struct ScoreArgs {
    /// Text file to be processed
    input: PathBuf,

    /// File where the report should be saved, overwriting it if it exists
    ///
    /// The report is printed on stdout if this is not specified.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Kind of report to produce
    #[arg(short = 't', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Dictionary to be used
    #[arg(short, long, default_value = "dictionary/")]
    dictionary: PathBuf,

    /// Word pair frequency above which familiarity does not improve
    ///
    /// Higher values make the score more sensitive.
    #[arg(short = 'm', long, default_value = "20000")]
    max_frequency: NonZeroU64,

    /// Percentage removed from a word's score when one of its word pairs is
    /// not in the dictionary at all
    ///
    /// Higher values make missing word pairs stand out more.
    #[arg(long, default_value = "55", value_parser = clap::value_parser!(u8).range(0..=100))]
    missing_hit: u8,
}

/// Whitelist edition parameters
#[derive(ClapArgs, Debug)]
struct WhitelistArgs {
    /// Dictionary whose whitelist is being edited
    #[arg(short, long, default_value = "dictionary/")]
    dictionary: PathBuf,

    #[command(subcommand)]
    action: WhitelistAction,
}

/// Whitelist edits
#[derive(Subcommand, Debug)]
enum WhitelistAction {
    /// Never flag this word again
    Add { word: Box<str> },

    /// Remove a word from the whitelist
    Remove { word: Box<str> },

    /// Display the whitelisted words
    List,
}
//
impl Args {
    /// Decode and validate CLI arguments
    pub fn parse_and_check() -> Result<Self> {
        // Decode CLI arguments
        let args = Args::parse();

        // Check CLI arguments for basic sanity
        match &args.command {
            Command::Build(build) => {
                anyhow::ensure!(
                    build.start_year <= build.end_year
                        && build.start_year <= DATASET_PUBLICATION_YEAR,
                    "requested year range excludes all books from the dataset"
                );
                anyhow::ensure!(
                    build.input_dir.is_dir(),
                    "input path {} not found",
                    build.input_dir.display()
                );
            }
            Command::Cleanup(cleanup) => {
                anyhow::ensure!(
                    cleanup.output.is_dir(),
                    "can't find the dictionary {} to clean up",
                    cleanup.output.display()
                );
            }
            Command::Score(_) | Command::Whitelist(_) => {}
        }
        Ok(args)
    }
}
//
#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse_and_check()?;

    // Dispatch to the requested operating mode
    match args.command {
        Command::Build(args) => {
            let report = ProgressReport::new();
            let config = BuildConfig::new(args);
            let summary = build::build_all(config, &report).await?;
            let mut stdout = BufWriter::new(tokio::io::stdout());
            stdout.write_all(summary.to_string().as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Command::Cleanup(args) => {
            let purged = shard::cleanup(&args.output).await?;
            println!("Removed partial dictionaries for {purged} source file(s).");
        }
        Command::Score(args) => {
            let input = args.input.clone();
            let out = args.out.clone();
            let config = ScoreConfig::new(args);
            score_text(config, &input, out.as_deref()).await?;
        }
        Command::Whitelist(args) => edit_whitelist(args).await?,
    }
    Ok(())
}

/// Score a text file and emit the requested report
async fn score_text(config: Arc<ScoreConfig>, input: &Path, out: Option<&Path>) -> Result<()> {
    // Load the dictionary and whitelist
    let whitelist = Whitelist::load(&config.dictionary).await?;
    let dictionary = Dictionary::open(&config.dictionary)?;
    let scorer = Scorer::new(config.clone(), dictionary, whitelist);

    // Score every word of the text
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading input text {}", input.display()))?;
    let words = text::scan(&content);
    let reports = text::score_words(&scorer, &words)?;

    // Emit the report
    let title = input
        .file_name()
        .map_or_else(|| input.display().to_string(), |name| name.to_string_lossy().into_owned());
    let output: Box<dyn AsyncWrite + Send + Unpin> = match out {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating report file {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    render::render(config.format, &title, &words, &reports, output).await
}

/// Apply a whitelist edit
async fn edit_whitelist(args: WhitelistArgs) -> Result<()> {
    let mut whitelist = Whitelist::load(&args.dictionary).await?;
    match args.action {
        WhitelistAction::Add { word } => {
            if whitelist.add(&word).await? {
                println!("Word [{word}] will now be ignored when using this dictionary.");
            } else {
                println!("Word not added to the whitelist. [{word}] is already in it.");
            }
        }
        WhitelistAction::Remove { word } => {
            let removed = whitelist.remove(&word).await?;
            println!("Found and removed {removed} instance(s) of [{word}].");
        }
        WhitelistAction::List => {
            for word in whitelist.words() {
                println!("{word}");
            }
        }
    }
    Ok(())
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Year where the dataset that we use was published
pub const DATASET_PUBLICATION_YEAR: Year = 2012;

/// Canonical word pair, see [`normalize::normalize()`]
pub type Key = Box<str>;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Number of occurences or publications
///
/// According to
/// https://github.com/orgtre/google-books-ngram-frequency?tab=readme-ov-file#the-underlying-corpus,
/// English can have >283 billion matches over 10 years, so u32 would not be
/// enough for the most common word pairs once years are summed.
pub type Count = u64;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
