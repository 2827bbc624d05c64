//! Decoding of gzipped TSV source files from Google

use crate::{progress::ProgressTracker, Count, Result, Year};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::AsyncReaderBuilder;
use futures::{Stream, TryStreamExt};
use serde::Deserialize;
use std::path::Path;
use tokio::{fs::File, io::BufReader};
use tokio_util::io::InspectReader;

/// Record from a source file
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct Entry {
    /// Raw (case-sensitive, possibly tagged) phrase being studied
    pub phrase: Box<str>,

    /// Year on which the data was recorded
    pub year: Year,

    /// Number of recorded occurences
    pub occurrence_count: Count,

    /// Number of books across which occurences were recorded
    pub publication_count: Count,
}

/// Open a source file and stream its records
///
/// Compressed bytes are reported to `bytes` as they are read.
pub async fn read_source(
    path: &Path,
    bytes: ProgressTracker,
) -> Result<impl Stream<Item = Result<Entry>>> {
    // Open the source file and track how much of it has been read
    let file = File::open(path)
        .await
        .with_context(|| format!("opening source file {}", path.display()))?;
    let len = file
        .metadata()
        .await
        .with_context(|| format!("querying size of source file {}", path.display()))?
        .len();
    bytes.add_work(len);
    let gz_bytes = BufReader::new(InspectReader::new(file, move |block: &[u8]| {
        bytes.make_progress(block.len() as u64);
    }));

    // Apply gzip decoder to compressed bytes
    let mut tsv_bytes = GzipDecoder::new(gz_bytes);
    tsv_bytes.multiple_members(true);

    // Apply TSV decoder to uncompressed bytes. Phrases may contain quotes,
    // which have no special meaning in this dataset.
    let entries = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .create_deserializer(tsv_bytes)
        .into_deserialize::<Entry>();
    let context = format!("decoding source file {}", path.display());
    Ok(entries.map_err(move |e| anyhow::Error::new(e).context(context.clone())))
}
