//! On-disk layout of the dictionary
//!
//! The dictionary root holds one directory per leading character of a word
//! pair. Inside of it, each file holds every word pair that shares a certain
//! three-character prefix, as newline-delimited `key<TAB>count` records:
//!
//! ```text
//! dictionary/c/cat.txt
//! dictionary/c/ca_.txt        <- "ca" or "ca xyz"
//! dictionary/c/_currently_working_on_ca.txt
//! ```
//!
//! Each source file of the corpus owns the 27 shard files that share its
//! two-character identifier. While a source is being processed, a marker
//! file is present next to its shards. Any shard of a source whose marker
//! is present should be considered garbage.

use crate::{aggregate::AggregateEntry, Result};
use anyhow::Context;
use std::{
    fmt::{self, Display, Formatter},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};

/// Characters that may appear in a shard or source identifier
///
/// Underscore stands for "anything else", including a missing character.
pub const BUCKET_CHARS: &[u8; 27] = b"_abcdefghijklmnopqrstuvwxyz";

/// Replacement for missing characters and spaces in identifiers
const PLACEHOLDER: u8 = b'_';

/// File name prefix of progress markers
const MARKER_PREFIX: &str = "_currently_working_on_";

/// Extension of temporary files used for atomic rewrites
pub const TMP_EXTENSION: &str = "txt.tmp";

/// Identifier of a corpus source file, e.g. "ab" or "a_"
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourceId([u8; 2]);
//
impl SourceId {
    /// Enumerate all possible source identifiers
    ///
    /// The first character is always a letter, as word pairs don't start
    /// with an underscore in the corpus.
    pub fn all() -> impl Iterator<Item = Self> {
        (BUCKET_CHARS[1..].iter())
            .flat_map(|&a| BUCKET_CHARS.iter().map(move |&b| Self([a, b])))
    }

    /// Shard files owned by this source
    pub fn shards(self) -> impl Iterator<Item = ShardId> {
        let [a, b] = self.0;
        BUCKET_CHARS.iter().map(move |&c| ShardId([a, b, c]))
    }

    /// Shard whose presence indicates that this source has been processed
    ///
    /// This is the first shard created by [`ShardWriter::begin()`].
    pub fn first_shard(self) -> ShardId {
        let [a, b] = self.0;
        ShardId([a, b, BUCKET_CHARS[0]])
    }

    /// Directory holding the shards of this source
    pub fn dir(self, root: &Path) -> PathBuf {
        root.join(char::from(self.0[0]).to_string())
    }

    /// Location of the progress marker of this source
    pub fn marker_path(self, root: &Path) -> PathBuf {
        self.dir(root).join(format!("{MARKER_PREFIX}{self}.txt"))
    }
}
//
impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b] = self.0;
        write!(f, "{}{}", char::from(a), char::from(b))
    }
}

/// Identifier of a shard file, i.e. a three-character word pair prefix
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ShardId([u8; 3]);
//
impl ShardId {
    /// Find out which shard a word pair belongs to
    ///
    /// Missing characters (short keys) and spaces are replaced with an
    /// underscore. Returns `None` if the key cannot be stored in the
    /// dictionary, which is never the case of normalized keys.
    pub fn of_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let mut id = [PLACEHOLDER; 3];
        for (idx, slot) in id.iter_mut().enumerate() {
            *slot = match chars.next() {
                None | Some(' ') if idx > 0 => PLACEHOLDER,
                Some(c @ ('a'..='z' | '_')) => c as u8,
                _ => return None,
            };
        }
        Some(Self(id))
    }

    /// Source file that owns this shard
    pub fn source(self) -> SourceId {
        let [a, b, _] = self.0;
        SourceId([a, b])
    }

    /// Location of this shard
    pub fn path(self, root: &Path) -> PathBuf {
        self.source().dir(root).join(format!("{self}.txt"))
    }
}
//
impl Display for ShardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}{}{}", char::from(a), char::from(b), char::from(c))
    }
}

/// Append-only writer for the shards of one source file
///
/// Shards are not deduplicated nor sorted at this stage, that is the job of
/// [`consolidate()`](crate::consolidate::consolidate).
#[derive(Debug)]
pub struct ShardWriter {
    /// Source file being processed
    source: SourceId,

    /// Location of the dictionary
    root: PathBuf,

    /// Output streams, in the order of [`SourceId::shards()`]
    outputs: Vec<(ShardId, BufWriter<File>)>,
}
//
impl ShardWriter {
    /// Claim a source file and start writing its shards
    ///
    /// Returns `None` if another worker has already claimed this source file.
    /// Otherwise, the progress marker has been created and all shards of this
    /// source exist and are empty.
    pub async fn begin(root: &Path, source: SourceId) -> Result<Option<Self>> {
        // Make sure the destination directory exists
        let dir = source.dir(root);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating dictionary directory {}", dir.display()))?;

        // Claim the source by creating its marker, which fails if it exists
        let marker = source.marker_path(root);
        let mut marker_file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::info!("Source [{source}] is already being worked on, skipping it");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("creating progress marker {}", marker.display()))
            }
        };
        marker_file
            .write_all(
                format!(
                    "This file will be removed when processing this dictionary entry ({source}) is complete.\n"
                )
                .as_bytes(),
            )
            .await
            .with_context(|| format!("writing progress marker {}", marker.display()))?;

        // Create empty shards to append entries to
        let mut outputs = Vec::with_capacity(BUCKET_CHARS.len());
        for shard in source.shards() {
            let path = shard.path(root);
            let file = File::create(&path)
                .await
                .with_context(|| format!("creating shard {}", path.display()))?;
            outputs.push((shard, BufWriter::new(file)));
        }
        Ok(Some(Self {
            source,
            root: root.into(),
            outputs,
        }))
    }

    /// Append an entry to the shard that it belongs to
    ///
    /// Returns `false` if the entry does not belong to this source file, in
    /// which case it is discarded.
    pub async fn write(&mut self, entry: &AggregateEntry) -> Result<bool> {
        let Some(shard) = ShardId::of_key(&entry.key).filter(|s| s.source() == self.source) else {
            log::trace!(
                "Discarded {entry:?}, which does not belong to source [{}]",
                self.source
            );
            return Ok(false);
        };
        let (_, output) = (self.outputs.iter_mut())
            .find(|(id, _)| *id == shard)
            .expect("all shards of the source should have been opened by begin()");
        output
            .write_all(format!("{}\t{}\n", entry.key, entry.total_count).as_bytes())
            .await
            .with_context(|| format!("appending to shard {}", shard.path(&self.root).display()))?;
        Ok(true)
    }

    /// Flush and close all shards, get ready for consolidation
    pub async fn close(self) -> Result<Marker> {
        for (shard, mut output) in self.outputs {
            output
                .flush()
                .await
                .with_context(|| format!("flushing shard {}", shard.path(&self.root).display()))?;
        }
        Ok(Marker {
            source: self.source,
            root: self.root,
        })
    }
}

/// Handle to the progress marker of a claimed source file
#[derive(Debug)]
pub struct Marker {
    /// Source file being processed
    source: SourceId,

    /// Location of the dictionary
    root: PathBuf,
}
//
/// Outcome of a progress marker removal
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    /// The marker was removed, the source is done
    Done,

    /// The marker had already been removed by someone else
    Vanished,
}
//
impl Marker {
    /// Source file that this marker is about
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Locations of the shards of this source file
    pub fn shard_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.source.shards().map(|shard| shard.path(&self.root))
    }

    /// Truth that the marker still exists on disk
    pub async fn is_present(&self) -> Result<bool> {
        let path = self.source.marker_path(&self.root);
        fs::try_exists(&path)
            .await
            .with_context(|| format!("checking for progress marker {}", path.display()))
    }

    /// Delete the marker, signaling that the source file is fully processed
    pub async fn complete(self) -> Result<Completion> {
        let path = self.source.marker_path(&self.root);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(Completion::Done),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Completion::Vanished),
            Err(e) => {
                Err(e).with_context(|| format!("removing progress marker {}", path.display()))
            }
        }
    }
}

/// Truth that a source file is being worked on, or was left half-done
pub async fn is_claimed(root: &Path, source: SourceId) -> Result<bool> {
    let path = source.marker_path(root);
    fs::try_exists(&path)
        .await
        .with_context(|| format!("checking for progress marker {}", path.display()))
}

/// Truth that a source file has already been processed
pub async fn is_built(root: &Path, source: SourceId) -> Result<bool> {
    let path = source.first_shard().path(root);
    let shard_exists = fs::try_exists(&path)
        .await
        .with_context(|| format!("checking for shard {}", path.display()))?;
    Ok(shard_exists && !is_claimed(root, source).await?)
}

/// Remove every partial dictionary left behind by interrupted builds
///
/// Returns the number of source files whose partial output was removed.
/// Running this on a clean dictionary does nothing.
pub async fn cleanup(root: &Path) -> Result<usize> {
    let mut purged = 0;
    for source in SourceId::all() {
        if is_claimed(root, source).await? {
            log::info!("Removing partial dictionary for [{source}]");
            purge(root, source).await?;
            purged += 1;
        }
    }
    Ok(purged)
}

/// Remove the shards, temporary files and progress marker of a source
pub async fn purge(root: &Path, source: SourceId) -> Result<()> {
    for shard in source.shards() {
        let path = shard.path(root);
        remove_if_exists(&path.with_extension(TMP_EXTENSION)).await?;
        remove_if_exists(&path).await?;
    }
    remove_if_exists(&source.marker_path(root)).await?;

    // Directories only exist as long as they have contents
    let dir = source.dir(root);
    if let Ok(mut entries) = fs::read_dir(&dir).await {
        if entries.next_entry().await?.is_none() {
            remove_if_exists_dir(&dir).await?;
        }
    }
    Ok(())
}

/// Remove a file, unless it's already gone
async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            Err(e).with_context(|| format!("removing {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// Remove an empty directory, unless it's already gone
async fn remove_if_exists_dir(path: &Path) -> Result<()> {
    match fs::remove_dir(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            Err(e).with_context(|| format!("removing directory {}", path.display()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(key: &str, total_count: u64) -> AggregateEntry {
        AggregateEntry {
            key: key.into(),
            total_count,
            total_publications: 10,
        }
    }

    fn source(id: &str) -> SourceId {
        SourceId::all().find(|s| s.to_string() == id).unwrap()
    }

    #[test]
    fn shard_derivation() {
        let id = |key| ShardId::of_key(key).map(|s| s.to_string());
        assert_eq!(id("cat sat").as_deref(), Some("cat"));
        assert_eq!(id("ca sat").as_deref(), Some("ca_"));
        assert_eq!(id("a cat").as_deref(), Some("a_c"));
        assert_eq!(id("ab").as_deref(), Some("ab_"));
        assert_eq!(id("c").as_deref(), Some("c__"));
        assert_eq!(id("_start_ the").as_deref(), Some("_st"));
        assert_eq!(id(" cat"), None);
        assert_eq!(id("Cat sat"), None);
        assert_eq!(id("ça va"), None);
        assert_eq!(id(""), None);
    }

    #[test]
    fn layout() {
        let root = Path::new("dict");
        assert_eq!(SourceId::all().count(), 26 * 27);
        assert_eq!(SourceId::all().next(), Some(source("a_")));
        assert_eq!(
            source("ca").marker_path(root),
            Path::new("dict/c/_currently_working_on_ca.txt")
        );
        assert_eq!(
            ShardId::of_key("cat sat").unwrap().path(root),
            Path::new("dict/c/cat.txt")
        );
        assert_eq!(ShardId::of_key("cat sat").unwrap().source(), source("ca"));
        assert_eq!(source("ca").first_shard().to_string(), "ca_");
        let shards = source("ca").shards().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(shards.len(), 27);
        assert_eq!(shards[0], "ca_");
        assert_eq!(shards[26], "caz");
    }

    #[tokio::test]
    async fn claim_write_complete() {
        let root = tempdir().unwrap();
        let root = root.path();
        let ca = source("ca");

        let mut writer = ShardWriter::begin(root, ca).await.unwrap().unwrap();
        assert!(is_claimed(root, ca).await.unwrap());
        assert!(!is_built(root, ca).await.unwrap());
        assert!(
            ShardWriter::begin(root, ca).await.unwrap().is_none(),
            "a claimed source cannot be claimed again"
        );

        assert!(writer.write(&entry("cat sat", 300)).await.unwrap());
        assert!(writer.write(&entry("cat sat", 20)).await.unwrap());
        assert!(writer.write(&entry("ca va", 400)).await.unwrap());
        assert!(!writer.write(&entry("dog sat", 500)).await.unwrap());
        let marker = writer.close().await.unwrap();
        assert_eq!(marker.shard_paths().count(), 27);
        assert!(marker.shard_paths().all(|path| path.is_file()));
        assert!(!root.join("d").exists());

        let cat = std::fs::read_to_string(root.join("c/cat.txt")).unwrap();
        assert_eq!(cat, "cat sat\t300\ncat sat\t20\n");
        let ca_ = std::fs::read_to_string(root.join("c/ca_.txt")).unwrap();
        assert_eq!(ca_, "ca va\t400\n");

        assert!(marker.is_present().await.unwrap());
        assert_eq!(marker.complete().await.unwrap(), Completion::Done);
        assert!(is_built(root, ca).await.unwrap());
    }

    #[tokio::test]
    async fn vanished_marker() {
        let root = tempdir().unwrap();
        let root = root.path();
        let ca = source("ca");
        let writer = ShardWriter::begin(root, ca).await.unwrap().unwrap();
        let marker = writer.close().await.unwrap();
        std::fs::remove_file(ca.marker_path(root)).unwrap();
        assert!(!marker.is_present().await.unwrap());
        assert_eq!(marker.complete().await.unwrap(), Completion::Vanished);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let root = tempdir().unwrap();
        let root = root.path();

        // A completed source and an interrupted one sharing a directory
        let done = ShardWriter::begin(root, source("ca")).await.unwrap().unwrap();
        let marker = done.close().await.unwrap();
        marker.complete().await.unwrap();
        let mut partial = ShardWriter::begin(root, source("cb")).await.unwrap().unwrap();
        partial.write(&entry("cba xyz", 999)).await.unwrap();
        drop(partial);
        std::fs::write(root.join("c/cba.txt.tmp"), "junk").unwrap();

        // An interrupted source alone in its directory
        let lonely = ShardWriter::begin(root, source("zz")).await.unwrap().unwrap();
        drop(lonely);

        assert_eq!(cleanup(root).await.unwrap(), 2);
        assert!(source("cb").shards().all(|s| !s.path(root).exists()));
        assert!(!root.join("c/cba.txt.tmp").exists());
        assert!(!source("cb").marker_path(root).exists());
        assert!(!root.join("z").exists());
        assert!(is_built(root, source("ca")).await.unwrap());
        assert!(source("ca").shards().all(|s| s.path(root).is_file()));

        assert_eq!(cleanup(root).await.unwrap(), 0);
        let pristine = tempdir().unwrap();
        assert_eq!(cleanup(pristine.path()).await.unwrap(), 0);
    }
}
