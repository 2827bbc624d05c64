//! Read-only point lookups into a built dictionary

use crate::{
    consolidate::parse_line,
    shard::ShardId,
    Count, Key, Result,
};
use anyhow::Context;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

/// Contents of one shard, as seen by a linear scan
type Shard = HashMap<Key, Count>;

/// Handle to a built dictionary
///
/// Shards are loaded on first use and kept around for the lifetime of this
/// handle, which is only correct as long as nobody is building the
/// dictionary at the same time.
#[derive(Debug)]
pub struct Dictionary {
    /// Location of the dictionary
    root: PathBuf,

    /// Shards loaded so far, `None` standing for a shard file that does not
    /// exist
    shards: Mutex<HashMap<ShardId, Option<Arc<Shard>>>>,
}
//
impl Dictionary {
    /// Prepare to query the dictionary at some location
    pub fn open(root: &Path) -> Result<Self> {
        anyhow::ensure!(
            root.is_dir(),
            "no dictionary found in path {}",
            root.display()
        );
        Ok(Self {
            root: root.into(),
            shards: Mutex::new(HashMap::new()),
        })
    }

    /// Look up the frequency of a canonical word pair
    ///
    /// Returns `None` if the word pair is not in the dictionary, including
    /// when its shard does not exist. This must be distinguished from a
    /// frequency of zero.
    pub fn lookup(&self, key: &str) -> Result<Option<Count>> {
        let Some(shard) = ShardId::of_key(key) else {
            return Ok(None);
        };
        Ok(self
            .shard(shard)?
            .and_then(|contents| contents.get(key).copied()))
    }

    /// Access the contents of a shard, loading it if needed
    fn shard(&self, id: ShardId) -> Result<Option<Arc<Shard>>> {
        if let Some(cached) = self.cache().get(&id) {
            return Ok(cached.clone());
        }
        let loaded = load_shard(&id.path(&self.root))?.map(Arc::new);
        Ok(self.cache().entry(id).or_insert(loaded).clone())
    }

    /// Access the shard cache
    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<ShardId, Option<Arc<Shard>>>> {
        self.shards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Load a shard from disk, if it exists
///
/// If a key appears several times, which can only happen in a shard that was
/// not consolidated, the first occurence wins.
fn load_shard(path: &Path) -> Result<Option<Shard>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading shard {}", path.display())),
    };
    let mut shard = Shard::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, count) = parse_line(line)
            .with_context(|| format!("parsing line {} of shard {}", idx + 1, path.display()))?;
        shard.entry(key.into()).or_insert(count);
    }
    log::debug!("Loaded {} entries from shard {}", shard.len(), path.display());
    Ok(Some(shard))
}
