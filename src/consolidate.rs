//! Deduplication and frequency sorting of shard files

use crate::{shard::TMP_EXTENSION, Count, Result};
use anyhow::Context;
use std::{
    cmp::Reverse,
    collections::{hash_map, HashMap},
    path::Path,
};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};

/// Merge duplicate keys of a shard file and sort it by decreasing frequency
///
/// Returns the number of distinct keys in the shard. Keys with equal counts
/// are sorted alphabetically so that the output only depends on the input
/// key/count multiset.
///
/// The shard is rewritten through a temporary file which is then renamed over
/// the original, so readers either see the old or the new contents.
pub async fn consolidate(path: &Path) -> Result<usize> {
    // Sum up the counts of each key
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading shard {}", path.display()))?;
    let mut totals = HashMap::<&str, Count>::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, count) = parse_line(line)
            .with_context(|| format!("parsing line {} of shard {}", idx + 1, path.display()))?;
        match totals.entry(key) {
            hash_map::Entry::Occupied(mut o) => *o.get_mut() += count,
            hash_map::Entry::Vacant(v) => {
                v.insert(count);
            }
        }
    }

    // Order keys by decreasing frequency
    let mut entries = totals.into_iter().collect::<Vec<_>>();
    entries.sort_unstable_by_key(|&(key, count)| (Reverse(count), key));

    // Write down the result and swap it in
    let tmp_path = path.with_extension(TMP_EXTENSION);
    let tmp_file = File::create(&tmp_path)
        .await
        .with_context(|| format!("creating temporary shard {}", tmp_path.display()))?;
    let mut output = BufWriter::new(tmp_file);
    for (key, count) in &entries {
        output
            .write_all(format!("{key}\t{count}\n").as_bytes())
            .await
            .with_context(|| format!("writing temporary shard {}", tmp_path.display()))?;
    }
    output
        .flush()
        .await
        .with_context(|| format!("flushing temporary shard {}", tmp_path.display()))?;
    output
        .into_inner()
        .sync_all()
        .await
        .with_context(|| format!("syncing temporary shard {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("replacing shard {}", path.display()))?;
    log::debug!("Consolidated {} into {} entries", path.display(), entries.len());
    Ok(entries.len())
}

/// Split a `key<TAB>count` shard record
pub fn parse_line(line: &str) -> Result<(&str, Count)> {
    let (key, count) = line
        .split_once('\t')
        .context("shard record should have a key and a count")?;
    let count = count
        .trim_end()
        .parse::<Count>()
        .with_context(|| format!("shard record count {count:?} should be an integer"))?;
    Ok((key, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn merges_and_sorts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cat.txt");
        std::fs::write(
            &path,
            "cat sat\t300\ncatch up\t500\ncat sat\t250\ncattle run\t260\ncatch up\t10\ncats eat\t260\n",
        )
        .unwrap();

        assert_eq!(consolidate(&path).await.unwrap(), 4);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "cat sat\t550\ncatch up\t510\ncats eat\t260\ncattle run\t260\n"
        );
        assert!(!path.with_extension(TMP_EXTENSION).exists());

        // Consolidated shards are a fixed point
        assert_eq!(consolidate(&path).await.unwrap(), 4);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "cat sat\t550\ncatch up\t510\ncats eat\t260\ncattle run\t260\n"
        );
    }

    #[tokio::test]
    async fn preserves_counts_and_orders_by_frequency() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dog.txt");
        let input = [
            ("dog ran", 400),
            ("dog sat", 900),
            ("dog ran", 600),
            ("dogs bark", 1200),
            ("dog sat", 1),
            ("dog ran", 300),
        ];
        let mut text = String::new();
        for (key, count) in input {
            text.push_str(&format!("{key}\t{count}\n"));
        }
        std::fs::write(&path, text).unwrap();

        assert_eq!(consolidate(&path).await.unwrap(), 3);
        let output = std::fs::read_to_string(&path).unwrap();
        let records = output
            .lines()
            .map(|line| parse_line(line).unwrap())
            .collect::<Vec<_>>();
        let mut expected = HashMap::<&str, Count>::new();
        for (key, count) in input {
            *expected.entry(key).or_default() += count;
        }
        assert_eq!(records.iter().copied().collect::<HashMap<_, _>>(), expected);
        assert!(records.windows(2).all(|pair| pair[0].1 >= pair[1].1));
    }

    #[tokio::test]
    async fn empty_shard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zzz.txt");
        std::fs::write(&path, "").unwrap();
        assert_eq!(consolidate(&path).await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn malformed_shard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "bad line\n").unwrap();
        assert!(consolidate(&path).await.is_err());
        std::fs::write(&path, "bad line\tmany\n").unwrap();
        assert!(consolidate(&path).await.is_err());
    }

    #[tokio::test]
    async fn missing_shard() {
        let dir = tempdir().unwrap();
        assert!(consolidate(&dir.path().join("nope.txt")).await.is_err());
    }
}
