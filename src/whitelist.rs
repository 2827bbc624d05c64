//! User-editable list of words that always get a passing grade

use crate::{normalize::strip_word, shard::TMP_EXTENSION, Result};
use anyhow::Context;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

/// Name of the whitelist file within the dictionary directory
pub const WHITELIST_FILE: &str = "custom.txt";

/// Header of newly created whitelist files
const HEADER: &str = "# Custom dictionary white list.\n# Each entry should be on a line by itself.\n";

/// Set of exempt words
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Whitelist {
    /// Location of the whitelist file
    path: PathBuf,

    /// Whitelisted words, in [`strip_word()`] form
    words: HashSet<Box<str>>,
}
//
impl Whitelist {
    /// Load the whitelist of a dictionary, creating it if needed
    pub async fn load(dictionary: &Path) -> Result<Self> {
        anyhow::ensure!(
            dictionary.is_dir(),
            "no dictionary found in path {}",
            dictionary.display()
        );
        let path = dictionary.join(WHITELIST_FILE);
        if !fs::try_exists(&path)
            .await
            .with_context(|| format!("checking for whitelist {}", path.display()))?
        {
            fs::write(&path, HEADER)
                .await
                .with_context(|| format!("creating whitelist {}", path.display()))?;
        }
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading whitelist {}", path.display()))?;
        Ok(Self {
            path,
            words: parse(&contents),
        })
    }

    /// Truth that a word is exempt from scoring
    ///
    /// Words with digits in them are always exempt.
    pub fn is_whitelisted(&self, word: &str) -> bool {
        word.chars().any(|c| c.is_ascii_digit()) || self.words.contains(strip_word(word).as_str())
    }

    /// Whitelisted words, in alphabetical order
    pub fn words(&self) -> Vec<&str> {
        let mut words = self.words.iter().map(|w| &**w).collect::<Vec<_>>();
        words.sort_unstable();
        words
    }

    /// Add a word to the whitelist
    ///
    /// Returns `false` if the word was already whitelisted.
    pub async fn add(&mut self, word: &str) -> Result<bool> {
        let stripped = strip_word(word);
        anyhow::ensure!(!stripped.is_empty(), "{word:?} does not look like a word");
        if self.words.contains(stripped.as_str()) {
            return Ok(false);
        }

        // Make sure the new word lands on a line of its own
        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading whitelist {}", self.path.display()))?;
        let separator = if contents.is_empty() || contents.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening whitelist {}", self.path.display()))?;
        file.write_all(format!("{separator}{}\n", word.trim()).as_bytes())
            .await
            .with_context(|| format!("appending to whitelist {}", self.path.display()))?;
        file.flush().await?;
        self.words.insert(stripped.into());
        Ok(true)
    }

    /// Remove a word from the whitelist
    ///
    /// Returns the number of matching lines that were removed.
    pub async fn remove(&mut self, word: &str) -> Result<usize> {
        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading whitelist {}", self.path.display()))?;
        let target = word.trim().to_lowercase();
        let mut kept = String::with_capacity(contents.len());
        let mut removed = 0;
        for line in contents.split_inclusive('\n') {
            if line.trim().to_lowercase() == target {
                removed += 1;
            } else {
                kept.push_str(line);
            }
        }
        if removed == 0 {
            return Ok(0);
        }

        let tmp_path = self.path.with_extension(TMP_EXTENSION);
        fs::write(&tmp_path, &kept)
            .await
            .with_context(|| format!("writing temporary whitelist {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("replacing whitelist {}", self.path.display()))?;
        self.words = parse(&kept);
        Ok(removed)
    }
}

/// Extract whitelisted words from the whitelist file
fn parse(contents: &str) -> HashSet<Box<str>> {
    contents
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(strip_word)
        .filter(|word| !word.is_empty())
        .map(String::into_boxed_str)
        .collect()
}
