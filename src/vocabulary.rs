//! Word lists: the word → translation mapping a practice session drills.
//!
//! Word lists are stored as a flat JSON object, `{"apple": "苹果", ...}`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::VocabularyError;

/// A single word and its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub translation: String,
}

impl WordEntry {
    pub fn new(word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            translation: translation.into(),
        }
    }
}

impl fmt::Display for WordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.word, self.translation)
    }
}

/// Mapping of word → translation with unique words.
///
/// Kept sorted so a seeded shuffle always yields the same draw order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabularySet {
    words: BTreeMap<String, String>,
}

impl VocabularySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a word's translation.
    pub fn insert(&mut self, word: impl Into<String>, translation: impl Into<String>) {
        self.words.insert(word.into(), translation.into());
    }

    pub fn translation(&self, word: &str) -> Option<&str> {
        self.words.get(word).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = WordEntry> + '_ {
        self.words.iter().map(|(w, t)| WordEntry::new(w, t))
    }

    /// Parse a word list from a JSON object of word → translation.
    pub fn from_json_str(json: &str) -> Result<Self, VocabularyError> {
        let set: Self = serde_json::from_str(json)?;
        if set.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(set)
    }

    /// Load a word list from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, VocabularyError> {
        let contents = fs::read_to_string(path)?;
        let set = Self::from_json_str(&contents)?;
        info!("Loaded {} words from {}", set.len(), path.display());
        Ok(set)
    }
}

impl<W: Into<String>, T: Into<String>> FromIterator<(W, T)> for VocabularySet {
    fn from_iter<I: IntoIterator<Item = (W, T)>>(iter: I) -> Self {
        Self {
            words: iter
                .into_iter()
                .map(|(w, t)| (w.into(), t.into()))
                .collect(),
        }
    }
}
