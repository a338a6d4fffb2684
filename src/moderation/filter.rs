//! Aho-Corasick matcher over a sensitive-word list.

use aho_corasick::{AhoCorasick, BuildError};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to read word list: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build matcher: {0}")]
    Build(#[from] BuildError),
}

/// Empty by default; an empty filter matches nothing.
#[derive(Default, Debug, Clone)]
pub struct SensitiveFilter {
    matcher: Option<AhoCorasick>,
    words: Vec<String>,
}

impl SensitiveFilter {
    /// Words are trimmed; blanks and duplicates are dropped.
    pub fn new<I, S>(words: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for word in words {
            let word = word.as_ref().trim();
            if !word.is_empty() && !unique.iter().any(|w| w == word) {
                unique.push(word.to_string());
            }
        }
        if unique.is_empty() {
            return Ok(Self::default());
        }

        Ok(Self {
            matcher: Some(AhoCorasick::new(&unique)?),
            words: unique,
        })
    }

    /// One word per line; blank lines are skipped.
    pub fn from_word_list(raw: &str) -> Result<Self, FilterError> {
        Self::new(raw.lines())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        Self::from_word_list(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The match that ends first, scanning left to right.
    pub fn first_match(&self, text: &str) -> Option<String> {
        let matcher = self.matcher.as_ref()?;
        matcher.find(text).map(|m| text[m.range()].to_string())
    }

    /// Every distinct word, overlapping and nested ones included, in match order.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let Some(matcher) = &self.matcher else {
            return found;
        };
        for m in matcher.find_overlapping_iter(text) {
            let word = &text[m.range()];
            if !found.iter().any(|w| w == word) {
                found.push(word.to_string());
            }
        }
        found
    }

    /// Replaces every character covered by any match with `*`.
    pub fn mask(&self, text: &str) -> String {
        let Some(matcher) = &self.matcher else {
            return text.to_string();
        };
        let mut covered = vec![false; text.len()];
        for m in matcher.find_overlapping_iter(text) {
            covered[m.range()].iter_mut().for_each(|b| *b = true);
        }
        text.char_indices()
            .map(|(i, c)| if covered[i] { '*' } else { c })
            .collect()
    }
}
