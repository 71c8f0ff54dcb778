//! Gesture labels and the ordered vocabulary that maps classifier outputs to them

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One gesture identifier from the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Ordered label set; label identity is positional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<Label>,
}

impl LabelVocabulary {
    /// Build a vocabulary, rejecting empty or duplicate label lists
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<Label> = labels.into_iter().map(Label::new).collect();
        if labels.is_empty() {
            return Err(Error::config("label vocabulary must not be empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(Error::config(format!("Duplicate label '{}'", label)));
            }
        }
        Ok(Self { labels })
    }

    /// Label at classifier output `index`
    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    /// Position of a label, if present
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.as_str() == name)
    }

    /// Number of labels (L)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}
