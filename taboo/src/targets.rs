use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{normalize, InvalidTarget, TabooSet, UnknownTargets};

/// One playable concept: the secret answer and the words that may not be used to describe it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub answer: String,
    pub taboo_words: Vec<String>,
}

impl TargetEntry {
    pub fn new<S: Into<String>>(answer: &str, taboo_words: impl IntoIterator<Item = S>) -> Self {
        Self {
            answer: String::from(answer),
            taboo_words: taboo_words.into_iter().map(Into::into).collect(),
        }
    }

    /// Recomputed on every call, the entry itself is never changed.
    pub fn taboo_set(&self) -> TabooSet {
        TabooSet::new(&self.answer, &self.taboo_words)
    }
}

/// All targets of a session, keyed by answer.
#[derive(Clone, Debug, Default)]
pub struct TargetTable {
    entries: BTreeMap<String, TargetEntry>,
}

impl TargetTable {
    pub fn new(entries: impl IntoIterator<Item = TargetEntry>) -> Result<Self, InvalidTarget> {
        let mut table = BTreeMap::new();
        for entry in entries {
            if normalize(&entry.answer).trim().is_empty() {
                return Err(InvalidTarget::EmptyAnswer);
            }
            if let Some(word_idx) = entry
                .taboo_words
                .iter()
                .position(|word| normalize(word).trim().is_empty())
            {
                return Err(InvalidTarget::EmptyTabooWord {
                    answer: entry.answer,
                    word_idx,
                });
            }
            if table.contains_key(&entry.answer) {
                return Err(InvalidTarget::DuplicateAnswer {
                    answer: entry.answer,
                });
            }
            table.insert(entry.answer.clone(), entry);
        }
        Ok(Self { entries: table })
    }

    pub fn get(&self, answer: &str) -> Option<&TargetEntry> {
        self.entries.get(answer)
    }

    /// The initial pool of unused answers for a session.
    pub fn answers(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails if any answer is missing from the detector's label vocabulary.
    ///
    /// Labels are compared by exact string equality, the same way verdicts are.
    pub fn check_vocabulary<S: AsRef<str>>(&self, labels: &[S]) -> Result<(), UnknownTargets> {
        let labels: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        let answers: Vec<String> = self
            .entries
            .keys()
            .filter(|answer| !labels.contains(answer.as_str()))
            .cloned()
            .collect();
        if answers.is_empty() {
            Ok(())
        } else {
            Err(UnknownTargets { answers })
        }
    }
}
