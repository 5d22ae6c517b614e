//! Option sets: ordered `label -> candidate values` mappings and their cartesian product.
//!
//! Labels are kept exactly as written in the sweep description (`"--kernel "`,
//! `"OMP_NUM_THREADS="`). How a label is turned into argv tokens or an
//! environment pair is decided in [`crate::plan`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SweepError};

/// A single candidate value for an option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

/// Ordered mapping from option label to candidate values.
///
/// Insertion order is the enumeration order. Serialized as an array of
/// `[label, [values...]]` pairs so the order survives a JSON round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet {
    entries: Vec<(String, Vec<OptionValue>)>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate values of `label`. An existing label keeps its position.
    pub fn insert(&mut self, label: impl Into<String>, values: Vec<OptionValue>) -> &mut Self {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, slot)) => *slot = values,
            None => self.entries.push((label, values)),
        }
        self
    }

    pub fn with(mut self, label: impl Into<String>, values: Vec<OptionValue>) -> Self {
        self.insert(label, values);
        self
    }

    pub fn with_ints(self, label: impl Into<String>, values: &[i64]) -> Self {
        self.with(label, values.iter().copied().map(OptionValue::Int).collect())
    }

    pub fn with_strs(self, label: impl Into<String>, values: &[&str]) -> Self {
        self.with(label, values.iter().map(|s| OptionValue::from(*s)).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&[OptionValue]> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[OptionValue])> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_slice()))
    }

    /// Number of combinations in the cartesian product. An empty set has exactly one
    /// (the empty selection). `None` when the count does not fit in `usize`.
    pub fn combination_count(&self) -> Option<usize> {
        self.entries
            .iter()
            .try_fold(1usize, |acc, (_, v)| acc.checked_mul(v.len()))
    }

    /// Check that every label is non-empty and maps to at least one value.
    pub fn validate(&self, what: &str) -> Result<()> {
        for (label, values) in &self.entries {
            if label.trim().is_empty() {
                return Err(SweepError::invalid(format!("{what}: empty option label")));
            }
            if values.is_empty() {
                return Err(SweepError::invalid(format!(
                    "{what}: option {label:?} has no candidate values"
                )));
            }
        }
        Ok(())
    }

    /// Iterate the cartesian product in odometer order: the last label varies fastest.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            set: self,
            cursor: vec![0; self.entries.len()],
            done: self.entries.iter().any(|(_, v)| v.is_empty()),
        }
    }
}

/// One selection of exactly one value per label.
pub type Selection<'a> = Vec<(&'a str, &'a OptionValue)>;

/// Iterator returned by [`OptionSet::combinations`].
pub struct Combinations<'a> {
    set: &'a OptionSet,
    cursor: Vec<usize>,
    done: bool,
}

impl<'a> Iterator for Combinations<'a> {
    type Item = Selection<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item: Selection<'a> = self
            .set
            .entries
            .iter()
            .zip(&self.cursor)
            .map(|((label, values), &i)| (label.as_str(), &values[i]))
            .collect();

        // Advance from the rightmost position; carry leftwards.
        self.done = true;
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.set.entries[pos].1.len() {
                self.done = false;
                break;
            }
            self.cursor[pos] = 0;
        }

        Some(item)
    }
}
