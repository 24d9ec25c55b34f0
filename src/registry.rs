use std::collections::HashSet;

use crate::domain::{Modality, SequenceSpec};
use crate::error::BidsError;

/// Raw sequence folder name to BIDS modality and suffix. Iteration order is
/// the order sequences are attempted for each subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRegistry {
    entries: Vec<SequenceSpec>,
}

impl SequenceRegistry {
    pub fn new(entries: Vec<SequenceSpec>) -> Result<Self, BidsError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.sequence_key.as_str()) {
                return Err(BidsError::DuplicateSequence(entry.sequence_key.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Sequences of the resting-state study this tool was first written for.
    pub fn standard() -> Result<Self, BidsError> {
        let entries = DEFAULT_SEQUENCES
            .iter()
            .map(|(key, modality, suffix)| SequenceSpec::new(key, *modality, suffix))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    pub fn lookup(&self, sequence_key: &str) -> Result<&SequenceSpec, BidsError> {
        self.entries
            .iter()
            .find(|entry| entry.sequence_key == sequence_key)
            .ok_or_else(|| BidsError::UnknownSequence(sequence_key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequenceSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const DEFAULT_SEQUENCES: &[(&str, Modality, &str)] = &[
    ("rs_01", Modality::Func, "task-rest_run-1_bold"),
    ("rs_02", Modality::Func, "task-rest_run-2_bold"),
    ("stim_01", Modality::Func, "task-stim_run-1_bold"),
    ("mprage_01", Modality::Anat, "T1w"),
    ("mprage_02", Modality::Anat, "T1w2"),
    ("flair_01", Modality::Anat, "FLAIR"),
];
