use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BidsError;

pub const SUBJECT_LABEL_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Anat,
    Func,
    Dwi,
    Fmap,
    Perf,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Anat => "anat",
            Modality::Func => "func",
            Modality::Dwi => "dwi",
            Modality::Fmap => "fmap",
            Modality::Perf => "perf",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity/suffix tail of a BIDS filename, e.g. `task-rest_run-1_bold` or `T1w`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BidsSuffix(String);

impl BidsSuffix {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidsSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BidsSuffix {
    type Err = BidsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.starts_with('_')
            && !trimmed.ends_with('_')
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(BidsError::InvalidSuffix {
                sequence: String::new(),
                suffix: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for BidsSuffix {
    type Error = BidsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BidsSuffix> for String {
    fn from(value: BidsSuffix) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceSpec {
    pub sequence_key: String,
    pub modality: Modality,
    pub suffix: BidsSuffix,
}

impl SequenceSpec {
    pub fn new(sequence_key: &str, modality: Modality, suffix: &str) -> Result<Self, BidsError> {
        let suffix = suffix
            .parse::<BidsSuffix>()
            .map_err(|_| BidsError::InvalidSuffix {
                sequence: sequence_key.to_string(),
                suffix: suffix.to_string(),
            })?;
        Ok(Self {
            sequence_key: sequence_key.to_string(),
            modality,
            suffix,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectLabel(String);

impl SubjectLabel {
    /// `sub-` followed by the id zero-padded to [`SUBJECT_LABEL_WIDTH`] digits.
    pub fn from_id(numeric_id: u32) -> Self {
        Self(format!("sub-{numeric_id:0width$}", width = SUBJECT_LABEL_WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub raw_folder_name: String,
    pub numeric_id: u32,
    pub label: SubjectLabel,
}

impl Subject {
    pub fn new(raw_folder_name: &str, numeric_id: u32) -> Self {
        Self {
            raw_folder_name: raw_folder_name.to_string(),
            numeric_id,
            label: SubjectLabel::from_id(numeric_id),
        }
    }

    /// Filename stem shared by the image and sidecar of one sequence.
    pub fn output_stem(&self, sequence: &SequenceSpec) -> String {
        format!("{}_{}", self.label, sequence.suffix)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn label_is_zero_padded() {
        assert_eq!(SubjectLabel::from_id(7).as_str(), "sub-007");
        assert_eq!(SubjectLabel::from_id(123).as_str(), "sub-123");
        assert_eq!(SubjectLabel::from_id(0).as_str(), "sub-000");
    }

    #[test]
    fn label_keeps_wide_ids() {
        assert_eq!(SubjectLabel::from_id(1234).as_str(), "sub-1234");
    }

    #[test]
    fn suffix_rejects_path_characters() {
        let err = "anat/T1w".parse::<BidsSuffix>().unwrap_err();
        assert_matches!(err, BidsError::InvalidSuffix { .. });
        assert!("".parse::<BidsSuffix>().is_err());
        assert!("task-rest_run-1_bold".parse::<BidsSuffix>().is_ok());
    }

    #[test]
    fn output_stem_joins_label_and_suffix() {
        let subject = Subject::new("REST_MRT_5__0", 5);
        let spec = SequenceSpec::new("mprage_01", Modality::Anat, "T1w").unwrap();
        assert_eq!(subject.output_stem(&spec), "sub-005_T1w");
    }
}
