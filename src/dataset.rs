use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::{Subject, SubjectLabel};
use crate::error::BidsError;
use crate::fs_util;
use crate::sidecar::to_pretty_json;

pub const DATASET_DESCRIPTION: &str = "dataset_description.json";
pub const PARTICIPANTS: &str = "participants.tsv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescription {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    #[serde(rename = "DatasetType")]
    pub dataset_type: String,
    #[serde(rename = "Authors", default)]
    pub authors: Vec<String>,
}

impl Default for DatasetDescription {
    fn default() -> Self {
        Self {
            name: "MS_AV_REST_MRT Study".to_string(),
            bids_version: "1.8.0".to_string(),
            dataset_type: "raw".to_string(),
            authors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Created,
    AlreadyPresent,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeResult {
    pub dataset_description: FileStatus,
    pub participants: FileStatus,
}

/// Writes the dataset-level files that are missing. Existing files are never
/// touched, even when `subjects` no longer matches their content.
pub fn finalize(
    target_root: &Utf8Path,
    description: &DatasetDescription,
    subjects: &[Subject],
) -> Result<FinalizeResult, BidsError> {
    Ok(FinalizeResult {
        dataset_description: write_description(target_root, description)?,
        participants: write_participants(target_root, subjects)?,
    })
}

pub fn write_description(
    target_root: &Utf8Path,
    description: &DatasetDescription,
) -> Result<FileStatus, BidsError> {
    let path = target_root.join(DATASET_DESCRIPTION);
    let mut content = to_pretty_json(description)?;
    content.push(b'\n');
    let status = created_or_present(fs_util::write_if_absent(&path, &content)?);
    if status == FileStatus::Created {
        tracing::info!(path = %path, "created dataset_description.json");
    }
    Ok(status)
}

pub fn write_participants(
    target_root: &Utf8Path,
    subjects: &[Subject],
) -> Result<FileStatus, BidsError> {
    let path = target_root.join(PARTICIPANTS);
    let content = participants_table(subjects);
    let status = created_or_present(fs_util::write_if_absent(&path, content.as_bytes())?);
    if status == FileStatus::Created {
        tracing::info!(path = %path, rows = subjects.len(), "created participants.tsv");
    }
    Ok(status)
}

/// `participant_id` header followed by one row per distinct label, in the
/// order given.
pub fn participants_table(subjects: &[Subject]) -> String {
    let mut seen = Vec::<&SubjectLabel>::new();
    let mut table = String::from("participant_id\n");
    for subject in subjects {
        if seen.contains(&&subject.label) {
            continue;
        }
        seen.push(&subject.label);
        table.push_str(subject.label.as_str());
        table.push('\n');
    }
    table
}

fn created_or_present(created: bool) -> FileStatus {
    if created {
        FileStatus::Created
    } else {
        FileStatus::AlreadyPresent
    }
}
