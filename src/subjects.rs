use std::fs;

use camino::Utf8Path;
use regex::Regex;
use serde::Serialize;

use crate::domain::Subject;
use crate::error::BidsError;

/// Subject folders are named `<prefix><digits><suffix>`.
#[derive(Debug, Clone)]
pub struct SubjectPattern {
    prefix: String,
    suffix: String,
    matcher: Regex,
}

impl SubjectPattern {
    pub fn new(prefix: &str, suffix: &str) -> Result<Self, BidsError> {
        if prefix.is_empty() && suffix.is_empty() {
            return Err(BidsError::InvalidSubjectPattern(
                "prefix and suffix cannot both be empty".to_string(),
            ));
        }
        let expr = format!("^{}(.*){}$", regex::escape(prefix), regex::escape(suffix));
        let matcher =
            Regex::new(&expr).map_err(|err| BidsError::InvalidSubjectPattern(err.to_string()))?;
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            matcher,
        })
    }

    pub fn standard() -> Result<Self, BidsError> {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns `None` when the name does not match the pattern at all,
    /// `Some(Err)` when it matches but the id token is not a non-negative integer.
    pub fn parse(&self, folder_name: &str) -> Option<Result<Subject, BidsError>> {
        let captures = self.matcher.captures(folder_name)?;
        let token = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        Some(parse_numeric_id(token).map(|id| Subject::new(folder_name, id)))
    }
}

pub const DEFAULT_PREFIX: &str = "REST_MRT_";
pub const DEFAULT_SUFFIX: &str = "__0";

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFolder {
    pub folder: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectScan {
    pub subjects: Vec<Subject>,
    pub skipped: Vec<SkippedFolder>,
}

/// The canonical subject list: every immediate child directory of
/// `source_root` matching `pattern`, ordered by numeric id then folder name.
pub fn list_subjects(
    source_root: &Utf8Path,
    pattern: &SubjectPattern,
) -> Result<SubjectScan, BidsError> {
    if !source_root.as_std_path().is_dir() {
        return Err(BidsError::MissingSourceRoot(
            source_root.as_std_path().to_path_buf(),
        ));
    }

    let entries = fs::read_dir(source_root.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("read {source_root}: {err}")))?;

    let mut scan = SubjectScan::default();
    for entry in entries {
        let entry = entry.map_err(|err| BidsError::Filesystem(err.to_string()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 folder name");
            continue;
        };
        match pattern.parse(&name) {
            None => continue,
            Some(Ok(subject)) => scan.subjects.push(subject),
            Some(Err(err)) => {
                tracing::warn!(folder = %name, "skipping invalid subject folder: {err}");
                scan.skipped.push(SkippedFolder {
                    folder: name,
                    reason: err.to_string(),
                });
            }
        }
    }

    scan.subjects.sort_by(|a, b| {
        a.numeric_id
            .cmp(&b.numeric_id)
            .then_with(|| a.raw_folder_name.cmp(&b.raw_folder_name))
    });
    scan.skipped.sort_by(|a, b| a.folder.cmp(&b.folder));
    Ok(scan)
}

fn parse_numeric_id(token: &str) -> Result<u32, BidsError> {
    let trimmed = token.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(BidsError::InvalidSubjectId(token.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| BidsError::InvalidSubjectId(token.to_string()))
}
