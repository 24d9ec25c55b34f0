use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::converter::{Converter, ToolInfo};
use crate::dataset::{self, FileStatus, FinalizeResult};
use crate::domain::{Modality, Subject};
use crate::driver::{self, ConversionTask, ConvertOptions, SequenceOutcome};
use crate::error::BidsError;
use crate::fs_util;
use crate::sidecar::{self, EnrichOutcome, STANDARD_FIELDS};
use crate::subjects::{SkippedFolder, SubjectScan, list_subjects};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub convert: ConvertOptions,
    /// Restrict conversion to these numeric ids. The participants manifest
    /// still lists every subject.
    pub only_subjects: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub source_root: Utf8PathBuf,
    pub target_root: Utf8PathBuf,
    pub dry_run: bool,
    pub converter: ToolInfo,
    pub subjects: Vec<SubjectReport>,
    pub skipped_folders: Vec<SkippedFolder>,
    pub dataset: FinalizeResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectReport {
    pub label: String,
    pub folder: String,
    pub sequences: Vec<SequenceReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    pub sequence: String,
    pub modality: Modality,
    pub outcome: SequenceOutcome,
    pub image: Utf8PathBuf,
    pub sidecar: Utf8PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub converted: usize,
    pub already_converted: usize,
    pub would_convert: usize,
    pub missing_sequence: usize,
    pub no_sidecar: usize,
    pub enriched: usize,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for sequence in self.subjects.iter().flat_map(|subject| &subject.sequences) {
            match sequence.outcome {
                SequenceOutcome::Converted => summary.converted += 1,
                SequenceOutcome::AlreadyConverted => summary.already_converted += 1,
                SequenceOutcome::WouldConvert => summary.would_convert += 1,
                SequenceOutcome::MissingSequence => summary.missing_sequence += 1,
                SequenceOutcome::NoSidecar => summary.no_sidecar += 1,
            }
            if matches!(sequence.enrichment, Some(EnrichOutcome::Enriched { .. })) {
                summary.enriched += 1;
            }
        }
        summary
    }
}

pub struct Pipeline<C: Converter> {
    config: PipelineConfig,
    converter: C,
}

impl<C: Converter> Pipeline<C> {
    pub fn new(config: PipelineConfig, converter: C) -> Self {
        Self { config, converter }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// The canonical subject list shared by conversion and the participants
    /// manifest.
    pub fn subjects(&self) -> Result<SubjectScan, BidsError> {
        list_subjects(&self.config.source_root, &self.config.subject_pattern)
    }

    pub fn run(
        &self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, BidsError> {
        let started_at = iso_timestamp();
        let start = Instant::now();
        let dry_run = options.convert.dry_run;

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; scanning {}", self.config.source_root),
            elapsed: None,
        });
        let scan = self.subjects()?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} subjects, {} skipped folders",
                scan.subjects.len(),
                scan.skipped.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        if !dry_run {
            fs_util::ensure_dir(&self.config.target_root)?;
        }

        let mut subjects = Vec::new();
        for subject in scan.subjects.iter().filter(|subject| {
            options.only_subjects.is_empty() || options.only_subjects.contains(&subject.numeric_id)
        }) {
            subjects.push(self.run_subject(subject, options.convert, sink, start)?);
        }

        let dataset = if dry_run {
            FinalizeResult {
                dataset_description: FileStatus::Skipped,
                participants: FileStatus::Skipped,
            }
        } else {
            sink.event(ProgressEvent {
                message: "phase=Finalize; writing dataset files".to_string(),
                elapsed: Some(start.elapsed()),
            });
            dataset::finalize(&self.config.target_root, &self.config.dataset, &scan.subjects)?
        };

        sink.event(ProgressEvent {
            message: "phase=Done; BIDS conversion complete".to_string(),
            elapsed: Some(start.elapsed()),
        });

        Ok(RunReport {
            started_at,
            finished_at: iso_timestamp(),
            source_root: self.config.source_root.clone(),
            target_root: self.config.target_root.clone(),
            dry_run,
            converter: self.converter.tool_info(),
            subjects,
            skipped_folders: scan.skipped,
            dataset,
        })
    }

    fn run_subject(
        &self,
        subject: &Subject,
        options: ConvertOptions,
        sink: &dyn ProgressSink,
        start: Instant,
    ) -> Result<SubjectReport, BidsError> {
        let mut sequences = Vec::new();
        for spec in self.config.registry.iter() {
            let task = ConversionTask::new(
                subject,
                spec,
                &self.config.source_root,
                &self.config.target_root,
            );
            let outcome = driver::convert(&task, &self.converter, options)?;
            sink.event(ProgressEvent {
                message: format!("phase=Convert; {} -> {outcome:?}", task.context()),
                elapsed: Some(start.elapsed()),
            });

            let enrichment = if outcome.needs_enrichment() {
                Some(sidecar::enrich(&task.sidecar_path, &task.source_dir, STANDARD_FIELDS)?)
            } else {
                None
            };

            sequences.push(SequenceReport {
                sequence: spec.sequence_key.clone(),
                modality: spec.modality,
                outcome,
                image: task.image_path,
                sidecar: task.sidecar_path,
                enrichment,
            });
        }

        Ok(SubjectReport {
            label: subject.label.to_string(),
            folder: subject.raw_folder_name.clone(),
            sequences,
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
