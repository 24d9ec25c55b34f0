use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{SequenceSpec, Subject};
use crate::pipeline::{ProgressEvent, ProgressSink, RunReport, RunSummary};
use crate::subjects::SubjectScan;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        #[derive(Serialize)]
        struct WithSummary<'a> {
            #[serde(flatten)]
            report: &'a RunReport,
            summary: RunSummary,
        }
        Self::print_json(&WithSummary {
            report,
            summary: report.summary(),
        })
    }

    pub fn print_subjects(scan: &SubjectScan) -> io::Result<()> {
        Self::print_json(scan)
    }

    pub fn print_sequences<'a>(
        sequences: impl Iterator<Item = &'a SequenceSpec>,
    ) -> io::Result<()> {
        Self::print_json(&sequences.collect::<Vec<_>>())
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the tracing subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &RunReport) {
        let summary = report.summary();
        let mode = if report.dry_run { " (dry run)" } else { "" };
        println!("BIDS conversion summary{mode}");
        println!("  source: {}", report.source_root);
        println!("  target: {}", report.target_root);
        if let Some(version) = &report.converter.version {
            println!("  converter: {version}");
        }
        println!(
            "  converted: {}, already converted: {}, missing: {}, no sidecar: {}, enriched: {}",
            summary.converted,
            summary.already_converted,
            summary.missing_sequence,
            summary.no_sidecar,
            summary.enriched
        );
        if report.dry_run {
            println!("  would convert: {}", summary.would_convert);
        }
        for skipped in &report.skipped_folders {
            println!("  skipped folder {}: {}", skipped.folder, skipped.reason);
        }
        for subject in &report.subjects {
            println!("{} ({})", subject.label, subject.folder);
            for sequence in &subject.sequences {
                println!(
                    "  {:<12} {:<5} {}",
                    sequence.sequence,
                    sequence.modality.as_str(),
                    sequence.outcome.as_str()
                );
            }
        }
    }

    pub fn print_subjects(scan: &SubjectScan) {
        for Subject {
            raw_folder_name,
            label,
            ..
        } in &scan.subjects
        {
            println!("{label}\t{raw_folder_name}");
        }
        for skipped in &scan.skipped {
            println!("# skipped {}: {}", skipped.folder, skipped.reason);
        }
    }

    pub fn print_sequences<'a>(sequences: impl Iterator<Item = &'a SequenceSpec>) {
        for spec in sequences {
            println!("{}\t{}\t{}", spec.sequence_key, spec.modality, spec.suffix);
        }
    }
}
