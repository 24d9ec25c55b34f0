use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::converter::{Converter, ConverterRequest, expected_outputs};
use crate::domain::{SequenceSpec, Subject};
use crate::error::BidsError;
use crate::fs_util;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Convert even when both artifacts already exist.
    pub force: bool,
    /// Decide only; never invoke the converter or touch the target tree.
    pub dry_run: bool,
}

/// One (subject, sequence) pair resolved to concrete paths.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub subject: Subject,
    pub sequence: SequenceSpec,
    pub source_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub stem: String,
    pub image_path: Utf8PathBuf,
    pub sidecar_path: Utf8PathBuf,
}

impl ConversionTask {
    pub fn new(
        subject: &Subject,
        sequence: &SequenceSpec,
        source_root: &Utf8Path,
        target_root: &Utf8Path,
    ) -> Self {
        let source_dir = source_root
            .join(&subject.raw_folder_name)
            .join(&sequence.sequence_key);
        let output_dir = target_root
            .join(subject.label.as_str())
            .join(sequence.modality.as_str());
        let stem = subject.output_stem(sequence);
        let (image_path, sidecar_path) = expected_outputs(&output_dir, &stem, true);
        Self {
            subject: subject.clone(),
            sequence: sequence.clone(),
            source_dir,
            output_dir,
            stem,
            image_path,
            sidecar_path,
        }
    }

    pub fn context(&self) -> String {
        format!("{} {}", self.subject.label, self.sequence.sequence_key)
    }

    pub fn is_converted(&self) -> bool {
        self.image_path.as_std_path().is_file() && self.sidecar_path.as_std_path().is_file()
    }

    fn request(&self) -> ConverterRequest {
        ConverterRequest {
            context: self.context(),
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir.clone(),
            stem: self.stem.clone(),
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOutcome {
    MissingSequence,
    AlreadyConverted,
    WouldConvert,
    Converted,
    NoSidecar,
}

impl SequenceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceOutcome::MissingSequence => "missing_sequence",
            SequenceOutcome::AlreadyConverted => "already_converted",
            SequenceOutcome::WouldConvert => "would_convert",
            SequenceOutcome::Converted => "converted",
            SequenceOutcome::NoSidecar => "no_sidecar",
        }
    }

    /// Whether the sidecar at the task's path was just written by the converter.
    pub fn needs_enrichment(&self) -> bool {
        matches!(self, SequenceOutcome::Converted)
    }
}

/// Runs the converter for `task` unless its outputs already exist. Only a
/// converter failure is an error; every other condition is an outcome.
pub fn convert(
    task: &ConversionTask,
    converter: &dyn Converter,
    options: ConvertOptions,
) -> Result<SequenceOutcome, BidsError> {
    let context = task.context();

    if !task.source_dir.as_std_path().is_dir() {
        tracing::info!(%context, "sequence folder missing");
        return Ok(SequenceOutcome::MissingSequence);
    }

    if !options.force && task.is_converted() {
        tracing::info!(%context, "already converted, skipping");
        return Ok(SequenceOutcome::AlreadyConverted);
    }

    if options.dry_run {
        tracing::info!(%context, output = %task.output_dir, "would convert");
        return Ok(SequenceOutcome::WouldConvert);
    }

    fs_util::ensure_dir(&task.output_dir)?;
    tracing::info!(%context, "converting");
    converter.convert(&task.request())?;

    if task.sidecar_path.as_std_path().is_file() {
        Ok(SequenceOutcome::Converted)
    } else {
        tracing::warn!(
            %context,
            sidecar = %task.sidecar_path,
            "JSON sidecar not found, skipping supplement"
        );
        Ok(SequenceOutcome::NoSidecar)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::converter::ToolInfo;
    use crate::domain::Modality;

    #[derive(Default)]
    struct RecordingConverter {
        requests: Mutex<Vec<ConverterRequest>>,
        write_sidecar: bool,
        fail: bool,
    }

    impl Converter for RecordingConverter {
        fn convert(&self, request: &ConverterRequest) -> Result<(), BidsError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(BidsError::ConverterFailed {
                    sequence: request.context.clone(),
                    status: "1".to_string(),
                    message: "corrupt input".to_string(),
                });
            }
            let (image, sidecar) = expected_outputs(&request.output_dir, &request.stem, true);
            fs::write(image.as_std_path(), b"nifti").unwrap();
            if self.write_sidecar {
                fs::write(sidecar.as_std_path(), b"{}").unwrap();
            }
            Ok(())
        }

        fn tool_info(&self) -> ToolInfo {
            ToolInfo {
                program: "mock".to_string(),
                version: None,
            }
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        task: ConversionTask,
    }

    fn fixture(create_source: bool) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let subject = Subject::new("REST_MRT_5__0", 5);
        let sequence = SequenceSpec::new("mprage_01", Modality::Anat, "T1w").unwrap();
        let task =
            ConversionTask::new(&subject, &sequence, &root.join("raw"), &root.join("bids"));
        if create_source {
            fs::create_dir_all(task.source_dir.as_std_path()).unwrap();
        }
        Fixture { _temp: temp, task }
    }

    #[test]
    fn task_paths_follow_bids_layout() {
        let fx = fixture(false);
        assert!(fx.task.source_dir.ends_with("raw/REST_MRT_5__0/mprage_01"));
        assert!(fx.task.image_path.ends_with("bids/sub-005/anat/sub-005_T1w.nii.gz"));
        assert!(fx.task.sidecar_path.ends_with("bids/sub-005/anat/sub-005_T1w.json"));
    }

    #[test]
    fn missing_source_is_not_an_error() {
        let fx = fixture(false);
        let converter = RecordingConverter::default();
        let outcome = convert(&fx.task, &converter, ConvertOptions::default()).unwrap();
        assert_eq!(outcome, SequenceOutcome::MissingSequence);
        assert!(converter.requests.lock().unwrap().is_empty());
        assert!(!fx.task.output_dir.as_std_path().exists());
    }

    #[test]
    fn second_run_skips_converter() {
        let fx = fixture(true);
        let converter = RecordingConverter {
            write_sidecar: true,
            ..Default::default()
        };

        let first = convert(&fx.task, &converter, ConvertOptions::default()).unwrap();
        assert_eq!(first, SequenceOutcome::Converted);
        let image_before = fs::read(fx.task.image_path.as_std_path()).unwrap();
        let sidecar_before = fs::read(fx.task.sidecar_path.as_std_path()).unwrap();

        let second = convert(&fx.task, &converter, ConvertOptions::default()).unwrap();
        assert_eq!(second, SequenceOutcome::AlreadyConverted);
        assert_eq!(converter.requests.lock().unwrap().len(), 1);
        assert_eq!(fs::read(fx.task.image_path.as_std_path()).unwrap(), image_before);
        assert_eq!(fs::read(fx.task.sidecar_path.as_std_path()).unwrap(), sidecar_before);
    }

    #[test]
    fn force_reconverts() {
        let fx = fixture(true);
        let converter = RecordingConverter {
            write_sidecar: true,
            ..Default::default()
        };
        let options = ConvertOptions {
            force: true,
            dry_run: false,
        };
        convert(&fx.task, &converter, options).unwrap();
        convert(&fx.task, &converter, options).unwrap();
        assert_eq!(converter.requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn image_without_sidecar_is_reconverted() {
        let fx = fixture(true);
        fs::create_dir_all(fx.task.output_dir.as_std_path()).unwrap();
        fs::write(fx.task.image_path.as_std_path(), b"partial").unwrap();
        let converter = RecordingConverter::default();

        let outcome = convert(&fx.task, &converter, ConvertOptions::default()).unwrap();
        assert_eq!(outcome, SequenceOutcome::NoSidecar);
        assert_eq!(converter.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let fx = fixture(true);
        let converter = RecordingConverter::default();
        let options = ConvertOptions {
            force: false,
            dry_run: true,
        };
        let outcome = convert(&fx.task, &converter, options).unwrap();
        assert_eq!(outcome, SequenceOutcome::WouldConvert);
        assert!(converter.requests.lock().unwrap().is_empty());
        assert!(!fx.task.output_dir.as_std_path().exists());
    }

    #[test]
    fn converter_failure_propagates() {
        let fx = fixture(true);
        let converter = RecordingConverter {
            fail: true,
            ..Default::default()
        };
        let err = convert(&fx.task, &converter, ConvertOptions::default()).unwrap_err();
        assert_matches!(
            err,
            BidsError::ConverterFailed { sequence, .. } if sequence == "sub-005 mprage_01"
        );
    }

    #[test]
    fn request_carries_compressed_stem() {
        let fx = fixture(true);
        let converter = RecordingConverter::default();
        convert(&fx.task, &converter, ConvertOptions::default()).unwrap();
        let requests = converter.requests.lock().unwrap();
        assert_eq!(requests[0].stem, "sub-005_T1w");
        assert!(requests[0].compress);
        assert_eq!(requests[0].source_dir, fx.task.source_dir);
    }
}
