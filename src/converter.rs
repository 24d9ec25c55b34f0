use std::path::{Path, PathBuf};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::BidsError;

/// One DICOM-to-NIfTI invocation: everything in `source_dir` becomes
/// `<output_dir>/<stem>.nii[.gz]` plus `<stem>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterRequest {
    /// Human-readable context for logs and errors, e.g. `sub-005 mprage_01`.
    pub context: String,
    pub source_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub stem: String,
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub program: String,
    pub version: Option<String>,
}

pub trait Converter: Send + Sync {
    fn convert(&self, request: &ConverterRequest) -> Result<(), BidsError>;
    fn tool_info(&self) -> ToolInfo;
}

/// `dcm2niix` located on `PATH` or at an explicit location.
#[derive(Debug, Clone)]
pub struct Dcm2niix {
    program: String,
    resolved: Option<PathBuf>,
}

impl Dcm2niix {
    pub fn new(program: &str) -> Self {
        let resolved = if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
            let path = PathBuf::from(program);
            path.is_file().then_some(path)
        } else {
            find_in_path(program)
        };
        Self {
            program: program.to_string(),
            resolved,
        }
    }

    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    fn require_program(&self) -> Result<&PathBuf, BidsError> {
        self.resolved
            .as_ref()
            .ok_or_else(|| BidsError::MissingTool(self.program.clone()))
    }

    pub fn build_args(request: &ConverterRequest) -> Vec<String> {
        vec![
            "-z".to_string(),
            if request.compress { "y" } else { "n" }.to_string(),
            "-f".to_string(),
            request.stem.clone(),
            "-o".to_string(),
            request.output_dir.to_string(),
            request.source_dir.to_string(),
        ]
    }
}

impl Converter for Dcm2niix {
    fn convert(&self, request: &ConverterRequest) -> Result<(), BidsError> {
        let program = self.require_program()?;
        let args = Self::build_args(request);
        tracing::debug!(program = %program.display(), ?args, "invoking converter");

        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|err| BidsError::MissingTool(format!("{}: {err}", program.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            tracing::debug!(target: "dcm2niix", "{line}");
        }

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(BidsError::ConverterFailed {
            sequence: request.context.clone(),
            status: output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            message,
        })
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            program: self.program.clone(),
            version: self.resolved.as_deref().and_then(tool_version),
        }
    }
}

/// Expected `(image, sidecar)` paths for a request.
pub fn expected_outputs(
    output_dir: &Utf8Path,
    stem: &str,
    compress: bool,
) -> (Utf8PathBuf, Utf8PathBuf) {
    let image_ext = if compress { "nii.gz" } else { "nii" };
    (
        output_dir.join(format!("{stem}.{image_ext}")),
        output_dir.join(format!("{stem}.json")),
    )
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

// dcm2niix prints its banner and exits non-zero for `-v`, so the status is ignored.
fn tool_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-v").output().ok()?;
    [&output.stdout, &output.stderr].into_iter().find_map(|bytes| {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    })
}
