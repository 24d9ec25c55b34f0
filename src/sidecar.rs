use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::BidsError;
use crate::fs_util;
use crate::header::{DicomHeader, HeaderSource, representative_dicom};

pub type Sidecar = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// First numeric value, e.g. a DS attribute.
    Number,
    Text,
    /// Every numeric value, in header order.
    NumberList,
}

/// Copies a DICOM attribute into the sidecar. Candidates are tried in order;
/// the first one holding a usable value wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub sidecar_key: &'static str,
    pub candidates: &'static [&'static str],
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn resolve(&self, header: &dyn HeaderSource) -> Option<Value> {
        self.candidates
            .iter()
            .find_map(|keyword| extract(header, keyword, self.kind))
    }
}

pub const STANDARD_FIELDS: &[FieldRule] = &[
    FieldRule {
        sidecar_key: "RepetitionTime",
        candidates: &["RepetitionTime"],
        kind: FieldKind::Number,
    },
    FieldRule {
        sidecar_key: "EchoTime",
        candidates: &["EchoTime"],
        kind: FieldKind::Number,
    },
    FieldRule {
        sidecar_key: "FlipAngle",
        candidates: &["FlipAngle"],
        kind: FieldKind::Number,
    },
    FieldRule {
        sidecar_key: "PhaseEncodingDirection",
        candidates: &["InPlanePhaseEncodingDirection", "PhaseEncodingDirection"],
        kind: FieldKind::Text,
    },
    FieldRule {
        sidecar_key: "PixelSpacing",
        candidates: &["PixelSpacing"],
        kind: FieldKind::NumberList,
    },
    FieldRule {
        sidecar_key: "SliceThickness",
        candidates: &["SliceThickness"],
        kind: FieldKind::Number,
    },
];

/// Inserts every resolvable rule whose key is not already in `sidecar`.
/// Returns the keys that were added.
pub fn merge_header(
    sidecar: &mut Sidecar,
    header: &dyn HeaderSource,
    rules: &[FieldRule],
) -> Vec<String> {
    let mut added = Vec::new();
    for rule in rules {
        if sidecar.contains_key(rule.sidecar_key) {
            continue;
        }
        if let Some(value) = rule.resolve(header) {
            sidecar.insert(rule.sidecar_key.to_string(), value);
            added.push(rule.sidecar_key.to_string());
        }
    }
    added
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichOutcome {
    Enriched { dicom: Utf8PathBuf, added: Vec<String> },
    Unchanged { dicom: Utf8PathBuf },
    NoDicom,
    UnreadableDicom { dicom: Utf8PathBuf, message: String },
}

/// Supplements the sidecar at `sidecar_path` with header fields from one
/// DICOM file in `sequence_dir`.
pub fn enrich(
    sidecar_path: &Utf8Path,
    sequence_dir: &Utf8Path,
    rules: &[FieldRule],
) -> Result<EnrichOutcome, BidsError> {
    let Some(dicom) = representative_dicom(sequence_dir)? else {
        tracing::warn!(dir = %sequence_dir, "no DICOM files found for header parsing");
        return Ok(EnrichOutcome::NoDicom);
    };

    let header = match DicomHeader::open(&dicom) {
        Ok(header) => header,
        Err(err) => {
            tracing::warn!(file = %dicom, "skipping sidecar enrichment: {err}");
            return Ok(EnrichOutcome::UnreadableDicom {
                dicom,
                message: err.to_string(),
            });
        }
    };

    enrich_with(sidecar_path, &header, rules).map(|added| {
        if added.is_empty() {
            EnrichOutcome::Unchanged { dicom }
        } else {
            EnrichOutcome::Enriched { dicom, added }
        }
    })
}

/// Load, merge and write back. The file is only rewritten when a key was added.
pub fn enrich_with(
    sidecar_path: &Utf8Path,
    header: &dyn HeaderSource,
    rules: &[FieldRule],
) -> Result<Vec<String>, BidsError> {
    let mut sidecar = read_sidecar(sidecar_path)?;
    let added = merge_header(&mut sidecar, header, rules);
    if !added.is_empty() {
        write_sidecar(sidecar_path, &sidecar)?;
        tracing::info!(sidecar = %sidecar_path, fields = ?added, "supplemented sidecar");
    }
    Ok(added)
}

pub fn read_sidecar(path: &Utf8Path) -> Result<Sidecar, BidsError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("read {path}: {err}")))?;
    let value: Value = serde_json::from_str(&content).map_err(|err| BidsError::InvalidSidecar {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BidsError::InvalidSidecar {
            path: path.as_std_path().to_path_buf(),
            message: "top-level value is not an object".to_string(),
        }),
    }
}

pub fn write_sidecar(path: &Utf8Path, sidecar: &Sidecar) -> Result<(), BidsError> {
    let mut content = to_pretty_json(sidecar)?;
    content.push(b'\n');
    fs_util::write_atomic(path, &content)
}

/// Pretty JSON with four-space indentation, the layout dcm2niix uses.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, BidsError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| BidsError::Filesystem(err.to_string()))?;
    Ok(buffer)
}

fn extract(header: &dyn HeaderSource, keyword: &str, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::Text => header.text(keyword).map(Value::String),
        FieldKind::Number => header
            .numbers(keyword)
            .and_then(|values| values.first().copied())
            .and_then(number),
        FieldKind::NumberList => {
            let values = header
                .numbers(keyword)?
                .into_iter()
                .map(number)
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Array(values))
        }
    }
}

fn number(value: f64) -> Option<Value> {
    Number::from_f64(value).map(Value::Number)
}
