use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, OpenFileOptions};

use crate::error::BidsError;

/// Read access to DICOM header attributes by standard keyword
/// (e.g. `RepetitionTime`).
pub trait HeaderSource {
    /// Trimmed string value; `None` when absent or blank.
    fn text(&self, keyword: &str) -> Option<String>;
    /// All numeric values of a (possibly multi-valued) attribute.
    fn numbers(&self, keyword: &str) -> Option<Vec<f64>>;
}

/// Header of one DICOM file, read up to (not including) the pixel data.
pub struct DicomHeader {
    path: Utf8PathBuf,
    object: DefaultDicomObject,
}

impl DicomHeader {
    pub fn open(path: &Utf8Path) -> Result<Self, BidsError> {
        let object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path.as_std_path())
            .map_err(|err| BidsError::DicomRead {
                path: path.as_std_path().to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(Self {
            path: path.to_owned(),
            object,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl HeaderSource for DicomHeader {
    fn text(&self, keyword: &str) -> Option<String> {
        let element = self.object.element_by_name(keyword).ok()?;
        let value = element.to_str().ok()?;
        non_blank(&value)
    }

    fn numbers(&self, keyword: &str) -> Option<Vec<f64>> {
        let element = self.object.element_by_name(keyword).ok()?;
        let values = element.to_multi_float64().ok()?;
        (!values.is_empty()).then_some(values)
    }
}

/// Header values held as raw DICOM strings, multi-valued attributes
/// separated by `\`.
#[derive(Debug, Clone, Default)]
pub struct HeaderValues(BTreeMap<String, String>);

impl HeaderValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keyword: &str, value: &str) -> Self {
        self.0.insert(keyword.to_string(), value.to_string());
        self
    }
}

impl HeaderSource for HeaderValues {
    fn text(&self, keyword: &str) -> Option<String> {
        self.0.get(keyword).and_then(|value| non_blank(value))
    }

    fn numbers(&self, keyword: &str) -> Option<Vec<f64>> {
        let raw = self.0.get(keyword)?;
        let values = raw
            .split('\\')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        (!values.is_empty()).then_some(values)
    }
}

/// First `*.dcm` file in `sequence_dir`, falling back to the first file named
/// `MR*`. Both lookups are in lexicographic order and non-recursive.
pub fn representative_dicom(sequence_dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, BidsError> {
    let entries = fs::read_dir(sequence_dir.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("read {sequence_dir}: {err}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| BidsError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(path) = Utf8PathBuf::from_path_buf(path) {
            files.push(path);
        }
    }
    files.sort();

    let by_extension = files.iter().find(|path| {
        path.extension()
            .map(|ext| ext.eq_ignore_ascii_case("dcm"))
            .unwrap_or(false)
    });
    let by_prefix = || {
        files.iter().find(|path| {
            path.file_name()
                .map(|name| name.starts_with("MR"))
                .unwrap_or(false)
        })
    };
    Ok(by_extension.or_else(by_prefix).cloned())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim_matches(|ch: char| ch.is_whitespace() || ch == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
