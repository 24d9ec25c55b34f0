use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetDescription;
use crate::domain::{Modality, SequenceSpec};
use crate::error::BidsError;
use crate::registry::SequenceRegistry;
use crate::subjects::{DEFAULT_PREFIX, DEFAULT_SUFFIX, SubjectPattern};

pub const DEFAULT_CONFIG_FILE: &str = "dicom2bids.json";
pub const DEFAULT_CONVERTER: &str = "dcm2niix";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub source_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub target_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub subject_pattern: Option<SubjectPatternEntry>,
    /// Replaces the standard registry when present.
    #[serde(default)]
    pub sequences: Option<Vec<SequenceEntry>>,
    #[serde(default)]
    pub dataset: Option<DatasetDescription>,
    #[serde(default)]
    pub converter: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubjectPatternEntry {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SequenceEntry {
    /// Key of a sequence in the standard registry.
    Shorthand(String),
    Detailed(SequenceEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SequenceEntryObject {
    pub key: String,
    pub modality: Modality,
    pub suffix: String,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_root: Option<Utf8PathBuf>,
    pub target_root: Option<Utf8PathBuf>,
}

/// Everything one pipeline run needs. Independent values can drive
/// independent runs in the same process.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub schema_version: u32,
    pub source_root: Utf8PathBuf,
    pub target_root: Utf8PathBuf,
    pub subject_pattern: SubjectPattern,
    pub registry: SequenceRegistry,
    pub dataset: DatasetDescription,
    pub converter: String,
}

impl PipelineConfig {
    pub fn new(source_root: Utf8PathBuf, target_root: Utf8PathBuf) -> Result<Self, BidsError> {
        Ok(Self {
            schema_version: 1,
            source_root,
            target_root,
            subject_pattern: SubjectPattern::standard()?,
            registry: SequenceRegistry::standard()?,
            dataset: DatasetDescription::default(),
            converter: DEFAULT_CONVERTER.to_string(),
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `dicom2bids.json` in the working directory when it
    /// exists, or falls back to built-in defaults.
    pub fn load(path: Option<&str>) -> Result<Config, BidsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BidsError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| BidsError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<PipelineConfig, BidsError> {
        Self::resolve_config(Self::load(path)?, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: Overrides,
    ) -> Result<PipelineConfig, BidsError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let source_root = overrides
            .source_root
            .or(config.source_root)
            .ok_or_else(|| BidsError::MissingSetting("source_root".to_string()))?;
        let target_root = overrides
            .target_root
            .or(config.target_root)
            .ok_or_else(|| BidsError::MissingSetting("target_root".to_string()))?;

        let subject_pattern = match config.subject_pattern {
            Some(entry) => SubjectPattern::new(
                entry.prefix.as_deref().unwrap_or(DEFAULT_PREFIX),
                entry.suffix.as_deref().unwrap_or(DEFAULT_SUFFIX),
            )?,
            None => SubjectPattern::standard()?,
        };

        let registry = match config.sequences {
            Some(entries) => resolve_sequences(entries)?,
            None => SequenceRegistry::standard()?,
        };

        Ok(PipelineConfig {
            schema_version,
            source_root,
            target_root,
            subject_pattern,
            registry,
            dataset: config.dataset.unwrap_or_default(),
            converter: config
                .converter
                .unwrap_or_else(|| DEFAULT_CONVERTER.to_string()),
        })
    }
}

fn resolve_sequences(entries: Vec<SequenceEntry>) -> Result<SequenceRegistry, BidsError> {
    let standard = SequenceRegistry::standard()?;
    let specs = entries
        .into_iter()
        .map(|entry| match entry {
            SequenceEntry::Shorthand(key) => standard.lookup(&key).cloned(),
            SequenceEntry::Detailed(obj) => SequenceSpec::new(&obj.key, obj.modality, &obj.suffix),
        })
        .collect::<Result<Vec<_>, BidsError>>()?;
    SequenceRegistry::new(specs)
}
