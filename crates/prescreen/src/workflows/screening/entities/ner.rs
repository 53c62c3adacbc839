//! Optional statistical named-entity pass layered on top of the pattern tables.
//!
//! The model is constructed explicitly and loaded at most once on first use. Any load or
//! inference failure is logged and treated as "no entities", so the pattern-only result
//! is always the floor.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::{Regex, RegexBuilder};
use tracing::{info, warn};

use crate::config::NerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NerLabel {
    Person,
    Location,
    Date,
    Organization,
    Other,
}

impl NerLabel {
    /// Map common tag sets (CoNLL, OntoNotes, NorNE) onto the labels the extractor uses.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "PER" | "PERSON" => NerLabel::Person,
            "LOC" | "GPE" | "GPE_LOC" | "LOCATION" => NerLabel::Location,
            "DATE" | "DRV" => NerLabel::Date,
            "ORG" | "GPE_ORG" | "ORGANIZATION" => NerLabel::Organization,
            _ => NerLabel::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntity {
    pub text: String,
    pub label: NerLabel,
    pub start: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum NerError {
    #[error("failed to read NER model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse NER model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid NER model entry {0:?}")]
    InvalidEntry(String),
    #[error("NER inference failed: {0}")]
    Inference(String),
}

/// Pluggable NER implementation.
pub trait NerBackend: Send + Sync {
    fn backend_id(&self) -> &str;

    fn recognize(&self, text: &str) -> Result<Vec<NamedEntity>, NerError>;
}

type BackendLoader = Box<dyn Fn() -> Result<Arc<dyn NerBackend>, NerError> + Send + Sync>;

/// Lazily loaded NER backend shared by every extraction in the process.
pub struct NerModel {
    loader: BackendLoader,
    backend: OnceLock<Option<Arc<dyn NerBackend>>>,
}

impl NerModel {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn NerBackend>, NerError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            backend: OnceLock::new(),
        }
    }

    /// Wrap an already constructed backend.
    pub fn from_backend(backend: Arc<dyn NerBackend>) -> Self {
        let model = Self::new(|| Err(NerError::Inference("backend preloaded".to_string())));
        let _ = model.backend.set(Some(backend));
        model
    }

    /// `None` when no model file is configured.
    pub fn from_config(config: &NerConfig) -> Option<Self> {
        let path = config.gazetteer_path.clone()?;
        Some(Self::new(move || {
            let backend = GazetteerNerBackend::from_path(&path)?;
            Ok(Arc::new(backend) as Arc<dyn NerBackend>)
        }))
    }

    /// Load the backend on first call; a failed load is remembered and never retried.
    pub fn backend(&self) -> Option<Arc<dyn NerBackend>> {
        self.backend
            .get_or_init(|| match (self.loader)() {
                Ok(backend) => {
                    info!(backend = backend.backend_id(), "NER model loaded");
                    Some(backend)
                }
                Err(err) => {
                    warn!(error = %err, "NER model unavailable, using pattern extraction only");
                    None
                }
            })
            .clone()
    }

    pub fn annotate(&self, text: &str) -> Vec<NamedEntity> {
        let Some(backend) = self.backend() else {
            return Vec::new();
        };
        match backend.recognize(text) {
            Ok(entities) => entities,
            Err(err) => {
                warn!(backend = backend.backend_id(), error = %err, "NER pass failed");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for NerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NerModel")
            .field("loaded", &self.backend.get().map(Option::is_some))
            .finish()
    }
}

/// Dictionary model: a JSON object of tag to phrase list, e.g.
/// `{"PERSON": ["Ola Nordmann"], "GPE": ["Oslo"], "ORG": ["UDI"]}`.
/// Phrases match case-insensitively on word boundaries.
pub struct GazetteerNerBackend {
    entries: Vec<(NerLabel, Regex)>,
}

impl GazetteerNerBackend {
    pub fn from_path(path: &Path) -> Result<Self, NerError> {
        let raw = fs::read_to_string(path).map_err(|source| NerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, NerError> {
        let table: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)?;

        let mut entries = Vec::new();
        for (tag, phrases) in table {
            let label = NerLabel::from_tag(&tag);
            for phrase in phrases {
                let phrase = phrase.trim();
                if phrase.is_empty() {
                    return Err(NerError::InvalidEntry(tag));
                }
                let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
                    .case_insensitive(true)
                    .build()
                    .map_err(|_| NerError::InvalidEntry(phrase.to_string()))?;
                entries.push((label, pattern));
            }
        }

        Ok(Self { entries })
    }
}

impl NerBackend for GazetteerNerBackend {
    fn backend_id(&self) -> &str {
        "gazetteer"
    }

    fn recognize(&self, text: &str) -> Result<Vec<NamedEntity>, NerError> {
        let mut found: Vec<NamedEntity> = self
            .entries
            .iter()
            .flat_map(|(label, pattern)| {
                pattern.find_iter(text).map(|hit| NamedEntity {
                    text: hit.as_str().to_string(),
                    label: *label,
                    start: hit.start(),
                })
            })
            .collect();
        found.sort_by_key(|entity| entity.start);
        Ok(found)
    }
}
