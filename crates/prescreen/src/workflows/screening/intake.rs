use std::path::{Path, PathBuf};

use super::domain::{ApplicationDraft, DocumentUpload};
use super::extraction::MediaType;

/// Validation errors raised before anything reaches the repository.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("{field} must be between {min} and {max} characters (found {found})")]
    FieldLength {
        field: &'static str,
        min: usize,
        max: usize,
        found: usize,
    },
    #[error("unsupported media type {0:?}; allowed: application/pdf, image/jpeg, image/png, image/webp")]
    UnsupportedMediaType(String),
    #[error("original filename must not be empty")]
    MissingFilename,
    #[error("storage path {0:?} does not point to a stored upload")]
    StoragePathOutsideRoot(String),
}

const FULL_NAME_LIMIT: usize = 255;
const NATIONALITY_LIMIT: usize = 128;
const NOTES_LIMIT: usize = 2000;
const DOCUMENT_TYPE_LIMIT: usize = 80;
const REVIEW_REASON_MIN: usize = 8;
const REVIEW_REASON_LIMIT: usize = 1000;

/// Normalizes applicant input and enforces the field limits of the intake forms.
///
/// A guard with a storage root only accepts uploads whose resolved path stays inside it.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    storage_root: Option<PathBuf>,
}

impl IntakeGuard {
    pub fn confined_to(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: Some(storage_root.into()),
        }
    }

    pub fn draft(&self, draft: ApplicationDraft) -> Result<ApplicationDraft, IntakeViolation> {
        let applicant_full_name = bounded(
            "applicant_full_name",
            &draft.applicant_full_name,
            1,
            FULL_NAME_LIMIT,
        )?;
        let applicant_nationality =
            bounded("applicant_nationality", &draft.applicant_nationality, 1, NATIONALITY_LIMIT)?;
        let notes = match draft.notes.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(notes) => Some(bounded("notes", notes, 0, NOTES_LIMIT)?),
        };

        Ok(ApplicationDraft {
            applicant_full_name,
            applicant_nationality,
            applicant_birth_date: draft.applicant_birth_date,
            notes,
        })
    }

    /// The stored media type is rewritten to its canonical essence.
    pub fn upload(&self, upload: DocumentUpload) -> Result<DocumentUpload, IntakeViolation> {
        let document_type =
            bounded("document_type", &upload.document_type, 1, DOCUMENT_TYPE_LIMIT)?;
        let media_type = MediaType::from_declared(&upload.media_type)
            .ok_or_else(|| IntakeViolation::UnsupportedMediaType(upload.media_type.clone()))?;
        let original_filename = upload.original_filename.trim().to_string();
        if original_filename.is_empty() {
            return Err(IntakeViolation::MissingFilename);
        }

        let storage_path = match self.storage_root.as_deref() {
            Some(root) => confine(root, &upload.storage_path)?,
            None => upload.storage_path,
        };

        Ok(DocumentUpload {
            document_type,
            original_filename,
            media_type: media_type.essence().to_string(),
            storage_path,
            file_size_bytes: upload.file_size_bytes,
        })
    }

    pub fn review_reason(&self, reason: &str) -> Result<String, IntakeViolation> {
        bounded("reason", reason, REVIEW_REASON_MIN, REVIEW_REASON_LIMIT)
    }
}

/// Resolve `path` against the root (symlinks and `..` included) and require the result to
/// be an existing file below the root. Relative paths are taken relative to the root.
fn confine(root: &Path, path: &Path) -> Result<PathBuf, IntakeViolation> {
    let rejected = || IntakeViolation::StoragePathOutsideRoot(path.display().to_string());
    let root = root.canonicalize().map_err(|_| rejected())?;
    let resolved = root.join(path).canonicalize().map_err(|_| rejected())?;
    if resolved.starts_with(&root) && resolved.is_file() {
        Ok(resolved)
    } else {
        Err(rejected())
    }
}

fn bounded(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, IntakeViolation> {
    let trimmed = value.trim();
    let found = trimmed.chars().count();
    if (min..=max).contains(&found) {
        Ok(trimmed.to_string())
    } else {
        Err(IntakeViolation::FieldLength {
            field,
            min,
            max,
            found,
        })
    }
}
