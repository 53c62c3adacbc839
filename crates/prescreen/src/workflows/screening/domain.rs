use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entities::ExtractedEntities;
use super::extraction::ExtractionMethod;

/// Identifier wrapper for screening applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Applicant-supplied data used to open a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub applicant_full_name: String,
    pub applicant_nationality: String,
    #[serde(default)]
    pub applicant_birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Metadata for a document whose bytes already sit in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: String,
    pub original_filename: String,
    pub media_type: String,
    pub storage_path: PathBuf,
    #[serde(default)]
    pub file_size_bytes: u64,
}

/// Lifecycle of an application through the pre-screening workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    DocumentsUploaded,
    Queued,
    Processing,
    ReviewReady,
    MoreInfoRequired,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::DocumentsUploaded => "documents_uploaded",
            ApplicationStatus::Queued => "queued",
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::ReviewReady => "review_ready",
            ApplicationStatus::MoreInfoRequired => "more_info_required",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Statuses that wait on a caseworker and therefore sit in the review queue.
    pub const fn in_manual_queue(self) -> bool {
        matches!(
            self,
            ApplicationStatus::ReviewReady | ApplicationStatus::MoreInfoRequired
        )
    }
}

/// Per-document processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// Structured payload stored for a successfully processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtraction {
    pub document_type: String,
    pub filename: String,
    pub extraction_method: ExtractionMethod,
    pub extraction_confidence: f64,
    pub char_count: usize,
    pub page_count: usize,
    pub nlp_score: f64,
    pub entities: ExtractedEntities,
    pub warnings: Vec<String>,
}

/// A stored document together with whatever the last pipeline run produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub document_type: String,
    pub original_filename: String,
    pub media_type: String,
    pub file_size_bytes: u64,
    pub storage_path: PathBuf,
    pub status: DocumentStatus,
    pub ocr_text: Option<String>,
    pub extraction: Option<DocumentExtraction>,
    pub processing_error: Option<String>,
}

impl DocumentRecord {
    pub fn new(id: DocumentId, upload: DocumentUpload) -> Self {
        Self {
            id,
            document_type: upload.document_type,
            original_filename: upload.original_filename,
            media_type: upload.media_type,
            file_size_bytes: upload.file_size_bytes,
            storage_path: upload.storage_path,
            status: DocumentStatus::Uploaded,
            ocr_text: None,
            extraction: None,
            processing_error: None,
        }
    }

    /// Lower-cased, trimmed document type used for rule matching.
    pub fn normalized_type(&self) -> String {
        self.document_type.trim().to_lowercase()
    }

    /// Drop everything a previous run stored so the document is processed from scratch.
    pub fn reset(&mut self) {
        self.status = DocumentStatus::Uploaded;
        self.ocr_text = None;
        self.extraction = None;
        self.processing_error = None;
    }
}
