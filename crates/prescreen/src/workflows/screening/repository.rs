use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationStatus, DocumentRecord, DocumentStatus,
};
use super::evaluation::{RiskTier, RuleResult};

/// Repository record: applicant data, documents, and the aggregates of the latest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub applicant_full_name: String,
    pub applicant_nationality: String,
    pub applicant_birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: ApplicationStatus,
    pub documents: Vec<DocumentRecord>,
    pub rule_results: Vec<RuleResult>,
    pub recommendation_summary: Option<String>,
    pub confidence_score: Option<f64>,
    pub priority_score: f64,
    pub sla_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub final_decision_reason: Option<String>,
    #[serde(default)]
    pub final_decision_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(id: ApplicationId, draft: ApplicationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            applicant_full_name: draft.applicant_full_name,
            applicant_nationality: draft.applicant_nationality,
            applicant_birth_date: draft.applicant_birth_date,
            notes: draft.notes,
            status: ApplicationStatus::Draft,
            documents: Vec::new(),
            rule_results: Vec::new(),
            recommendation_summary: None,
            confidence_score: None,
            priority_score: 0.0,
            sla_due_at: None,
            final_decision_reason: None,
            final_decision_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Risk tier of the stored confidence; an unprocessed application reads as high risk.
    pub fn risk_tier(&self) -> RiskTier {
        RiskTier::from_confidence(self.confidence_score.unwrap_or(0.0))
    }

    /// Fractional days since creation, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.created_at).num_seconds().max(0);
        seconds as f64 / 86_400.0
    }

    pub fn count_documents(&self, status: DocumentStatus) -> usize {
        self.documents
            .iter()
            .filter(|document| document.status == status)
            .count()
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            status: self.status.label(),
            applicant_full_name: self.applicant_full_name.clone(),
            document_count: self.documents.len(),
            recommendation_summary: self.recommendation_summary.clone(),
            confidence_score: self.confidence_score,
            priority_score: self.priority_score,
            sla_due_at: self.sla_due_at,
        }
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Append-only record of workflow transitions.
pub trait AuditTrail: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
    /// Events for one application in the order they were recorded.
    fn events_for(&self, application_id: &ApplicationId) -> Result<Vec<AuditEvent>, AuditError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ApplicationCreated,
    DocumentUploaded,
    ProcessingQueued,
    ProcessingStarted,
    ProcessingCompleted,
    ReviewDecisionSubmitted,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::ApplicationCreated => "application_created",
            AuditAction::DocumentUploaded => "document_uploaded",
            AuditAction::ProcessingQueued => "processing_queued",
            AuditAction::ProcessingStarted => "processing_started",
            AuditAction::ProcessingCompleted => "processing_completed",
            AuditAction::ReviewDecisionSubmitted => "review_decision_submitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub application_id: ApplicationId,
    pub action: AuditAction,
    pub reason: String,
    pub metadata: BTreeMap<String, Value>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        application_id: ApplicationId,
        action: AuditAction,
        reason: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            application_id,
            action,
            reason: reason.into(),
            metadata,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit trail unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    pub applicant_full_name: String,
    pub document_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    pub priority_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
}

/// Audit events of one application, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrailView {
    pub application_id: ApplicationId,
    pub events: Vec<AuditEvent>,
}
