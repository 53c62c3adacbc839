//! Document-to-decision pre-screening pipeline.
//!
//! Stored documents are routed through text extraction (text layer or OCR), entity
//! extraction and a per-document richness score. The eligibility engine then fuses the
//! document list, the merged entities and the applicant notes into weighted rule results,
//! from which the decision policy derives confidence, risk tier, recommendation, priority
//! and SLA deadline. Processed applications then wait in a caseworker review queue, ordered
//! by overdue deadline and priority, until a review decision closes them or asks for more
//! information.

pub mod domain;
pub mod entities;
pub mod evaluation;
pub mod extraction;
pub(crate) mod intake;
pub mod repository;
pub mod review;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationDraft, ApplicationId, ApplicationStatus, DocumentExtraction, DocumentId,
    DocumentRecord, DocumentStatus, DocumentUpload,
};
pub use entities::{
    document_nlp_score, extract_entities, parse_date_flexible, EntityExtractor,
    ExtractedEntities, NerModel,
};
pub use evaluation::{
    Decision, DecisionContext, EligibilityEngine, EvidenceRecommendation, EvidenceValue,
    Recommendation, RiskTier, RuleCode, RuleResult,
};
pub use extraction::{ExtractedText, ExtractionMethod, MediaType, TextExtractor};
pub use intake::IntakeViolation;
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationStatusView, AuditAction, AuditError,
    AuditEvent, AuditTrail, AuditTrailView, RepositoryError,
};
pub use review::{
    ReviewDecisionAction, ReviewDecisionRequest, ReviewQueue, ReviewQueueItem,
    ReviewQueueMetrics,
};
pub use router::application_router;
pub use service::{
    DecisionBreakdownView, DocumentOutcome, ProcessingReport, ScreeningService,
    ScreeningServiceError,
};

/// Round to two decimal places, the precision every persisted score is reported at.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
