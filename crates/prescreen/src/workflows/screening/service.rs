use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationStatus, DocumentExtraction, DocumentId,
    DocumentRecord, DocumentStatus, DocumentUpload,
};
use super::entities::{document_nlp_score, EntityExtractor, ExtractedEntities, NerModel};
use super::evaluation::{
    recommend_evidence, Decision, DecisionContext, EligibilityEngine, EvidenceRecommendation,
    RiskTier, RuleResult,
};
use super::extraction::{ExtractionMethod, TextExtractor};
use super::intake::{IntakeGuard, IntakeViolation};
use super::repository::{
    ApplicationRecord, ApplicationRepository, AuditAction, AuditError, AuditEvent, AuditTrail,
    AuditTrailView, RepositoryError,
};
use super::review::{
    apply_review_decision, queue_metrics, review_queue, ReviewDecisionRequest, ReviewQueue,
    ReviewQueueMetrics,
};
use super::round2;
use crate::config::AppConfig;

const PENDING_RECOMMENDATION: &str = "Processing not completed yet for this application";

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// Service composing intake validation, storage, audit, and the screening pipeline.
pub struct ScreeningService<R, A> {
    guard: IntakeGuard,
    repository: Arc<R>,
    audit: Arc<A>,
    extractor: Arc<TextExtractor>,
    entities: Arc<EntityExtractor>,
    engine: EligibilityEngine,
    in_flight: Mutex<HashSet<ApplicationId>>,
    writes: Mutex<()>,
}

impl<R, A> ScreeningService<R, A>
where
    R: ApplicationRepository + 'static,
    A: AuditTrail + 'static,
{
    pub fn new(
        repository: Arc<R>,
        audit: Arc<A>,
        extractor: TextExtractor,
        entities: EntityExtractor,
    ) -> Self {
        Self {
            guard: IntakeGuard::default(),
            repository,
            audit,
            extractor: Arc::new(extractor),
            entities: Arc::new(entities),
            engine: EligibilityEngine::new(),
            in_flight: Mutex::new(HashSet::new()),
            writes: Mutex::new(()),
        }
    }

    /// Only accept uploads that resolve to a file below `root`.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.guard = IntakeGuard::confined_to(root);
        self
    }

    /// Tesseract/pdfium extraction plus the configured NER model, if any. Uploads are
    /// confined to the configured storage root.
    pub fn from_config(repository: Arc<R>, audit: Arc<A>, config: &AppConfig) -> Self {
        let entities = match NerModel::from_config(&config.ner) {
            Some(model) => EntityExtractor::with_ner(Arc::new(model)),
            None => EntityExtractor::new(),
        };
        Self::new(
            repository,
            audit,
            TextExtractor::from_config(&config.ocr),
            entities,
        )
        .with_storage_root(config.storage.upload_root.clone())
    }

    /// Open a new application in `draft` status.
    pub fn submit(
        &self,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, ScreeningServiceError> {
        let draft = self.guard.draft(draft)?;
        let record = ApplicationRecord::new(next_application_id(), draft, Utc::now());
        let stored = self.repository.insert(record)?;

        self.audit.record(AuditEvent::new(
            stored.id.clone(),
            AuditAction::ApplicationCreated,
            "Application created by applicant",
            metadata([
                ("applicant_full_name", json!(stored.applicant_full_name)),
                ("applicant_nationality", json!(stored.applicant_nationality)),
            ]),
        ))?;

        Ok(stored)
    }

    /// Register a stored document against an application.
    pub fn attach_document(
        &self,
        application_id: &ApplicationId,
        upload: DocumentUpload,
    ) -> Result<DocumentRecord, ScreeningServiceError> {
        let upload = self.guard.upload(upload)?;
        let document = DocumentRecord::new(next_document_id(), upload);
        {
            let _write = self.write_lock();
            let mut record = self.fetch(application_id)?;
            record.documents.push(document.clone());
            record.status = ApplicationStatus::DocumentsUploaded;
            record.updated_at = Utc::now();
            self.repository.update(record)?;
        }

        self.audit.record(AuditEvent::new(
            application_id.clone(),
            AuditAction::DocumentUploaded,
            "New document uploaded",
            metadata([
                ("document_type", json!(document.document_type)),
                ("original_filename", json!(document.original_filename)),
                ("mime_type", json!(document.media_type)),
            ]),
        ))?;

        Ok(document)
    }

    /// Mark an application ready for a pipeline run. With `force_reprocess` every document
    /// drops the output of earlier runs.
    pub fn queue(
        &self,
        application_id: &ApplicationId,
        force_reprocess: bool,
    ) -> Result<ApplicationRecord, ScreeningServiceError> {
        if self.is_running(application_id) {
            return Err(ScreeningServiceError::AlreadyProcessing(application_id.clone()));
        }

        let record = {
            let _write = self.write_lock();
            let mut record = self.fetch(application_id)?;
            if record.documents.is_empty() {
                return Err(ScreeningServiceError::NoDocuments);
            }

            if force_reprocess {
                record.documents.iter_mut().for_each(DocumentRecord::reset);
            }
            record.status = ApplicationStatus::Queued;
            record.priority_score = 0.0;
            record.sla_due_at = None;
            record.updated_at = Utc::now();
            self.repository.update(record.clone())?;
            record
        };

        self.audit.record(AuditEvent::new(
            application_id.clone(),
            AuditAction::ProcessingQueued,
            "Automated pre-screening queued",
            metadata([("force_reprocess", json!(force_reprocess))]),
        ))?;

        Ok(record)
    }

    /// Run the pipeline over every document, one at a time, then replace the rule results
    /// and aggregates. A document that fails is recorded on its own record and never stops
    /// the run.
    pub fn process(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ProcessingReport, ScreeningServiceError> {
        let _slot = self.claim(application_id)?;
        let mut record = {
            let _write = self.write_lock();
            let mut record = self.fetch(application_id)?;
            record.status = ApplicationStatus::Processing;
            record.updated_at = Utc::now();
            self.repository.update(record.clone())?;
            record
        };
        self.audit.record(AuditEvent::new(
            application_id.clone(),
            AuditAction::ProcessingStarted,
            "Automated pre-screening started",
            metadata([("status", json!(record.status.label()))]),
        ))?;
        info!(
            application_id = %application_id,
            documents = record.documents.len(),
            "pre-screening started"
        );

        let mut outcomes = Vec::with_capacity(record.documents.len());
        let mut extracted: Vec<ExtractedEntities> = Vec::new();

        for document in record.documents.iter_mut() {
            document.status = DocumentStatus::Processing;
            match self.process_document(document) {
                Ok(processed) => {
                    extracted.push(processed.extraction.entities.clone());
                    outcomes.push(DocumentOutcome::processed(document, &processed.extraction));
                    document.ocr_text = Some(processed.ocr_text);
                    document.extraction = Some(processed.extraction);
                    document.processing_error = None;
                    document.status = DocumentStatus::Processed;
                }
                Err(failure) => {
                    warn!(
                        application_id = %application_id,
                        document_id = %failure.document_id.0,
                        error = %failure.message,
                        "document processing failed"
                    );
                    outcomes.push(DocumentOutcome::failed(document, &failure));
                    document.processing_error = Some(failure.message);
                    document.status = DocumentStatus::Failed;
                }
            }
        }

        let processed_documents = record.count_documents(DocumentStatus::Processed);
        let failed_documents = record.count_documents(DocumentStatus::Failed);

        let rules = self
            .engine
            .evaluate(record.notes.as_deref(), &record.documents, &extracted);
        let now = Utc::now();
        let decision = self.engine.decide(
            &rules,
            &DecisionContext {
                processed_documents,
                failed_documents,
                age_days: record.age_days(now),
                now,
            },
        );
        let summary = decision.summary();

        {
            // Documents attached while the run was going stay in the record untouched.
            let _write = self.write_lock();
            let mut stored = self.fetch(application_id)?;
            let mut finished: HashMap<DocumentId, DocumentRecord> = record
                .documents
                .into_iter()
                .map(|document| (document.id.clone(), document))
                .collect();
            for document in stored.documents.iter_mut() {
                if let Some(done) = finished.remove(&document.id) {
                    *document = done;
                }
            }

            stored.rule_results = rules.clone();
            stored.status = ApplicationStatus::ReviewReady;
            stored.recommendation_summary = Some(summary.clone());
            stored.confidence_score = Some(decision.confidence);
            stored.priority_score = decision.priority_score;
            stored.sla_due_at = Some(decision.sla_due_at);
            stored.updated_at = now;
            self.repository.update(stored)?;
        }

        self.audit.record(AuditEvent::new(
            application_id.clone(),
            AuditAction::ProcessingCompleted,
            "Automated pre-screening completed",
            metadata([
                ("confidence_score", json!(decision.confidence)),
                ("risk_level", json!(decision.risk_tier.as_str())),
                ("priority_score", json!(decision.priority_score)),
                ("sla_due_at", json!(decision.sla_due_at.to_rfc3339())),
                ("processed_documents", json!(processed_documents)),
                ("failed_documents", json!(failed_documents)),
            ]),
        ))?;
        info!(
            application_id = %application_id,
            confidence = decision.confidence,
            risk = decision.risk_tier.as_str(),
            priority = decision.priority_score,
            processed_documents,
            failed_documents,
            "pre-screening completed"
        );

        Ok(ProcessingReport {
            application_id: application_id.clone(),
            processed_documents,
            failed_documents,
            documents: outcomes,
            rules,
            decision,
            summary,
        })
    }

    /// Stored rules and aggregates of the latest run.
    pub fn decision_breakdown(
        &self,
        application_id: &ApplicationId,
    ) -> Result<DecisionBreakdownView, ScreeningServiceError> {
        let record = self.fetch(application_id)?;
        let confidence = record.confidence_score.unwrap_or(0.0);

        Ok(DecisionBreakdownView {
            application_id: record.id.clone(),
            recommendation: record
                .recommendation_summary
                .clone()
                .unwrap_or_else(|| PENDING_RECOMMENDATION.to_string()),
            confidence_score: round2(confidence),
            risk_level: RiskTier::from_confidence(confidence),
            rules: record.rule_results,
        })
    }

    /// Missing documents that would address failed rules, and suggested next steps.
    pub fn evidence_recommendations(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EvidenceRecommendation, ScreeningServiceError> {
        let record = self.fetch(application_id)?;
        Ok(recommend_evidence(
            &record.rule_results,
            &record.documents,
            Some(record.risk_tier()),
            Utc::now(),
        ))
    }

    /// Caseworker queue: applications awaiting review, most urgent first.
    pub fn review_queue(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<ReviewQueue, ScreeningServiceError> {
        let records = self.repository.list()?;
        Ok(review_queue(records, skip, limit, Utc::now()))
    }

    pub fn queue_metrics(
        &self,
        daily_manual_capacity: u32,
    ) -> Result<ReviewQueueMetrics, ScreeningServiceError> {
        if daily_manual_capacity == 0 {
            return Err(ScreeningServiceError::InvalidCapacity);
        }
        let records = self.repository.list()?;
        Ok(queue_metrics(&records, daily_manual_capacity, Utc::now()))
    }

    /// Apply a caseworker decision and audit it with the previous and resulting status.
    pub fn submit_review_decision(
        &self,
        application_id: &ApplicationId,
        decision: ReviewDecisionRequest,
    ) -> Result<ApplicationRecord, ScreeningServiceError> {
        let reason = self.guard.review_reason(&decision.reason)?;

        let (record, previous_status) = {
            let _write = self.write_lock();
            if self.is_running(application_id) {
                return Err(ScreeningServiceError::AlreadyProcessing(application_id.clone()));
            }
            let mut record = self.fetch(application_id)?;
            let previous_status = record.status;
            apply_review_decision(&mut record, decision.action, reason.clone(), Utc::now());
            self.repository.update(record.clone())?;
            (record, previous_status)
        };

        self.audit.record(AuditEvent::new(
            application_id.clone(),
            AuditAction::ReviewDecisionSubmitted,
            reason,
            metadata([
                ("decision_action", json!(decision.action.label())),
                ("final_status", json!(record.status.label())),
                ("previous_status", json!(previous_status.label())),
            ]),
        ))?;
        info!(
            application_id = %application_id,
            action = decision.action.label(),
            status = record.status.label(),
            "review decision recorded"
        );

        Ok(record)
    }

    /// Audit events of an application, newest first.
    pub fn audit_trail(
        &self,
        application_id: &ApplicationId,
    ) -> Result<AuditTrailView, ScreeningServiceError> {
        let record = self.fetch(application_id)?;
        let mut events = self.audit.events_for(application_id)?;
        events.reverse();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(AuditTrailView {
            application_id: record.id,
            events,
        })
    }

    /// Fetch an application for API responses.
    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ScreeningServiceError> {
        self.fetch(application_id)
    }

    fn fetch(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ScreeningServiceError> {
        let record = self
            .repository
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    fn process_document(
        &self,
        document: &DocumentRecord,
    ) -> Result<ProcessedDocument, DocumentFailure> {
        if !document.storage_path.exists() {
            return Err(DocumentFailure::new(document, "Stored file no longer exists"));
        }

        let extracted = self
            .extractor
            .extract(&document.storage_path, &document.media_type);
        if extracted.method == ExtractionMethod::Error {
            let message = if extracted.warnings.is_empty() {
                "Text extraction failed".to_string()
            } else {
                extracted.warnings.join("; ")
            };
            return Err(DocumentFailure::new(document, message));
        }

        let entities = self.entities.extract(&extracted.text);
        let nlp_score = document_nlp_score(&entities);
        debug!(
            document_id = %document.id.0,
            method = extracted.method.label(),
            entities = entities.raw_entity_count,
            nlp_score,
            "document processed"
        );

        let ocr_text = if extracted.text.is_empty() {
            format!(
                "No text extracted from {} (method: {})",
                document.original_filename,
                extracted.method.label()
            )
        } else {
            extracted.text
        };

        Ok(ProcessedDocument {
            ocr_text,
            extraction: DocumentExtraction {
                document_type: document.document_type.clone(),
                filename: document.original_filename.clone(),
                extraction_method: extracted.method,
                extraction_confidence: extracted.confidence,
                char_count: extracted.char_count,
                page_count: extracted.page_count,
                nlp_score,
                entities,
                warnings: extracted.warnings,
            },
        })
    }

    /// Serializes read-modify-write cycles on stored records.
    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self, application_id: &ApplicationId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(application_id)
    }

    fn claim(
        &self,
        application_id: &ApplicationId,
    ) -> Result<RunSlot<'_>, ScreeningServiceError> {
        let mut running = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(application_id.clone()) {
            return Err(ScreeningServiceError::AlreadyProcessing(application_id.clone()));
        }
        Ok(RunSlot {
            in_flight: &self.in_flight,
            application_id: application_id.clone(),
        })
    }
}

/// Releases the single-run claim on drop, including on early error returns.
struct RunSlot<'a> {
    in_flight: &'a Mutex<HashSet<ApplicationId>>,
    application_id: ApplicationId,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.application_id);
    }
}

struct ProcessedDocument {
    ocr_text: String,
    extraction: DocumentExtraction,
}

#[derive(Debug, Clone)]
struct DocumentFailure {
    document_id: DocumentId,
    message: String,
}

impl DocumentFailure {
    fn new(document: &DocumentRecord, message: impl Into<String>) -> Self {
        Self {
            document_id: document.id.clone(),
            message: message.into(),
        }
    }
}

fn metadata<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Per-document line of a processing report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub document_id: DocumentId,
    pub document_type: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<ExtractionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlp_score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentOutcome {
    fn processed(document: &DocumentRecord, extraction: &DocumentExtraction) -> Self {
        Self {
            document_id: document.id.clone(),
            document_type: document.document_type.clone(),
            status: DocumentStatus::Processed,
            extraction_method: Some(extraction.extraction_method),
            nlp_score: Some(extraction.nlp_score),
            warnings: extraction.warnings.clone(),
            error: None,
        }
    }

    fn failed(document: &DocumentRecord, failure: &DocumentFailure) -> Self {
        Self {
            document_id: document.id.clone(),
            document_type: document.document_type.clone(),
            status: DocumentStatus::Failed,
            extraction_method: None,
            nlp_score: None,
            warnings: Vec::new(),
            error: Some(failure.message.clone()),
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub application_id: ApplicationId,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub documents: Vec<DocumentOutcome>,
    pub rules: Vec<RuleResult>,
    pub decision: Decision,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionBreakdownView {
    pub application_id: ApplicationId,
    pub recommendation: String,
    pub confidence_score: f64,
    pub risk_level: RiskTier,
    pub rules: Vec<RuleResult>,
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("Upload at least one document before processing")]
    NoDocuments,
    #[error("application {0} is already being processed")]
    AlreadyProcessing(ApplicationId),
    #[error("daily_manual_capacity must be > 0")]
    InvalidCapacity,
}

impl ScreeningServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreeningServiceError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScreeningServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScreeningServiceError::Repository(RepositoryError::Conflict)
            | ScreeningServiceError::AlreadyProcessing(_) => StatusCode::CONFLICT,
            ScreeningServiceError::NoDocuments | ScreeningServiceError::InvalidCapacity => {
                StatusCode::BAD_REQUEST
            }
            ScreeningServiceError::Repository(RepositoryError::Unavailable(_))
            | ScreeningServiceError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
