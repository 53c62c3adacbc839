use metrics_exporter_prometheus::PrometheusHandle;
use prescreen::workflows::screening::{
    ApplicationId, ApplicationRecord, ApplicationRepository, AuditError, AuditEvent, AuditTrail,
    RepositoryError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        if guard.contains_key(&record.id) {
            guard.insert(record.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    /// Newest first.
    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let mut records: Vec<ApplicationRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("repository mutex poisoned".to_string())
}

/// Audit trail kept in memory and mirrored to the log.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditTrail {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditTrail for InMemoryAuditTrail {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        info!(
            application_id = %event.application_id,
            action = event.action.label(),
            reason = %event.reason,
            "audit event"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }

    fn events_for(&self, application_id: &ApplicationId) -> Result<Vec<AuditEvent>, AuditError> {
        let guard = self
            .events
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|event| &event.application_id == application_id)
            .cloned()
            .collect())
    }
}

impl InMemoryAuditTrail {
    pub(crate) fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Media type for a local file, guessed from its extension.
pub(crate) fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Parse a `type=path` document argument.
pub(crate) fn parse_document_arg(raw: &str) -> Result<(String, PathBuf), String> {
    let (document_type, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=PATH, got '{raw}'"))?;
    let document_type = document_type.trim();
    let path = path.trim();
    if document_type.is_empty() || path.is_empty() {
        return Err(format!("expected TYPE=PATH, got '{raw}'"));
    }
    Ok((document_type.to_string(), PathBuf::from(path)))
}
