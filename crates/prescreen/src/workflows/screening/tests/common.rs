use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use image::{DynamicImage, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;

use crate::workflows::screening::domain::{
    ApplicationDraft, ApplicationId, DocumentId, DocumentRecord, DocumentStatus, DocumentUpload,
};
use crate::workflows::screening::entities::EntityExtractor;
use crate::workflows::screening::extraction::{
    OcrEngine, OcrError, PageRasterizer, RasterError, TextExtractor,
};
use crate::workflows::screening::repository::{
    ApplicationRecord, ApplicationRepository, AuditError, AuditEvent, AuditTrail, RepositoryError,
};
use crate::workflows::screening::{application_router, ScreeningService};

pub(super) type MemoryService = ScreeningService<MemoryRepository, MemoryAudit>;

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAudit {
    pub(super) fn actions(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|event| event.action.label())
            .collect()
    }

    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditTrail for MemoryAudit {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit mutex poisoned").push(event);
        Ok(())
    }

    fn events_for(&self, application_id: &ApplicationId) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .events
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .filter(|event| &event.application_id == application_id)
            .cloned()
            .collect())
    }
}

/// What the stub engine answers for every page.
#[derive(Debug, Clone)]
pub(super) enum StubReply {
    Text(String),
    Unavailable,
    Failed,
}

#[derive(Clone)]
pub(super) struct StubOcr {
    reply: StubReply,
    calls: Arc<AtomicUsize>,
}

impl StubOcr {
    pub(super) fn new(reply: StubReply) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn text(text: &str) -> Self {
        Self::new(StubReply::Text(text.to_string()))
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for StubOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            StubReply::Unavailable => Err(OcrError::Unavailable("tesseract missing".to_string())),
            StubReply::Failed => Err(OcrError::Failed("page unreadable".to_string())),
        }
    }
}

/// Hands out blank pages without touching the file.
pub(super) struct StubRasterizer {
    pub(super) pages: usize,
}

impl PageRasterizer for StubRasterizer {
    fn for_each_page(
        &self,
        _path: &Path,
        visit: &mut dyn FnMut(usize, DynamicImage) -> ControlFlow<()>,
    ) -> Result<usize, RasterError> {
        let mut visited = 0;
        for index in 0..self.pages {
            visited += 1;
            let page = DynamicImage::ImageRgba8(RgbaImage::new(16, 16));
            if visit(index, page).is_break() {
                break;
            }
        }
        Ok(visited)
    }
}

pub(super) struct MissingRasterizer;

impl PageRasterizer for MissingRasterizer {
    fn for_each_page(
        &self,
        _path: &Path,
        _visit: &mut dyn FnMut(usize, DynamicImage) -> ControlFlow<()>,
    ) -> Result<usize, RasterError> {
        Err(RasterError::Unavailable("libpdfium not found".to_string()))
    }
}

pub(super) fn extractor(ocr: StubOcr, pages: usize) -> TextExtractor {
    TextExtractor::new(Arc::new(ocr), Arc::new(StubRasterizer { pages }))
}

pub(super) fn build_service(ocr: StubOcr) -> (MemoryService, MemoryRepository, MemoryAudit) {
    let repository = MemoryRepository::default();
    let audit = MemoryAudit::default();
    let service = ScreeningService::new(
        Arc::new(repository.clone()),
        Arc::new(audit.clone()),
        extractor(ocr, 1),
        EntityExtractor::new(),
    );
    (service, repository, audit)
}

pub(super) fn application_router_with_service(service: MemoryService) -> axum::Router {
    application_router(Arc::new(service))
}

pub(super) fn draft() -> ApplicationDraft {
    ApplicationDraft {
        applicant_full_name: "Amina Yusuf".to_string(),
        applicant_nationality: "Somali".to_string(),
        applicant_birth_date: None,
        notes: Some("Applicant reports 8 years of continuous residence in Oslo.".to_string()),
    }
}

pub(super) fn upload(document_type: &str, path: &Path, media_type: &str) -> DocumentUpload {
    DocumentUpload {
        document_type: document_type.to_string(),
        original_filename: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string()),
        media_type: media_type.to_string(),
        storage_path: path.to_path_buf(),
        file_size_bytes: 0,
    }
}

/// A document record as the engine sees it after a run.
pub(super) fn document(document_type: &str, status: DocumentStatus) -> DocumentRecord {
    let mut record = DocumentRecord::new(
        DocumentId(format!("doc-{document_type}")),
        upload(document_type, Path::new("/tmp/unused.pdf"), "application/pdf"),
    );
    record.status = status;
    record
}

pub(super) const PASSPORT_TEXT: &str = "PASSPORT / PASS\n\
Surname: Yusuf\n\
Given name: Amina\n\
Nationality: Somali\n\
Passport number AB1234567\n\
Date of birth: 15.03.1985\n\
Date of issue: 10.05.2015\n\
Expiry date: 10.05.2025\n";

pub(super) const RESIDENCE_TEXT: &str = "Oppholdstillatelse / residence permit\n\
Permanent opphold innvilget etter 8 år i Norge.\n\
Adresse: Storgata 12, 0150 Oslo\n\
Norskprøve B1 bestått.\n";

/// One-page PDF whose text layer holds `line`.
pub(super) fn write_text_pdf(dir: &Path, name: &str, line: &str) -> PathBuf {
    let operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![50.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal(line)]),
        Operation::new("ET", vec![]),
    ];
    write_pdf(dir, name, operations)
}

/// One-page PDF without any text, as a scanner would produce before OCR.
pub(super) fn write_blank_pdf(dir: &Path, name: &str) -> PathBuf {
    write_pdf(dir, name, Vec::new())
}

fn write_pdf(dir: &Path, name: &str, operations: Vec<Operation>) -> PathBuf {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content { operations };
    let content_id = document.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    document.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    document.save(&path).expect("write pdf");
    path
}

pub(super) fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
        .save(&path)
        .expect("write png");
    path
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
