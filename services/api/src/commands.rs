use crate::infra::{
    guess_media_type, parse_document_arg, InMemoryApplicationRepository, InMemoryAuditTrail,
};
use clap::Args;
use prescreen::config::AppConfig;
use prescreen::error::AppError;
use prescreen::workflows::screening::{
    document_nlp_score, ApplicationDraft, DocumentUpload, EntityExtractor, ExtractedEntities,
    ExtractedText, NerModel, ProcessingReport, ScreeningService, TextExtractor,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ExtractArgs {
    /// Document to read
    pub(crate) path: PathBuf,
    /// Declared media type; guessed from the file extension when omitted
    #[arg(long)]
    pub(crate) media_type: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ScreenArgs {
    /// Applicant full name
    #[arg(long, default_value = "Unnamed applicant")]
    pub(crate) name: String,
    /// Applicant nationality
    #[arg(long, default_value = "unknown")]
    pub(crate) nationality: String,
    /// Free-text case notes
    #[arg(long)]
    pub(crate) notes: Option<String>,
    /// Document to screen as TYPE=PATH, e.g. passport=./scans/passport.pdf (repeatable)
    #[arg(long = "document", value_parser = parse_document_arg, required = true)]
    pub(crate) documents: Vec<(String, PathBuf)>,
    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Serialize)]
struct ExtractOutput {
    extraction: ExtractedText,
    entities: ExtractedEntities,
    nlp_score: f64,
}

fn entity_extractor(config: &AppConfig) -> EntityExtractor {
    match NerModel::from_config(&config.ner) {
        Some(model) => EntityExtractor::with_ner(Arc::new(model)),
        None => EntityExtractor::new(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_extract(args: ExtractArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let media_type = args
        .media_type
        .unwrap_or_else(|| guess_media_type(&args.path));

    let extraction = TextExtractor::from_config(&config.ocr).extract(&args.path, &media_type);
    let entities = entity_extractor(&config).extract(&extraction.text);
    let nlp_score = document_nlp_score(&entities);

    print_json(&ExtractOutput {
        extraction,
        entities,
        nlp_score,
    })
}

pub(crate) fn run_screen(args: ScreenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    // Local files named on the command line, so no storage root applies.
    let service = ScreeningService::new(
        repository,
        audit.clone(),
        TextExtractor::from_config(&config.ocr),
        entity_extractor(&config),
    );

    let record = service.submit(ApplicationDraft {
        applicant_full_name: args.name,
        applicant_nationality: args.nationality,
        applicant_birth_date: None,
        notes: args.notes,
    })?;

    for (document_type, path) in args.documents {
        let upload = DocumentUpload {
            document_type,
            original_filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            media_type: guess_media_type(&path),
            file_size_bytes: std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0),
            storage_path: path,
        };
        service.attach_document(&record.id, upload)?;
    }

    service.queue(&record.id, false)?;
    let report = service.process(&record.id)?;
    let recommendations = service.evidence_recommendations(&record.id)?;

    if args.json {
        return print_json(&serde_json::json!({
            "report": report,
            "evidence_recommendations": recommendations,
            "audit_events": audit.events().len(),
        }));
    }

    render_report(&report);
    if !recommendations.recommended_document_types.is_empty() {
        println!("\nRecommended evidence");
        for document_type in &recommendations.recommended_document_types {
            let rationale = recommendations
                .rationale_by_document_type
                .get(document_type)
                .map(String::as_str)
                .unwrap_or_default();
            println!("  - {document_type}: {rationale}");
        }
    }
    println!("\nNext actions");
    for action in &recommendations.recommended_next_actions {
        println!("  - {action}");
    }

    Ok(())
}

fn render_report(report: &ProcessingReport) {
    println!("Pre-screening report for {}", report.application_id);
    println!(
        "- {} processed / {} failed documents",
        report.processed_documents, report.failed_documents
    );
    for document in &report.documents {
        match (&document.error, document.extraction_method) {
            (Some(error), _) => println!("  - {}: failed ({error})", document.document_type),
            (None, Some(method)) => println!(
                "  - {}: {} (NLP score {:.2})",
                document.document_type,
                method.label(),
                document.nlp_score.unwrap_or(0.0)
            ),
            (None, None) => println!("  - {}", document.document_type),
        }
    }

    println!("\nRules");
    for rule in &report.rules {
        println!(
            "  [{}] {} ({:.2} x {:.2}): {}",
            if rule.passed { "pass" } else { "fail" },
            rule.name,
            rule.score,
            rule.weight,
            rule.rationale
        );
    }

    println!(
        "\nConfidence {:.2} | risk {} | priority {:.2} | review due {}",
        report.decision.confidence,
        report.decision.risk_tier.as_str(),
        report.decision.priority_score,
        report.decision.sla_due_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("{}", report.summary);
}
