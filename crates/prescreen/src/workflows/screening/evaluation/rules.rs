use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::evidence::{evidence, sample, Evidence, EvidenceValue};
use crate::workflows::screening::domain::{DocumentRecord, DocumentStatus};
use crate::workflows::screening::entities::{
    document_nlp_score, parse_date_flexible, ExtractedEntities,
};
use crate::workflows::screening::round2;

const LONG_RESIDENCE_PHRASES: [&str; 3] = ["years", "permanent residence", "long-term"];
const PARSING_QUALITY_THRESHOLD: f64 = 0.8;
const RICHNESS_PASS_COUNT: usize = 5;
const RICHNESS_FULL_COUNT: f64 = 10.0;

/// Stable identifiers of the rule catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCode {
    IdentityDocumentPresent,
    ResidencyEvidencePresent,
    LanguageRequirementEvidence,
    DocumentParsingQuality,
    SecurityScreeningSignal,
    NlpEntityRichness,
    ResidencyDurationSignal,
}

impl RuleCode {
    /// The unconditional rules, in evaluation order.
    pub const ALWAYS: [RuleCode; 6] = [
        RuleCode::IdentityDocumentPresent,
        RuleCode::ResidencyEvidencePresent,
        RuleCode::LanguageRequirementEvidence,
        RuleCode::DocumentParsingQuality,
        RuleCode::SecurityScreeningSignal,
        RuleCode::NlpEntityRichness,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RuleCode::IdentityDocumentPresent => "identity_document_present",
            RuleCode::ResidencyEvidencePresent => "residency_evidence_present",
            RuleCode::LanguageRequirementEvidence => "language_requirement_evidence",
            RuleCode::DocumentParsingQuality => "document_parsing_quality",
            RuleCode::SecurityScreeningSignal => "security_screening_signal",
            RuleCode::NlpEntityRichness => "nlp_entity_richness",
            RuleCode::ResidencyDurationSignal => "residency_duration_signal",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            RuleCode::IdentityDocumentPresent => "Identity document provided",
            RuleCode::ResidencyEvidencePresent => "Residency evidence provided",
            RuleCode::LanguageRequirementEvidence => "Language or integration evidence",
            RuleCode::DocumentParsingQuality => "Document OCR/NLP extraction quality",
            RuleCode::SecurityScreeningSignal => "Security screening evidence",
            RuleCode::NlpEntityRichness => "NLP entity extraction richness",
            RuleCode::ResidencyDurationSignal => "Residency duration signal",
        }
    }

    pub const fn weight(self) -> f64 {
        match self {
            RuleCode::IdentityDocumentPresent => 0.20,
            RuleCode::ResidencyEvidencePresent => 0.18,
            RuleCode::LanguageRequirementEvidence => 0.15,
            RuleCode::DocumentParsingQuality => 0.17,
            RuleCode::SecurityScreeningSignal => 0.15,
            RuleCode::NlpEntityRichness => 0.10,
            RuleCode::ResidencyDurationSignal => 0.05,
        }
    }

    /// Document types that satisfy the rule when uploaded.
    pub const fn document_options(self) -> &'static [&'static str] {
        match self {
            RuleCode::IdentityDocumentPresent => &["passport", "id_card"],
            RuleCode::ResidencyEvidencePresent => {
                &["residence_permit", "residence_proof", "tax_statement"]
            }
            RuleCode::LanguageRequirementEvidence => {
                &["language_certificate", "norwegian_test", "education_certificate"]
            }
            RuleCode::SecurityScreeningSignal => &["police_clearance"],
            RuleCode::DocumentParsingQuality
            | RuleCode::NlpEntityRichness
            | RuleCode::ResidencyDurationSignal => &[],
        }
    }
}

/// Outcome of one rule for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub code: RuleCode,
    pub name: String,
    pub passed: bool,
    pub score: f64,
    pub weight: f64,
    pub rationale: String,
    pub evidence: Evidence,
}

impl RuleResult {
    fn new(code: RuleCode, passed: bool, score: f64, rationale: String, evidence: Evidence) -> Self {
        Self {
            code,
            name: code.display_name().to_string(),
            passed,
            score,
            weight: code.weight(),
            rationale,
            evidence,
        }
    }
}

/// Inputs every rule reads, computed once per run.
pub(super) struct RuleSignals<'a> {
    document_types: BTreeSet<String>,
    total_documents: usize,
    processed_documents: usize,
    notes: Option<&'a str>,
    mentions_long_residence: bool,
    merged: ExtractedEntities,
    documents_with_entities: usize,
    average_nlp_score: f64,
}

impl<'a> RuleSignals<'a> {
    pub(super) fn collect(
        notes: Option<&'a str>,
        documents: &[DocumentRecord],
        entities: &[ExtractedEntities],
    ) -> Self {
        let lowered_notes = notes.unwrap_or_default().trim().to_lowercase();
        let average_nlp_score = if entities.is_empty() {
            0.0
        } else {
            let total: f64 = entities.iter().map(document_nlp_score).sum();
            round2(total / entities.len() as f64)
        };

        Self {
            document_types: documents
                .iter()
                .map(DocumentRecord::normalized_type)
                .collect(),
            total_documents: documents.len(),
            processed_documents: documents
                .iter()
                .filter(|document| document.status == DocumentStatus::Processed)
                .count(),
            notes,
            mentions_long_residence: LONG_RESIDENCE_PHRASES
                .iter()
                .any(|phrase| lowered_notes.contains(phrase)),
            merged: ExtractedEntities::merged(entities),
            documents_with_entities: entities.len(),
            average_nlp_score,
        }
    }

    fn has_document_for(&self, code: RuleCode) -> bool {
        code.document_options()
            .iter()
            .any(|option| self.document_types.contains(*option))
    }

    fn document_types(&self) -> EvidenceValue {
        EvidenceValue::List(self.document_types.iter().cloned().collect())
    }

    pub(super) fn residency_duration_applies(&self) -> bool {
        self.mentions_long_residence || !self.merged.residency_indicators.is_empty()
    }
}

pub(super) fn identity_document(signals: &RuleSignals<'_>) -> RuleResult {
    let by_document = signals.has_document_for(RuleCode::IdentityDocumentPresent);
    let by_text = !signals.merged.passport_numbers.is_empty();

    let score = match (by_document, by_text) {
        (true, _) => 1.0,
        (false, true) => 0.7,
        (false, false) => 0.0,
    };
    let rationale = match (by_document, by_text) {
        (true, true) => "Passport or national ID detected; passport number extracted from text",
        (true, false) => "Passport or national ID detected",
        (false, true) => "No identity document type uploaded; passport number extracted from text",
        (false, false) => "No passport or national ID document uploaded",
    };
    let expiry_dates: Vec<String> = signals
        .merged
        .expiry_dates
        .iter()
        .filter_map(|raw| parse_date_flexible(raw))
        .map(|date| date.to_string())
        .collect();

    RuleResult::new(
        RuleCode::IdentityDocumentPresent,
        by_document || by_text,
        score,
        rationale.to_string(),
        evidence([
            ("document_types", signals.document_types()),
            ("nlp_passport_numbers", sample(&signals.merged.passport_numbers, 3)),
            ("nlp_dates_found", signals.merged.dates.len().into()),
            ("nlp_expiry_dates", sample(&expiry_dates, 3)),
        ]),
    )
}

pub(super) fn residency_evidence(signals: &RuleSignals<'_>) -> RuleResult {
    let by_document = signals.has_document_for(RuleCode::ResidencyEvidencePresent);
    let by_text = !signals.merged.residency_indicators.is_empty();

    let score = match (by_document, by_text) {
        (true, _) => 1.0,
        (false, true) => 0.6,
        (false, false) => 0.0,
    };
    let rationale = match (by_document, by_text) {
        (true, true) => "Residency-related document detected; NLP found residency keywords in text",
        (true, false) => "Residency-related document detected",
        (false, true) => "No residency document uploaded; NLP found residency keywords in text",
        (false, false) => "No residency proof document or text signals detected",
    };

    RuleResult::new(
        RuleCode::ResidencyEvidencePresent,
        by_document || by_text,
        score,
        rationale.to_string(),
        evidence([
            ("document_types", signals.document_types()),
            ("nlp_residency_indicators", sample(&signals.merged.residency_indicators, 5)),
            ("nlp_addresses", sample(&signals.merged.addresses, 3)),
        ]),
    )
}

pub(super) fn language_requirement(signals: &RuleSignals<'_>) -> RuleResult {
    let by_document = signals.has_document_for(RuleCode::LanguageRequirementEvidence);
    let by_text = !signals.merged.language_indicators.is_empty();

    let score = match (by_document, by_text) {
        (true, _) => 1.0,
        (false, true) => 0.7,
        (false, false) => 0.35,
    };
    let rationale = match (by_document, by_text) {
        (true, true) => {
            "Language/integration certificate detected; language proficiency indicators found in text"
        }
        (true, false) => "Language/integration certificate detected",
        (false, true) => "No language certificate uploaded; language proficiency indicators found in text",
        (false, false) => "No explicit language certificate or text indicators found",
    };

    RuleResult::new(
        RuleCode::LanguageRequirementEvidence,
        by_document || by_text,
        score,
        rationale.to_string(),
        evidence([
            ("document_types", signals.document_types()),
            ("nlp_language_indicators", sample(&signals.merged.language_indicators, 5)),
        ]),
    )
}

pub(super) fn parsing_quality(signals: &RuleSignals<'_>) -> RuleResult {
    let ratio = if signals.total_documents == 0 {
        0.0
    } else {
        signals.processed_documents as f64 / signals.total_documents as f64
    };

    let mut rationale = format!(
        "OCR processed {}/{} documents",
        signals.processed_documents, signals.total_documents
    );
    if signals.average_nlp_score > 0.0 {
        rationale.push_str(&format!("; avg NLP entity score {}", signals.average_nlp_score));
    }

    RuleResult::new(
        RuleCode::DocumentParsingQuality,
        ratio >= PARSING_QUALITY_THRESHOLD,
        round2(ratio),
        rationale,
        evidence([
            ("processed_documents", signals.processed_documents.into()),
            ("total_documents", signals.total_documents.into()),
            ("avg_nlp_score", signals.average_nlp_score.into()),
            ("total_entities_extracted", signals.merged.raw_entity_count.into()),
        ]),
    )
}

pub(super) fn security_screening(signals: &RuleSignals<'_>) -> RuleResult {
    let present = signals.has_document_for(RuleCode::SecurityScreeningSignal);
    let (score, rationale) = if present {
        (1.0, "Police clearance document detected")
    } else {
        (0.4, "No police clearance document uploaded")
    };

    RuleResult::new(
        RuleCode::SecurityScreeningSignal,
        present,
        score,
        rationale.to_string(),
        evidence([("document_types", signals.document_types())]),
    )
}

pub(super) fn entity_richness(signals: &RuleSignals<'_>) -> RuleResult {
    let merged = &signals.merged;
    let count = merged.raw_entity_count;

    RuleResult::new(
        RuleCode::NlpEntityRichness,
        count >= RICHNESS_PASS_COUNT,
        (count as f64 / RICHNESS_FULL_COUNT).min(1.0),
        format!(
            "NLP extracted {count} entities across {} documents (nationalities: {}, keywords: {}, dates: {})",
            signals.documents_with_entities,
            merged.nationalities.len(),
            merged.keywords_found.len(),
            merged.dates.len(),
        ),
        evidence([
            ("raw_entity_count", count.into()),
            ("nationalities_found", sample(&merged.nationalities, 5)),
            ("keywords_found", sample(&merged.keywords_found, 10)),
            ("names_found", sample(&merged.names, 3)),
        ]),
    )
}

/// Bonus rule; callers include it only when [`RuleSignals::residency_duration_applies`].
pub(super) fn residency_duration(signals: &RuleSignals<'_>) -> RuleResult {
    let from_notes = signals.mentions_long_residence;
    let from_text = !signals.merged.residency_indicators.is_empty();

    let (score, source) = match (from_notes, from_text) {
        (true, true) => (1.0, "case notes and NLP text analysis"),
        (true, false) => (0.8, "case notes"),
        _ => (0.8, "NLP text analysis"),
    };

    RuleResult::new(
        RuleCode::ResidencyDurationSignal,
        true,
        score,
        format!("Residency duration detected via {source}"),
        evidence([
            ("notes", signals.notes.map(str::to_string).into()),
            ("nlp_residency_indicators", sample(&signals.merged.residency_indicators, 5)),
            ("nlp_numeric_values", sample(&signals.merged.numeric_values, 5)),
        ]),
    )
}
