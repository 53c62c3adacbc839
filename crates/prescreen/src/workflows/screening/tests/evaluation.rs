use super::common::*;
use crate::workflows::screening::domain::DocumentStatus;
use crate::workflows::screening::entities::{extract_entities, ExtractedEntities};
use crate::workflows::screening::evaluation::{
    EligibilityEngine, EvidenceValue, RuleCode, RuleResult,
};

fn rule(rules: &[RuleResult], code: RuleCode) -> &RuleResult {
    rules
        .iter()
        .find(|rule| rule.code == code)
        .unwrap_or_else(|| panic!("rule {} missing", code.as_str()))
}

#[test]
fn unconditional_weights_sum_to_ninety_five_hundredths() {
    let total: f64 = RuleCode::ALWAYS.iter().map(|code| code.weight()).sum();
    assert!((total - 0.95).abs() < 1e-9, "total {total}");
}

#[test]
fn single_processed_passport_without_entities() {
    let documents = vec![document("passport", DocumentStatus::Processed)];
    let entities = vec![ExtractedEntities::default()];

    let rules = EligibilityEngine::new().evaluate(None, &documents, &entities);

    assert_eq!(rules.len(), 6);
    let codes: Vec<RuleCode> = rules.iter().map(|rule| rule.code).collect();
    assert_eq!(codes, RuleCode::ALWAYS.to_vec());

    let identity = rule(&rules, RuleCode::IdentityDocumentPresent);
    assert!(identity.passed);
    assert_eq!(identity.score, 1.0);
    assert_eq!(identity.rationale, "Passport or national ID detected");

    let residency = rule(&rules, RuleCode::ResidencyEvidencePresent);
    assert!(!residency.passed);
    assert_eq!(residency.score, 0.0);

    let language = rule(&rules, RuleCode::LanguageRequirementEvidence);
    assert!(!language.passed);
    assert_eq!(language.score, 0.35);

    let parsing = rule(&rules, RuleCode::DocumentParsingQuality);
    assert!(parsing.passed);
    assert_eq!(parsing.score, 1.0);
    assert_eq!(parsing.rationale, "OCR processed 1/1 documents");

    let security = rule(&rules, RuleCode::SecurityScreeningSignal);
    assert!(!security.passed);
    assert_eq!(security.score, 0.4);

    let richness = rule(&rules, RuleCode::NlpEntityRichness);
    assert!(!richness.passed);
    assert_eq!(richness.score, 0.0);
}

#[test]
fn no_documents_fails_identity_and_parsing() {
    let rules = EligibilityEngine::new().evaluate(None, &[], &[]);

    assert_eq!(rules.len(), 6);
    let identity = rule(&rules, RuleCode::IdentityDocumentPresent);
    assert!(!identity.passed);
    assert_eq!(identity.rationale, "No passport or national ID document uploaded");

    let parsing = rule(&rules, RuleCode::DocumentParsingQuality);
    assert!(!parsing.passed);
    assert_eq!(parsing.score, 0.0);
    assert_eq!(parsing.rationale, "OCR processed 0/0 documents");
}

#[test]
fn passport_number_in_text_gives_partial_identity_credit() {
    let documents = vec![document("other", DocumentStatus::Processed)];
    let entities = vec![extract_entities("Passport no. AB1234567")];

    let rules = EligibilityEngine::new().evaluate(None, &documents, &entities);

    let identity = rule(&rules, RuleCode::IdentityDocumentPresent);
    assert!(identity.passed);
    assert_eq!(identity.score, 0.7);
    assert_eq!(
        identity.evidence.get("nlp_passport_numbers"),
        Some(&EvidenceValue::List(vec!["AB1234567".to_string()]))
    );
}

#[test]
fn residency_text_without_document_scores_sixty_percent() {
    let documents = vec![document("passport", DocumentStatus::Processed)];
    let entities = vec![extract_entities(RESIDENCE_TEXT)];

    let rules = EligibilityEngine::new().evaluate(None, &documents, &entities);

    let residency = rule(&rules, RuleCode::ResidencyEvidencePresent);
    assert!(residency.passed);
    assert_eq!(residency.score, 0.6);

    let language = rule(&rules, RuleCode::LanguageRequirementEvidence);
    assert!(language.passed);
    assert_eq!(language.score, 0.7);
}

#[test]
fn parsing_quality_needs_eighty_percent_processed() {
    let documents = vec![
        document("passport", DocumentStatus::Processed),
        document("residence_permit", DocumentStatus::Processed),
        document("police_clearance", DocumentStatus::Processed),
        document("norwegian_test", DocumentStatus::Failed),
    ];

    let rules = EligibilityEngine::new().evaluate(None, &documents, &[]);

    let parsing = rule(&rules, RuleCode::DocumentParsingQuality);
    assert!(!parsing.passed);
    assert_eq!(parsing.score, 0.75);
}

#[test]
fn expiry_dates_surface_as_iso_evidence() {
    let documents = vec![document("passport", DocumentStatus::Processed)];
    let entities = vec![extract_entities(PASSPORT_TEXT)];

    let rules = EligibilityEngine::new().evaluate(None, &documents, &entities);

    let identity = rule(&rules, RuleCode::IdentityDocumentPresent);
    assert_eq!(
        identity.rationale,
        "Passport or national ID detected; passport number extracted from text"
    );
    assert_eq!(
        identity.evidence.get("nlp_expiry_dates"),
        Some(&EvidenceValue::List(vec!["2025-05-10".to_string()]))
    );
}

#[test]
fn residency_duration_rule_depends_on_notes_and_text() {
    let engine = EligibilityEngine::new();
    let documents = vec![document("passport", DocumentStatus::Processed)];
    let plain = vec![ExtractedEntities::default()];
    let residency = vec![extract_entities("Botid: 9 år i Norge")];

    let without = engine.evaluate(Some("Applicant arrived recently"), &documents, &plain);
    assert_eq!(without.len(), 6);

    let notes_only = engine.evaluate(
        Some("Applicant reports 8 YEARS of continuous residence."),
        &documents,
        &plain,
    );
    let bonus = rule(&notes_only, RuleCode::ResidencyDurationSignal);
    assert_eq!(notes_only.len(), 7);
    assert!(bonus.passed);
    assert_eq!(bonus.score, 0.8);
    assert_eq!(bonus.rationale, "Residency duration detected via case notes");
    assert_eq!(bonus.weight, 0.05);

    let text_only = engine.evaluate(None, &documents, &residency);
    let bonus = rule(&text_only, RuleCode::ResidencyDurationSignal);
    assert_eq!(bonus.score, 0.8);
    assert_eq!(bonus.rationale, "Residency duration detected via NLP text analysis");
    assert_eq!(bonus.evidence.get("notes"), Some(&EvidenceValue::Null));

    let both = engine.evaluate(Some("permanent residence since 2012"), &documents, &residency);
    let bonus = rule(&both, RuleCode::ResidencyDurationSignal);
    assert_eq!(bonus.score, 1.0);
}

#[test]
fn document_order_does_not_change_results() {
    let engine = EligibilityEngine::new();
    let documents = vec![
        document("police_clearance", DocumentStatus::Processed),
        document("Passport", DocumentStatus::Processed),
        document("residence_permit", DocumentStatus::Failed),
    ];
    let mut reversed = documents.clone();
    reversed.reverse();
    let entities = vec![extract_entities(PASSPORT_TEXT), extract_entities(RESIDENCE_TEXT)];

    let forward = engine.evaluate(Some("long-term resident"), &documents, &entities);
    let backward = engine.evaluate(Some("long-term resident"), &reversed, &entities);
    assert_eq!(forward, backward);

    let mut reversed_entities = entities.clone();
    reversed_entities.reverse();
    let shuffled = engine.evaluate(Some("long-term resident"), &reversed, &reversed_entities);
    let scores = |rules: &[RuleResult]| {
        rules
            .iter()
            .map(|result| (result.code, result.passed, result.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(scores(&forward), scores(&shuffled));

    assert_eq!(
        rule(&forward, RuleCode::SecurityScreeningSignal)
            .evidence
            .get("document_types"),
        Some(&EvidenceValue::List(vec![
            "passport".to_string(),
            "police_clearance".to_string(),
            "residence_permit".to_string(),
        ]))
    );
}

#[test]
fn entity_richness_counts_raw_entities() {
    let documents = vec![document("passport", DocumentStatus::Processed)];
    let entities = vec![extract_entities(PASSPORT_TEXT)];
    let raw = entities[0].raw_entity_count;

    let rules = EligibilityEngine::new().evaluate(None, &documents, &entities);

    let richness = rule(&rules, RuleCode::NlpEntityRichness);
    assert!(raw >= 5);
    assert!(richness.passed);
    assert_eq!(richness.score, (raw as f64 / 10.0).min(1.0));
    assert!(richness
        .rationale
        .starts_with(&format!("NLP extracted {raw} entities across 1 documents")));
}
