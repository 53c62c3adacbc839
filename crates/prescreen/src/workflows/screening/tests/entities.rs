use std::sync::Arc;

use super::common::*;
use crate::workflows::screening::entities::{
    document_nlp_score, extract_entities, EntityExtractor, ExtractedEntities,
    GazetteerNerBackend, NamedEntity, NerBackend, NerError, NerLabel, NerModel,
};

#[test]
fn blank_text_yields_no_entities() {
    for text in ["", "   ", "\n\t\n"] {
        let entities = extract_entities(text);
        assert_eq!(entities, ExtractedEntities::default());
        assert_eq!(entities.raw_entity_count, 0);
    }
}

#[test]
fn passport_page_populates_identity_buckets() {
    let entities = extract_entities(PASSPORT_TEXT);

    assert_eq!(entities.passport_numbers, vec!["AB1234567".to_string()]);
    assert_eq!(
        entities.dates,
        vec![
            "15.03.1985".to_string(),
            "10.05.2015".to_string(),
            "10.05.2025".to_string(),
        ]
    );
    assert_eq!(entities.names, vec!["Yusuf".to_string(), "Amina".to_string()]);
    assert_eq!(entities.nationalities, vec!["somali".to_string()]);
    assert!(entities.keywords_found.contains(&"passport".to_string()));
}

#[test]
fn expiry_bucket_only_takes_labelled_expiry_dates() {
    let text = "Date of birth: 15.03.1985\nDate of issue: 10.05.2015\nExpiry date: 10.05.2025\n";
    let entities = extract_entities(text);

    assert_eq!(entities.expiry_dates, vec!["10.05.2025".to_string()]);
    assert!(entities.dates.contains(&"15.03.1985".to_string()));
}

#[test]
fn birth_date_alone_never_counts_as_expiry() {
    let entities = extract_entities("Date of birth: 15.03.1990\nFødselsdato: 15.03.1990");
    assert!(entities.expiry_dates.is_empty());
}

#[test]
fn second_label_after_slash_must_be_an_expiry_label() {
    for text in [
        "Date of expiry / Date of birth: 01.01.1990",
        "Utløpsdato / Fødselsdato: 01.01.1990",
        "Expiry date / Date of issue: 10.05.2015",
    ] {
        let entities = extract_entities(text);
        assert!(
            entities.expiry_dates.is_empty(),
            "{text:?} produced {:?}",
            entities.expiry_dates
        );
    }

    let entities = extract_entities("Expiry date / Utløpsdato: 10.05.2025");
    assert_eq!(entities.expiry_dates, vec!["10.05.2025".to_string()]);
}

#[test]
fn expiry_formats_in_both_languages() {
    let text = "Gyldig til: 01.02.2031\n\
        Valid until 2029-11-30\n\
        Utløpsdato: 12_08_2028\n\
        Expires on 5 March 2032\n\
        Date of expiry/Utløpsdato: 10 MAI/MAY 2030\n";
    let entities = extract_entities(text);

    assert_eq!(
        entities.expiry_dates,
        vec![
            "01.02.2031".to_string(),
            "2029-11-30".to_string(),
            "12_08_2028".to_string(),
            "5 March 2032".to_string(),
            "10 MAI/MAY 2030".to_string(),
        ]
    );
}

#[test]
fn machine_readable_zone_expiry_is_captured() {
    let text = "P<NORYUSUF<<AMINA<<<<<<<<<<<<<<<<<<<<<<<<<<<<\n\
        AB12345674SOM8503157F2505108<<<<<<<<<<<<<<06\n";
    let entities = extract_entities(text);
    assert_eq!(entities.expiry_dates, vec!["250510".to_string()]);
}

#[test]
fn residency_patterns_record_first_match_only() {
    let entities = extract_entities("Botid: 7 years in Oslo, previously 3 years in Bergen");
    let numeric_hits: Vec<&String> = entities
        .residency_indicators
        .iter()
        .filter(|hit| hit.chars().next().is_some_and(|ch| ch.is_ascii_digit()))
        .collect();

    assert_eq!(numeric_hits, vec![&"7 years".to_string()]);
    assert!(entities.residency_indicators.contains(&"botid".to_string()));
    assert_eq!(entities.numeric_values, vec!["7".to_string(), "3".to_string()]);
}

#[test]
fn addresses_join_postal_code_and_place() {
    let entities = extract_entities(RESIDENCE_TEXT);
    assert!(entities.addresses.contains(&"0150 Oslo".to_string()), "{:?}", entities.addresses);
    assert!(entities.addresses.contains(&"Storgata".to_string()), "{:?}", entities.addresses);
    assert!(entities.residency_indicators.contains(&"8 år".to_string()));
    assert!(entities.language_indicators.contains(&"b1".to_string()));
}

#[test]
fn place_name_stops_at_the_end_of_the_line() {
    let entities = extract_entities("Adresse: 0150 Oslo\nSkatteetaten bekrefter botid");
    assert!(entities.addresses.contains(&"0150 Oslo".to_string()), "{:?}", entities.addresses);
    assert!(!entities.addresses.iter().any(|hit| hit.contains("Skatteetaten")));

    let entities = extract_entities("Postadresse: 9008 Nord Tromsø");
    assert!(entities.addresses.contains(&"9008 Nord Tromsø".to_string()), "{:?}", entities.addresses);
}

#[test]
fn vocabulary_hits_keep_vocabulary_casing_and_dedupe() {
    let entities = extract_entities("NORWEGIAN citizen. Norwegian passport. norsk statsborgerskap");
    assert_eq!(
        entities.nationalities,
        vec!["norwegian".to_string(), "norsk".to_string()]
    );
}

#[test]
fn raw_count_is_bucket_sum_and_extraction_is_deterministic() {
    for text in [PASSPORT_TEXT, RESIDENCE_TEXT, "Name: Ola\nNAME: ola\n"] {
        let first = extract_entities(text);
        let second = extract_entities(text);
        assert_eq!(first, second);
        assert_eq!(first.raw_entity_count, first.bucket_total());
    }
}

#[test]
fn names_are_deduplicated_case_insensitively_keeping_first_casing() {
    let entities = extract_entities("Name: Ola Nordmann\nNAVN: OLA NORDMANN\n");
    assert_eq!(entities.names, vec!["Ola Nordmann".to_string()]);
}

#[test]
fn merge_adds_raw_counts_and_rededupes() {
    let passport = extract_entities(PASSPORT_TEXT);
    let again = extract_entities(PASSPORT_TEXT);

    let merged = ExtractedEntities::merged([&passport, &again]);

    assert_eq!(merged.passport_numbers, passport.passport_numbers);
    assert_eq!(merged.dates, passport.dates);
    assert_eq!(merged.raw_entity_count, passport.raw_entity_count * 2);
    assert!(merged.raw_entity_count > merged.bucket_total());
}

#[test]
fn ner_entities_extend_pattern_buckets() {
    let backend = GazetteerNerBackend::from_json(
        r#"{"PER": ["Amina Yusuf"], "GPE": ["Tromsø"], "ORG": ["Politiet i Oslo", "Acme AS"], "DATE": ["1. mai 2020"]}"#,
    )
    .expect("valid gazetteer");
    let extractor = EntityExtractor::with_ner(Arc::new(NerModel::from_backend(Arc::new(backend))));

    let entities = extractor.extract("Amina Yusuf moved to Tromsø 1. mai 2020; letter from Politiet i Oslo and Acme AS.");

    assert!(entities.names.contains(&"Amina Yusuf".to_string()));
    assert!(entities.addresses.contains(&"Tromsø".to_string()));
    assert!(entities.dates.contains(&"1. mai 2020".to_string()));
    assert!(entities.keywords_found.contains(&"Politiet i Oslo".to_string()));
    assert!(!entities.keywords_found.iter().any(|k| k == "Acme AS"));
    assert_eq!(entities.raw_entity_count, entities.bucket_total());
}

struct FailingBackend;

impl NerBackend for FailingBackend {
    fn backend_id(&self) -> &str {
        "failing"
    }

    fn recognize(&self, _text: &str) -> Result<Vec<NamedEntity>, NerError> {
        Err(NerError::Inference("model crashed".to_string()))
    }
}

#[test]
fn ner_failures_leave_pattern_result_untouched() {
    let failing = EntityExtractor::with_ner(Arc::new(NerModel::from_backend(Arc::new(
        FailingBackend,
    ))));
    let unloadable = EntityExtractor::with_ner(Arc::new(NerModel::new(|| {
        Err(NerError::Inference("weights missing".to_string()))
    })));

    let baseline = extract_entities(PASSPORT_TEXT);
    assert_eq!(failing.extract(PASSPORT_TEXT), baseline);
    assert_eq!(unloadable.extract(PASSPORT_TEXT), baseline);
}

#[test]
fn ner_label_mapping_ignores_unknown_tags() {
    assert_eq!(NerLabel::from_tag("MISC"), NerLabel::Other);
}

#[test]
fn nlp_score_of_empty_entities_is_zero() {
    assert_eq!(document_nlp_score(&ExtractedEntities::default()), 0.0);
}

#[test]
fn nlp_score_of_rich_document_is_positive_and_bounded() {
    let mut entities = extract_entities(PASSPORT_TEXT);
    entities.merge(&extract_entities(RESIDENCE_TEXT));

    assert!(entities.dates.len() >= 2);
    assert!(!entities.passport_numbers.is_empty());
    assert!(!entities.names.is_empty());
    assert!(!entities.nationalities.is_empty());
    assert!(entities.keywords_found.len() >= 3);
    assert!(entities.language_indicators.len() >= 2);
    assert!(!entities.residency_indicators.is_empty());

    let score = document_nlp_score(&entities);
    assert!(score > 0.0 && score <= 1.0, "score {score}");
}
