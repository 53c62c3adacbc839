use super::ExtractedEntities;
use crate::workflows::screening::round2;

const IDENTITY_WEIGHT: f64 = 0.25;
const KEYWORD_WEIGHT: f64 = 0.20;
const NATIONALITY_WEIGHT: f64 = 0.15;
const LANGUAGE_WEIGHT: f64 = 0.15;
const RESIDENCY_WEIGHT: f64 = 0.15;
const NAME_WEIGHT: f64 = 0.10;

/// 0..=1 richness of one document's entities: weighted coverage of six categories,
/// each capped before weighting, rounded to two decimals.
pub fn document_nlp_score(entities: &ExtractedEntities) -> f64 {
    let identity = coverage(entities.dates.len() + entities.passport_numbers.len(), 3);
    let keywords = coverage(entities.keywords_found.len(), 5);
    let nationality = presence(&entities.nationalities);
    let language = coverage(entities.language_indicators.len(), 2);
    let residency = coverage(entities.residency_indicators.len(), 2);
    let names = presence(&entities.names);

    round2(
        identity * IDENTITY_WEIGHT
            + keywords * KEYWORD_WEIGHT
            + nationality * NATIONALITY_WEIGHT
            + language * LANGUAGE_WEIGHT
            + residency * RESIDENCY_WEIGHT
            + names * NAME_WEIGHT,
    )
}

fn coverage(count: usize, saturation: usize) -> f64 {
    (count as f64 / saturation as f64).min(1.0)
}

fn presence(bucket: &[String]) -> f64 {
    if bucket.is_empty() {
        0.0
    } else {
        1.0
    }
}
