//! Entity extraction over document text.
//!
//! Pattern tables live in [`patterns`]; an optional [`NerModel`] adds names, places,
//! dates and known organisations on top. Every bucket is deduplicated case-insensitively,
//! keeping the first-seen spelling.

mod dates;
mod ner;
mod patterns;
mod scoring;

pub use dates::{parse_date_flexible, parse_date_flexible_at};
pub use ner::{GazetteerNerBackend, NamedEntity, NerBackend, NerError, NerLabel, NerModel};
pub use scoring::document_nlp_score;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use patterns::Indicator;

/// Typed entity buckets found in one document, or merged across several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub dates: Vec<String>,
    pub passport_numbers: Vec<String>,
    pub names: Vec<String>,
    pub nationalities: Vec<String>,
    pub addresses: Vec<String>,
    pub keywords_found: Vec<String>,
    pub language_indicators: Vec<String>,
    pub residency_indicators: Vec<String>,
    pub numeric_values: Vec<String>,
    pub expiry_dates: Vec<String>,
    pub raw_entity_count: usize,
}

impl ExtractedEntities {
    /// Sum of the current bucket lengths.
    pub fn bucket_total(&self) -> usize {
        self.buckets().iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_total() == 0
    }

    /// Concatenate `other` into each bucket and deduplicate again. Raw counts are added,
    /// so entities repeated across documents still count once per document.
    pub fn merge(&mut self, other: &ExtractedEntities) {
        for (mine, theirs) in self.buckets_mut().into_iter().zip(other.buckets()) {
            mine.extend(theirs.iter().cloned());
            *mine = dedupe(std::mem::take(mine));
        }
        self.raw_entity_count += other.raw_entity_count;
    }

    /// Merge every document's entities, in order.
    pub fn merged<'a>(all: impl IntoIterator<Item = &'a ExtractedEntities>) -> Self {
        all.into_iter().fold(Self::default(), |mut merged, entities| {
            merged.merge(entities);
            merged
        })
    }

    fn buckets(&self) -> [&Vec<String>; 10] {
        [
            &self.dates,
            &self.passport_numbers,
            &self.names,
            &self.nationalities,
            &self.addresses,
            &self.keywords_found,
            &self.language_indicators,
            &self.residency_indicators,
            &self.numeric_values,
            &self.expiry_dates,
        ]
    }

    fn buckets_mut(&mut self) -> [&mut Vec<String>; 10] {
        [
            &mut self.dates,
            &mut self.passport_numbers,
            &mut self.names,
            &mut self.nationalities,
            &mut self.addresses,
            &mut self.keywords_found,
            &mut self.language_indicators,
            &mut self.residency_indicators,
            &mut self.numeric_values,
            &mut self.expiry_dates,
        ]
    }
}

/// Pattern-based extractor with an optional NER pass.
#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
    ner: Option<Arc<NerModel>>,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ner(ner: Arc<NerModel>) -> Self {
        Self { ner: Some(ner) }
    }

    pub fn extract(&self, text: &str) -> ExtractedEntities {
        if text.trim().is_empty() {
            return ExtractedEntities::default();
        }

        let lowered = text.to_lowercase();
        let mut entities = ExtractedEntities {
            dates: dedupe(captures(&patterns::DATE_REGEXES, text)),
            passport_numbers: dedupe(captures(&patterns::ID_NUMBER_REGEXES, text)),
            nationalities: dedupe(vocabulary_hits(patterns::NATIONALITIES, &lowered)),
            keywords_found: dedupe(vocabulary_hits(patterns::CITIZENSHIP_KEYWORDS, &lowered)),
            language_indicators: dedupe(vocabulary_hits(patterns::LANGUAGE_INDICATORS, &lowered)),
            residency_indicators: dedupe(residency_hits(text, &lowered)),
            addresses: dedupe(captures(&patterns::ADDRESS_REGEXES, text)),
            names: dedupe(
                captures(&patterns::NAME_REGEXES, text)
                    .into_iter()
                    .filter(|name| !name.trim().is_empty())
                    .collect(),
            ),
            numeric_values: dedupe(captures(
                std::slice::from_ref(&*patterns::NUMERIC_VALUE_REGEX),
                text,
            )),
            ..ExtractedEntities::default()
        };

        if let Some(ner) = &self.ner {
            apply_named_entities(&mut entities, &ner.annotate(text));
        }

        entities.expiry_dates = dedupe(patterns::expiry_dates(text));
        entities.raw_entity_count = entities.bucket_total();
        entities
    }
}

/// Pattern-only extraction.
pub fn extract_entities(text: &str) -> ExtractedEntities {
    EntityExtractor::new().extract(text)
}

fn apply_named_entities(entities: &mut ExtractedEntities, found: &[NamedEntity]) {
    if found.is_empty() {
        return;
    }

    for entity in found {
        let value = entity.text.trim();
        if value.is_empty() {
            continue;
        }
        match entity.label {
            NerLabel::Person => entities.names.push(value.to_string()),
            NerLabel::Location => entities.addresses.push(value.to_string()),
            NerLabel::Date => entities.dates.push(value.to_string()),
            NerLabel::Organization => {
                let lowered = value.to_lowercase();
                if patterns::ORGANISATION_KEYWORDS
                    .iter()
                    .any(|keyword| lowered.contains(keyword))
                {
                    entities.keywords_found.push(value.to_string());
                }
            }
            NerLabel::Other => {}
        }
    }

    for bucket in [
        &mut entities.names,
        &mut entities.addresses,
        &mut entities.dates,
        &mut entities.keywords_found,
    ] {
        *bucket = dedupe(std::mem::take(bucket));
    }
}

/// Every match of every pattern; multi-group matches are joined with a space.
fn captures(regexes: &[regex::Regex], text: &str) -> Vec<String> {
    regexes
        .iter()
        .flat_map(|regex| regex.captures_iter(text))
        .map(|caps| {
            let groups: Vec<&str> = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|group| group.as_str())
                .collect();
            if groups.is_empty() {
                caps.get(0).map(|whole| whole.as_str()).unwrap_or_default().to_string()
            } else {
                groups.join(" ")
            }
        })
        .collect()
}

fn vocabulary_hits(vocabulary: &[&str], lowered: &str) -> Vec<String> {
    vocabulary
        .iter()
        .filter(|entry| lowered.contains(&entry.to_lowercase()))
        .map(|entry| entry.to_string())
        .collect()
}

fn residency_hits(text: &str, lowered: &str) -> Vec<String> {
    patterns::RESIDENCY_MATCHERS
        .iter()
        .filter_map(|indicator| match indicator {
            Indicator::Pattern(regex) => regex.find(text).map(|hit| hit.as_str().to_string()),
            Indicator::Literal(phrase) => {
                lowered.contains(&phrase.to_lowercase()).then(|| phrase.to_string())
            }
        })
        .collect()
}

/// Trim, then drop case-insensitive repeats keeping the first spelling.
fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| {
            let trimmed = item.trim();
            seen.insert(trimmed.to_lowercase())
                .then(|| trimmed.to_string())
        })
        .collect()
}
