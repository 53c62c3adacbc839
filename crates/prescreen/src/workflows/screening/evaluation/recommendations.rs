use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::RiskTier;
use super::rules::{RuleCode, RuleResult};
use crate::workflows::screening::domain::DocumentRecord;

pub const EVIDENCE_RECOMMENDER_ID: &str = "fallback:evidence-recommendation-v1";

const MAX_NEXT_ACTIONS: usize = 4;

const BASE_NEXT_ACTIONS: [&str; 3] = [
    "Request only high-impact missing documents first",
    "Re-run processing after document upload",
    "Review updated rule breakdown before final decision",
];

/// Which missing documents would most likely flip failed rules, and what to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecommendation {
    pub recommended_document_types: Vec<String>,
    pub rationale_by_document_type: BTreeMap<String, String>,
    pub recommended_next_actions: Vec<String>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

pub fn recommend_evidence(
    rules: &[RuleResult],
    documents: &[DocumentRecord],
    risk: Option<RiskTier>,
    now: DateTime<Utc>,
) -> EvidenceRecommendation {
    let uploaded: HashSet<String> = documents.iter().map(DocumentRecord::normalized_type).collect();

    let mut recommended_document_types: Vec<String> = Vec::new();
    let mut rationale_by_document_type = BTreeMap::new();

    for code in RuleCode::ALWAYS {
        let Some(failed) = rules.iter().find(|rule| rule.code == code && !rule.passed) else {
            continue;
        };
        for option in code.document_options() {
            if uploaded.contains(*option) {
                continue;
            }
            if !recommended_document_types.iter().any(|known| known.as_str() == *option) {
                recommended_document_types.push(option.to_string());
            }
            rationale_by_document_type.insert(option.to_string(), failed.rationale.clone());
        }
    }

    let first_action = match risk {
        Some(RiskTier::High) => Some("Prioritize this application for immediate reviewer follow-up"),
        Some(RiskTier::Medium) => {
            Some("Schedule targeted reviewer check after top missing evidence arrives")
        }
        Some(RiskTier::Low) | None => None,
    };

    EvidenceRecommendation {
        recommended_document_types,
        rationale_by_document_type,
        recommended_next_actions: first_action
            .into_iter()
            .chain(BASE_NEXT_ACTIONS)
            .take(MAX_NEXT_ACTIONS)
            .map(str::to_string)
            .collect(),
        generated_by: EVIDENCE_RECOMMENDER_ID.to_string(),
        generated_at: now,
    }
}
