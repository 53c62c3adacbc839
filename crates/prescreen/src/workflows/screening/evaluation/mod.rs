//! Eligibility rule engine and decision policy.
//!
//! [`EligibilityEngine::evaluate`] turns an application's notes, its documents and the
//! per-document entities into weighted [`RuleResult`]s. [`EligibilityEngine::decide`]
//! folds those into confidence, risk tier, recommendation, priority and SLA.

mod evidence;
mod policy;
mod recommendations;
mod rules;

pub use evidence::{evidence, Evidence, EvidenceValue};
pub use policy::{
    confidence_score, priority_score, sla_due_at, Decision, DecisionContext, Recommendation,
    RiskTier,
};
pub use recommendations::{recommend_evidence, EvidenceRecommendation, EVIDENCE_RECOMMENDER_ID};
pub use rules::{RuleCode, RuleResult};

use tracing::debug;

use super::domain::DocumentRecord;
use super::entities::ExtractedEntities;
use rules::RuleSignals;

#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEngine;

impl EligibilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the rule catalogue. Document order never changes scores; evidence quoting
    /// document types is sorted. The residency duration rule is appended only when notes
    /// or extracted text point at long residence.
    pub fn evaluate(
        &self,
        notes: Option<&str>,
        documents: &[DocumentRecord],
        entities: &[ExtractedEntities],
    ) -> Vec<RuleResult> {
        let signals = RuleSignals::collect(notes, documents, entities);

        let mut results = vec![
            rules::identity_document(&signals),
            rules::residency_evidence(&signals),
            rules::language_requirement(&signals),
            rules::parsing_quality(&signals),
            rules::security_screening(&signals),
            rules::entity_richness(&signals),
        ];
        if signals.residency_duration_applies() {
            results.push(rules::residency_duration(&signals));
        }

        debug!(
            rules = results.len(),
            passed = results.iter().filter(|rule| rule.passed).count(),
            "eligibility rules evaluated"
        );
        results
    }

    pub fn decide(&self, rules: &[RuleResult], context: &DecisionContext) -> Decision {
        Decision::from_rules(rules, context)
    }
}
