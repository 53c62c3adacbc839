use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::rules::RuleResult;
use crate::workflows::screening::round2;

const LOW_RISK_CONFIDENCE: f64 = 0.8;
const MEDIUM_RISK_CONFIDENCE: f64 = 0.6;

/// Coarse bucket derived from confidence; drives priority and SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Boundary values belong to the higher-confidence tier.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= LOW_RISK_CONFIDENCE {
            RiskTier::Low
        } else if confidence >= MEDIUM_RISK_CONFIDENCE {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    const fn priority_component(self) -> f64 {
        match self {
            RiskTier::High => 45.0,
            RiskTier::Medium => 30.0,
            RiskTier::Low => 15.0,
        }
    }

    const fn sla_days(self) -> i64 {
        match self {
            RiskTier::High => 7,
            RiskTier::Medium => 14,
            RiskTier::Low => 21,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ManualFollowUp,
    InsufficientEvidence,
    FastTrack,
    Borderline,
    NotEligible,
}

impl Recommendation {
    /// Failed documents win over everything, then an empty processed set, then confidence.
    pub fn select(confidence: f64, processed_documents: usize, failed_documents: usize) -> Self {
        if failed_documents > 0 {
            return Recommendation::ManualFollowUp;
        }
        if processed_documents == 0 {
            return Recommendation::InsufficientEvidence;
        }
        match RiskTier::from_confidence(confidence) {
            RiskTier::Low => Recommendation::FastTrack,
            RiskTier::Medium => Recommendation::Borderline,
            RiskTier::High => Recommendation::NotEligible,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Recommendation::ManualFollowUp => {
                "Manual follow-up required due to failed document parsing"
            }
            Recommendation::InsufficientEvidence => {
                "Insufficient evidence for automated recommendation"
            }
            Recommendation::FastTrack => "Eligible for fast-track manual verification",
            Recommendation::Borderline => {
                "Borderline eligibility; prioritize targeted human review"
            }
            Recommendation::NotEligible => {
                "Likely not eligible in current submission; request additional evidence"
            }
        }
    }
}

/// Weighted mean of rule scores; zero when no weight is present.
pub fn confidence_score(rules: &[RuleResult]) -> f64 {
    let total_weight: f64 = rules.iter().map(|rule| rule.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = rules.iter().map(|rule| rule.score * rule.weight).sum();
    weighted / total_weight
}

/// Queue priority in 0..=100. An unknown tier counts 20 risk points.
pub fn priority_score(
    confidence: f64,
    risk: Option<RiskTier>,
    failed_documents: usize,
    age_days: f64,
) -> f64 {
    let risk_component = risk.map_or(20.0, RiskTier::priority_component);
    let confidence_component = (1.0 - confidence) * 30.0;
    let failure_component = if failed_documents > 0 { 15.0 } else { 0.0 };
    let aging_component = (age_days.max(0.0) * 2.0).min(20.0);

    round2(
        (risk_component + confidence_component + failure_component + aging_component)
            .clamp(0.0, 100.0),
    )
}

/// Review deadline; an unknown tier gets the most relaxed SLA.
pub fn sla_due_at(now: DateTime<Utc>, risk: Option<RiskTier>) -> DateTime<Utc> {
    now + Duration::days(risk.map_or(21, RiskTier::sla_days))
}

/// What happens outside the rules: document outcomes, application age, the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionContext {
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub age_days: f64,
    pub now: DateTime<Utc>,
}

/// Aggregate outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Rounded to two decimals; tier and recommendation use the unrounded value.
    pub confidence: f64,
    pub risk_tier: RiskTier,
    pub recommendation: Recommendation,
    pub passed_rules: usize,
    pub total_rules: usize,
    pub priority_score: f64,
    pub sla_due_at: DateTime<Utc>,
}

impl Decision {
    pub fn from_rules(rules: &[RuleResult], context: &DecisionContext) -> Self {
        let confidence = confidence_score(rules);
        let risk_tier = RiskTier::from_confidence(confidence);

        Self {
            confidence: round2(confidence),
            risk_tier,
            recommendation: Recommendation::select(
                confidence,
                context.processed_documents,
                context.failed_documents,
            ),
            passed_rules: rules.iter().filter(|rule| rule.passed).count(),
            total_rules: rules.len(),
            priority_score: priority_score(
                confidence,
                Some(risk_tier),
                context.failed_documents,
                context.age_days,
            ),
            sla_due_at: sla_due_at(context.now, Some(risk_tier)),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}. Rules passed: {}/{}. Risk level: {}.",
            self.recommendation.message(),
            self.passed_rules,
            self.total_rules,
            self.risk_tier.as_str()
        )
    }
}
