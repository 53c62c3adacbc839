use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus};
use super::evaluation::RiskTier;
use super::repository::ApplicationRecord;
use super::round2;

/// Queued applications at or above this priority count as high priority.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 75.0;
/// Priority never drops below this when more information is requested.
pub const MORE_INFO_PRIORITY_FLOOR: f64 = 70.0;
pub const MORE_INFO_SLA_DAYS: i64 = 14;
pub const DEFAULT_DAILY_MANUAL_CAPACITY: u32 = 20;

/// What a caseworker decided after reviewing the automated recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecisionAction {
    Approve,
    Reject,
    RequestMoreInfo,
}

impl ReviewDecisionAction {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewDecisionAction::Approve => "approve",
            ReviewDecisionAction::Reject => "reject",
            ReviewDecisionAction::RequestMoreInfo => "request_more_info",
        }
    }

    pub const fn resulting_status(self) -> ApplicationStatus {
        match self {
            ReviewDecisionAction::Approve => ApplicationStatus::Approved,
            ReviewDecisionAction::Reject => ApplicationStatus::Rejected,
            ReviewDecisionAction::RequestMoreInfo => ApplicationStatus::MoreInfoRequired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecisionRequest {
    pub action: ReviewDecisionAction,
    pub reason: String,
}

/// Record a caseworker decision. Final decisions leave the queue with no priority or
/// deadline; a request for more information restarts a 14-day clock at priority 70 or more.
pub fn apply_review_decision(
    record: &mut ApplicationRecord,
    action: ReviewDecisionAction,
    reason: String,
    now: DateTime<Utc>,
) {
    record.status = action.resulting_status();
    match action {
        ReviewDecisionAction::Approve | ReviewDecisionAction::Reject => {
            record.priority_score = 0.0;
            record.sla_due_at = None;
        }
        ReviewDecisionAction::RequestMoreInfo => {
            record.priority_score = record.priority_score.max(MORE_INFO_PRIORITY_FLOOR);
            record.sla_due_at = Some(now + Duration::days(MORE_INFO_SLA_DAYS));
        }
    }
    record.final_decision_reason = Some(reason);
    record.final_decision_at = Some(now);
    record.updated_at = now;
}

pub fn is_overdue(record: &ApplicationRecord, now: DateTime<Utc>) -> bool {
    record.status.in_manual_queue() && record.sla_due_at.is_some_and(|due| due < now)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewQueueItem {
    pub application_id: ApplicationId,
    pub applicant_full_name: String,
    pub applicant_nationality: String,
    pub status: ApplicationStatus,
    pub recommendation_summary: Option<String>,
    pub confidence_score: Option<f64>,
    pub risk_level: RiskTier,
    pub priority_score: f64,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewQueueItem {
    fn from_record(record: ApplicationRecord, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: is_overdue(&record, now),
            risk_level: record.risk_tier(),
            application_id: record.id,
            applicant_full_name: record.applicant_full_name,
            applicant_nationality: record.applicant_nationality,
            status: record.status,
            recommendation_summary: record.recommendation_summary,
            confidence_score: record.confidence_score,
            priority_score: record.priority_score,
            sla_due_at: record.sla_due_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// One page of the caseworker queue plus the size of the whole queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewQueue {
    pub data: Vec<ReviewQueueItem>,
    pub count: usize,
}

/// Overdue first, then highest priority, earliest deadline, oldest application.
pub fn review_queue(
    records: Vec<ApplicationRecord>,
    skip: usize,
    limit: usize,
    now: DateTime<Utc>,
) -> ReviewQueue {
    let mut items: Vec<ReviewQueueItem> = records
        .into_iter()
        .filter(|record| record.status.in_manual_queue())
        .map(|record| ReviewQueueItem::from_record(record, now))
        .collect();
    items.sort_by(|a, b| queue_order(a, b, now));

    let count = items.len();
    let data = items.into_iter().skip(skip).take(limit).collect();
    ReviewQueue { data, count }
}

fn queue_order(a: &ReviewQueueItem, b: &ReviewQueueItem, now: DateTime<Utc>) -> Ordering {
    b.is_overdue
        .cmp(&a.is_overdue)
        .then_with(|| b.priority_score.total_cmp(&a.priority_score))
        .then_with(|| a.sla_due_at.unwrap_or(now).cmp(&b.sla_due_at.unwrap_or(now)))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.application_id.cmp(&b.application_id))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewQueueMetrics {
    pub pending_manual_count: usize,
    pub overdue_count: usize,
    pub high_priority_count: usize,
    pub avg_waiting_days: f64,
    pub daily_manual_capacity: u32,
    pub estimated_days_to_clear_backlog: f64,
}

/// Backlog figures for the manual queue. `daily_manual_capacity` must be positive.
pub fn queue_metrics(
    records: &[ApplicationRecord],
    daily_manual_capacity: u32,
    now: DateTime<Utc>,
) -> ReviewQueueMetrics {
    let queued: Vec<&ApplicationRecord> = records
        .iter()
        .filter(|record| record.status.in_manual_queue())
        .collect();

    let pending_manual_count = queued.len();
    let overdue_count = queued
        .iter()
        .filter(|record| is_overdue(record, now))
        .count();
    let high_priority_count = queued
        .iter()
        .filter(|record| record.priority_score >= HIGH_PRIORITY_THRESHOLD)
        .count();
    let avg_waiting_days = if queued.is_empty() {
        0.0
    } else {
        let total: f64 = queued.iter().map(|record| record.age_days(now)).sum();
        round2(total / pending_manual_count as f64)
    };

    ReviewQueueMetrics {
        pending_manual_count,
        overdue_count,
        high_priority_count,
        avg_waiting_days,
        daily_manual_capacity,
        estimated_days_to_clear_backlog: round2(
            pending_manual_count as f64 / f64::from(daily_manual_capacity.max(1)),
        ),
    }
}
