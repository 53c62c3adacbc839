//! Document pre-screening for citizenship and residence applications.
//!
//! Uploaded documents flow through text extraction, entity extraction and a weighted
//! eligibility rule engine that produces a confidence score, risk tier, recommendation
//! and review priority for human caseworkers.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
