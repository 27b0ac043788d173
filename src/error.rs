//! Error types for the planning core

use thiserror::Error;

/// Failure raised by the duty scheduler and its input helpers.
///
/// Cycle exceedance is not represented here: it is reported through
/// `CycleSummary::cycle_exceeded` on an otherwise complete schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PlanError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PlanError::InvalidInput(message.into())
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
