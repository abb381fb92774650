//! Checks applied before anything is written.

use crate::{PeriodRecord, PeriodStatus, QuestionRecord, UserRecord, UserRole};
use chrono::NaiveDate;
use thiserror::Error;

/// Why a write was refused.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{entity} #{id} does not exist")]
    NotFound { entity: &'static str, id: u32 },

    #[error("user #{user_id} has role {actual}, expected {expected}")]
    WrongRole {
        user_id: u32,
        expected: UserRole,
        actual: UserRole,
    },

    #[error("period #{0} is closed and no longer accepts scores")]
    PeriodClosed(u32),

    #[error("score {value} is outside the range {min}..={max}")]
    ScoreOutOfRange { value: f64, min: f64, max: f64 },

    #[error("{field} {value} has more than one decimal place")]
    TooPrecise { field: &'static str, value: f64 },

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

impl ValidationError {
    /// True when the error names a record that is missing rather than bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ValidationError::NotFound { .. })
    }
}

pub fn validate_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName(field));
    }
    Ok(())
}

/// Stored numbers keep one decimal place, so anything finer would be rounded away.
fn expect_one_decimal(field: &'static str, value: f64) -> Result<(), ValidationError> {
    let scaled = value * 10.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        return Err(ValidationError::TooPrecise { field, value });
    }
    Ok(())
}

/// A question needs finite bounds with `0 <= min < max` and a positive step,
/// each with at most one decimal place.
pub fn validate_question_range(min: f64, max: f64, step: f64) -> Result<(), ValidationError> {
    if !(min.is_finite() && max.is_finite() && step.is_finite()) {
        return Err(ValidationError::InvalidQuestion(
            "score bounds and step must be finite numbers".to_string(),
        ));
    }
    expect_one_decimal("min_score", min)?;
    expect_one_decimal("max_score", max)?;
    expect_one_decimal("step", step)?;
    // 0 marks an unscored question, so scores below it could never count
    if min < 0.0 {
        return Err(ValidationError::InvalidQuestion(format!(
            "min_score {min} must not be negative"
        )));
    }
    if min >= max {
        return Err(ValidationError::InvalidQuestion(format!(
            "min_score {min} must be below max_score {max}"
        )));
    }
    if step <= 0.0 {
        return Err(ValidationError::InvalidQuestion(format!(
            "step {step} must be positive"
        )));
    }
    Ok(())
}

pub fn validate_period_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::InvalidPeriod(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok(())
}

fn expect_role(user: &UserRecord, expected: UserRole) -> Result<(), ValidationError> {
    if user.role != expected {
        return Err(ValidationError::WrongRole {
            user_id: user.user_id,
            expected,
            actual: user.role,
        });
    }
    Ok(())
}

/// Check a score submission against the records it refers to.
///
/// A value of exactly 0 is always accepted: it marks the question as unscored again.
pub fn validate_score(
    question: &QuestionRecord,
    judge: &UserRecord,
    presenter: &UserRecord,
    period: &PeriodRecord,
    value: f64,
) -> Result<(), ValidationError> {
    expect_role(judge, UserRole::Judge)?;
    expect_role(presenter, UserRole::Presenter)?;

    if period.status == PeriodStatus::Closed {
        return Err(ValidationError::PeriodClosed(period.period_id));
    }

    if value.is_finite() {
        expect_one_decimal("score", value)?;
    }
    let in_range = value.is_finite() && value >= question.min_score && value <= question.max_score;
    if value != 0.0 && !in_range {
        return Err(ValidationError::ScoreOutOfRange {
            value,
            min: question.min_score,
            max: question.max_score,
        });
    }
    Ok(())
}
