//! A library with common utilities for judged scoring: records, result aggregation,
//! validation, CSV export and storage.

pub mod export;
pub mod memory_store;
pub mod results;
pub mod source;
pub mod validate;

#[cfg(feature = "database")]
pub mod db_util;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name of the implicit group holding questions without a category.
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";
/// Default lower bound for a new question.
pub const DEFAULT_QUESTION_MIN: f64 = 0.0;
/// Default upper bound for a new question.
pub const DEFAULT_QUESTION_MAX: f64 = 10.0;
/// Default input granularity for a new question.
pub const DEFAULT_QUESTION_STEP: f64 = 0.1;

/// The role a user plays. Only judges and presenters take part in aggregation.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Judge,
    Presenter,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            UserRole::Judge => "judge",
            UserRole::Presenter => "presenter",
            UserRole::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// Whether a period still accepts score submissions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Active,
    Closed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PeriodStatus::Active => "active",
            PeriodStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// A user as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u32,
    pub name: String,
    pub role: UserRole,
    /// The category a presenter reports under. Informational only.
    pub category_id: Option<u32>,
}

/// A named grouping of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category_id: u32,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
}

/// A question judges answer with a number in `[min_score, max_score]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: u32,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<u32>,
    pub min_score: f64,
    pub max_score: f64,
    pub step: f64,
}

/// A time window that scopes which scores are aggregated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub period_id: u32,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
}

/// One judge's score for one question about one presenter in one period.
/// A value of exactly 0 means the judge has not scored it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score_id: u32,
    pub question_id: u32,
    pub judge_id: u32,
    pub presenter_id: u32,
    pub period_id: u32,
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub category_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<u32>,
    #[serde(default = "default_min")]
    pub min_score: f64,
    #[serde(default = "default_max")]
    pub max_score: f64,
    #[serde(default = "default_step")]
    pub step: f64,
}

fn default_min() -> f64 {
    DEFAULT_QUESTION_MIN
}
fn default_max() -> f64 {
    DEFAULT_QUESTION_MAX
}
fn default_step() -> f64 {
    DEFAULT_QUESTION_STEP
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPeriod {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_status")]
    pub status: PeriodStatus,
}

fn default_status() -> PeriodStatus {
    PeriodStatus::Active
}

/// Data sent by a judge. Submitting the same tuple again replaces the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub question_id: u32,
    pub judge_id: u32,
    pub presenter_id: u32,
    pub period_id: u32,
    pub value: f64,
}

/// Partial update of a user. `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<u32>>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<PeriodStatus>,
}

/// Distinguish a field set to `null` from a field that was left out.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl UserPatch {
    pub fn apply(self, user: &mut UserRecord) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(category_id) = self.category_id {
            user.category_id = category_id;
        }
    }
}

impl CategoryPatch {
    pub fn apply(self, category: &mut CategoryRecord) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(sort_order) = self.sort_order {
            category.sort_order = sort_order;
        }
    }
}

impl QuestionPatch {
    pub fn apply(self, question: &mut QuestionRecord) {
        if let Some(title) = self.title {
            question.title = title;
        }
        if let Some(description) = self.description {
            question.description = description;
        }
        if let Some(category_id) = self.category_id {
            question.category_id = category_id;
        }
        if let Some(min_score) = self.min_score {
            question.min_score = min_score;
        }
        if let Some(max_score) = self.max_score {
            question.max_score = max_score;
        }
        if let Some(step) = self.step {
            question.step = step;
        }
    }
}

impl PeriodPatch {
    pub fn apply(self, period: &mut PeriodRecord) {
        if let Some(name) = self.name {
            period.name = name;
        }
        if let Some(start_date) = self.start_date {
            period.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            period.end_date = end_date;
        }
        if let Some(status) = self.status {
            period.status = status;
        }
    }
}

/// A single judge's raw score inside a question breakdown. 0 means unscored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub judge_id: u32,
    pub judge_name: String,
    pub score: f64,
}

/// Per-question average across judges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: u32,
    pub question_title: String,
    pub average_score: f64,
    pub judge_scores: Vec<JudgeScore>,
}

/// One category group in a presenter's breakdown.
/// `category_id` is `None` for the uncategorized group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category_id: Option<u32>,
    pub category_name: String,
    pub scores: Vec<QuestionResult>,
    pub category_total: f64,
}

/// The aggregated breakdown for one presenter in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub presenter_id: u32,
    pub presenter_name: String,
    pub categories: Vec<CategoryResult>,
    pub total_average: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_defaults() {
        let q: NewQuestion = serde_json::from_str(r#"{"title":"Teamwork"}"#).unwrap();
        assert_eq!(q.min_score, 0.0);
        assert_eq!(q.max_score, 10.0);
        assert_eq!(q.step, 0.1);
        assert_eq!(q.category_id, None);
    }

    #[test]
    fn test_patch_null_clears_category() {
        let patch: QuestionPatch = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        assert_eq!(patch.category_id, Some(None));

        let patch: QuestionPatch = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        assert_eq!(patch.category_id, None);

        let mut question = QuestionRecord {
            question_id: 1,
            title: "Old".to_string(),
            description: None,
            category_id: Some(4),
            min_score: 0.0,
            max_score: 10.0,
            step: 0.5,
        };
        patch.apply(&mut question);
        assert_eq!(question.title, "New");
        assert_eq!(question.category_id, Some(4));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::Presenter).unwrap(), "\"presenter\"");
        let role: UserRole = serde_json::from_str("\"judge\"").unwrap();
        assert_eq!(role, UserRole::Judge);
        assert_eq!(PeriodStatus::Closed.to_string(), "closed");
    }
}
