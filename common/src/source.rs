//! The data-access interface the result aggregator reads from.

use crate::{CategoryRecord, QuestionRecord, ScoreRecord, UserRecord, UserRole};
use anyhow::Result;

/// Read access to everything `calculate_results` needs.
///
/// Implemented by `PgConnection` (behind the `database` feature) and by
/// [`crate::memory_store::MemoryStore`]. Methods take `&mut self` because a
/// database connection needs exclusive access while a query runs.
pub trait ScoringData {
    /// All scores recorded for a period. An unknown period yields no scores.
    fn fetch_scores(&mut self, period_id: u32) -> Result<Vec<ScoreRecord>>;

    /// All users with the given role, in a stable order.
    fn fetch_users_by_role(&mut self, role: UserRole) -> Result<Vec<UserRecord>>;

    /// All questions, in a stable order.
    fn fetch_questions(&mut self) -> Result<Vec<QuestionRecord>>;

    /// All categories, ordered by `sort_order`.
    fn fetch_categories(&mut self) -> Result<Vec<CategoryRecord>>;
}
