//! Interfaces between the application code and database.

use crate::source::ScoringData;
use crate::validate::{self, ValidationError};
use crate::{
    CategoryPatch, CategoryRecord, NewCategory, NewPeriod, NewQuestion, NewUser, PeriodPatch,
    PeriodRecord, PeriodStatus, QuestionPatch, QuestionRecord, ScoreRecord, ScoreSubmission,
    UserPatch, UserRecord, UserRole,
};
use anyhow::{Context, Result, anyhow};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::table;
use std::env;

mod categories;
mod conversions;
mod periods;
mod questions;
mod schema;
mod scores;
mod users;

pub use categories::*;
pub use periods::*;
pub use questions::*;
pub use schema::*;
pub use scores::{get_scores_for_period, upsert_score};
pub use users::{
    count_users, delete_user, get_user_by_id, get_users, insert_user, update_user,
};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Maximum connections the API keeps open.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Read `DATABASE_URL`, loading a `.env` file first if there is one.
pub fn get_database_url() -> Result<String> {
    dotenvy::dotenv().ok();
    env::var("DATABASE_URL").context("DATABASE_URL must be set")
}

pub fn establish_connection(database_url: &str) -> Result<PgConnection> {
    PgConnection::establish(database_url)
        .map_err(|e| anyhow!("Error connecting to database: {e}"))
}

/// Open a single connection using `DATABASE_URL`.
pub fn get_database_connection() -> Result<PgConnection> {
    establish_connection(&get_database_url()?)
}

/// Build a connection pool. Fails if no connection can be opened.
pub fn get_database_pool(database_url: &str, max_size: u32) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .context("Error building database connection pool")
}

pub fn get_pooled_database_connection(pool: &PgPool) -> Result<PgPooledConnection> {
    pool.get()
        .context("Error getting a connection from the database pool")
}

fn not_found(entity: &'static str, id: u32) -> anyhow::Error {
    ValidationError::NotFound { entity, id }.into()
}

impl ScoringData for PgConnection {
    fn fetch_scores(&mut self, period_id: u32) -> Result<Vec<ScoreRecord>> {
        get_scores_for_period(self, period_id)
    }

    fn fetch_users_by_role(&mut self, role: UserRole) -> Result<Vec<UserRecord>> {
        get_users(self, Some(role), None)
    }

    fn fetch_questions(&mut self) -> Result<Vec<QuestionRecord>> {
        get_all_questions(self)
    }

    fn fetch_categories(&mut self) -> Result<Vec<CategoryRecord>> {
        get_all_categories(self)
    }
}
