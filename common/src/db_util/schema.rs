//! Table creation and default data.

use super::*;
use diesel::connection::SimpleConnection;

const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS score_categories (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    role VARCHAR(16) NOT NULL CHECK (role IN ('judge', 'presenter', 'admin')),
    category_id INTEGER REFERENCES score_categories(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS score_questions (
    id SERIAL PRIMARY KEY,
    title VARCHAR(200) NOT NULL,
    description TEXT,
    category_id INTEGER REFERENCES score_categories(id) ON DELETE SET NULL,
    min_score NUMERIC(10,1) NOT NULL,
    max_score NUMERIC(10,1) NOT NULL,
    step NUMERIC(10,1) NOT NULL
);

CREATE TABLE IF NOT EXISTS score_periods (
    id SERIAL PRIMARY KEY,
    name VARCHAR(200) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'closed'))
);

CREATE TABLE IF NOT EXISTS scores (
    id SERIAL PRIMARY KEY,
    question_id INTEGER NOT NULL REFERENCES score_questions(id) ON DELETE CASCADE,
    judge_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    presenter_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    period_id INTEGER NOT NULL REFERENCES score_periods(id) ON DELETE CASCADE,
    value NUMERIC(10,1) NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (question_id, judge_id, presenter_id, period_id)
);

CREATE INDEX IF NOT EXISTS scores_period_idx ON scores (period_id);
";

/// Create every table if it does not exist yet. Safe to run repeatedly.
pub fn init_schema(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(CREATE_TABLES)
        .map_err(|e| anyhow!("Error creating tables: {e}"))?;
    log::info!("Database schema is ready");
    Ok(())
}

/// Insert a small working data set. Does nothing if any user exists.
/// Returns whether data was inserted.
pub fn seed_default_data(conn: &mut PgConnection) -> Result<bool> {
    if count_users(conn)? > 0 {
        log::info!("Users already exist, skipping default data");
        return Ok(false);
    }

    conn.transaction::<(), anyhow::Error, _>(|conn| {
        let seed_users = [
            ("Administrator", UserRole::Admin),
            ("Judge A", UserRole::Judge),
            ("Judge B", UserRole::Judge),
            ("Presenter A", UserRole::Presenter),
            ("Presenter B", UserRole::Presenter),
        ];
        for (user_name, user_role) in seed_users {
            insert_user(
                conn,
                NewUser {
                    name: user_name.to_string(),
                    role: user_role,
                    category_id: None,
                },
            )?;
        }

        for question_title in ["Content", "Delivery", "Answers to questions"] {
            insert_question(
                conn,
                NewQuestion {
                    title: question_title.to_string(),
                    description: None,
                    category_id: None,
                    min_score: crate::DEFAULT_QUESTION_MIN,
                    max_score: crate::DEFAULT_QUESTION_MAX,
                    step: crate::DEFAULT_QUESTION_STEP,
                },
            )?;
        }

        let (start, end) = NaiveDate::from_ymd_opt(2025, 1, 1)
            .zip(NaiveDate::from_ymd_opt(2025, 3, 31))
            .ok_or_else(|| anyhow!("Invalid default period dates"))?;
        insert_period(
            conn,
            NewPeriod {
                name: "2025 Q1".to_string(),
                start_date: start,
                end_date: end,
                status: PeriodStatus::Active,
            },
        )?;
        Ok(())
    })?;

    log::info!("Inserted default users, questions and period");
    Ok(true)
}
