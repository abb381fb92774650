//! Score submission, aggregated results and exports.

use crate::helpers::*;
use chrono::Utc;
use rocket::State;
use rocket::serde::json::{Json, Value, json};
use tally_common::db_util::{self, PgPool};
use tally_common::results::{calculate_results, results_for_presenter};
use tally_common::{ScoreRecord, ScoreResult, ScoreSubmission, UserRole, export};

#[get("/scores?<period_id>")]
pub fn list_scores(pool: &State<PgPool>, period_id: Option<u32>) -> ApiResult<Vec<ScoreRecord>> {
    let period_id = required(period_id, "period_id")?;
    let mut conn = connection(pool)?;
    db_util::get_scores_for_period(&mut conn, period_id)
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Insert or replace one judge's score. A value of 0 clears it.
#[post("/scores", data = "<body>")]
pub fn submit_score(pool: &State<PgPool>, body: Json<ScoreSubmission>) -> ApiResult<ScoreRecord> {
    let mut conn = connection(pool)?;
    let score = db_util::upsert_score(&mut conn, body.into_inner()).map_err(|e| error_response(&e))?;
    tracing::info!(
        judge_id = score.judge_id,
        presenter_id = score.presenter_id,
        question_id = score.question_id,
        period_id = score.period_id,
        value = score.value,
        "Score saved"
    );
    Ok(Json(score))
}

#[get("/results?<period_id>&<presenter_id>")]
pub fn get_results(
    pool: &State<PgPool>,
    period_id: Option<u32>,
    presenter_id: Option<u32>,
) -> ApiResult<Vec<ScoreResult>> {
    let period_id = required(period_id, "period_id")?;
    let mut conn = connection(pool)?;
    let results = calculate_results(&mut *conn, period_id).map_err(|e| error_response(&e))?;

    match presenter_id {
        None => Ok(Json(results)),
        Some(presenter_id) => results_for_presenter(results, presenter_id)
            .map(|result| Json(vec![result]))
            .ok_or_else(|| not_found_error(format!("presenter #{presenter_id} does not exist"))),
    }
}

#[get("/export?<period_id>&<judge_id>")]
pub fn export_scores(
    pool: &State<PgPool>,
    period_id: Option<u32>,
    judge_id: Option<u32>,
) -> Result<CsvDownload, ApiError> {
    let period_id = required(period_id, "period_id")?;
    let mut conn = connection(pool)?;

    let period = db_util::find_period(&mut conn, period_id)
        .map_err(|e| error_response(&e))?
        .ok_or_else(|| not_found_error(format!("period #{period_id} does not exist")))?;

    let mut judges = db_util::get_users(&mut conn, Some(UserRole::Judge), None)
        .map_err(|e| error_response(&e))?;
    if let Some(judge_id) = judge_id {
        judges.retain(|j| j.user_id == judge_id);
        if judges.is_empty() {
            return Err(not_found_error(format!("judge #{judge_id} does not exist")));
        }
    }

    let results = calculate_results(&mut *conn, period_id).map_err(|e| error_response(&e))?;
    let exported_at = Utc::now();
    let csv = export::render_csv(&period, &results, &judges, exported_at);
    let filename = export::export_filename(&period, exported_at);

    tracing::info!(
        period_id = period_id,
        judges = judges.len(),
        presenters = results.len(),
        filename = %filename,
        "Exported scores"
    );
    Ok(CsvDownload::new(csv, &filename))
}

/// Create the tables and insert default data on an empty database.
#[post("/init")]
pub fn init_database(pool: &State<PgPool>) -> ApiResult<Value> {
    let mut conn = connection(pool)?;
    db_util::init_schema(&mut conn).map_err(|e| error_response(&e))?;
    let seeded = db_util::seed_default_data(&mut conn).map_err(|e| error_response(&e))?;
    Ok(Json(json!({ "initialized": true, "seeded": seeded })))
}
