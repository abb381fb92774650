//! Management routes for users, categories, questions and periods.

use crate::helpers::*;
use clap::ValueEnum;
use rocket::State;
use rocket::serde::json::{Json, Value, json};
use rocket::serde::Deserialize;
use tally_common::db_util::{self, PgPool};
use tally_common::{
    CategoryPatch, CategoryRecord, NewCategory, NewPeriod, NewQuestion, NewUser, PeriodPatch,
    PeriodRecord, QuestionPatch, QuestionRecord, UserPatch, UserRecord, UserRole,
};

/// A `PUT` body: the id of the record plus the fields to change.
#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct Update<P> {
    id: u32,
    #[serde(flatten)]
    patch: P,
}

fn deleted(id: u32) -> Json<Value> {
    Json(json!({ "deleted": id }))
}

#[get("/users?<role>&<category_id>")]
pub fn list_users(
    pool: &State<PgPool>,
    role: Option<&str>,
    category_id: Option<u32>,
) -> ApiResult<Vec<UserRecord>> {
    let role = role
        .map(|r| {
            UserRole::from_str(r, true)
                .map_err(|_| bad_request_error(format!("Unknown role: {r}")))
        })
        .transpose()?;

    let mut conn = connection(pool)?;
    db_util::get_users(&mut conn, role, category_id)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[post("/users", data = "<body>")]
pub fn create_user(pool: &State<PgPool>, body: Json<NewUser>) -> ApiResult<UserRecord> {
    let mut conn = connection(pool)?;
    let user = db_util::insert_user(&mut conn, body.into_inner()).map_err(|e| error_response(&e))?;
    tracing::info!(user_id = user.user_id, role = %user.role, "Created user");
    Ok(Json(user))
}

#[put("/users", data = "<body>")]
pub fn update_user(pool: &State<PgPool>, body: Json<Update<UserPatch>>) -> ApiResult<UserRecord> {
    let Update { id, patch } = body.into_inner();
    let mut conn = connection(pool)?;
    db_util::update_user(&mut conn, id, patch)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[delete("/users?<id>")]
pub fn delete_user(pool: &State<PgPool>, id: Option<u32>) -> ApiResult<Value> {
    let id = required(id, "id")?;
    let mut conn = connection(pool)?;
    db_util::delete_user(&mut conn, id).map_err(|e| error_response(&e))?;
    tracing::info!(user_id = id, "Deleted user and their scores");
    Ok(deleted(id))
}

#[get("/categories")]
pub fn list_categories(pool: &State<PgPool>) -> ApiResult<Vec<CategoryRecord>> {
    let mut conn = connection(pool)?;
    db_util::get_all_categories(&mut conn)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[post("/categories", data = "<body>")]
pub fn create_category(
    pool: &State<PgPool>,
    body: Json<NewCategory>,
) -> ApiResult<CategoryRecord> {
    let mut conn = connection(pool)?;
    db_util::insert_category(&mut conn, body.into_inner())
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[put("/categories", data = "<body>")]
pub fn update_category(
    pool: &State<PgPool>,
    body: Json<Update<CategoryPatch>>,
) -> ApiResult<CategoryRecord> {
    let Update { id, patch } = body.into_inner();
    let mut conn = connection(pool)?;
    db_util::update_category(&mut conn, id, patch)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[delete("/categories?<id>")]
pub fn delete_category(pool: &State<PgPool>, id: Option<u32>) -> ApiResult<Value> {
    let id = required(id, "id")?;
    let mut conn = connection(pool)?;
    db_util::delete_category(&mut conn, id).map_err(|e| error_response(&e))?;
    Ok(deleted(id))
}

#[get("/questions")]
pub fn list_questions(pool: &State<PgPool>) -> ApiResult<Vec<QuestionRecord>> {
    let mut conn = connection(pool)?;
    db_util::get_all_questions(&mut conn)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[post("/questions", data = "<body>")]
pub fn create_question(
    pool: &State<PgPool>,
    body: Json<NewQuestion>,
) -> ApiResult<QuestionRecord> {
    let mut conn = connection(pool)?;
    db_util::insert_question(&mut conn, body.into_inner())
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[put("/questions", data = "<body>")]
pub fn update_question(
    pool: &State<PgPool>,
    body: Json<Update<QuestionPatch>>,
) -> ApiResult<QuestionRecord> {
    let Update { id, patch } = body.into_inner();
    let mut conn = connection(pool)?;
    db_util::update_question(&mut conn, id, patch)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[delete("/questions?<id>")]
pub fn delete_question(pool: &State<PgPool>, id: Option<u32>) -> ApiResult<Value> {
    let id = required(id, "id")?;
    let mut conn = connection(pool)?;
    db_util::delete_question(&mut conn, id).map_err(|e| error_response(&e))?;
    Ok(deleted(id))
}

#[get("/periods")]
pub fn list_periods(pool: &State<PgPool>) -> ApiResult<Vec<PeriodRecord>> {
    let mut conn = connection(pool)?;
    db_util::get_all_periods(&mut conn)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[post("/periods", data = "<body>")]
pub fn create_period(pool: &State<PgPool>, body: Json<NewPeriod>) -> ApiResult<PeriodRecord> {
    let mut conn = connection(pool)?;
    db_util::insert_period(&mut conn, body.into_inner())
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[put("/periods", data = "<body>")]
pub fn update_period(
    pool: &State<PgPool>,
    body: Json<Update<PeriodPatch>>,
) -> ApiResult<PeriodRecord> {
    let Update { id, patch } = body.into_inner();
    let mut conn = connection(pool)?;
    db_util::update_period(&mut conn, id, patch)
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[delete("/periods?<id>")]
pub fn delete_period(pool: &State<PgPool>, id: Option<u32>) -> ApiResult<Value> {
    let id = required(id, "id")?;
    let mut conn = connection(pool)?;
    db_util::delete_period(&mut conn, id).map_err(|e| error_response(&e))?;
    tracing::info!(period_id = id, "Deleted period and its scores");
    Ok(deleted(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::serde::json::from_str;

    #[test_log::test]
    fn test_update_body_keeps_null_apart_from_missing() {
        let body: Update<QuestionPatch> =
            from_str(r#"{"id":3,"category_id":null,"max_score":5}"#).unwrap();
        assert_eq!(body.id, 3);
        assert_eq!(body.patch.category_id, Some(None));
        assert_eq!(body.patch.max_score, Some(5.0));
        assert_eq!(body.patch.title, None);

        let body: Update<UserPatch> = from_str(r#"{"id":8,"name":"Kim"}"#).unwrap();
        assert_eq!(body.patch.name.as_deref(), Some("Kim"));
        assert_eq!(body.patch.category_id, None);
    }
}
