//! A json api for judges to submit scores and for organizers to read the results.

#[macro_use]
extern crate rocket;

mod helpers;
mod records;
mod scoring;

use anyhow::{Result, anyhow};
use helpers::{ApiErrorBody, ApiErrorKind, CorsFairing, RequestTimingFairing};
use rocket::Request;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket_prometheus::PrometheusMetrics;
use tally_common::db_util::{
    DEFAULT_POOL_SIZE, get_database_pool, get_database_url, get_pooled_database_connection,
    init_schema,
};
use tracing_subscriber::EnvFilter;

#[catch(404)]
fn not_found(request: &Request) -> Json<ApiErrorBody> {
    Json(ApiErrorBody::new(
        ApiErrorKind::NotFound,
        format!("No route for {} {}", request.method(), request.uri()),
    ))
}

/// Malformed bodies and anything else Rocket rejects before a route runs.
#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> Json<ApiErrorBody> {
    let kind = match status.code {
        400 => ApiErrorKind::BadRequest,
        422 => ApiErrorKind::UnprocessableEntity,
        404 => ApiErrorKind::NotFound,
        _ => ApiErrorKind::Internal,
    };
    Json(ApiErrorBody::new(kind, status.reason_lossy()))
}

fn mount_routes(rocket: rocket::Rocket<rocket::Build>) -> rocket::Rocket<rocket::Build> {
    let prometheus = PrometheusMetrics::new();
    rocket
        .attach(prometheus.clone())
        .mount("/metrics", prometheus)
        .mount(
            "/",
            routes![
                records::list_users,
                records::create_user,
                records::update_user,
                records::delete_user,
                records::list_categories,
                records::create_category,
                records::update_category,
                records::delete_category,
                records::list_questions,
                records::create_question,
                records::update_question,
                records::delete_question,
                records::list_periods,
                records::create_period,
                records::update_period,
                records::delete_period,
                scoring::list_scores,
                scoring::submit_score,
                scoring::get_results,
                scoring::export_scores,
                scoring::init_database,
            ],
        )
        .register("/", catchers![not_found, default_catcher])
        .attach(RequestTimingFairing)
        .attach(CorsFairing)
}

#[rocket::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = get_database_url()?;
    let pool = get_database_pool(&database_url, DEFAULT_POOL_SIZE)?;
    {
        let mut conn = get_pooled_database_connection(&pool)?;
        init_schema(&mut conn)?;
    }
    tracing::info!(pool_size = DEFAULT_POOL_SIZE, "Connected to database");

    mount_routes(rocket::build().manage(pool))
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {e}"))?;
    Ok(())
}
