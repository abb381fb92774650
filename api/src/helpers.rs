//! Responses, error mapping and fairings shared by the routes.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::response::Response;
use rocket::response::status as rocket_status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use std::time::Instant;
use tally_common::db_util::{PgPool, PgPooledConnection, get_pooled_database_connection};
use tally_common::validate::ValidationError;

#[derive(Clone, Copy)]
pub struct RequestTimingFairing;

#[rocket::async_trait]
impl Fairing for RequestTimingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request timing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut rocket::Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let started_at = request.local_cache(Instant::now);

        tracing::info!(
            method = %request.method(),
            path = %request.uri(),
            status = response.status().code,
            elapsed_ms = started_at.elapsed().as_millis(),
            "Request completed"
        );
    }
}

/// Lets the browser front end call the API from another origin.
#[derive(Clone, Copy)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
        response.set_header(Header::new(
            "Access-Control-Expose-Headers",
            "Content-Disposition",
        ));
        response.set_header(Header::new("Access-Control-Max-Age", "86400"));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    NotFound,
    BadRequest,
    UnprocessableEntity,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ApiErrorBody {
    error: ApiErrorKind,
    message: String,
}

impl ApiErrorBody {
    pub fn new(error: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

pub type ApiError = rocket_status::Custom<Json<ApiErrorBody>>;
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: Status, kind: ApiErrorKind, message: impl Into<String>) -> ApiError {
    rocket_status::Custom(status, Json(ApiErrorBody::new(kind, message)))
}

pub fn not_found_error(message: impl Into<String>) -> ApiError {
    api_error(Status::NotFound, ApiErrorKind::NotFound, message)
}

pub fn bad_request_error(message: impl Into<String>) -> ApiError {
    api_error(Status::BadRequest, ApiErrorKind::BadRequest, message)
}

pub fn unprocessable_entity_error(message: impl Into<String>) -> ApiError {
    api_error(
        Status::UnprocessableEntity,
        ApiErrorKind::UnprocessableEntity,
        message,
    )
}

pub fn internal_error(message: impl Into<String>) -> ApiError {
    api_error(Status::InternalServerError, ApiErrorKind::Internal, message)
}

/// Pick a status for an error coming out of the storage layer.
///
/// Missing records become 404, rejected input 422 and anything else 500.
pub fn error_response(err: &anyhow::Error) -> ApiError {
    match err.downcast_ref::<ValidationError>() {
        Some(invalid) if invalid.is_not_found() => not_found_error(invalid.to_string()),
        Some(invalid) => unprocessable_entity_error(invalid.to_string()),
        None => {
            tracing::error!(error = %err, "Database operation failed");
            internal_error("Database operation failed")
        }
    }
}

/// Unwrap a required query parameter or answer 400.
pub fn required<T>(param: Option<T>, name: &str) -> Result<T, ApiError> {
    param.ok_or_else(|| bad_request_error(format!("Missing or invalid query parameter: {name}")))
}

pub fn connection(pool: &PgPool) -> Result<PgPooledConnection, ApiError> {
    get_pooled_database_connection(pool).map_err(|e| {
        tracing::error!(error = %e, "Failed to get database connection from pool");
        internal_error("Database unavailable")
    })
}

/// A CSV attachment.
#[derive(Responder)]
#[response(status = 200, content_type = "text/csv")]
pub struct CsvDownload {
    body: String,
    disposition: Header<'static>,
}

impl CsvDownload {
    pub fn new(body: String, filename: &str) -> Self {
        Self {
            body,
            disposition: Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::validate::ValidationError;

    #[test_log::test]
    fn test_error_response_status() {
        let missing: anyhow::Error = ValidationError::NotFound {
            entity: "period",
            id: 4,
        }
        .into();
        assert_eq!(error_response(&missing).0, Status::NotFound);

        let closed: anyhow::Error = ValidationError::PeriodClosed(4).into();
        assert_eq!(error_response(&closed).0, Status::UnprocessableEntity);

        let other = anyhow::anyhow!("connection reset");
        assert_eq!(error_response(&other).0, Status::InternalServerError);

        assert_eq!(
            required::<u32>(None, "period_id").unwrap_err().0,
            Status::BadRequest
        );
    }
}
