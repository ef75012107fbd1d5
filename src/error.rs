use okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

use crate::auth::AuthorizationError;
use crate::cycles::CycleStatsError;

#[derive(Debug)]
pub enum ApiError {
    DatabaseError(sqlx::Error),
    BadRequest(String),
    Forbidden(String),
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => Status::InternalServerError,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Forbidden(_) => Status::Forbidden,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let (error_type, message) = match self {
            ApiError::DatabaseError(e) => {
                log::error!("database error: {}", e);
                ("DatabaseError", e.to_string())
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                ("BadRequest", msg)
            }
            ApiError::Forbidden(msg) => {
                log::debug!("forbidden: {}", msg);
                ("Forbidden", msg)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                ("InternalError", msg)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response)
            .unwrap_or_else(|_| r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Malformed request, such as an unknown `order_by` field."),
            ("403", "Caller may not view the workspace."),
            ("500", "Data store or server failure."),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<CycleStatsError> for ApiError {
    fn from(err: CycleStatsError) -> Self {
        match err {
            CycleStatsError::InvalidOrdering(_) => ApiError::BadRequest(err.to_string()),
            CycleStatsError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            AuthorizationError::MissingWorkspace => ApiError::BadRequest(err.to_string()),
            AuthorizationError::Config(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ordering_is_a_client_error() {
        let err = ApiError::from(CycleStatsError::InvalidOrdering("owner".into()));
        assert_eq!(err.status(), Status::BadRequest);
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg.contains("owner")));
    }

    #[test]
    fn authorizer_denial_keeps_its_reason() {
        let err = ApiError::from(AuthorizationError::Forbidden("not a member".into()));
        assert_eq!(err.status(), Status::Forbidden);
        assert!(matches!(err, ApiError::Forbidden(ref msg) if msg == "forbidden: not a member"));
    }

    #[test]
    fn missing_authorizer_is_a_server_error() {
        let err = ApiError::from(AuthorizationError::Config("authorizer missing".into()));
        assert_eq!(err.status(), Status::InternalServerError);
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = ApiError::from(CycleStatsError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status(), Status::InternalServerError);
    }
}
