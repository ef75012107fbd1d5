use rocket::http::Status;
use thiserror::Error;

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("workspace slug missing from route")]
    MissingWorkspace,
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthorizationError {
    pub fn status(&self) -> Status {
        match self {
            AuthorizationError::Forbidden(_) => Status::Forbidden,
            AuthorizationError::MissingWorkspace => Status::BadRequest,
            AuthorizationError::Config(_) => Status::InternalServerError,
        }
    }
}
