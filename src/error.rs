use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    InvalidTransition,
    Validation,
    NotFound,
    Forbidden,
    Unauthenticated,
}

pub const INVALID_TRANSITION: i32 = 100;
pub const VALIDATION: i32 = 101;
pub const NOT_FOUND: i32 = 102;
pub const FORBIDDEN: i32 = 103;
pub const UNAUTHENTICATED: i32 = 104;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            INVALID_TRANSITION => ErrorKind::InvalidTransition,
            VALIDATION => ErrorKind::Validation,
            NOT_FOUND => ErrorKind::NotFound,
            FORBIDDEN => ErrorKind::Forbidden,
            UNAUTHENTICATED => ErrorKind::Unauthenticated,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_invalid_transition_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidTransition
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found_error(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_forbidden_error(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    /// Message safe to hand to callers; internal failures stay opaque.
    pub fn public_message(&self) -> &str {
        match self.kind() {
            ErrorKind::Internal => "Internal Server Error",
            _ => self.message.as_str(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidTransition => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        validation_error(err.to_string())
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        authorizor_error(err)
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        password_hash_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "code": self.code,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub fn invalid_transition_error() -> Error {
    Error {
        code: INVALID_TRANSITION,
        message: "invalid status transition".into(),
    }
}

pub fn validation_error(message: impl Into<String>) -> Error {
    Error {
        code: VALIDATION,
        message: message.into(),
    }
}

pub fn not_found_error(what: &str) -> Error {
    Error {
        code: NOT_FOUND,
        message: format!("{} not found", what),
    }
}

pub fn forbidden_error() -> Error {
    Error {
        code: FORBIDDEN,
        message: "forbidden".into(),
    }
}

pub fn unauthenticated_error() -> Error {
    Error {
        code: UNAUTHENTICATED,
        message: "missing or malformed principal".into(),
    }
}

pub fn env_var_error(err: env::VarError) -> Error {
    tracing::error!(?err, "environment variable error");

    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!(?err, "database error");

    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn config_error(message: impl Into<String>) -> Error {
    Error {
        code: 3,
        message: message.into(),
    }
}

pub fn authorizor_error<T: Debug>(err: T) -> Error {
    tracing::error!(?err, "authorizor error");

    Error {
        code: 4,
        message: "authorizor error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn password_hash_error<T: Debug>(err: T) -> Error {
    tracing::error!(?err, "password hash error");

    Error {
        code: 6,
        message: "password hash error".into(),
    }
}
