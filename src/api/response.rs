//! API response helpers

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::error::FieldErrors;
use crate::storage;

/// Hold data for a successful API interaction
pub struct Success<V>
where
    V: Serialize,
{
    status_code: StatusCode,
    data: V,
}

impl<V> Success<V>
where
    V: Serialize,
{
    pub fn ok(data: V) -> Self {
        Self {
            status_code: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: V) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            data,
        }
    }
}

#[derive(Serialize)]
struct DataWrapper<D>
where
    D: Serialize,
{
    data: D,
}

impl<V> IntoResponse for Success<V>
where
    V: Serialize,
{
    fn into_response(self) -> Response {
        (self.status_code, Json(DataWrapper { data: self.data })).into_response()
    }
}

/// A plain message as response data
#[derive(Serialize)]
pub struct Message {
    message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Confirmation of a deletion
#[derive(Serialize)]
pub struct Deleted {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<u64>,
}

impl Deleted {
    pub fn one() -> Self {
        Self {
            ok: true,
            deleted: None,
        }
    }

    pub fn many(deleted: u64) -> Self {
        Self {
            ok: true,
            deleted: Some(deleted),
        }
    }
}

/// Hold data for a failed API interaction
#[derive(Debug)]
pub struct Error {
    status_code: StatusCode,
    message: String,
    description: Option<String>,
    errors: Option<FieldErrors>,
}

impl Error {
    fn new<M>(status_code: StatusCode, message: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code,
            message: message.to_string(),
            description: None,
            errors: None,
        }
    }

    pub fn bad_request<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn too_many_requests<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    /// Log the actual error, the client only gets a generic message
    pub fn internal_server_error<M>(message: M) -> Self
    where
        M: std::fmt::Display,
    {
        tracing::error!("Internal server error: {message}");

        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// Validation failure with a message per field
    pub fn validation(errors: FieldErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(StatusCode::BAD_REQUEST, "Validation error")
        }
    }

    pub fn with_description<M>(self, description: M) -> Self
    where
        M: ToString,
    {
        Self {
            description: Some(description.to_string()),
            ..self
        }
    }
}

impl From<crate::error::Error> for Error {
    fn from(err: crate::error::Error) -> Self {
        use crate::error::Error as E;

        match err {
            E::Validation(errors) => Self::validation(errors),
            E::BadRequest(message) => Self::bad_request(message),
            E::Unauthenticated(message) => Self::unauthorized(message),
            E::Forbidden(message) => Self::forbidden(message),
            E::NotFound(message) => Self::not_found(message),
            E::Conflict(message) => Self::conflict(message),
            E::Storage(err) => Self::from(err),
            E::Internal(message) => Self::internal_server_error(message),
        }
    }
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        match err {
            storage::Error::UniqueViolation("email") => {
                let mut errors = FieldErrors::new();
                errors.insert("email", "Email already in use".to_string());

                Self {
                    errors: Some(errors),
                    ..Self::conflict("Email already in use")
                }
            }
            err => Self::internal_server_error(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorWrapper {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status_code,
            Json(ErrorWrapper {
                error: self.message,
                description: self.description,
                errors: self.errors,
            }),
        )
            .into_response()
    }
}
