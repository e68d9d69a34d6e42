//! services/api/src/web/response.rs
//!
//! The uniform `{message, error, data}` envelope and the mapping from failures to
//! HTTP status codes.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conversa_core::ports::PortError;
use serde::Serialize;
use tracing::error;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

//=========================================================================================
// Envelope
//=========================================================================================

/// Every response body, successful or not, has this shape.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            error: None,
            data: Some(data),
        }
    }
}

/// A successful response: status plus enveloped payload.
pub struct ApiResponse<T> {
    status: StatusCode,
    body: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            body: Envelope::success(message, data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: Envelope::success(message, data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

//=========================================================================================
// HttpError
//=========================================================================================

/// Request-level failure. Internal details are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PortError> for HttpError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => HttpError::NotFound(what),
            PortError::Validation(why) => HttpError::BadRequest(why),
            PortError::Unauthorized => HttpError::Unauthorized,
            PortError::Unexpected(detail) => HttpError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        HttpError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, detail) = match self {
            HttpError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (INTERNAL_MESSAGE.to_string(), INTERNAL_MESSAGE.to_string())
            }
            other => {
                let text = other.to_string();
                ("Request failed".to_string(), text)
            }
        };
        let body: Envelope<()> = Envelope {
            message,
            error: Some(detail),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type HttpResult<T> = Result<ApiResponse<T>, HttpError>;

//=========================================================================================
// Extractors
//=========================================================================================

/// `Json` whose rejections come back as 400 envelopes.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(HttpError))]
pub struct AppJson<T>(pub T);

/// `Path` whose rejections (a malformed id, say) come back as 400 envelopes.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(HttpError))]
pub struct AppPath<T>(pub T);

/// `Query` whose rejections come back as 400 envelopes.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(HttpError))]
pub struct AppQuery<T>(pub T);
