//! Handler-level failures and their HTTP rendering.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing prompt parameter")]
    MissingPrompt,

    #[error("prompt must be a string")]
    InvalidPrompt,

    #[error(transparent)]
    Body(#[from] BytesRejection),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingPrompt => StatusCode::BAD_REQUEST,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::InvalidPrompt | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
