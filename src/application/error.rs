use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::infra::{
    api::{Notice, RequestError, notices_for},
    error::InfraError,
};

/// Status of the whole-app "no data" view, shown when the bootstrap
/// aggregate cannot be loaded.
pub const NO_DATA_STATUS: u16 = 466;

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("site bootstrap data is unavailable: {0}")]
    NoData(RequestError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Body of every page-level error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub status_code: u16,
    pub description: String,
    pub notices: Vec<Notice>,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Upstream status, 408 when no response arrived, 466 for missing
    /// bootstrap data.
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            AppError::Request(err) => match err {
                RequestError::Timeout | RequestError::Transport(_) => 408,
                RequestError::Status { status, .. } => *status,
                RequestError::Decode(_) => 502,
                RequestError::Aborted(_) => 500,
            },
            AppError::NoData(_) => NO_DATA_STATUS,
            AppError::NotFound => 404,
            AppError::Validation(_) => 400,
            AppError::Infra(_) | AppError::Unexpected(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message-bundle key describing the failure.
    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::Request(err) if err.is_timeout() => "error.timeout",
            AppError::Request(err) if err.is_not_found() => "error.notFound",
            AppError::NotFound => "error.notFound",
            AppError::NoData(_) => "error.noData",
            _ => "error.unknown",
        }
    }

    pub fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Request(err) if err.is_timeout() => "Upstream request timed out",
            AppError::Request(err) if err.is_not_found() => "Resource not found",
            AppError::Request(_) => "Upstream request failed",
            AppError::NoData(_) => "Site data is unavailable",
            AppError::NotFound => "Resource not found",
            AppError::Validation(_) => "Request could not be processed",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self {
            AppError::Request(err) | AppError::NoData(err) => notices_for(err),
            _ => Vec::new(),
        }
    }

    /// Error view with `description` as the user-facing text.
    pub fn view(&self, description: impl Into<String>) -> ErrorView {
        ErrorView {
            status_code: self.status_code().as_u16(),
            description: description.into(),
            notices: self.notices(),
        }
    }

    /// Respond with `view`, attaching the diagnostic chain for logging.
    pub fn into_response_with(self, view: ErrorView) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(view)).into_response();
        report.attach(&mut response);
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let view = self.view(self.presentation_message());
        self.into_response_with(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_forwarded() {
        let err = AppError::from(RequestError::Status {
            status: 404,
            message: Some("文章不存在".into()),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let view = err.view("gone");
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].message, "文章不存在");
    }

    #[test]
    fn missing_response_maps_to_408() {
        let err = AppError::from(RequestError::Transport("connection refused".into()));
        assert_eq!(err.status_code().as_u16(), 408);
        assert_eq!(err.message_key(), "error.timeout");
    }

    #[test]
    fn bootstrap_failure_is_466() {
        let err = AppError::NoData(RequestError::Timeout);
        assert_eq!(err.status_code().as_u16(), NO_DATA_STATUS);
        assert_eq!(err.message_key(), "error.noData");
    }

    #[test]
    fn unauthorized_is_silent() {
        let err = AppError::from(RequestError::Status {
            status: 401,
            message: Some("unauthorized".into()),
        });
        assert!(err.notices().is_empty());
    }

    #[test]
    fn response_carries_report_and_json_view() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.messages, vec!["resource not found".to_string()]);
    }
}
