use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single content API request.
///
/// `Clone` so one failed fetch can be handed to every waiter sharing it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("content api responded with status {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("failed to decode response body: {0}")]
    Decode(String),
    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

impl RequestError {
    /// Build a status error from the raw response body.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .as_ref()
            .and_then(api_message);
        if status == 408 {
            return Self::Timeout;
        }
        Self::Status { status, message }
    }

    /// The upstream status, when a response was received at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// No usable response: timed out or never connected.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Notes answer 403 when they are protected by a password.
    pub fn is_password_required(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn api_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub const GENERIC_REQUEST_MESSAGE: &str = "Request failed";

/// `message` from an API error body; arrays surface their first entry.
fn api_message(body: &Value) -> Option<String> {
    let message = match body.get("message")? {
        Value::Null => return None,
        Value::String(message) => Some(message.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    Some(message.unwrap_or_else(|| GENERIC_REQUEST_MESSAGE.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// User-facing message derived from a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub const TIMEOUT_NOTICE: &str = "Request timed out, please check your network connection";

/// Notices to show for `err`. Unauthorized responses stay silent.
pub fn notices_for(err: &RequestError) -> Vec<Notice> {
    if err.is_timeout() {
        return vec![Notice {
            level: NoticeLevel::Warning,
            message: TIMEOUT_NOTICE.to_string(),
        }];
    }
    if err.is_unauthorized() {
        return Vec::new();
    }
    match err.api_message() {
        Some(message) => vec![Notice {
            level: NoticeLevel::Error,
            message: message.to_string(),
        }],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_read_from_string_or_array() {
        let err = RequestError::from_status(400, br#"{"message":"slug taken"}"#);
        assert_eq!(err.api_message(), Some("slug taken"));

        let err = RequestError::from_status(422, br#"{"message":["title is empty","x"]}"#);
        assert_eq!(err.api_message(), Some("title is empty"));

        let err = RequestError::from_status(400, br#"{"message":{"code":1}}"#);
        assert_eq!(err.api_message(), Some(GENERIC_REQUEST_MESSAGE));

        let err = RequestError::from_status(500, b"<html>oops</html>");
        assert_eq!(err.api_message(), None);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn status_408_is_a_timeout() {
        assert_eq!(RequestError::from_status(408, b""), RequestError::Timeout);
        assert!(RequestError::Timeout.is_timeout());
        assert!(RequestError::Transport("refused".into()).is_timeout());
    }

    #[test]
    fn notices_follow_error_taxonomy() {
        let timeout = notices_for(&RequestError::Timeout);
        assert_eq!(timeout.len(), 1);
        assert_eq!(timeout[0].message, TIMEOUT_NOTICE);

        let unauthorized = RequestError::from_status(401, br#"{"message":"login"}"#);
        assert!(notices_for(&unauthorized).is_empty());

        let verbatim = RequestError::from_status(404, "{\"message\":\"文章不存在\"}".as_bytes());
        assert_eq!(notices_for(&verbatim)[0].message, "文章不存在");
        assert_eq!(notices_for(&verbatim)[0].level, NoticeLevel::Error);
    }

    #[test]
    fn forbidden_means_password_required() {
        let err = RequestError::from_status(403, b"{}");
        assert!(err.is_password_required());
        assert!(!err.is_unauthorized());
    }
}
