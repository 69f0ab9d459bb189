use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Backend error taxonomy
#[derive(Debug, Error)]
pub enum HoHatchError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    FileSystem(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{0}")]
    Texconv(String),

    #[error("{0}")]
    Download(String),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HoHatchError>;

/// Response envelope handed to the frontend.
///
/// `success` is always present. On success the payload fields are flattened
/// into the top-level object; on failure `error` carries the message and
/// `error_key` optionally names a translatable message.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_key: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_key: None,
        }
    }

    /// Failure that still carries a payload (e.g. zero counts).
    pub fn err_with(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message.into()),
            error_key: None,
        }
    }

    pub fn with_error_key(mut self, key: impl Into<String>) -> Self {
        self.error_key = Some(key.into());
        self
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl<T> From<Result<T>> for ApiResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => ApiResult::ok(data),
            Err(e) => {
                log::error!("{}", e);
                ApiResult::err(e.to_string())
            }
        }
    }
}

/// Plain acknowledgement payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Counts {
        dump_count: usize,
    }

    #[test]
    fn success_flattens_payload() {
        let value = serde_json::to_value(ApiResult::ok(Counts { dump_count: 3 })).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "dump_count": 3 }));
    }

    #[test]
    fn failure_carries_message_and_key() {
        let result: ApiResult<Counts> = ApiResult::err("boom").with_error_key("replace_conversion_failed");
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "success": false,
                "error": "boom",
                "error_key": "replace_conversion_failed"
            })
        );
    }

    #[test]
    fn converts_errors_from_results() {
        let result: ApiResult<Message> =
            Err(HoHatchError::NotFound(PathBuf::from("/tmp/missing.dds"))).into();
        assert!(!result.success);
        assert!(result.error_message().unwrap().contains("missing.dds"));
    }
}
