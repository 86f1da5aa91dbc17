use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Azure returned HTTP {status} ({code}): {message}")]
    Arm {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Long-running operation ended with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// True for the 403 ARM returns when the caller cannot see a resource
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Arm { status: 403, .. })
    }
}

/// ARM error envelope: `{"error":{"code":"...","message":"..."}}`
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ArmErrorResponse {
    pub error: ArmErrorBody,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ArmErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_error_formats_code_and_message() {
        let error = ApiError::Arm {
            status: 400,
            code: "InvalidParameter".to_string(),
            message: "The value of sku is invalid".to_string(),
        };

        let text = error.to_string();
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("InvalidParameter"));
        assert!(text.contains("sku is invalid"));
    }

    #[test]
    fn not_found_is_detected() {
        assert!(ApiError::NotFound("/x".into()).is_not_found());
        assert!(!ApiError::RateLimited.is_not_found());
    }

    #[test]
    fn arm_error_body_parses() {
        let body = r#"{"error":{"code":"Conflict","message":"busy"}}"#;
        let parsed: ArmErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.code, "Conflict");
        assert_eq!(parsed.error.message, "busy");
    }
}
