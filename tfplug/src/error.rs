//! Framework errors and their gRPC status mapping

#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("unknown {kind} type {name:?}")]
    UnknownType { kind: &'static str, name: String },

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("decoding failed: {0}")]
    Decoding(String),

    #[error("expected {expected} at {path}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },

    #[error("no value at {0}")]
    Path(String),

    #[error("state upgrade failed: {0}")]
    StateUpgrade(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<TfplugError> for tonic::Status {
    fn from(err: TfplugError) -> Self {
        match err {
            TfplugError::UnknownType { .. } => tonic::Status::not_found(err.to_string()),
            TfplugError::Decoding(_) | TfplugError::TypeMismatch { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_are_not_found() {
        let err = TfplugError::UnknownType {
            kind: "resource",
            name: "azurerm_x".to_string(),
        };
        assert_eq!(err.to_string(), r#"unknown resource type "azurerm_x""#);
        let status: tonic::Status = err.into();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[test]
    fn bad_payloads_are_invalid_arguments() {
        let status: tonic::Status = TfplugError::Decoding("truncated".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = TfplugError::Tls("no key".into()).into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
