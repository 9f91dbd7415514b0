use thiserror::Error;

/// Errors raised by configuration loading and the outbound provider clients
#[derive(Error, Debug)]
pub enum ConsultError {
    #[error("API Error: {0}")]
    ApiError(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Response Error: {0}")]
    ResponseError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl ConsultError {
    /// True for failures of the transport or the remote service, as opposed to local setup
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ConsultError::RequestError(_)
                | ConsultError::HttpError { .. }
                | ConsultError::ReqwestError(_)
                | ConsultError::ApiError(_)
        )
    }
}

/// Result type for provider and configuration operations
pub type ConsultResult<T> = Result<T, ConsultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = ConsultError::HttpError {
            status_code: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP Error: 429 - quota exceeded");
        assert!(err.is_transport());
    }

    #[test]
    fn test_config_error_is_not_transport() {
        let err = ConsultError::ConfigError("missing key".to_string());
        assert!(!err.is_transport());
    }
}
