use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot reach backend at {url}: {message}")]
    Connectivity { url: String, message: String },

    #[error("Request to {url} timed out after {}s, the backend may be cold-starting, please retry", .after_ms / 1000)]
    Timeout { url: String, after_ms: u64 },

    #[error("API {status} at {url}: {body}")]
    HttpStatus { url: String, status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Item {id} is already {status}")]
    ResolutionConflict { id: String, status: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// The backend URL the failing call was aimed at, when there was one.
    pub fn url(&self) -> Option<&str> {
        match self {
            ConsoleError::Connectivity { url, .. }
            | ConsoleError::Timeout { url, .. }
            | ConsoleError::HttpStatus { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ConsoleError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_contains_status_and_url() {
        let err = ConsoleError::HttpStatus {
            url: "https://ops.example.com/pipeline/run".into(),
            status: 500,
            body: "boom".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("https://ops.example.com/pipeline/run"));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_timeout_message_in_seconds() {
        let err = ConsoleError::Timeout { url: "http://x/health".into(), after_ms: 10_000 };
        assert!(err.to_string().contains("10s"));
        assert_eq!(err.url(), Some("http://x/health"));
    }

    #[test]
    fn test_internal_has_no_url() {
        assert!(ConsoleError::Internal("x".into()).url().is_none());
    }
}
