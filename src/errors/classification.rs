use super::types::ConsoleError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
    /// Whether the local fallback producer may stand in for the failed call.
    pub fallback_eligible: bool,
}

impl ConsoleError {
    /// Classify this error to determine its type, whether it can be retried,
    /// and whether the fallback producer may take over.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            ConsoleError::Connectivity { .. } => ErrorClassification {
                error_type: "ConnectivityError",
                retryable: true,
                fallback_eligible: true,
            },
            ConsoleError::Timeout { .. } => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
                fallback_eligible: true,
            },
            ConsoleError::HttpStatus { status, .. } => ErrorClassification {
                error_type: "HttpStatusError",
                retryable: *status >= 500 || *status == 429,
                fallback_eligible: true,
            },
            ConsoleError::Configuration(_) => ErrorClassification {
                error_type: "ConfigurationError",
                retryable: false,
                fallback_eligible: true,
            },

            ConsoleError::Protocol(_) => ErrorClassification {
                error_type: "ProtocolError",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::ResolutionConflict { .. } => ErrorClassification {
                error_type: "ResolutionConflict",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::NotFound(_) => ErrorClassification {
                error_type: "NotFoundError",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::InvalidArgument(_) => ErrorClassification {
                error_type: "InvalidArgumentError",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
                fallback_eligible: false,
            },
            ConsoleError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
                fallback_eligible: false,
            },
            ConsoleError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
                fallback_eligible: false,
            },
        }
    }
}
