use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Connection reset, refused, timed out or unresolvable host
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Backing store rejected the call because of load
    #[error("Throttled: {message}")]
    Throttled { message: String },

    /// Upstream answered with something that cannot be used
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Transport failures, throttling and HTTP 429/5xx are transient;
    /// everything else is treated as permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Throttled { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Quote 'AAPL' not found");
        assert_eq!(error.to_string(), "Not found: Quote 'AAPL' not found");
    }

    #[test]
    fn test_http_error_display() {
        let error = DomainError::http(503, "Service Unavailable");
        assert_eq!(error.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(DomainError::network("connection reset by peer").is_retryable());
        assert!(DomainError::throttled("ProvisionedThroughputExceeded").is_retryable());
        assert!(DomainError::http(500, "boom").is_retryable());
        assert!(DomainError::http(502, "bad gateway").is_retryable());
        assert!(DomainError::http(429, "slow down").is_retryable());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        assert!(!DomainError::http(404, "missing").is_retryable());
        assert!(!DomainError::http(400, "bad request").is_retryable());
        assert!(!DomainError::invalid_response("not json").is_retryable());
        assert!(!DomainError::cache("serialization failed").is_retryable());
        assert!(!DomainError::validation("empty symbol").is_retryable());
    }
}
