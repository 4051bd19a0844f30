use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur while ingesting,
/// storing and serving pNode data. It uses the `thiserror` crate for ergonomic
/// error handling and automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// Some errors automatically convert from their source types using `#[from]`:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// HTTP errors are classified by the clients into [`AppError::ClientError`],
/// [`AppError::NetworkError`], [`AppError::Timeout`] or
/// [`AppError::RateLimitExceeded`] so that retry and circuit-breaker decisions
/// can be made without looking at `reqwest` types.
///
/// # Examples
///
/// ```no_run
/// use podwatch_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::NodeNotFound("8dx2...".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx operations, including connection failures,
    /// query errors and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed with an unexpected status or body.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// A pRPC endpoint answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Node not found in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A configured pRPC source URL is malformed.
    #[error("Invalid pRPC source URL: {0}")]
    InvalidSourceUrl(String),

    /// Every configured pRPC source failed during an ingestion run.
    #[error("No pRPC source reachable: {0}")]
    SourcesUnavailable(String),

    /// API response contained no data.
    #[error("Empty response from API")]
    EmptyResponse,

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Configuration file or environment error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The endpoint may be slow or unreachable.".to_string()
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::RpcError { code, message } => {
                format!(
                    "pRPC call failed ({}): {}\n   Check that the seed runs a compatible pNode version.",
                    code, message
                )
            }
            AppError::SourcesUnavailable(detail) => {
                format!(
                    "None of the configured pRPC sources answered: {}\n   Check the [[sources]] entries in network.toml.",
                    detail
                )
            }
            AppError::InvalidSourceUrl(url) => {
                format!(
                    "Invalid pRPC source URL: {}\n   Example: http://127.0.0.1:6000/rpc",
                    url
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!("Request timed out after {} seconds.\n   Try again later.", secs)
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::EmptyResponse => {
                "The API returned no data. The service may be temporarily unavailable.".to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use podwatch_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::NodeNotFound("abc".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::ClientError(_)
        )
    }

    /// Returns true if this error should trip the circuit breaker.
    ///
    /// Transient errors (network issues, timeouts, rate limits) trip the
    /// circuit. Errors that indicate bad input or configuration do not.
    ///
    /// # Examples
    ///
    /// ```
    /// use podwatch_core::error::AppError;
    ///
    /// assert!(AppError::Timeout(3).should_trip_circuit());
    /// assert!(!AppError::ConfigError("bad".to_string()).should_trip_circuit());
    /// ```
    pub fn should_trip_circuit(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,

            AppError::ClientError(msg) => {
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connect")
                    || msg.contains("Server error")
            }

            AppError::DatabaseError(_)
            | AppError::RpcError { .. }
            | AppError::SerializationError(_)
            | AppError::InvalidUrl(_)
            | AppError::NodeNotFound(_)
            | AppError::InvalidSourceUrl(_)
            | AppError::SourcesUnavailable(_)
            | AppError::EmptyResponse
            | AppError::ConfigError(_)
            | AppError::Generic(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::NodeNotFound("pk-1".to_string());
        assert_eq!(err.to_string(), "Node not found: pk-1");
    }

    #[test]
    fn test_rpc_error_display() {
        let err = AppError::RpcError {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(err.to_string(), "RPC error -32601: Method not found");
    }

    #[test]
    fn test_error_from_serde() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let app_err: AppError = result.unwrap_err().into();
        assert!(matches!(app_err, AppError::SerializationError(_)));
    }

    #[test]
    fn test_user_message_sources_unavailable() {
        let err = AppError::SourcesUnavailable("2 sources failed".to_string());
        assert!(err.user_message().contains("network.toml"));
    }

    #[test]
    fn test_user_message_database_connection() {
        let err = AppError::DatabaseError(sqlx::Error::PoolTimedOut);
        let msg = err.user_message();
        assert!(msg.contains("Cannot connect to database") || msg.contains("Database error"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(AppError::NetworkError("reset".to_string()).is_retryable());
        assert!(AppError::Timeout(3).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
        assert!(!AppError::InvalidSourceUrl("bad".to_string()).is_retryable());
        assert!(
            !AppError::RpcError {
                code: -1,
                message: "x".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_should_trip_circuit() {
        assert!(AppError::NetworkError("connection reset".to_string()).should_trip_circuit());
        assert!(AppError::RateLimitExceeded.should_trip_circuit());
        assert!(AppError::ClientError("Server error: HTTP 502".to_string()).should_trip_circuit());
        assert!(!AppError::ClientError("HTTP 400 from x".to_string()).should_trip_circuit());
        assert!(!AppError::EmptyResponse.should_trip_circuit());
        assert!(!AppError::Generic("x".to_string()).should_trip_circuit());
    }
}
