use thiserror::Error;

/// Boxed error type surfaced by caller-supplied backend closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Final error taxonomy for guarded backend calls.
///
/// Low-level failures are reclassified into these variants so calling code
/// only branches on the final error and `used_fallback`, never on
/// backend-specific error shapes.
#[derive(Error, Debug)]
pub enum CallError {
    /// The circuit breaker rejected the call; the backend was never invoked.
    #[error("circuit breaker is open for operation '{operation}'")]
    CircuitOpen { operation: String },

    /// The backend was invoked but exceeded its allotted deadline.
    #[error("operation '{operation}' exceeded deadline of {timeout_ms}ms")]
    DeadlineExceeded { operation: String, timeout_ms: u64 },

    /// Any other failure surfaced by the backend itself.
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),
}

impl CallError {
    /// Stable tag used to classify errors on the microservice error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::CircuitOpen { .. } => "circuit_open",
            CallError::DeadlineExceeded { .. } => "deadline_exceeded",
            CallError::Backend(_) => "backend_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let open = CallError::CircuitOpen {
            operation: "get_listing".to_string(),
        };
        assert_eq!(open.kind(), "circuit_open");
        assert!(open.to_string().contains("get_listing"));

        let deadline = CallError::DeadlineExceeded {
            operation: "get_listing".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(deadline.kind(), "deadline_exceeded");
        assert!(deadline.to_string().contains("500ms"));

        let backend = CallError::Backend("connection refused".into());
        assert_eq!(backend.kind(), "backend_error");
    }
}
