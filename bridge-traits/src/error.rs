use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    /// Failure reported by the remote content service.
    ///
    /// `retry` is set by the collaborator when the condition is transient
    /// (rate limiting, lock contention) and the request may simply be sent
    /// again later.
    #[error("Remote request failed with status {status}: {message}")]
    Remote {
        status: u16,
        message: String,
        retry: bool,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        BridgeError::Remote {
            status,
            message: message.into(),
            retry: false,
        }
    }

    pub fn retryable(status: u16, message: impl Into<String>) -> Self {
        BridgeError::Remote {
            status,
            message: message.into(),
            retry: true,
        }
    }

    /// HTTP-equivalent status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Remote { status, .. } => Some(*status),
            BridgeError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Remote { retry: true, .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(BridgeError::NotFound("abc".into()).is_not_found());
        assert!(BridgeError::remote(404, "gone").is_not_found());
        assert!(BridgeError::remote(409, "stale rev").is_conflict());
        assert!(!BridgeError::OperationFailed("x".into()).is_conflict());
        assert_eq!(BridgeError::OperationFailed("x".into()).status(), None);
    }

    #[test]
    fn test_retry_flag() {
        assert!(BridgeError::retryable(429, "slow down").is_retryable());
        assert!(!BridgeError::remote(500, "broken").is_retryable());
        assert!(!BridgeError::NotAvailable("remote".into()).is_retryable());
    }
}
