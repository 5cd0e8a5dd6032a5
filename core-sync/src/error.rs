use bridge_traits::{BridgeError, ItemKind, ItemRef};
use core_async::throttle::SettleError;
use core_runtime::events::EventError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Collaborator failure passed through without item context.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Failed to read local {kind} item {name}: {source}")]
    LocalRead {
        kind: ItemKind,
        name: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to save {kind} item {item} locally: {source}")]
    Save {
        kind: ItemKind,
        item: ItemRef,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to push {kind} item {item}: {source}")]
    Push {
        kind: ItemKind,
        item: ItemRef,
        #[source]
        source: BridgeError,
    },

    #[error("Conflict pushing {kind} item {item}: remote copy differs in {}", .fields.join(", "))]
    Conflict {
        kind: ItemKind,
        item: ItemRef,
        fields: Vec<String>,
    },

    #[error("Failed to delete {kind} item {item}: {source}")]
    Delete {
        kind: ItemKind,
        item: ItemRef,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to list {kind} items: {source}")]
    Listing {
        kind: ItemKind,
        #[source]
        source: BridgeError,
    },

    #[error("Concurrent dispatch failed: {0}")]
    Concurrency(#[from] SettleError),

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error(transparent)]
    Config(#[from] core_runtime::Error),
}

impl SyncError {
    fn bridge_source(&self) -> Option<&BridgeError> {
        match self {
            SyncError::Bridge(source)
            | SyncError::LocalRead { source, .. }
            | SyncError::Save { source, .. }
            | SyncError::Push { source, .. }
            | SyncError::Delete { source, .. }
            | SyncError::Listing { source, .. } => Some(source),
            _ => None,
        }
    }

    /// HTTP-equivalent status of the underlying failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Conflict { .. } => Some(409),
            other => other.bridge_source().and_then(BridgeError::status),
        }
    }

    /// Whether the collaborator flagged the failure as transient.
    pub fn is_retryable(&self) -> bool {
        self.bridge_source()
            .map(BridgeError::is_retryable)
            .unwrap_or(false)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The item the failure is about, when known.
    pub fn item(&self) -> Option<&ItemRef> {
        match self {
            SyncError::Save { item, .. }
            | SyncError::Push { item, .. }
            | SyncError::Conflict { item, .. }
            | SyncError::Delete { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Payload for `*-error` events.
    pub fn to_event_error(&self) -> EventError {
        EventError::new(self.to_string())
            .with_status(self.status())
            .with_retryable(self.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_reports_409_and_fields() {
        let err = SyncError::Conflict {
            kind: ItemKind::Categories,
            item: ItemRef::named("news"),
            fields: vec!["description".to_string(), "tags".to_string()],
        };

        assert_eq!(err.status(), Some(409));
        assert!(!err.is_retryable());
        assert_eq!(err.item().unwrap().name, "news");
        assert!(err.to_string().contains("description, tags"));
    }

    #[test]
    fn test_retry_flag_follows_source() {
        let err = SyncError::Push {
            kind: ItemKind::Assets,
            item: ItemRef::named("logo"),
            source: BridgeError::retryable(429, "slow down"),
        };
        assert!(err.is_retryable());

        let event = err.to_event_error();
        assert_eq!(event.status, Some(429));
        assert!(event.retryable);
    }

    #[test]
    fn test_not_found_passthrough() {
        let err: SyncError = BridgeError::NotFound("a-1".to_string()).into();
        assert!(err.is_not_found());
        assert!(err.item().is_none());
    }
}
