/// Error returned by every [`EventStore`](crate::EventStore) operation.
///
/// The store is never retried; the variant only tells the caller which
/// side failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable: refused, dropped, timed out or closed.
    #[error("store connection: {0}")]
    Connection(String),

    /// The store rejected the command.
    #[error("store command: {0}")]
    Command(String),

    /// Event payload failed validation before reaching the store.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}
