//! Error taxonomy of the stream engine.

use crate::persist::PersistError;

/// Errors from stream-level operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Operation attempted while the stream is being torn down.
    #[error("stream is in graceful shutdown")]
    StreamInGracefulShutdown,

    /// The publisher handle was already moved to an external acquirer.
    #[error("publisher already released")]
    PublisherAlreadyReleased,

    /// A publisher handle is already installed on this stream.
    #[error("publisher already owned")]
    PublisherAlreadyOwned,

    /// Publish attempted through the facade while write authority is external.
    #[error("publish to stream with released publisher")]
    PublishToStreamWithReleasedPublisher,

    /// The persister rejected the operation.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// The subscriber worker thread could not be spawned.
    #[error("failed to spawn subscriber thread: {0}")]
    SubscriberSpawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StreamError::StreamInGracefulShutdown.to_string(),
            "stream is in graceful shutdown"
        );
        assert_eq!(
            StreamError::PublishToStreamWithReleasedPublisher.to_string(),
            "publish to stream with released publisher"
        );
    }

    #[test]
    fn test_persist_error_is_transparent() {
        let inner = PersistError::InconsistentTimestamp {
            supplied: 5,
            head: 10,
        };
        let outer = StreamError::from(inner);
        assert!(outer.to_string().contains("inconsistent timestamp"));
    }
}
