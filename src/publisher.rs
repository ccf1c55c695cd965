/// Publisher Capability
///
/// The concrete broker transport is an external collaborator (spec §1); this
/// crate only defines the interface the Block Processor publishes through and
/// a logging default, the same "capability, not inheritance" shape as
/// `rpc::Client`.
use async_trait::async_trait;

use crate::errors::AppError;
use crate::events::MatchedTxEvent;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &MatchedTxEvent) -> Result<(), AppError>;
}

/// Publisher used when no broker client is wired up: logs the event at info
/// level and returns success. Lets the pipeline run end-to-end without a
/// live broker dependency.
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, topic: &str, event: &MatchedTxEvent) -> Result<(), AppError> {
        tracing::info!(
            topic = topic,
            tx_hash = %event.tx_hash,
            user_id = %event.user_id,
            direction = ?event.direction,
            "publishing matched tx event"
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Captures every published event for assertion, in place of a real
    /// broker client.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub published: Mutex<Vec<MatchedTxEvent>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            RecordingPublisher::default()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, _topic: &str, event: &MatchedTxEvent) -> Result<(), AppError> {
            self.published.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn logging_publisher_always_succeeds() {
        let publisher = LoggingPublisher;
        let event = crate::events::MatchedTxEvent::new(
            "u1".into(),
            "0xa".into(),
            crate::events::Direction::In,
            "0xtx".into(),
            1,
            0,
            "0xa".into(),
            Some("0xb".into()),
            "0".into(),
            "0.000000000000000000".into(),
            "0".into(),
            "0.000000000000000000".into(),
            "success".into(),
            1,
            false,
        );
        assert!(publisher.publish("tx_events", &event).await.is_ok());
    }

    #[tokio::test]
    async fn recording_publisher_captures_events() {
        let publisher = RecordingPublisher::new();
        let event = crate::events::MatchedTxEvent::new(
            "u1".into(),
            "0xa".into(),
            crate::events::Direction::Out,
            "0xtx".into(),
            1,
            0,
            "0xa".into(),
            Some("0xb".into()),
            "0".into(),
            "0.000000000000000000".into(),
            "0".into(),
            "0.000000000000000000".into(),
            "success".into(),
            1,
            false,
        );
        publisher.publish("tx_events", &event).await.unwrap();
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }
}
