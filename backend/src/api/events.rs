//! Ingest events for Server-Sent Events streaming.
//!
//! Every event published here is mirrored into `tracing` and broadcast to
//! all subscribers of `/api/events`.

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::transform::pipeline::{IngestEvent, Stage};

/// Events buffered per slow subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 100;

/// Global event broadcaster
pub static EVENTS: Lazy<EventBroadcaster> = Lazy::new(EventBroadcaster::new);

pub struct EventBroadcaster {
    sender: broadcast::Sender<IngestEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Log `event` and send it to all subscribers.
    pub fn publish(&self, event: IngestEvent) {
        let job_id = event.job_id;
        match &event.stage {
            Stage::Progress { percent } => tracing::debug!(%job_id, percent, "progress"),
            Stage::Status { message } => tracing::info!(%job_id, "{}", message),
            Stage::Preview { headers, rows } => {
                tracing::debug!(%job_id, columns = headers.len(), rows = rows.len(), "preview ready")
            }
            Stage::Finished { records, fields } => {
                tracing::info!(%job_id, records, fields, "ingest finished")
            }
            Stage::Failed { kind, message } => {
                tracing::error!(%job_id, kind = ?kind, "{}", message)
            }
        }

        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = EventBroadcaster::new();
        let mut rx = events.subscribe();

        let job_id = Uuid::new_v4();
        events.publish(IngestEvent {
            job_id,
            stage: Stage::Progress { percent: 60 },
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, job_id);
        assert_eq!(received.stage, Stage::Progress { percent: 60 });
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBroadcaster::default().publish(IngestEvent {
            job_id: Uuid::nil(),
            stage: Stage::Finished { records: 0, fields: 0 },
        });
    }
}
