use crate::events::{Role, SideChannelEvent};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use std::sync::Arc;

/// Longest transcript prefix written to the log.
const LOG_PREVIEW_CHARS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("side channel closed")]
    Closed,
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("side channel transport error: {0}")]
    Transport(String),
}

/// A reliable, ordered data channel to the connected client, parallel to the audio.
///
/// Implementations deliver each payload as one UTF-8 JSON message, in the order
/// `publish_data` is called.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SideChannel: Send + Sync {
    async fn publish_data(&self, payload: Vec<u8>) -> Result<(), RelayError>;
}

/// Publishes transcription and interview events to the client.
///
/// Relaying is best-effort: failures are logged and dropped so they can never
/// disturb the conversation itself.
#[derive(Clone)]
pub struct TranscriptRelay {
    channel: Arc<dyn SideChannel>,
}

impl TranscriptRelay {
    pub fn new(channel: Arc<dyn SideChannel>) -> Self {
        Self { channel }
    }

    /// Sends one transcription event. Empty or whitespace-only text is skipped.
    pub async fn publish(&self, role: Role, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let event = SideChannelEvent::transcription(role, text);
        match self.try_publish(&event).await {
            Ok(()) => tracing::info!("Sent transcription [{}]: {}...", role, preview(text)),
            Err(e) => tracing::warn!("Failed to send transcription: {}", e),
        }
    }

    /// Sends any serializable payload under the same failure rules as [`publish`](Self::publish).
    ///
    /// Returns whether the event was handed to the channel.
    pub async fn publish_event<E: Serialize + Sync>(&self, event: &E) -> bool {
        match self.try_publish(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send side-channel event: {}", e);
                false
            }
        }
    }

    async fn try_publish<E: Serialize + Sync>(&self, event: &E) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(event)?;
        self.channel.publish_data(payload).await
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingChannel;
    use chrono::{DateTime, Utc};

    #[tokio::test]
    async fn test_publish_sends_one_event_verbatim() {
        let channel = Arc::new(RecordingChannel::new());
        let relay = TranscriptRelay::new(channel.clone());
        let started = Utc::now();

        relay.publish(Role::User, "  I'd like a backend role  ").await;

        let events = channel.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "transcription");
        assert_eq!(events[0]["role"], "user");
        assert_eq!(events[0]["text"], "  I'd like a backend role  ");
        let timestamp: DateTime<Utc> =
            serde_json::from_value(events[0]["timestamp"].clone()).unwrap();
        assert!(timestamp >= started);
    }

    #[tokio::test]
    async fn test_publish_skips_blank_text() {
        let channel = Arc::new(RecordingChannel::new());
        let relay = TranscriptRelay::new(channel.clone());

        relay.publish(Role::User, "").await;
        relay.publish(Role::Agent, " \n\t ").await;

        assert!(channel.events().is_empty());
    }

    #[tokio::test]
    async fn test_publish_swallows_channel_failure() {
        let mut channel = MockSideChannel::new();
        channel
            .expect_publish_data()
            .times(1)
            .returning(|_| Err(RelayError::Transport("peer went away".to_string())));
        let relay = TranscriptRelay::new(Arc::new(channel));

        // Returns normally; the mock verifies the send was attempted.
        relay.publish(Role::Agent, "hello").await;
    }

    #[tokio::test]
    async fn test_publish_event_swallows_closed_channel() {
        let mut channel = MockSideChannel::new();
        channel
            .expect_publish_data()
            .times(1)
            .returning(|_| Err(RelayError::Closed));
        let relay = TranscriptRelay::new(Arc::new(channel));

        let sent = relay
            .publish_event(&SideChannelEvent::interview_created("abc123"))
            .await;

        assert!(!sent);
    }

    #[tokio::test]
    async fn test_events_keep_publish_order() {
        let channel = Arc::new(RecordingChannel::new());
        let relay = TranscriptRelay::new(channel.clone());

        for text in ["one", "two", "three"] {
            relay.publish(Role::User, text).await;
        }

        let texts: Vec<_> = channel
            .events()
            .iter()
            .map(|e| e["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let long = "é".repeat(80);
        assert_eq!(preview(&long).chars().count(), LOG_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
