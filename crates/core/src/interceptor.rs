use crate::events::Role;
use crate::relay::TranscriptRelay;
use crate::session::{GeneratedReply, ReplyGenerator, ReplyOptions, UserSpeechHook};
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;

/// Taps the conversation so both sides of it reach the transcript relay.
///
/// Wrapping never changes what the session does: the original hook still runs and
/// reply results are passed through untouched.
#[derive(Clone)]
pub struct SessionInterceptor {
    relay: TranscriptRelay,
}

impl SessionInterceptor {
    pub fn new(relay: TranscriptRelay) -> Self {
        Self { relay }
    }

    /// Relays the user's transcript, then runs `original` with it if there is one.
    pub fn wrap_user_speech(&self, original: Option<UserSpeechHook>) -> UserSpeechHook {
        let relay = self.relay.clone();
        Arc::new(move |transcript: String| {
            let relay = relay.clone();
            let original = original.clone();
            async move {
                relay.publish(Role::User, &transcript).await;
                if let Some(original) = original {
                    original(transcript).await;
                }
            }
            .boxed()
        })
    }

    pub fn wrap_replies<G: ReplyGenerator>(&self, inner: G) -> RelayingReplies<G> {
        RelayingReplies {
            inner,
            relay: self.relay.clone(),
        }
    }
}

/// A [`ReplyGenerator`] that relays every finished reply's text as the agent's line.
pub struct RelayingReplies<G> {
    inner: G,
    relay: TranscriptRelay,
}

#[async_trait]
impl<G: ReplyGenerator> ReplyGenerator for RelayingReplies<G> {
    async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply> {
        let reply = self.inner.generate_reply(options).await?;
        if let Some(text) = reply.text.as_deref() {
            self.relay.publish(Role::Agent, text).await;
        }
        Ok(reply)
    }
}
