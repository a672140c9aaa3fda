//! The voice session seam: what the conversation loop needs from a speech backend,
//! and the loop itself.

use crate::agent::{InterviewAgent, ToolDefinition};
use crate::interceptor::SessionInterceptor;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, OptionFuture};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Upper bound on tool-call rounds answered within one user turn.
pub const MAX_TOOL_ROUNDS: usize = 4;

/// Shared switch deciding whether user speech may cut off the agent.
///
/// Interruptions are allowed while no [`InterruptionGuard`] is alive.
#[derive(Debug, Clone, Default)]
pub struct InterruptionGate {
    holds: Arc<AtomicUsize>,
}

impl InterruptionGate {
    /// Disallows interruptions until the returned guard is dropped.
    pub fn disallow(&self) -> InterruptionGuard {
        self.holds.fetch_add(1, Ordering::SeqCst);
        InterruptionGuard {
            holds: self.holds.clone(),
        }
    }

    pub fn allowed(&self) -> bool {
        self.holds.load(Ordering::SeqCst) == 0
    }
}

#[must_use = "interruptions are allowed again as soon as the guard is dropped"]
#[derive(Debug)]
pub struct InterruptionGuard {
    holds: Arc<AtomicUsize>,
}

impl Drop for InterruptionGuard {
    fn drop(&mut self) {
        self.holds.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Kind of the remote participant. SIP callers come in over the phone network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    #[default]
    Standard,
    Sip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseSuppression {
    Standard,
    Telephony,
}

impl NoiseSuppression {
    pub fn for_participant(kind: ParticipantKind) -> Self {
        match kind {
            ParticipantKind::Standard => NoiseSuppression::Standard,
            ParticipantKind::Sip => NoiseSuppression::Telephony,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VadSettings {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SttSettings {
    pub model: String,
    pub language: String,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Voice activity detection, speech-to-text, language model and voice for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechPipeline {
    pub vad: VadSettings,
    pub stt: SttSettings,
    pub llm_model: String,
    pub voice: String,
}

impl Default for SpeechPipeline {
    fn default() -> Self {
        Self {
            vad: VadSettings::default(),
            stt: SttSettings::default(),
            llm_model: "gpt-4o-realtime-preview".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

/// Everything a backend needs to start the conversation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub pipeline: SpeechPipeline,
    pub noise_suppression: NoiseSuppression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transcript of one finished user utterance.
    UserSpeechCommitted(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// The outcome of one reply: what was said and which tools the model asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOptions {
    /// Extra instructions for this reply only.
    pub instructions: Option<String>,
    pub allow_interruptions: bool,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            instructions: None,
            allow_interruptions: true,
        }
    }
}

/// Produces one spoken reply and reports its result once it is finished.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply>;
}

#[async_trait]
impl<G: ReplyGenerator + ?Sized> ReplyGenerator for Arc<G> {
    async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply> {
        (**self).generate_reply(options).await
    }
}

/// A speech backend able to carry the conversation.
#[async_trait]
pub trait RealtimeSession: ReplyGenerator {
    /// Configures the backend and returns the stream of session events.
    ///
    /// The backend consults `interruptions` before cutting off a reply on user speech.
    async fn start(
        &self,
        config: SessionConfig,
        interruptions: InterruptionGate,
    ) -> Result<mpsc::Receiver<SessionEvent>>;

    async fn submit_tool_output(&self, call_id: &str, output: &str) -> Result<()>;
}

pub type UserSpeechHook = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct SessionHooks {
    pub on_user_speech_committed: Option<UserSpeechHook>,
}

/// Drives one conversation over a [`RealtimeSession`].
pub struct AgentSession<S> {
    backend: Arc<S>,
    hooks: SessionHooks,
    replies: Arc<dyn ReplyGenerator>,
    interruptions: InterruptionGate,
    intercepted: bool,
}

impl<S: RealtimeSession + 'static> AgentSession<S> {
    pub fn new(backend: Arc<S>) -> Self {
        let replies: Arc<dyn ReplyGenerator> = backend.clone();
        Self {
            backend,
            hooks: SessionHooks::default(),
            replies,
            interruptions: InterruptionGate::default(),
            intercepted: false,
        }
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn interruptions(&self) -> &InterruptionGate {
        &self.interruptions
    }

    /// Routes the user-speech hook and reply generation through `interceptor`.
    ///
    /// Only the first call has an effect.
    pub fn install_interceptor(&mut self, interceptor: &SessionInterceptor) {
        if self.intercepted {
            tracing::warn!("Session interceptor already installed, skipping");
            return;
        }
        let original = self.hooks.on_user_speech_committed.take();
        self.hooks.on_user_speech_committed = Some(interceptor.wrap_user_speech(original));
        self.replies = Arc::new(interceptor.wrap_replies(self.replies.clone()));
        self.intercepted = true;
        tracing::info!("Session interceptor installed");
    }

    pub async fn commit_user_speech(&self, transcript: String) {
        if let Some(hook) = &self.hooks.on_user_speech_committed {
            hook(transcript).await;
        }
    }

    pub async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply> {
        let _no_interruptions = (!options.allow_interruptions).then(|| self.interruptions.disallow());
        self.replies.generate_reply(options).await
    }

    pub async fn start(&self, config: SessionConfig) -> Result<mpsc::Receiver<SessionEvent>> {
        self.backend
            .start(config, self.interruptions.clone())
            .await
    }

    /// Greets the user, then answers committed utterances until the session closes.
    ///
    /// Events keep flowing while a reply or tool call is in flight, so the user-speech
    /// hook runs as each utterance is committed. Utterances that arrive mid-reply are
    /// answered together by one follow-up reply. On close the in-flight reply is
    /// allowed to finish and no new one is started.
    pub async fn run(&self, agent: &InterviewAgent, mut events: mpsc::Receiver<SessionEvent>) {
        let mut in_flight = Some(Box::pin(self.respond(agent, agent.greeting_options())));
        let mut reply_owed = false;

        loop {
            tokio::select! {
                biased;
                Some(()) = OptionFuture::from(in_flight.as_mut()) => {
                    in_flight = None;
                    if std::mem::take(&mut reply_owed) {
                        in_flight = Some(Box::pin(self.respond(agent, ReplyOptions::default())));
                    }
                }
                event = events.recv() => match event {
                    Some(SessionEvent::UserSpeechCommitted(transcript)) => {
                        let has_words = !transcript.trim().is_empty();
                        self.commit_user_speech(transcript).await;
                        if has_words {
                            if in_flight.is_none() {
                                in_flight = Some(Box::pin(self.respond(agent, ReplyOptions::default())));
                            } else {
                                reply_owed = true;
                            }
                        }
                    }
                    Some(SessionEvent::Error(message)) => {
                        tracing::warn!("Session error: {}", message);
                    }
                    Some(SessionEvent::Closed) => {
                        tracing::info!("Session closed");
                        break;
                    }
                    None => break,
                },
            }
        }

        if let Some(reply) = in_flight {
            reply.await;
        }
    }

    // One reply plus however many tool rounds it leads to.
    async fn respond(&self, agent: &InterviewAgent, options: ReplyOptions) {
        let mut reply = match self.generate_reply(options).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Failed to generate reply: {:#}", e);
                return;
            }
        };

        let mut rounds = 0;
        while !reply.tool_calls.is_empty() {
            if rounds == MAX_TOOL_ROUNDS {
                tracing::warn!(
                    "Dropping {} tool calls after {} rounds",
                    reply.tool_calls.len(),
                    MAX_TOOL_ROUNDS
                );
                return;
            }
            rounds += 1;

            for call in &reply.tool_calls {
                let output = match agent.call_tool(call, &self.interruptions).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!("Tool {} failed: {}", call.name, e);
                        e.to_string()
                    }
                };
                if let Err(e) = self.backend.submit_tool_output(&call.call_id, &output).await {
                    tracing::error!("Failed to submit output of {}: {:#}", call.name, e);
                    return;
                }
            }

            reply = match self.generate_reply(ReplyOptions::default()).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!("Failed to generate reply after tool call: {:#}", e);
                    return;
                }
            };
        }
    }
}
