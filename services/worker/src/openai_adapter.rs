use crate::room::Outbound;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use interview_core::session::{
    GeneratedReply, InterruptionGate, NoiseSuppression, RealtimeSession, ReplyGenerator,
    ReplyOptions, SessionConfig, SessionEvent, ToolCall,
};
use openai_realtime::types::events::ResponseResource;
use openai_realtime::types::session::{
    AudioFormat, FunctionTool, InputAudioTranscription, NoiseReductionType,
    ServerVadTurnDetection, Tool, TurnDetection,
};
use openai_realtime::types::{Item, ServerEvent, Session};
use openai_realtime::{RealtimeClient, ServerRx};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, mpsc, oneshot};

// The reply `generate_reply` is waiting on. Errors carry the server's message.
struct PendingReply {
    event_id: String,
    created: bool,
    tx: oneshot::Sender<Result<ResponseResource, String>>,
}

type PendingSlot = Arc<Mutex<Option<PendingReply>>>;

/// Runs the core session contract on top of a realtime speech-to-speech connection.
///
/// Generic over [`RealtimeClient`] so the connection can be mocked in tests.
pub struct OpenAIAdapter<C: RealtimeClient> {
    client: Arc<C>,
    audio_out: mpsc::Sender<Outbound>,
    pending_reply: PendingSlot,
    next_reply: AtomicU64,
    started: AtomicBool,
}

impl<C: RealtimeClient + 'static> OpenAIAdapter<C> {
    pub fn new(client: Arc<C>, audio_out: mpsc::Sender<Outbound>) -> Self {
        Self {
            client,
            audio_out,
            pending_reply: Arc::default(),
            next_reply: AtomicU64::new(1),
            started: AtomicBool::new(false),
        }
    }

    /// Forwards little-endian PCM16 audio from the participant.
    pub async fn append_audio(&self, pcm: &[u8]) -> Result<()> {
        self.client
            .append_input_audio_buffer(STANDARD.encode(pcm))
            .await
    }
}

/// Translates the core session settings into a `session.update` payload.
///
/// Server-side turn detection never starts or cancels replies on its own: every reply
/// comes from `generate_reply`, and barge-in is decided against the interruption gate.
fn session_from_config(config: &SessionConfig) -> Session {
    let pipeline = &config.pipeline;
    let noise_reduction = match config.noise_suppression {
        NoiseSuppression::Standard => NoiseReductionType::NearField,
        NoiseSuppression::Telephony => NoiseReductionType::FarField,
    };
    let turn_detection = TurnDetection::ServerVad(
        ServerVadTurnDetection::default()
            .with_threshold(pipeline.vad.threshold)
            .with_prefix_padding_ms(pipeline.vad.prefix_padding_ms)
            .with_silence_duration_ms(pipeline.vad.silence_duration_ms)
            .with_create_response(false)
            .with_interrupt_response(false),
    );
    let tools = config
        .tools
        .iter()
        .map(|tool| {
            Tool::Function(FunctionTool::new(
                &tool.name,
                &tool.description,
                tool.parameters.clone(),
            ))
        })
        .collect();

    Session::builder()
        .with_modalities_enable_audio()
        .with_instructions(&config.instructions)
        .with_voice(&pipeline.voice)
        .with_audio_format(AudioFormat::Pcm16)
        .with_input_audio_transcription(
            InputAudioTranscription::new(&pipeline.stt.model)
                .with_language(&pipeline.stt.language),
        )
        .with_noise_reduction(noise_reduction)
        .with_turn_detection(turn_detection)
        .with_tools(tools)
        .build()
}

#[async_trait]
impl<C: RealtimeClient + 'static> ReplyGenerator for OpenAIAdapter<C> {
    async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply> {
        let event_id = format!("reply_{}", self.next_reply.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_reply.lock().await;
            if pending.is_some() {
                anyhow::bail!("a reply is already being generated");
            }
            *pending = Some(PendingReply {
                event_id: event_id.clone(),
                created: false,
                tx,
            });
        }

        if let Err(e) = self.client.create_response(event_id, options.instructions).await {
            self.pending_reply.lock().await.take();
            return Err(e).context("Adapter failed to request a response");
        }

        let response = rx
            .await
            .context("Realtime session ended before the reply finished")?
            .map_err(|message| anyhow::anyhow!("Realtime API rejected the reply: {}", message))?;
        tracing::debug!(
            "Response {} finished with status {}",
            response.id(),
            response.status()
        );

        Ok(GeneratedReply {
            text: response.transcript(),
            tool_calls: response
                .function_calls()
                .map(|(call_id, name, arguments)| ToolCall {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl<C: RealtimeClient + 'static> RealtimeSession for OpenAIAdapter<C> {
    async fn start(
        &self,
        config: SessionConfig,
        interruptions: InterruptionGate,
    ) -> Result<mpsc::Receiver<SessionEvent>> {
        if self.started.swap(true, Ordering::SeqCst) {
            anyhow::bail!("realtime session already started");
        }

        let server_rx = self.client.server_events().await?;
        self.client
            .update_session(session_from_config(&config))
            .await
            .context("Adapter failed to configure the realtime session")?;

        let (tx, rx) = mpsc::channel(128);
        let pump = EventPump {
            client: Arc::downgrade(&self.client),
            events: tx,
            audio_out: self.audio_out.clone(),
            pending_reply: self.pending_reply.clone(),
            interruptions,
        };
        tokio::spawn(pump.run(server_rx));
        Ok(rx)
    }

    async fn submit_tool_output(&self, call_id: &str, output: &str) -> Result<()> {
        self.client
            .create_conversation_item(Item::function_call_output(call_id, output))
            .await
            .context("Adapter failed to submit tool output")
    }
}

// Routes realtime server events to the session, the participant's audio and the
// pending reply. Holds the client weakly so dropping the adapter closes the connection.
struct EventPump<C> {
    client: Weak<C>,
    events: mpsc::Sender<SessionEvent>,
    audio_out: mpsc::Sender<Outbound>,
    pending_reply: PendingSlot,
    interruptions: InterruptionGate,
}

impl<C: RealtimeClient> EventPump<C> {
    async fn run(self, mut server_rx: ServerRx) {
        loop {
            let event = match server_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Adapter lagged behind, skipped {} server events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let session_event = match event {
                ServerEvent::ConversationItemInputAudioTranscriptionCompleted(data) => {
                    Some(SessionEvent::UserSpeechCommitted(data.transcript().to_string()))
                }
                ServerEvent::InputAudioBufferSpeechStarted(_) => {
                    self.barge_in().await;
                    None
                }
                ServerEvent::ResponseAudioDelta(data) => {
                    self.forward_audio(data.delta()).await;
                    None
                }
                ServerEvent::ResponseCreated(_) => {
                    if let Some(pending) = self.pending_reply.lock().await.as_mut() {
                        pending.created = true;
                    }
                    None
                }
                ServerEvent::ResponseDone(done) => {
                    match self.pending_reply.lock().await.take() {
                        Some(pending) => {
                            if pending.tx.send(Ok(done.into_response())).is_err() {
                                tracing::debug!("Reply waiter went away");
                            }
                        }
                        None => tracing::debug!("Response finished with nobody waiting"),
                    }
                    None
                }
                ServerEvent::Error(e) => {
                    let error = e.error();
                    tracing::warn!("Realtime error {}: {}", error.code(), error.message());
                    self.reject_pending_reply(error.event_id(), error.message())
                        .await;
                    Some(SessionEvent::Error(error.message().to_string()))
                }
                ServerEvent::Close { reason } => {
                    tracing::info!("Realtime connection closed: {:?}", reason);
                    break;
                }
                _ => None,
            };

            if let Some(session_event) = session_event {
                if self.events.send(session_event).await.is_err() {
                    tracing::warn!("Session event receiver dropped, stopping adapter task.");
                    return;
                }
            }
        }

        // Fails any reply still in flight.
        self.pending_reply.lock().await.take();
        if self.events.send(SessionEvent::Closed).await.is_err() {
            tracing::debug!("Session already gone at close");
        }
    }

    // An error fails the pending reply when it names the reply's request, or when it
    // arrives before the server acknowledged the reply with `response.created`.
    async fn reject_pending_reply(&self, event_id: Option<&str>, message: &str) {
        let mut pending = self.pending_reply.lock().await;
        let rejected = pending
            .as_ref()
            .is_some_and(|p| !p.created || event_id == Some(p.event_id.as_str()));
        if !rejected {
            return;
        }
        if let Some(p) = pending.take() {
            if p.tx.send(Err(message.to_string())).is_err() {
                tracing::debug!("Reply waiter went away");
            }
        }
    }

    async fn barge_in(&self) {
        if !self.interruptions.allowed() || self.pending_reply.lock().await.is_none() {
            return;
        }
        let Some(client) = self.client.upgrade() else {
            return;
        };
        tracing::debug!("User started speaking, cancelling the current reply");
        if let Err(e) = client.cancel_response().await {
            tracing::warn!("Failed to cancel response: {:#}", e);
        }
    }

    async fn forward_audio(&self, delta: &str) {
        match STANDARD.decode(delta) {
            Ok(pcm) => {
                if self.audio_out.send(Outbound::Audio(pcm)).await.is_err() {
                    tracing::debug!("Participant audio queue closed");
                }
            }
            Err(e) => tracing::warn!("Dropping undecodable audio delta: {}", e),
        }
    }
}
