use crate::openai_adapter::OpenAIAdapter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use interview_core::agent::Persona;
use interview_core::orchestrator::{AGENT_NAME, JobContext, SessionOrchestrator, WorkerContext};
use interview_core::relay::{RelayError, SideChannel};
use interview_core::session::ParticipantKind;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const OUTBOUND_CAPACITY: usize = 256;

/// Frames queued for the participant's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A side-channel event, sent as a text frame.
    Data(Vec<u8>),
    /// Synthesized PCM16 audio, sent as a binary frame.
    Audio(Vec<u8>),
}

/// The side-channel half of a room: events share the socket with the audio and keep
/// their publish order.
pub struct RoomSideChannel {
    tx: mpsc::Sender<Outbound>,
}

impl RoomSideChannel {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SideChannel for RoomSideChannel {
    async fn publish_data(&self, payload: Vec<u8>) -> Result<(), RelayError> {
        self.tx
            .send(Outbound::Data(payload))
            .await
            .map_err(|_| RelayError::Closed)
    }
}

/// Shared by every room the worker serves.
pub struct RoomState {
    pub worker: Arc<WorkerContext>,
    pub persona: Persona,
    pub api_key: SecretString,
    pub interview_api_url: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    #[serde(default)]
    pub participant: ParticipantKind,
}

pub async fn agent_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<RoomState>>,
) -> Response {
    info!("{} participant joining {}", participant_label(params.participant), AGENT_NAME);
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_room(socket, params.participant, state).await {
            error!("Room ended with error: {:#}", e);
        }
    })
}

fn participant_label(kind: ParticipantKind) -> &'static str {
    match kind {
        ParticipantKind::Standard => "Standard",
        ParticipantKind::Sip => "SIP",
    }
}

/// Runs one participant connection: audio in, audio and events out, until either side closes.
async fn handle_room(
    socket: WebSocket,
    participant: ParticipantKind,
    state: Arc<RoomState>,
) -> Result<()> {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            let message = match outbound {
                Outbound::Data(payload) => match String::from_utf8(payload) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!("Dropping side-channel payload that is not UTF-8: {}", e);
                        continue;
                    }
                },
                Outbound::Audio(pcm) => Message::Binary(pcm.into()),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        if let Err(e) = sink.close().await {
            tracing::debug!("Failed to close participant socket: {}", e);
        }
    });

    let realtime_config = openai_realtime::Config::builder()
        .with_api_key(state.api_key.clone())
        .with_model(&state.worker.pipeline().llm_model)
        .build();
    let client = openai_realtime::connect_with_config(1024, realtime_config)
        .await
        .context("Failed to connect to the realtime API")?;
    let adapter = Arc::new(OpenAIAdapter::new(Arc::new(client), out_tx.clone()));

    let orchestrator = SessionOrchestrator::new(state.worker.clone(), state.persona.clone())
        .with_endpoint(&state.interview_api_url);
    let ctx = JobContext {
        participant,
        side_channel: Arc::new(RoomSideChannel::new(out_tx)),
        session: adapter.clone(),
    };
    let mut session = tokio::spawn(async move {
        if let Err(e) = orchestrator.entrypoint(ctx).await {
            error!("Session failed: {:#}", e);
        }
    });

    loop {
        tokio::select! {
            _ = &mut session => {
                info!("Session finished, closing room");
                break;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Binary(pcm))) => {
                    if let Err(e) = adapter.append_audio(&pcm).await {
                        warn!("Failed to forward participant audio: {:#}", e);
                        break;
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Ignoring text frame from participant: {}", text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Participant left");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    info!("Participant socket error: {}", e);
                    break;
                }
            }
        }
    }

    // Dropping the session releases the realtime connection and the outbound queue.
    session.abort();
    drop(adapter);
    if let Err(e) = writer.await {
        if !e.is_cancelled() {
            warn!("Room writer task failed: {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    #[tokio::test]
    async fn test_side_channel_frames_keep_publish_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let channel = RoomSideChannel::new(tx);

        channel.publish_data(b"{\"n\":1}".to_vec()).await.unwrap();
        channel.publish_data(b"{\"n\":2}".to_vec()).await.unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Data(b"{\"n\":1}".to_vec())));
        assert_eq!(rx.recv().await, Some(Outbound::Data(b"{\"n\":2}".to_vec())));
    }

    #[tokio::test]
    async fn test_publish_after_room_closed_reports_closed() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let channel = RoomSideChannel::new(tx);

        let err = channel.publish_data(b"{}".to_vec()).await.unwrap_err();

        assert!(matches!(err, RelayError::Closed));
    }

    #[test]
    fn test_participant_kind_comes_from_the_query() {
        let uri: Uri = "/agents/Blake-1c1b?participant=sip".parse().unwrap();
        let Query(params) = Query::<JoinParams>::try_from_uri(&uri).unwrap();
        assert_eq!(params.participant, ParticipantKind::Sip);

        let uri: Uri = "/agents/Blake-1c1b".parse().unwrap();
        let Query(params) = Query::<JoinParams>::try_from_uri(&uri).unwrap();
        assert_eq!(params.participant, ParticipantKind::Standard);

        let uri: Uri = "/agents/Blake-1c1b?participant=fax".parse().unwrap();
        assert!(Query::<JoinParams>::try_from_uri(&uri).is_err());
    }
}
