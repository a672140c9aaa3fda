use crate::types::{self, Base64EncodedAudioBytes, ClientEvent, Item, ResponseConfig, Session};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

mod config;
mod utils;

pub use config::Config;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// The operations a voice session needs from the realtime endpoint.
///
/// Implemented by [`Client`]; adapters depend on this trait so the connection can be
/// replaced by a mock in tests.
#[async_trait]
pub trait RealtimeClient: Send + Sync {
    async fn update_session(&self, session: Session) -> Result<()>;
    async fn append_input_audio_buffer(&self, audio: Base64EncodedAudioBytes) -> Result<()>;
    async fn create_conversation_item(&self, item: Item) -> Result<()>;
    /// Asks the model to reply now, optionally with per-reply instructions.
    ///
    /// `event_id` comes back in any error that rejects the request.
    async fn create_response(&self, event_id: String, instructions: Option<String>) -> Result<()>;
    async fn cancel_response(&self) -> Result<()>;
    async fn server_events(&self) -> Result<ServerRx>;
}

// Holds the channel capacity, the connection config and the two halves of the
// event plumbing once connected.
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientEvent>(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());

        // Writer: drains client events until every sender is dropped, then closes the socket
        // so the server ends its side and the reader below finishes.
        tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close realtime socket: {}", e);
            }
        });

        // Reader: decodes server frames and broadcasts them to every subscriber.
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                        Ok(event) => {
                            if let types::ServerEvent::ResponseDone(done) = &event {
                                if let Some(usage) = done.response().usage() {
                                    tracing::debug!(
                                        "total_tokens: {}, input_tokens: {}, output_tokens: {}",
                                        usage.total_tokens(),
                                        usage.input_tokens(),
                                        usage.output_tokens()
                                    );
                                }
                            }
                            if let Err(e) = s_tx.send(event) {
                                tracing::debug!("no subscriber for server event: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message of {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            let close_event = types::ServerEvent::Close {
                reason: Some("realtime connection ended".to_string()),
            };
            if let Err(e) = s_tx.send(close_event) {
                tracing::debug!("no subscriber for close event: {}", e);
            }
        });
        Ok(())
    }

    async fn send_client_event(&self, event: ClientEvent) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(event).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }
}

#[async_trait]
impl RealtimeClient for Client {
    async fn update_session(&self, session: Session) -> Result<()> {
        self.send_client_event(ClientEvent::SessionUpdate { session })
            .await
    }

    async fn append_input_audio_buffer(&self, audio: Base64EncodedAudioBytes) -> Result<()> {
        self.send_client_event(ClientEvent::InputAudioBufferAppend { audio })
            .await
    }

    async fn create_conversation_item(&self, item: Item) -> Result<()> {
        self.send_client_event(ClientEvent::ConversationItemCreate { item })
            .await
    }

    async fn create_response(&self, event_id: String, instructions: Option<String>) -> Result<()> {
        let response = instructions.map(|i| ResponseConfig::with_instructions(&i));
        self.send_client_event(ClientEvent::ResponseCreate {
            event_id: Some(event_id),
            response,
        })
        .await
    }

    async fn cancel_response(&self) -> Result<()> {
        self.send_client_event(ClientEvent::ResponseCancel {}).await
    }

    async fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }
}

/// Connects with an explicit configuration and channel capacity.
pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_before_connect_fail() {
        let client = Client::new(8, Config::default());

        assert!(client.create_response("reply_1".to_string(), None).await.is_err());
        assert!(client.server_events().await.is_err());
    }
}
