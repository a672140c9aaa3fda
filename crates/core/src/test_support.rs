use crate::agent::Persona;
use crate::relay::{RelayError, SideChannel};
use crate::session::{
    GeneratedReply, InterruptionGate, NoiseSuppression, RealtimeSession, ReplyGenerator,
    ReplyOptions, SessionConfig, SessionEvent, SpeechPipeline,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A side-channel that keeps every payload it is handed.
#[derive(Default)]
pub struct RecordingChannel {
    payloads: Mutex<Vec<Vec<u8>>>,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also appends `relay:<role>:<text>` to `log` for each transcription.
    pub fn with_log(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            payloads: Mutex::default(),
            log: Some(log),
        }
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|payload| serde_json::from_slice(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl SideChannel for RecordingChannel {
    async fn publish_data(&self, payload: Vec<u8>) -> Result<(), RelayError> {
        if let Some(log) = &self.log {
            let event: serde_json::Value = serde_json::from_slice(&payload)?;
            log.lock().unwrap().push(format!(
                "relay:{}:{}",
                event["role"].as_str().unwrap_or_default(),
                event["text"].as_str().unwrap_or_default()
            ));
        }
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

/// A speech backend that answers from a fixed list of replies.
pub struct ScriptedSession {
    replies: Mutex<VecDeque<GeneratedReply>>,
    requests: Mutex<Vec<ReplyOptions>>,
    interruptions_allowed: Mutex<Vec<bool>>,
    tool_outputs: Mutex<Vec<(String, String)>>,
    started: Mutex<Option<(SessionConfig, InterruptionGate)>>,
    events: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl ScriptedSession {
    /// Returns the session and the sender feeding its event stream.
    pub fn new(replies: Vec<GeneratedReply>) -> (Self, mpsc::Sender<SessionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
            interruptions_allowed: Mutex::default(),
            tool_outputs: Mutex::default(),
            started: Mutex::default(),
            events: Mutex::new(Some(rx)),
        };
        (session, tx)
    }

    pub fn config() -> SessionConfig {
        SessionConfig {
            instructions: Persona::default().instructions,
            tools: Vec::new(),
            pipeline: SpeechPipeline::default(),
            noise_suppression: NoiseSuppression::Standard,
        }
    }

    pub fn requests(&self) -> Vec<ReplyOptions> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether interruptions were allowed at the start of each reply.
    pub fn interruptions_allowed(&self) -> Vec<bool> {
        self.interruptions_allowed.lock().unwrap().clone()
    }

    pub fn tool_outputs(&self) -> Vec<(String, String)> {
        self.tool_outputs.lock().unwrap().clone()
    }

    pub fn started_with(&self) -> Option<SessionConfig> {
        self.started
            .lock()
            .unwrap()
            .as_ref()
            .map(|(config, _)| config.clone())
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedSession {
    async fn generate_reply(&self, options: ReplyOptions) -> Result<GeneratedReply> {
        if let Some((_, gate)) = self.started.lock().unwrap().as_ref() {
            self.interruptions_allowed
                .lock()
                .unwrap()
                .push(gate.allowed());
        }
        self.requests.lock().unwrap().push(options);
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl RealtimeSession for ScriptedSession {
    async fn start(
        &self,
        config: SessionConfig,
        interruptions: InterruptionGate,
    ) -> Result<mpsc::Receiver<SessionEvent>> {
        *self.started.lock().unwrap() = Some((config, interruptions));
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already started"))
    }

    async fn submit_tool_output(&self, call_id: &str, output: &str) -> Result<()> {
        self.tool_outputs
            .lock()
            .unwrap()
            .push((call_id.to_string(), output.to_string()));
        Ok(())
    }
}
