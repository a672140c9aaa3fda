use crate::types::session::Session;
use serde::{Deserialize, Serialize};

/// Base64 encoded little-endian PCM16 audio.
pub type Base64EncodedAudioBytes = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Session },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: Base64EncodedAudioBytes },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: Item },
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Echoed back in `error.event_id` when the request is rejected.
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
    #[serde(rename = "response.cancel")]
    ResponseCancel {},
}

/// Conversation items the client adds on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    /// The result of a function call the model requested.
    FunctionCallOutput { call_id: String, output: String },
}

impl Item {
    pub fn function_call_output(call_id: &str, output: &str) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.to_string(),
            output: output.to_string(),
        }
    }
}

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}

impl ResponseConfig {
    pub fn with_instructions(instructions: &str) -> Self {
        Self {
            instructions: Some(instructions.to_string()),
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

/// Server events this client understands. Anything else deserializes to `Other`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Synthesized locally when the WebSocket closes.
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionChangedEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionChangedEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(SpeechStartedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(TranscriptionCompletedEvent),
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta(AudioDeltaEvent),
    #[serde(rename = "response.created")]
    ResponseCreated(ResponseCreatedEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseDoneEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: String,
    error: ErrorDetails,
}

impl ErrorEvent {
    pub fn error(&self) -> &ErrorDetails {
        &self.error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    code: Option<String>,
    message: String,
    /// The client event that caused the error, when there was one.
    #[serde(default)]
    event_id: Option<String>,
}

impl ErrorDetails {
    /// The error code, falling back to the error type.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.kind)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChangedEvent {
    #[serde(default)]
    event_id: String,
    session: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechStartedEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    audio_start_ms: u64,
    item_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionCompletedEvent {
    #[serde(default)]
    event_id: String,
    item_id: String,
    transcript: String,
}

impl TranscriptionCompletedEvent {
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeltaEvent {
    #[serde(default)]
    event_id: String,
    response_id: String,
    delta: Base64EncodedAudioBytes,
}

impl AudioDeltaEvent {
    pub fn delta(&self) -> &str {
        &self.delta
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCreatedEvent {
    #[serde(default)]
    event_id: String,
    response: ResponseResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDoneEvent {
    #[serde(default)]
    event_id: String,
    response: ResponseResource,
}

impl ResponseDoneEvent {
    pub fn response(&self) -> &ResponseResource {
        &self.response
    }

    pub fn into_response(self) -> ResponseResource {
        self.response
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseResource {
    id: String,
    /// "completed", "cancelled", "failed" or "incomplete".
    status: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ResponseResource {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn output(&self) -> &[OutputItem] {
        &self.output
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Everything the assistant said in this response, or `None` when it said nothing.
    pub fn transcript(&self) -> Option<String> {
        let text: String = self
            .output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                _ => None,
            })
            .flatten()
            .filter_map(ContentPart::text)
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Function calls requested by the model, in output order.
    pub fn function_calls(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.output.iter().filter_map(|item| match item {
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => Some((call_id.as_str(), name.as_str(), arguments.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Audio {
        #[serde(default)]
        transcript: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Audio { transcript } => transcript.as_deref(),
            ContentPart::Other => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    total_tokens: i32,
    input_tokens: i32,
    output_tokens: i32,
}

impl Usage {
    pub fn total_tokens(&self) -> i32 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> i32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> i32 {
        self.output_tokens
    }
}
