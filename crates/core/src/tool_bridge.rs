//! The `generate_interview` bridge to the interview-generation service.
//!
//! A call either returns the service's raw response body or fails with a
//! [`ToolError`]. Announcing the created interview on the side-channel is a
//! best-effort enrichment layered on a successful call; it never changes the
//! call's outcome.
//!
//! There is no retry and no idempotency key. A timeout after the service already
//! created the interview means a user-driven retry creates a second one; that
//! decision belongs to the conversation, which sees the error text.

use crate::events::SideChannelEvent;
use crate::relay::TranscriptRelay;
use crate::session::InterruptionGate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const GENERATE_INTERVIEW_URL: &str = "https://auto-inter.vercel.app/api/vapi/generate";

/// Hard upper bound for one call, connect through body read.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors the conversation sees as the tool's result.
///
/// The display strings are what the model reads, e.g. `error: HTTP 500`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("error: HTTP {0}")]
    Http(u16),
    #[error("error: {0}")]
    Network(String),
    #[error("error: unknown tool {0}")]
    UnknownTool(String),
    #[error("error: invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    fn network(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            ToolError::Network(format!("request timed out after {:?}", timeout))
        } else {
            ToolError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Technical,
    Behavioral,
    Mixed,
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterviewType::Technical => f.write_str("technical"),
            InterviewType::Behavioral => f.write_str("behavioral"),
            InterviewType::Mixed => f.write_str("mixed"),
        }
    }
}

/// Everything the service needs to prepare an interview, gathered during the conversation.
///
/// Serialized as the request body; every field goes over the wire as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterviewRequest {
    /// What role would you like to train for
    pub role: String,
    /// Are you aiming for a technical, behavioral or mixed interview?
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    /// The job experience level
    pub level: String,
    /// The list of technologies to cover during the job interview
    pub techstack: String,
    /// How many questions would you like me to prepare
    pub amount: String,
    /// Tell me your user id
    pub userid: String,
}

impl InterviewRequest {
    /// Names of the text fields that are still blank.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        [
            ("role", &self.role),
            ("level", &self.level),
            ("techstack", &self.techstack),
            ("amount", &self.amount),
            ("userid", &self.userid),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Executes `generate_interview` requests against the external service.
#[derive(Clone)]
pub struct ToolBridge {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    relay: TranscriptRelay,
}

impl ToolBridge {
    pub fn new(client: reqwest::Client, relay: TranscriptRelay) -> Self {
        Self {
            client,
            endpoint: GENERATE_INTERVIEW_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            relay,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Posts the request and returns the response body verbatim.
    ///
    /// Interruptions stay disallowed until the call finishes. Expects the caller to
    /// have confirmed every field with the user and to call at most once per turn.
    pub async fn invoke(
        &self,
        interruptions: &InterruptionGate,
        request: &InterviewRequest,
    ) -> Result<String, ToolError> {
        let _no_interruptions = interruptions.disallow();

        tracing::info!(
            "Requesting {} interview for role '{}' ({} questions)",
            request.interview_type,
            request.role,
            request.amount
        );

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ToolError::network(e, self.timeout))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            tracing::warn!("Interview service answered with HTTP {}", status.as_u16());
            return Err(ToolError::Http(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::network(e, self.timeout))?;

        if let Some(interview_id) = created_interview_id(&body) {
            let event = SideChannelEvent::interview_created(&interview_id);
            if self.relay.publish_event(&event).await {
                tracing::info!("Sent interview_created: {}", interview_id);
            }
        }

        Ok(body)
    }
}

/// The new interview's id when the body is a JSON object with a truthy `success`
/// and a non-empty string `interviewId`.
fn created_interview_id(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    if !parsed.get("success").is_some_and(is_truthy) {
        return None;
    }
    parsed
        .get("interviewId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
