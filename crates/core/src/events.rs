use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcribed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Agent => f.write_str("agent"),
        }
    }
}

/// Structured payloads sent to the client over the side-channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideChannelEvent {
    /// One committed user utterance or one generated assistant reply.
    Transcription {
        role: Role,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// The interview-generation service created an interview.
    InterviewCreated {
        #[serde(rename = "interviewId")]
        interview_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl SideChannelEvent {
    pub fn transcription(role: Role, text: &str) -> Self {
        Self::Transcription {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn interview_created(interview_id: &str) -> Self {
        Self::InterviewCreated {
            interview_id: interview_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}
