pub mod agent;
pub mod events;
pub mod interceptor;
pub mod orchestrator;
pub mod relay;
pub mod session;
pub mod tool_bridge;

#[cfg(test)]
mod test_support;

pub use agent::{InterviewAgent, Persona, ToolDefinition};
pub use events::{Role, SideChannelEvent};
pub use interceptor::SessionInterceptor;
pub use orchestrator::{AGENT_NAME, JobContext, SessionOrchestrator, WorkerContext};
pub use relay::{RelayError, SideChannel, TranscriptRelay};
pub use session::{
    GeneratedReply, InterruptionGate, NoiseSuppression, ParticipantKind, RealtimeSession,
    ReplyGenerator, ReplyOptions, SessionConfig, SessionEvent, SpeechPipeline, ToolCall,
};
pub use tool_bridge::{InterviewRequest, InterviewType, ToolBridge, ToolError};
