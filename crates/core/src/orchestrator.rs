use crate::agent::{InterviewAgent, Persona};
use crate::interceptor::SessionInterceptor;
use crate::relay::{SideChannel, TranscriptRelay};
use crate::session::{
    AgentSession, NoiseSuppression, ParticipantKind, RealtimeSession, SessionConfig,
    SpeechPipeline,
};
use crate::tool_bridge::ToolBridge;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Name the worker registers its agent under.
pub const AGENT_NAME: &str = "Blake-1c1b";

/// Per-process state loaded once and shared by every job.
pub struct WorkerContext {
    http: reqwest::Client,
    pipeline: SpeechPipeline,
}

impl WorkerContext {
    pub fn prewarm(pipeline: SpeechPipeline) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        tracing::info!(
            "Prewarmed worker: model={}, voice={}, stt={}",
            pipeline.llm_model,
            pipeline.voice,
            pipeline.stt.model
        );
        Ok(Self { http, pipeline })
    }

    pub fn pipeline(&self) -> &SpeechPipeline {
        &self.pipeline
    }
}

/// One connected participant: who they are, how to reach them, and the speech backend.
pub struct JobContext<S> {
    pub participant: ParticipantKind,
    pub side_channel: Arc<dyn SideChannel>,
    pub session: Arc<S>,
}

/// Builds the agent for each job and runs its session to completion.
pub struct SessionOrchestrator {
    worker: Arc<WorkerContext>,
    persona: Persona,
    endpoint: Option<String>,
}

impl SessionOrchestrator {
    pub fn new(worker: Arc<WorkerContext>, persona: Persona) -> Self {
        Self {
            worker,
            persona,
            endpoint: None,
        }
    }

    /// Overrides the interview service URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub async fn entrypoint<S: RealtimeSession + 'static>(&self, ctx: JobContext<S>) -> Result<()> {
        tracing::info!("Starting {} for {:?} participant", AGENT_NAME, ctx.participant);

        let relay = TranscriptRelay::new(ctx.side_channel);
        let mut bridge = ToolBridge::new(self.worker.http.clone(), relay.clone());
        if let Some(endpoint) = &self.endpoint {
            bridge = bridge.with_endpoint(endpoint);
        }
        let agent = InterviewAgent::new(self.persona.clone(), bridge);

        let mut session = AgentSession::new(ctx.session);
        session.install_interceptor(&SessionInterceptor::new(relay));

        let config = SessionConfig {
            instructions: agent.instructions().to_string(),
            tools: agent.tools(),
            pipeline: self.worker.pipeline.clone(),
            noise_suppression: NoiseSuppression::for_participant(ctx.participant),
        };
        let events = session
            .start(config)
            .await
            .context("failed to start voice session")?;

        session.run(&agent, events).await;
        tracing::info!("{} session finished", AGENT_NAME);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{GeneratedReply, SessionEvent, ToolCall};
    use crate::test_support::{RecordingChannel, ScriptedSession};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spoken(text: &str) -> GeneratedReply {
        GeneratedReply {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_full_conversation_reaches_the_client_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success": true, "interviewId": "int-7"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        let tool_call = ToolCall {
            call_id: "call_9".to_string(),
            name: "generate_interview".to_string(),
            arguments: r#"{"role": "SRE", "type": "technical", "level": "mid",
                "techstack": "linux,k8s", "amount": "3", "userid": "u1"}"#
                .to_string(),
        };
        let (backend, events) = ScriptedSession::new(vec![
            spoken("Hello! How can I help?"),
            GeneratedReply {
                text: Some("I am generating your interview now.".to_string()),
                tool_calls: vec![tool_call],
            },
            spoken("Your interview is ready."),
        ]);
        let backend = Arc::new(backend);
        let channel = Arc::new(RecordingChannel::new());
        let worker = Arc::new(WorkerContext::prewarm(SpeechPipeline::default()).unwrap());
        let orchestrator = SessionOrchestrator::new(worker, Persona::default())
            .with_endpoint(&server.uri());

        events
            .send(SessionEvent::UserSpeechCommitted("Yes, that's right".to_string()))
            .await
            .unwrap();
        events.send(SessionEvent::Closed).await.unwrap();
        orchestrator
            .entrypoint(JobContext {
                participant: ParticipantKind::Sip,
                side_channel: channel.clone(),
                session: backend.clone(),
            })
            .await
            .unwrap();

        let summary: Vec<String> = channel
            .events()
            .iter()
            .map(|e| match e["type"].as_str().unwrap() {
                "transcription" => format!("{}:{}", e["role"].as_str().unwrap(), e["text"].as_str().unwrap()),
                other => format!("{}:{}", other, e["interviewId"].as_str().unwrap()),
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                "agent:Hello! How can I help?",
                "user:Yes, that's right",
                "agent:I am generating your interview now.",
                "interview_created:int-7",
                "agent:Your interview is ready.",
            ]
        );
        assert_eq!(
            backend.tool_outputs(),
            vec![(
                "call_9".to_string(),
                r#"{"success": true, "interviewId": "int-7"}"#.to_string()
            )]
        );

        let config = backend.started_with().unwrap();
        assert_eq!(config.noise_suppression, NoiseSuppression::Telephony);
        assert_eq!(config.tools[0].name, "generate_interview");
        assert!(config.instructions.contains("interview assistant"));
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let (backend, _events) = ScriptedSession::new(Vec::new());
        let backend = Arc::new(backend);
        let worker = Arc::new(WorkerContext::prewarm(SpeechPipeline::default()).unwrap());
        let orchestrator = SessionOrchestrator::new(worker, Persona::default());
        backend
            .start(ScriptedSession::config(), Default::default())
            .await
            .unwrap();

        let err = orchestrator
            .entrypoint(JobContext {
                participant: ParticipantKind::Standard,
                side_channel: Arc::new(RecordingChannel::new()),
                session: backend,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to start voice session"));
    }
}
