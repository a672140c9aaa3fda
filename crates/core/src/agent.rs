use crate::session::{InterruptionGate, ReplyOptions, ToolCall};
use crate::tool_bridge::{InterviewRequest, ToolBridge, ToolError};
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::Serialize;
use serde_json::Value;

pub const GENERATE_INTERVIEW_TOOL: &str = "generate_interview";

const DEFAULT_INSTRUCTIONS: &str = r#"You are a professional AI interview assistant.

Collect the following details from the user, one at a time:
- the job role they want to train for
- their experience level
- the interview type: technical, behavioral or mixed
- the tech stack to cover
- how many questions to prepare
- their user id

Ask only one question at a time and wait for the answer before asking the next.
Once you have every detail, confirm them briefly with the user.
When the user confirms, say "I am generating your interview now." and then call the generate_interview tool with the collected details.

Respond in plain natural speech suitable for voice. No JSON. No markdown."#;

const DEFAULT_GREETING: &str = "Greet the user and offer your assistance.";

/// What the agent says and how it opens the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Standing instructions for the whole session.
    pub instructions: String,
    /// Instructions for the opening reply.
    pub greeting: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// A function the model may call, with its JSON-schema parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The interview assistant: its persona plus the `generate_interview` tool.
pub struct InterviewAgent {
    persona: Persona,
    bridge: ToolBridge,
}

impl InterviewAgent {
    pub fn new(persona: Persona, bridge: ToolBridge) -> Self {
        Self { persona, bridge }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn instructions(&self) -> &str {
        &self.persona.instructions
    }

    /// Options for the first reply of the session. The greeting can be interrupted.
    pub fn greeting_options(&self) -> ReplyOptions {
        ReplyOptions {
            instructions: Some(self.persona.greeting.clone()),
            allow_interruptions: true,
        }
    }

    pub fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: GENERATE_INTERVIEW_TOOL.to_string(),
            description: "Generate interview questions based on user details".to_string(),
            parameters: parameters_schema::<InterviewRequest>(),
        }]
    }

    /// Dispatches one tool call from the model.
    ///
    /// `generate_interview` only reaches the service once all six fields are present
    /// and non-blank.
    pub async fn call_tool(
        &self,
        call: &ToolCall,
        interruptions: &InterruptionGate,
    ) -> Result<String, ToolError> {
        if call.name != GENERATE_INTERVIEW_TOOL {
            return Err(ToolError::UnknownTool(call.name.clone()));
        }

        let request: InterviewRequest = serde_json::from_str(&call.arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let blank = request.blank_fields();
        if !blank.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "missing {}",
                blank.join(", ")
            )));
        }

        self.bridge.invoke(interruptions, &request).await
    }
}

// Inline schema without the root `$schema` and `title` keys, the shape function
// parameters are declared in.
fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();
    let mut value = Value::from(schema);
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::TranscriptRelay;
    use crate::test_support::RecordingChannel;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent_with_endpoint(endpoint: &str) -> InterviewAgent {
        let relay = TranscriptRelay::new(Arc::new(RecordingChannel::new()));
        let bridge = ToolBridge::new(reqwest::Client::new(), relay).with_endpoint(endpoint);
        InterviewAgent::new(Persona::default(), bridge)
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            call_id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    const FULL_ARGUMENTS: &str = r#"{
        "role": "Frontend Developer",
        "type": "mixed",
        "level": "junior",
        "techstack": "react,typescript",
        "amount": "10",
        "userid": "u-42"
    }"#;

    #[test]
    fn test_tool_schema_declares_six_required_fields() {
        let agent = agent_with_endpoint("http://127.0.0.1:9");

        let tools = agent.tools();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "generate_interview");
        let parameters = &tools[0].parameters;
        assert_eq!(parameters["type"], "object");
        assert!(parameters.get("$schema").is_none());
        let mut required: Vec<_> = parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        required.sort();
        assert_eq!(
            required,
            vec!["amount", "level", "role", "techstack", "type", "userid"]
        );
        let kinds = parameters["properties"]["type"]["enum"].as_array().unwrap();
        assert_eq!(kinds.len(), 3);
        assert!(
            parameters["properties"]["role"]["description"]
                .as_str()
                .unwrap()
                .contains("role")
        );
    }

    #[test]
    fn test_greeting_allows_interruptions() {
        let agent = agent_with_endpoint("http://127.0.0.1:9");

        let options = agent.greeting_options();

        assert!(options.allow_interruptions);
        assert_eq!(
            options.instructions.as_deref(),
            Some("Greet the user and offer your assistance.")
        );
        assert!(agent.instructions().contains("generate_interview"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let agent = agent_with_endpoint("http://127.0.0.1:9");

        let err = agent
            .call_tool(&call("lookup_weather", "{}"), &InterruptionGate::default())
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::UnknownTool("lookup_weather".to_string()));
    }

    #[tokio::test]
    async fn test_blank_fields_never_reach_the_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let agent = agent_with_endpoint(&server.uri());
        let arguments = FULL_ARGUMENTS.replace("\"u-42\"", "\"\"");

        let err = agent
            .call_tool(
                &call(GENERATE_INTERVIEW_TOOL, &arguments),
                &InterruptionGate::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::InvalidArguments("missing userid".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_interview_type_is_invalid() {
        let agent = agent_with_endpoint("http://127.0.0.1:9");
        let arguments = FULL_ARGUMENTS.replace("\"mixed\"", "\"panel\"");

        let err = agent
            .call_tool(
                &call(GENERATE_INTERVIEW_TOOL, &arguments),
                &InterruptionGate::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_complete_call_reaches_the_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
            .expect(1)
            .mount(&server)
            .await;
        let agent = agent_with_endpoint(&format!("{}/generate", server.uri()));

        let output = agent
            .call_tool(
                &call(GENERATE_INTERVIEW_TOOL, FULL_ARGUMENTS),
                &InterruptionGate::default(),
            )
            .await
            .unwrap();

        assert_eq!(output, "queued");
    }
}
