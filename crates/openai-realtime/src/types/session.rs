use serde::{Deserialize, Serialize};

/// Session configuration sent with `session.update`.
///
/// Every field is optional on the wire; unset fields keep the server's current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// `["text", "audio"]` for a voice session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    modalities: Vec<String>,

    /// System instructions prepended to every model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// The voice used for synthesized replies, e.g. "alloy".
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_format: Option<AudioFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_format: Option<AudioFormat>,

    /// Speech-to-text settings for the user's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<InputAudioTranscription>,

    /// Noise reduction applied to the user's audio before VAD and transcription.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_noise_reduction: Option<NoiseReduction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    turn_detection: Option<TurnDetection>,

    /// Functions the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,

    /// "auto", "none" or "required".
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder {
            session: Session::default(),
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn input_audio_transcription(&self) -> Option<&InputAudioTranscription> {
        self.input_audio_transcription.as_ref()
    }

    pub fn input_audio_noise_reduction(&self) -> Option<&NoiseReduction> {
        self.input_audio_noise_reduction.as_ref()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.session.modalities = vec!["text".to_string(), "audio".to_string()];
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.session.voice = Some(voice.to_string());
        self
    }

    pub fn with_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.input_audio_format = Some(format);
        self.session.output_audio_format = Some(format);
        self
    }

    pub fn with_input_audio_transcription(mut self, transcription: InputAudioTranscription) -> Self {
        self.session.input_audio_transcription = Some(transcription);
        self
    }

    pub fn with_noise_reduction(mut self, kind: NoiseReductionType) -> Self {
        self.session.input_audio_noise_reduction = Some(NoiseReduction { kind });
        self
    }

    pub fn with_turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.session.turn_detection = Some(turn_detection);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.session.tools = tools;
        self.session.tool_choice = Some("auto".to_string());
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

impl InputAudioTranscription {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseReduction {
    #[serde(rename = "type")]
    kind: NoiseReductionType,
}

impl NoiseReduction {
    pub fn kind(&self) -> NoiseReductionType {
        self.kind
    }
}

/// Near-field suits headsets and laptop microphones, far-field suits phones and rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReductionType {
    NearField,
    FarField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad(ServerVadTurnDetection),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerVadTurnDetection {
    /// Activation threshold for VAD (0.0 to 1.0).
    threshold: f32,

    /// Amount of audio to include before speech starts, in milliseconds.
    prefix_padding_ms: u32,

    /// Duration of silence that ends a turn, in milliseconds.
    silence_duration_ms: u32,

    /// Whether the server starts a reply on its own when a turn ends.
    create_response: bool,

    /// Whether the server cancels the current reply when the user starts speaking.
    interrupt_response: bool,
}

impl Default for ServerVadTurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            create_response: true,
            interrupt_response: true,
        }
    }
}

impl ServerVadTurnDetection {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_prefix_padding_ms(mut self, prefix_padding_ms: u32) -> Self {
        self.prefix_padding_ms = prefix_padding_ms;
        self
    }

    pub fn with_silence_duration_ms(mut self, silence_duration_ms: u32) -> Self {
        self.silence_duration_ms = silence_duration_ms;
        self
    }

    pub fn with_create_response(mut self, create_response: bool) -> Self {
        self.create_response = create_response;
        self
    }

    pub fn with_interrupt_response(mut self, interrupt_response: bool) -> Self {
        self.interrupt_response = interrupt_response;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn create_response(&self) -> bool {
        self.create_response
    }

    pub fn interrupt_response(&self) -> bool {
        self.interrupt_response
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    #[serde(rename = "function")]
    Function(FunctionTool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    name: String,
    description: String,
    /// JSON Schema for the arguments object.
    parameters: serde_json::Value,
}

impl FunctionTool {
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }
}
