//! Worker configuration, loaded once from the environment at startup.

use interview_core::session::{SpeechPipeline, SttSettings, VadSettings};
use interview_core::tool_bridge::GENERATE_INTERVIEW_URL;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub bind_address: SocketAddr,
    pub pipeline: SpeechPipeline,
    pub interview_api_url: String,
    pub prompts_dir: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, reading `.env.local` and then
    /// `.env` first when they exist.
    ///
    /// *   `OPENAI_API_KEY`: Secret key for the realtime API. Required.
    /// *   `BIND_ADDRESS`: Listen address. Defaults to "0.0.0.0:8081".
    /// *   `REALTIME_MODEL`: Defaults to "gpt-4o-realtime-preview".
    /// *   `REALTIME_VOICE`: Defaults to "alloy".
    /// *   `TRANSCRIPTION_MODEL`: Defaults to "whisper-1".
    /// *   `SPEECH_LANGUAGE`: Defaults to "en".
    /// *   `VAD_THRESHOLD`, `VAD_PREFIX_PADDING_MS`, `VAD_SILENCE_MS`: Voice activity detection.
    /// *   `INTERVIEW_API_URL`: Interview generation endpoint.
    /// *   `PROMPTS_DIR`: (Optional) Directory with persona overrides.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:8081".parse().ok())?;

        let defaults = SpeechPipeline::default();
        let threshold: f32 = parse_or(&lookup, "VAD_THRESHOLD", Some(defaults.vad.threshold))?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue(
                "VAD_THRESHOLD".to_string(),
                format!("{} is outside 0.0..=1.0", threshold),
            ));
        }
        let pipeline = SpeechPipeline {
            vad: VadSettings {
                threshold,
                prefix_padding_ms: parse_or(
                    &lookup,
                    "VAD_PREFIX_PADDING_MS",
                    Some(defaults.vad.prefix_padding_ms),
                )?,
                silence_duration_ms: parse_or(
                    &lookup,
                    "VAD_SILENCE_MS",
                    Some(defaults.vad.silence_duration_ms),
                )?,
            },
            stt: SttSettings {
                model: lookup("TRANSCRIPTION_MODEL").unwrap_or(defaults.stt.model),
                language: lookup("SPEECH_LANGUAGE").unwrap_or(defaults.stt.language),
            },
            llm_model: lookup("REALTIME_MODEL").unwrap_or(defaults.llm_model),
            voice: lookup("REALTIME_VOICE").unwrap_or(defaults.voice),
        };

        let interview_api_url =
            lookup("INTERVIEW_API_URL").unwrap_or_else(|| GENERATE_INTERVIEW_URL.to_string());
        let prompts_dir = lookup("PROMPTS_DIR").map(PathBuf::from);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            openai_api_key,
            bind_address,
            pipeline,
            interview_api_url,
            prompts_dir,
            log_level,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("pipeline", &self.pipeline)
            .field("interview_api_url", &self.interview_api_url)
            .field("prompts_dir", &self.prompts_dir)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}
