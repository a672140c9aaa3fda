use secrecy::SecretString;

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const BASE_URL: &str = "wss://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Connection settings for the realtime endpoint.
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.config.api_key = api_key;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    /// Reads the key from `OPENAI_API_KEY`; an unset variable yields an empty key
    /// and the server rejects the handshake.
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            api_key: std::env::var(API_KEY_VAR).unwrap_or_default().into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}
