use crate::client::config::Config;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

const AUTHORIZATION_HEADER: &str = "Authorization";
const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request =
        format!("{}/realtime?model={}", config.base_url(), config.model()).into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        AUTHORIZATION_HEADER,
        format!("Bearer {}", config.api_key().expose_secret()).parse()?,
    );
    headers.insert(OPENAI_BETA_HEADER, "realtime=v1".parse()?);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_request_carries_model_and_auth() {
        let config = Config::builder()
            .with_base_url("wss://realtime.example.com/v1")
            .with_api_key(SecretString::from("sk-test".to_string()))
            .with_model("gpt-4o-realtime-preview")
            .build();

        let request = build_request(&config).unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://realtime.example.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Bearer sk-test");
        assert_eq!(request.headers()[OPENAI_BETA_HEADER], "realtime=v1");
    }
}
