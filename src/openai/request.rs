use std::fmt;

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{GenerationError, Result};
use crate::models::GenerationRequest;

pub const GENERATIONS_PATH: &str = "/v1/images/generations";
pub const MAX_PROMPT_CHARS: usize = 4000;
pub const MAX_IMAGE_COUNT: u8 = 10;

/// A fully prepared HTTP request: URL, JSON body, and header set.
#[derive(Clone)]
pub struct SerializedRequest {
    pub url: String,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

// The authorization header carries the API key; keep it out of {:?}.
impl fmt::Debug for SerializedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (*name, "Bearer ***")
                } else {
                    (*name, value.as_str())
                }
            })
            .collect();
        f.debug_struct("SerializedRequest")
            .field("url", &self.url)
            .field("body", &self.body)
            .field("headers", &headers)
            .finish()
    }
}

/// Turn a request into wire form. Pure, no I/O; all validation happens
/// here so nothing malformed ever reaches the network.
pub fn build(request: &GenerationRequest, config: &Config) -> Result<SerializedRequest> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(GenerationError::InvalidRequest(
            "prompt must not be empty".to_string(),
        ));
    }
    let prompt_chars = prompt.chars().count();
    if prompt_chars > MAX_PROMPT_CHARS {
        return Err(GenerationError::InvalidRequest(format!(
            "prompt is {} characters, provider limit is {}",
            prompt_chars, MAX_PROMPT_CHARS
        )));
    }
    if request.count == 0 || request.count > MAX_IMAGE_COUNT {
        return Err(GenerationError::InvalidRequest(format!(
            "image count {} is outside 1..={}",
            request.count, MAX_IMAGE_COUNT
        )));
    }

    let mut body = Map::<String, Value>::new();
    if let Some(model) = request
        .model
        .as_deref()
        .or(config.provider.model.as_deref())
        .filter(|value| !value.trim().is_empty())
    {
        body.insert("model".to_string(), Value::String(model.to_string()));
    }
    body.insert("prompt".to_string(), Value::String(prompt.to_string()));
    body.insert("n".to_string(), Value::Number(request.count.into()));
    body.insert(
        "size".to_string(),
        Value::String(request.size.as_str().to_string()),
    );
    body.insert(
        "response_format".to_string(),
        serde_json::to_value(request.response_format)
            .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?,
    );

    let url = format!(
        "{}{}",
        config.provider.endpoint.trim_end_matches('/'),
        GENERATIONS_PATH
    );
    let headers = vec![
        ("content-type", "application/json".to_string()),
        (
            "authorization",
            format!("Bearer {}", config.provider.api_key),
        ),
    ];

    Ok(SerializedRequest {
        url,
        body: Value::Object(body).to_string(),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::models::{ImageResponseFormat, ImageSize};

    fn test_config() -> Config {
        Config::new().with_provider(
            ProviderConfig::new()
                .with_endpoint("https://api.openai.com/")
                .with_api_key("sk-test"),
        )
    }

    #[test]
    fn test_body_round_trips_prompt_size_count() {
        let request = GenerationRequest::new("a red cube on white background")
            .with_size(ImageSize::Square512)
            .with_count(2)
            .with_response_format(ImageResponseFormat::B64Json);
        let serialized = build(&request, &test_config()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&serialized.body).unwrap();
        assert_eq!(value["prompt"], "a red cube on white background");
        assert_eq!(value["n"], 2);
        assert_eq!(value["size"], "512x512");
        assert_eq!(value["response_format"], "b64_json");
        assert!(value.get("model").is_none());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let request = GenerationRequest::new("grass");
        let serialized = build(&request, &test_config()).unwrap();
        assert_eq!(
            serialized.url,
            "https://api.openai.com/v1/images/generations"
        );
    }

    #[test]
    fn test_authorization_header_from_config() {
        let request = GenerationRequest::new("grass");
        let serialized = build(&request, &test_config()).unwrap();
        let auth = serialized
            .headers
            .iter()
            .find(|(name, _)| *name == "authorization")
            .map(|(_, value)| value.as_str());
        assert_eq!(auth, Some("Bearer sk-test"));
    }

    #[test]
    fn test_model_falls_back_to_config_default() {
        let config = Config::new().with_provider(
            ProviderConfig::new()
                .with_api_key("sk-test")
                .with_model("dall-e-3"),
        );
        let request = GenerationRequest::new("grass");
        let serialized = build(&request, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&serialized.body).unwrap();
        assert_eq!(value["model"], "dall-e-3");

        let overridden = build(&request.clone().with_model("gpt-image-1"), &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&overridden.body).unwrap();
        assert_eq!(value["model"], "gpt-image-1");
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let request = GenerationRequest::new("   ");
        assert!(matches!(
            build(&request, &test_config()),
            Err(GenerationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_rejects_over_length_prompt() {
        let request = GenerationRequest::new("x".repeat(MAX_PROMPT_CHARS + 1));
        assert!(matches!(
            build(&request, &test_config()),
            Err(GenerationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_rejects_bad_count() {
        for count in [0, MAX_IMAGE_COUNT + 1] {
            let request = GenerationRequest::new("grass").with_count(count);
            assert!(matches!(
                build(&request, &test_config()),
                Err(GenerationError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let request = GenerationRequest::new("grass");
        let serialized = build(&request, &test_config()).unwrap();
        let printed = format!("{:?}", serialized);
        assert!(!printed.contains("sk-test"));
    }
}
