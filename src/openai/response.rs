use base64::Engine;
use serde::Deserialize;

use crate::error::{GenerationError, Result};
use crate::models::ImageSource;

/// What a completed generation call boils down to: either image payloads
/// (possibly fewer than requested) or a structured provider error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Images {
        sources: Vec<ImageSource>,
        created: Option<u64>,
        revised_prompts: Vec<String>,
    },
    ProviderError {
        code: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct GenerationsResponse {
    #[serde(default)]
    created: Option<u64>,
    data: Vec<GenerationData>,
}

#[derive(Debug, Deserialize)]
struct GenerationData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// Classify a completed HTTP exchange.
///
/// Non-2xx statuses are only a `ProviderError` when the body carries the
/// provider's error envelope; anything else non-2xx surfaces as
/// `HttpStatus`. A 2xx body that does not match the expected schema is
/// `MalformedResponse`.
pub fn parse(status: u16, body: &[u8]) -> Result<ParsedResponse> {
    if !(200..300).contains(&status) {
        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
            let code = envelope
                .error
                .code
                .or(envelope.error.error_type)
                .unwrap_or_else(|| "unknown".to_string());
            let message = envelope.error.message.unwrap_or_default();
            return Ok(ParsedResponse::ProviderError { code, message });
        }
        return Err(GenerationError::HttpStatus(status));
    }

    let response: GenerationsResponse = serde_json::from_slice(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let mut sources = Vec::with_capacity(response.data.len());
    let mut revised_prompts = Vec::new();
    for item in response.data {
        if let Some(prompt) = item
            .revised_prompt
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            revised_prompts.push(prompt.to_string());
        }

        if let Some(url) = item.url.as_deref().filter(|value| !value.trim().is_empty()) {
            sources.push(ImageSource::Url(url.to_string()));
            continue;
        }
        if let Some(data) = item
            .b64_json
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| {
                    GenerationError::MalformedResponse(format!("invalid base64 image data: {}", e))
                })?;
            sources.push(ImageSource::Bytes(bytes));
            continue;
        }
        // Items with neither url nor b64_json are dropped, not invented.
        log::warn!("Generation item is missing both url and b64_json, skipping");
    }

    if sources.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "response contains no usable image data".to_string(),
        ));
    }

    Ok(ParsedResponse::Images {
        sources,
        created: response.created,
        revised_prompts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_response() {
        let body = serde_json::json!({
            "created": 1690130733u64,
            "data": [{"url": "https://cdn.example.com/a.png"}]
        });
        let parsed = parse(200, body.to_string().as_bytes()).unwrap();
        match parsed {
            ParsedResponse::Images {
                sources, created, ..
            } => {
                assert_eq!(
                    sources,
                    vec![ImageSource::Url("https://cdn.example.com/a.png".to_string())]
                );
                assert_eq!(created, Some(1690130733));
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_b64_response_decodes_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fakepng");
        let body = serde_json::json!({"data": [{"b64_json": encoded}]});
        let parsed = parse(200, body.to_string().as_bytes()).unwrap();
        match parsed {
            ParsedResponse::Images { sources, .. } => {
                assert_eq!(sources, vec![ImageSource::Bytes(b"fakepng".to_vec())]);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let body = serde_json::json!({"data": [{"b64_json": "!!not-base64!!"}]});
        assert!(matches!(
            parse(200, body.to_string().as_bytes()),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_success_with_wrong_schema_is_malformed() {
        assert!(matches!(
            parse(200, br#"{"unexpected": true}"#),
            Err(GenerationError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse(200, b"not json at all"),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_success_with_empty_data_is_malformed() {
        assert!(matches!(
            parse(200, br#"{"created": 1, "data": []}"#),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_envelope_becomes_provider_error() {
        let body = serde_json::json!({
            "error": {"code": "invalid_api_key", "message": "Incorrect API key provided"}
        });
        let parsed = parse(401, body.to_string().as_bytes()).unwrap();
        assert_eq!(
            parsed,
            ParsedResponse::ProviderError {
                code: "invalid_api_key".to_string(),
                message: "Incorrect API key provided".to_string(),
            }
        );
    }

    #[test]
    fn test_error_envelope_falls_back_to_type() {
        let body = serde_json::json!({
            "error": {"type": "server_error", "message": "boom", "code": null}
        });
        let parsed = parse(500, body.to_string().as_bytes()).unwrap();
        assert_eq!(
            parsed,
            ParsedResponse::ProviderError {
                code: "server_error".to_string(),
                message: "boom".to_string(),
            }
        );
    }

    #[test]
    fn test_non_2xx_without_envelope_is_http_status() {
        assert_eq!(
            parse(502, b"<html>Bad Gateway</html>"),
            Err(GenerationError::HttpStatus(502))
        );
    }

    #[test]
    fn test_non_2xx_never_yields_images() {
        let body = serde_json::json!({"data": [{"url": "https://cdn.example.com/a.png"}]});
        let parsed = parse(404, body.to_string().as_bytes());
        assert!(!matches!(parsed, Ok(ParsedResponse::Images { .. })));
    }

    #[test]
    fn test_fewer_images_than_requested_is_not_fatal() {
        let body = serde_json::json!({
            "data": [
                {"url": "https://cdn.example.com/a.png"},
                {"revised_prompt": "a better prompt"}
            ]
        });
        let parsed = parse(200, body.to_string().as_bytes()).unwrap();
        match parsed {
            ParsedResponse::Images {
                sources,
                revised_prompts,
                ..
            } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(revised_prompts, vec!["a better prompt".to_string()]);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }
}
