use serde::{Deserialize, Serialize};

/// Where a single pipeline run currently is. `Done` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Submitting,
    AwaitingResponse,
    FetchingImage,
    Decoding,
    Done,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Submitting => "submitting",
            Stage::AwaitingResponse => "awaiting_response",
            Stage::FetchingImage => "fetching_image",
            Stage::Decoding => "decoding",
            Stage::Done => "done",
        }
    }
}

pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-2";

/// Image models the request may name, in the provider's catalog order.
pub fn supported_models() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("dall-e-2", "DALL-E 2", "OpenAI"),
        ("dall-e-3", "DALL-E 3", "OpenAI"),
        ("gpt-image-1", "GPT Image 1", "OpenAI"),
    ]
}
