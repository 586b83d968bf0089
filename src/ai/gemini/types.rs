//! Request payload types for the `generateContent` endpoint.
//!
//! Responses are deliberately not modelled here: the provider returns image
//! parts under more than one key spelling, so they are read as untyped JSON by
//! [`crate::ai::extract`].

use serde::{Deserialize, Serialize};

/// Top-level `generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Single user turn asking for image output only.
    pub fn image_request(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }

    /// Parts of the first (and only) user turn.
    pub fn parts(&self) -> &[Part] {
        self.contents
            .first()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Untagged union of text and inline media content parts.
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }

    pub fn as_inline_data(&self) -> Option<&InlineData> {
        match self {
            Self::InlineData { inline_data } => Some(inline_data),
            Self::Text { .. } => None,
        }
    }
}

impl From<InlineData> for Part {
    fn from(inline_data: InlineData) -> Self {
        Self::InlineData { inline_data }
    }
}

/// Base64 inline payload, sent with snake_case keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}
