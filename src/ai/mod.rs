//! Generation provider integration
//!
//! Builds `generateContent` requests, talks to the provider over HTTP, walks
//! its loosely-shaped responses for image data, and substitutes models when the
//! provider reports that no channel is available.

pub mod classify;
pub mod extract;
pub mod fallback;
pub mod gemini;
pub mod mime;
pub mod mock;
pub mod payload;

pub use fallback::FallbackClient;
pub use gemini::{GeminiHttpClient, GenerateContentRequest, InlineData, Part};
pub use mock::MockGenerationClient;

use crate::models::ModelChain;
use crate::Result;
use async_trait::async_trait;

/// Images produced by one provider call and the model that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImages {
    pub images: Vec<String>,
    pub model_used: String,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Run `request` against `chain`, returning base64 image data.
    ///
    /// The reported `model_used` may differ from `chain.primary` when the
    /// primary had no available channels.
    async fn generate(
        &self,
        chain: &ModelChain,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeneratedImages>;
}
