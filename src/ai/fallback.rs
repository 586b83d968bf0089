//! Provider client that substitutes models when a channel is unavailable.

use super::classify::is_channel_unavailable;
use super::extract::extract_images;
use super::gemini::{ContentReply, GeminiHttpClient, GenerateContentRequest};
use super::{GeneratedImages, GenerationService};
use crate::error::EmptyResponseKind;
use crate::models::ModelChain;
use crate::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Walks a [`ModelChain`] one model at a time, stopping at the first success.
///
/// Only channel-unavailable failures move on to the next model. Anything else
/// (bad request, auth, a non-channel 5xx, an empty 2xx reply) is raised from
/// the model that produced it.
pub struct FallbackClient {
    http: GeminiHttpClient,
}

impl FallbackClient {
    pub fn new(http: GeminiHttpClient) -> Self {
        Self { http }
    }

    async fn attempt(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<Vec<String>> {
        let reply = self.http.generate_content(model, api_key, request).await?;

        let images = extract_images(&reply.payload)
            .map_err(|kind| empty_reply_error(model, kind, &reply))?;
        if images.is_empty() {
            return Err(empty_reply_error(
                model,
                EmptyResponseKind::NoImageData,
                &reply,
            ));
        }

        debug!("{} returned {} image(s)", model, images.len());
        Ok(images)
    }
}

fn empty_reply_error(model: &str, kind: EmptyResponseKind, reply: &ContentReply) -> Error {
    if is_channel_unavailable(reply.status, &reply.body) {
        Error::ChannelUnavailable {
            model: model.to_string(),
            status: reply.status,
            body: reply.body.clone(),
        }
    } else {
        Error::EmptyResponse {
            model: model.to_string(),
            kind,
        }
    }
}

#[async_trait]
impl GenerationService for FallbackClient {
    async fn generate(
        &self,
        chain: &ModelChain,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeneratedImages> {
        let attempts = chain.attempts();
        let mut last_error = None;

        for (index, model) in attempts.iter().enumerate() {
            match self.attempt(model, api_key, request).await {
                Ok(images) => {
                    if index > 0 {
                        info!("{} served the request in place of {}", model, chain.primary);
                    }
                    return Ok(GeneratedImages {
                        images,
                        model_used: model.clone(),
                    });
                }
                Err(e) if e.is_channel_unavailable() && index + 1 < attempts.len() => {
                    warn!(
                        "{} has no available channels, falling back to {}",
                        model,
                        attempts[index + 1]
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Config("Model chain is empty".to_string())))
    }
}
