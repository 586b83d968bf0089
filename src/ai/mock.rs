use super::{GeneratedImages, GenerateContentRequest, GenerationService};
use crate::models::ModelChain;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted outcome for one mock call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Images(Vec<String>),
    /// Served by a fallback model instead of the chain's primary.
    Substituted { model: String, images: Vec<String> },
    ProviderError { status: u16, body: String },
    ChannelUnavailable,
}

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub chain: ModelChain,
    pub api_key: String,
    pub request: GenerateContentRequest,
}

/// In-memory [`GenerationService`] that records every call.
///
/// Replies are consumed in call order; once the script runs out every call
/// succeeds with a single image derived from the call number.
#[derive(Clone)]
pub struct MockGenerationClient {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_images(self, images: &[&str]) -> Self {
        self.with_reply(MockReply::Images(
            images.iter().map(|i| i.to_string()).collect(),
        ))
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for MockGenerationClient {
    async fn generate(
        &self,
        chain: &ModelChain,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeneratedImages> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                chain: chain.clone(),
                api_key: api_key.to_string(),
                request: request.clone(),
            });
            calls.len()
        };

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(GeneratedImages {
                images: vec![format!("image-{}", call_number)],
                model_used: chain.primary.clone(),
            }),
            Some(MockReply::Images(images)) => Ok(GeneratedImages {
                images,
                model_used: chain.primary.clone(),
            }),
            Some(MockReply::Substituted { model, images }) => Ok(GeneratedImages {
                images,
                model_used: model,
            }),
            Some(MockReply::ProviderError { status, body }) => Err(Error::ProviderRequest {
                model: chain.primary.clone(),
                status,
                body,
            }),
            Some(MockReply::ChannelUnavailable) => Err(Error::ChannelUnavailable {
                model: chain.attempts().last().cloned().unwrap_or_default(),
                status: 503,
                body: "No available channels".to_string(),
            }),
        }
    }
}
