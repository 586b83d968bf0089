use super::types::GenerateContentRequest;
use crate::ai::classify::is_channel_unavailable;
use crate::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Successful (2xx) `generateContent` reply.
#[derive(Debug, Clone)]
pub struct ContentReply {
    pub status: u16,
    pub body: String,
    pub payload: Value,
}

/// Lightweight REST client for a Gemini-compatible `generateContent` host.
///
/// The model and API key are chosen per call so one client (and its
/// connection pool) can serve every stage and every fallback model.
#[derive(Debug, Clone)]
pub struct GeminiHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self::new_with_client(base_url, timeout, Client::new())
    }

    pub fn new_with_client(base_url: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// POSTs to `{base}/v1beta/models/{model}:generateContent?key={key}`.
    ///
    /// Non-2xx replies are classified into [`Error::ChannelUnavailable`] or
    /// [`Error::ProviderRequest`]; a 2xx body that is not JSON becomes
    /// [`Error::ResponseDecode`].
    pub async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<ContentReply> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                // The URL carries the API key.
                let e = e.without_url();
                tracing::error!("Failed to send request to {}: {}", model, e);
                e
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.without_url())?;

        if !(200..300).contains(&status) {
            tracing::error!("Provider error from {} (status {}): {}", model, status, body);
            return Err(if is_channel_unavailable(status, &body) {
                Error::ChannelUnavailable {
                    model: model.to_string(),
                    status,
                    body,
                }
            } else {
                Error::ProviderRequest {
                    model: model.to_string(),
                    status,
                    body,
                }
            });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => Ok(ContentReply {
                status,
                body,
                payload,
            }),
            Err(e) if is_channel_unavailable(status, &body) => {
                tracing::warn!("Non-JSON channel failure from {}: {}", model, e);
                Err(Error::ChannelUnavailable {
                    model: model.to_string(),
                    status,
                    body,
                })
            }
            Err(e) => {
                tracing::error!("Failed to parse response from {}: {}\nBody: {}", model, e, body);
                Err(Error::ResponseDecode {
                    model: model.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
