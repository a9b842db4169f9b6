//! Streaming provider over the Ollama chat API.

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, HttpHeader,
    ProviderError,
};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

use crate::api_types::{ChatOptions, OllamaChatChunk, OllamaChatRequest, TagsResponse, WireMessage};

/// A provider for a local or remote Ollama server.
///
/// Ollama streams newline-delimited JSON; each line carries one content
/// fragment and the final line is flagged `done`. The cancellation token is
/// polled between network reads.
pub struct OllamaProvider {
    client: Client,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaProvider {
    /// Create a provider with a default HTTP client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a provider over an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn chat_url(endpoint_url: &str) -> String {
        format!("{}/api/chat", endpoint_url.trim_end_matches('/'))
    }

    fn tags_url(endpoint_url: &str) -> String {
        format!("{}/api/tags", endpoint_url.trim_end_matches('/'))
    }
}

fn build_headers(headers: &[HttpHeader]) -> Result<HeaderMap, ProviderError> {
    let mut map = HeaderMap::new();
    for header in headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| {
            ProviderError::Configuration(format!("invalid header name: {}", header.name))
        })?;
        let value = HeaderValue::from_str(&header.value).map_err(|_| {
            ProviderError::Configuration(format!("invalid value for header {}", header.name))
        })?;
        map.append(name, value);
    }
    Ok(map)
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        let url = Self::chat_url(&request.endpoint_url);
        let headers = build_headers(&request.headers)?;

        let options = ChatOptions::from(&request.parameters);
        let body = OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: true,
            options: (!options.is_empty()).then_some(options),
        };

        debug!("POST {} (model: {})", url, body.model);

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Network(format!("failed to send request: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(next) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            let bytes = next.map_err(|err| ProviderError::Stream(err.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if line.is_empty() {
                    continue;
                }

                let chunk: OllamaChatChunk = serde_json::from_str(&line)
                    .map_err(|err| ProviderError::Stream(format!("malformed chunk: {}", err)))?;
                if let Some(message) = chunk.message {
                    if !message.content.is_empty() {
                        on_chunk(&message.content);
                    }
                }
                if chunk.done {
                    return Ok(());
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }

    async fn list_models(
        &self,
        endpoint_url: &str,
        headers: &[HttpHeader],
    ) -> Result<Vec<String>, ProviderError> {
        let url = Self::tags_url(endpoint_url);
        let headers = build_headers(headers)?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|err| ProviderError::Network(format!("failed to send request: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("tag listing failed with status {}", status);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Stream(format!("failed to parse response: {}", err)))?;
        Ok(tags.models.into_iter().map(|entry| entry.name).collect())
    }

    fn name(&self) -> &str {
        "OllamaProvider"
    }
}
