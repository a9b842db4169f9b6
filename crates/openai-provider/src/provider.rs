//! Streaming provider over the OpenAI-compatible chat-completions API.

use chat_core::{
    async_trait, CancellationToken, ChatProvider, ChatRequest, ChunkSink, HttpHeader,
    ProviderError,
};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use reqwest_eventsource::{Event, RequestBuilderExt};
use tracing::{debug, warn};

use crate::api_types::{
    ApiError, ChatCompletionChunk, ChatCompletionRequest, ModelListResponse, WireMessage,
};

/// Sentinel the stream sends after the last content chunk.
const DONE_MARKER: &str = "[DONE]";

/// A provider for any HTTP endpoint speaking the OpenAI protocol.
///
/// The endpoint URL and headers arrive with every request - resolved from
/// the settings tiers by the caller - so one provider instance serves every
/// chat regardless of which endpoint each resolves to.
pub struct OpenAiProvider {
    client: Client,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    /// Create a provider with a default HTTP client.
    ///
    /// No request timeout is set: streaming responses are long-lived.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a provider over an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn completions_url(endpoint_url: &str) -> String {
        format!("{}/v1/chat/completions", endpoint_url.trim_end_matches('/'))
    }

    fn models_url(endpoint_url: &str) -> String {
        format!("{}/v1/models", endpoint_url.trim_end_matches('/'))
    }
}

/// Build a header map from the resolved name/value pairs.
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

/// Map an error status and body to a provider error, preferring the body's
/// structured message when one parses.
fn api_error(status: u16, body: &str) -> ProviderError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.to_string(),
    };
    ProviderError::Api { status, message }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        on_chunk: ChunkSink,
        cancel: CancellationToken,
    ) -> Result<(), ProviderError> {
        let url = Self::completions_url(&request.endpoint_url);
        let headers = build_headers(&request.headers)?;

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: true,
            temperature: request.parameters.temperature,
            top_p: request.parameters.top_p,
            max_completion_tokens: request.parameters.max_completion_tokens,
            presence_penalty: request.parameters.presence_penalty,
            frequency_penalty: request.parameters.frequency_penalty,
            seed: request.parameters.seed,
        };

        debug!("POST {} (model: {})", url, body.model);

        let mut source = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .eventsource()
            .map_err(|err| ProviderError::Network(format!("failed to open stream: {}", err)))?;

        while let Some(event) = source.next().await {
            if cancel.is_cancelled() {
                source.close();
                return Err(ProviderError::Cancelled);
            }
            match event {
                Ok(Event::Open) => {
                    debug!("stream opened to {}", url);
                }
                Ok(Event::Message(message)) => {
                    if message.data == DONE_MARKER {
                        source.close();
                        break;
                    }
                    let chunk: ChatCompletionChunk =
                        serde_json::from_str(&message.data).map_err(|err| {
                            source.close();
                            ProviderError::Stream(format!("malformed chunk: {}", err))
                        })?;
                    for choice in &chunk.choices {
                        if let Some(content) = choice.delta.content.as_deref() {
                            if !content.is_empty() {
                                on_chunk(content);
                            }
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    source.close();
                    return Err(api_error(status.as_u16(), &body));
                }
                Err(err) => {
                    source.close();
                    return Err(ProviderError::Network(err.to_string()));
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
        let url = Self::models_url(endpoint_url);
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
            let body = response.text().await.unwrap_or_default();
            warn!("model listing failed with status {}", status);
            return Err(api_error(status.as_u16(), &body));
        }

        let listing: ModelListResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Stream(format!("failed to parse response: {}", err)))?;
        Ok(listing.data.into_iter().map(|entry| entry.id).collect())
    }

    fn name(&self) -> &str {
        "OpenAiProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_trims_trailing_slash() {
        assert_eq!(
            OpenAiProvider::completions_url("http://localhost:8080/"),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(
            OpenAiProvider::models_url("http://localhost:8080"),
            "http://localhost:8080/v1/models"
        );
    }

    #[test]
    fn test_build_headers() {
        let headers = build_headers(&[
            HttpHeader::new("Authorization", "Bearer key"),
            HttpHeader::new("X-Custom", "1"),
        ])
        .unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer key");
        assert_eq!(headers.get("x-custom").unwrap(), "1");
    }

    #[test]
    fn test_build_headers_rejects_invalid_name() {
        let result = build_headers(&[HttpHeader::new("bad header", "x")]);
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[test]
    fn test_api_error_prefers_structured_message() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        match api_error(404, body) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match api_error(500, "plain text failure") {
            ProviderError::Api { message, .. } => assert_eq!(message, "plain text failure"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
