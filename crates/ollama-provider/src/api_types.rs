//! Wire types for the Ollama chat API.

use chat_core::{ChatMessage, LmParameters, MessageRole};
use serde::{Deserialize, Serialize};

/// One message in the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: message.content.clone(),
        }
    }
}

/// Generation options in Ollama's naming.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Ollama's name for the completion-token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl From<&LmParameters> for ChatOptions {
    fn from(parameters: &LmParameters) -> Self {
        Self {
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            num_predict: parameters.max_completion_tokens,
            presence_penalty: parameters.presence_penalty,
            frequency_penalty: parameters.frequency_penalty,
            seed: parameters.seed,
        }
    }
}

impl ChatOptions {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.num_predict.is_none()
            && self.presence_penalty.is_none()
            && self.frequency_penalty.is_none()
            && self.seed.is_none()
    }
}

/// Request body for a streaming chat call.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

/// One NDJSON line of a streamed chat response.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
}

/// Response of the tag-listing endpoint.
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TagEntry {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_map_parameter_names() {
        let parameters = LmParameters {
            temperature: Some(0.2),
            max_completion_tokens: Some(256),
            ..Default::default()
        };
        let options = ChatOptions::from(&parameters);
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.num_predict, Some(256));
        assert!(!options.is_empty());

        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains("num_predict"));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn test_empty_options() {
        assert!(ChatOptions::from(&LmParameters::default()).is_empty());
    }

    #[test]
    fn test_chunk_parsing() {
        let line = r#"{"model":"qwen2-5-72b","message":{"role":"assistant","content":"Hi"},"done":false}"#;
        let chunk: OllamaChatChunk = serde_json::from_str(line).unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hi");
        assert!(!chunk.done);

        let last = r#"{"model":"qwen2-5-72b","done":true,"total_duration":12345}"#;
        let chunk: OllamaChatChunk = serde_json::from_str(last).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.is_none());
    }

    #[test]
    fn test_tags_parsing() {
        let body = r#"{"models":[{"name":"llama3.3:latest","size":1},{"name":"qwen2.5:72b","size":2}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<_> = tags.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["llama3.3:latest", "qwen2.5:72b"]);
    }
}
