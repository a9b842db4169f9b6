//! Configuration types for the three settings tiers.
//!
//! [`GlobalSettings`] is the process-wide base tier. [`SettingsOverrides`] is
//! the sparse per-group and per-chat tier: every field is optional, and an
//! absent field means "defer to the next tier down". Merging the tiers is the
//! resolver's job (in the state crate); these types only carry the data.

use serde::{Deserialize, Serialize};

/// Which kind of backend an endpoint points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointType {
    /// Any HTTP server speaking the OpenAI chat-completions protocol.
    OpenAiCompatible,
    /// An Ollama server.
    Ollama,
    /// An inference engine running inside this process.
    InProcess,
}

/// Which storage backend persists chats and settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageType {
    /// Volatile in-memory storage, lost on exit.
    InMemory,
    /// Durable local storage.
    Local,
}

/// A single HTTP header sent with every provider request.
///
/// Kept as an ordered name/value pair rather than a map so the user-defined
/// header order survives round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    /// Create a header from name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Sparse generation parameters.
///
/// Every field is optional; merging across tiers happens per key, not per
/// record, so a chat may pin only `temperature` while still inheriting the
/// group's `top_p`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LmParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl LmParameters {
    /// All parameter keys, in canonical order.
    pub const KEYS: [&'static str; 6] = [
        "temperature",
        "top_p",
        "max_completion_tokens",
        "presence_penalty",
        "frequency_penalty",
        "seed",
    ];

    /// True when no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.present_keys().is_empty()
    }

    /// Whether a given key is set on this record.
    pub fn has_key(&self, key: &str) -> bool {
        match key {
            "temperature" => self.temperature.is_some(),
            "top_p" => self.top_p.is_some(),
            "max_completion_tokens" => self.max_completion_tokens.is_some(),
            "presence_penalty" => self.presence_penalty.is_some(),
            "frequency_penalty" => self.frequency_penalty.is_some(),
            "seed" => self.seed.is_some(),
            _ => false,
        }
    }

    /// The keys set on this record, in canonical order.
    pub fn present_keys(&self) -> Vec<&'static str> {
        Self::KEYS
            .iter()
            .copied()
            .filter(|key| self.has_key(key))
            .collect()
    }

    /// Merge this record over a base record, key by key.
    ///
    /// For every key, `self`'s value wins when present, otherwise the base
    /// value is kept.
    pub fn merged_over(&self, base: &LmParameters) -> LmParameters {
        LmParameters {
            temperature: self.temperature.or(base.temperature),
            top_p: self.top_p.or(base.top_p),
            max_completion_tokens: self.max_completion_tokens.or(base.max_completion_tokens),
            presence_penalty: self.presence_penalty.or(base.presence_penalty),
            frequency_penalty: self.frequency_penalty.or(base.frequency_penalty),
            seed: self.seed.or(base.seed),
        }
    }
}

/// How a tier's system prompt combines with the tiers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptBehavior {
    /// Replace everything the lower tiers produced. Empty content suppresses
    /// the system prompt entirely.
    Override,
    /// Add this tier's content as an additional segment after the lower
    /// tiers' output.
    Append,
}

/// A group- or chat-tier system prompt override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptOverride {
    pub content: String,
    pub behavior: PromptBehavior,
}

impl SystemPromptOverride {
    /// An override that replaces the inherited prompt with `content`.
    pub fn replace(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            behavior: PromptBehavior::Override,
        }
    }

    /// An override that appends `content` to the inherited prompt.
    pub fn append(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            behavior: PromptBehavior::Append,
        }
    }

    /// An override that suppresses the inherited prompt entirely.
    pub fn suppress() -> Self {
        Self::replace("")
    }
}

/// Optional per-field overrides carried by a chat or a chat group.
///
/// Absence of a field always means "inherit". There is deliberately no way to
/// express "replace the whole record" - the resolver merges field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_headers: Option<Vec<HttpHeader>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<SystemPromptOverride>,
    #[serde(default, skip_serializing_if = "LmParameters::is_empty")]
    pub lm_parameters: LmParameters,
}

impl SettingsOverrides {
    /// True when no field is overridden.
    pub fn is_empty(&self) -> bool {
        self.endpoint_type.is_none()
            && self.endpoint_url.is_none()
            && self.endpoint_headers.is_none()
            && self.model.is_none()
            && self.system_prompt.is_none()
            && self.lm_parameters.is_empty()
    }
}

/// A named endpoint preset the user can apply to the global settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub endpoint_type: EndpointType,
    pub endpoint_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_headers: Vec<HttpHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// The global (base) settings tier.
///
/// Created with defaults on first run, loaded from storage at startup and
/// mutated only through the settings store's explicit update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub endpoint_type: EndpointType,
    pub endpoint_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint_headers: Vec<HttpHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "LmParameters::is_empty")]
    pub lm_parameters: LmParameters,
    pub storage_type: StorageType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_profiles: Vec<ProviderProfile>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            endpoint_type: EndpointType::OpenAiCompatible,
            endpoint_url: String::new(),
            endpoint_headers: Vec::new(),
            default_model: None,
            system_prompt: String::new(),
            lm_parameters: LmParameters::default(),
            storage_type: StorageType::InMemory,
            provider_profiles: Vec::new(),
        }
    }
}

impl GlobalSettings {
    /// Look up a provider profile by name.
    pub fn profile(&self, name: &str) -> Option<&ProviderProfile> {
        self.provider_profiles.iter().find(|p| p.name == name)
    }

    /// Apply a profile's endpoint fields in place.
    pub fn apply_profile(&mut self, profile: &ProviderProfile) {
        self.endpoint_type = profile.endpoint_type;
        self.endpoint_url = profile.endpoint_url.clone();
        self.endpoint_headers = profile.endpoint_headers.clone();
        if profile.default_model.is_some() {
            self.default_model = profile.default_model.clone();
        }
    }
}
