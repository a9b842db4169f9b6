//! Three-tier settings resolution.
//!
//! Pure functions over the tiers: given the global settings plus the
//! optional group and chat overrides, compute the one configuration a
//! generation will actually use, along with the tier that supplied each
//! field. Nothing here caches or stores anything - callers re-run resolution
//! whenever a tier may have changed, so a global edit is visible to the very
//! next send without touching any chat document.

use chat_core::{
    EndpointType, GlobalSettings, HttpHeader, LmParameters, PromptBehavior, SettingsOverrides,
    SystemPromptOverride,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One of the three configuration tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsTier {
    Chat,
    ChatGroup,
    Global,
}

/// Which tier supplied each resolved field.
///
/// Parameter provenance is per key: only keys present somewhere appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSources {
    pub endpoint_type: SettingsTier,
    pub endpoint_url: SettingsTier,
    pub endpoint_headers: SettingsTier,
    pub model: SettingsTier,
    /// The last tier that altered the system-prompt outcome.
    pub system_prompt: SettingsTier,
    pub lm_parameters: IndexMap<&'static str, SettingsTier>,
}

/// The flattened configuration used for a generation.
///
/// Derived, never stored: recompute instead of caching.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub endpoint_type: EndpointType,
    pub endpoint_url: String,
    pub endpoint_headers: Vec<HttpHeader>,
    pub model: Option<String>,
    /// Ordered non-empty prompt segments, each sent as one system message.
    pub system_prompt_segments: Vec<String>,
    pub lm_parameters: LmParameters,
    pub sources: SettingsSources,
}

/// Resolve all three tiers into one effective configuration.
///
/// Simple fields follow first-non-absent precedence Chat > Group > Global.
/// The system prompt is an override/append chain and generation parameters
/// merge per key; see the helpers below.
pub fn resolve(
    global: &GlobalSettings,
    group: Option<&SettingsOverrides>,
    chat: Option<&SettingsOverrides>,
) -> ResolvedSettings {
    let (endpoint_type, endpoint_type_src) = pick(
        chat.and_then(|c| c.endpoint_type),
        group.and_then(|g| g.endpoint_type),
        global.endpoint_type,
    );
    let (endpoint_url, endpoint_url_src) = pick(
        chat.and_then(|c| c.endpoint_url.clone()),
        group.and_then(|g| g.endpoint_url.clone()),
        global.endpoint_url.clone(),
    );
    let (endpoint_headers, endpoint_headers_src) = pick(
        chat.and_then(|c| c.endpoint_headers.clone()),
        group.and_then(|g| g.endpoint_headers.clone()),
        global.endpoint_headers.clone(),
    );
    let (model, model_src) = pick(
        chat.and_then(|c| c.model.clone()).map(Some),
        group.and_then(|g| g.model.clone()).map(Some),
        global.default_model.clone(),
    );

    let (system_prompt_segments, system_prompt_src) = resolve_system_prompt(
        &global.system_prompt,
        group.and_then(|g| g.system_prompt.as_ref()),
        chat.and_then(|c| c.system_prompt.as_ref()),
    );

    let empty = LmParameters::default();
    let chat_params = chat.map(|c| &c.lm_parameters).unwrap_or(&empty);
    let group_params = group.map(|g| &g.lm_parameters).unwrap_or(&empty);
    let lm_parameters = chat_params
        .merged_over(group_params)
        .merged_over(&global.lm_parameters);
    let lm_sources = parameter_sources(&global.lm_parameters, group_params, chat_params);

    ResolvedSettings {
        endpoint_type,
        endpoint_url,
        endpoint_headers,
        model,
        system_prompt_segments,
        lm_parameters,
        sources: SettingsSources {
            endpoint_type: endpoint_type_src,
            endpoint_url: endpoint_url_src,
            endpoint_headers: endpoint_headers_src,
            model: model_src,
            system_prompt: system_prompt_src,
            lm_parameters: lm_sources,
        },
    }
}

/// Resolve as if the chat tier did not exist.
///
/// This is what a chat would get after reverting its own overrides; the UI
/// shows it next to "revert to X" affordances.
pub fn resolve_inherited(
    global: &GlobalSettings,
    group: Option<&SettingsOverrides>,
) -> ResolvedSettings {
    resolve(global, group, None)
}

/// First-non-absent precedence for one simple field.
fn pick<T>(chat: Option<T>, group: Option<T>, global: T) -> (T, SettingsTier) {
    if let Some(value) = chat {
        (value, SettingsTier::Chat)
    } else if let Some(value) = group {
        (value, SettingsTier::ChatGroup)
    } else {
        (global, SettingsTier::Global)
    }
}

/// Apply the override/append chain across the tiers.
///
/// The global raw prompt is the base segment. Each higher tier either
/// replaces the accumulated list (`Override` - empty content suppresses it
/// entirely) or appends its content after it. Only non-empty segments
/// survive into the output, in Global then Group then Chat order.
fn resolve_system_prompt(
    global: &str,
    group: Option<&SystemPromptOverride>,
    chat: Option<&SystemPromptOverride>,
) -> (Vec<String>, SettingsTier) {
    let mut segments = vec![global.to_string()];

    for tier in [group, chat].into_iter().flatten() {
        match tier.behavior {
            PromptBehavior::Override => {
                segments.clear();
                segments.push(tier.content.clone());
            }
            PromptBehavior::Append => segments.push(tier.content.clone()),
        }
    }

    let source = if chat.is_some() {
        SettingsTier::Chat
    } else if group.is_some() {
        SettingsTier::ChatGroup
    } else {
        SettingsTier::Global
    };

    segments.retain(|segment| !segment.is_empty());
    (segments, source)
}

/// Per-key provenance for the merged generation parameters.
fn parameter_sources(
    global: &LmParameters,
    group: &LmParameters,
    chat: &LmParameters,
) -> IndexMap<&'static str, SettingsTier> {
    let mut sources = IndexMap::new();
    for key in LmParameters::KEYS {
        if chat.has_key(key) {
            sources.insert(key, SettingsTier::Chat);
        } else if group.has_key(key) {
            sources.insert(key, SettingsTier::ChatGroup);
        } else if global.has_key(key) {
            sources.insert(key, SettingsTier::Global);
        }
    }
    sources
}
