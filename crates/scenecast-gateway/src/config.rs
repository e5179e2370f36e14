//! Configuration surface: scene/channel entries and environment placeholder
//! expansion.
//!
//! Placeholders of the form `${NAME}` or `${NAME:default}` are expanded in
//! the raw configuration text *before* structural parsing, so secrets and
//! per-host values never need to appear in the file itself. An unknown name
//! without a default is left untouched.

use std::fmt;

use regex_lite::Regex;
use serde::Deserialize;

use scenecast_scene::{Scene, ShellScene, ShellSceneOptions};

/// Expand `${NAME}` / `${NAME:default}` placeholders using `lookup`.
pub fn expand_placeholders(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(close) = after.find('}') else {
            // Unterminated placeholder: keep the tail verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after[..close];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match lookup(name).or_else(|| default.map(str::to_string)) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str(&rest[start..start + 2 + close + 1]);
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Expand placeholders from the process environment.
#[must_use]
pub fn expand_env_placeholders(raw: &str) -> String {
    expand_placeholders(raw, |name| std::env::var(name).ok())
}

/// One scene entry: a kind plus per-entry options.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// One channel entry. Channel construction is out of this crate's scope;
/// embedders map `kind`/`options` onto their channel implementations.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEntry {
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Top-level configuration for the observation core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

impl GatewayConfig {
    /// Parse from configuration text, expanding `${...}` placeholders first.
    pub fn from_text(
        raw: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_placeholders(raw, lookup);
        serde_json::from_str(&expanded).map_err(ConfigError::Parse)
    }
}

/// Configuration failures.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    UnknownSceneKind(String),
    BadOption { entry: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::UnknownSceneKind(kind) => write!(f, "unknown scene kind: {kind:?}"),
            Self::BadOption { entry, message } => {
                write!(f, "bad option for {entry:?}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Build the built-in scene for an entry. `shell` is the only kind this
/// crate knows; embedders handle their own kinds before falling back here.
pub fn build_scene(entry: &SceneEntry) -> Result<Box<dyn Scene>, ConfigError> {
    match entry.kind.as_str() {
        "shell" => {
            let mut options = ShellSceneOptions::default();
            if let Some(pattern) = entry.options.get("prompt") {
                options.prompt = compile_regex(entry, "prompt", pattern)?;
            }
            if let Some(pattern) = entry.options.get("prompt_prefix") {
                options.prompt_prefix = Some(compile_regex(entry, "prompt_prefix", pattern)?);
            }
            if let Some(priority) = entry.options.get("priority") {
                options.priority = priority
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| ConfigError::BadOption {
                        entry: entry.kind.clone(),
                        message: "priority must be an integer".to_string(),
                    })?;
            }
            Ok(Box::new(ShellScene::new(options)))
        }
        other => Err(ConfigError::UnknownSceneKind(other.to_string())),
    }
}

fn compile_regex(
    entry: &SceneEntry,
    key: &str,
    value: &serde_json::Value,
) -> Result<Regex, ConfigError> {
    let pattern = value.as_str().ok_or_else(|| ConfigError::BadOption {
        entry: entry.kind.clone(),
        message: format!("{key} must be a string"),
    })?;
    Regex::new(pattern).map_err(|e| ConfigError::BadOption {
        entry: entry.kind.clone(),
        message: format!("{key}: {e}"),
    })
}
