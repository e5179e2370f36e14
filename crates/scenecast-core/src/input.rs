//! Structured input flowing from channels back into the wrapped program.

use serde::{Deserialize, Serialize};

/// Channel-originated input.
///
/// Text content is sanitized on construction: C0 control bytes other than tab
/// and newline are stripped, and carriage returns are stripped as well because
/// the gateway appends its own CR when forwarding to the PTY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneInput {
    Text { content: String },
    Select { index: usize },
}

impl SceneInput {
    /// Build a text input with control characters stripped.
    #[must_use]
    pub fn text(raw: impl AsRef<str>) -> Self {
        Self::Text {
            content: sanitize_text(raw.as_ref()),
        }
    }

    /// Build a selection input.
    #[must_use]
    pub fn select(index: usize) -> Self {
        Self::Select { index }
    }

    /// Re-apply text sanitization. Deserialized values bypass [`Self::text`],
    /// so the gateway normalizes inputs through this before use.
    #[must_use]
    pub fn sanitized(self) -> Self {
        match self {
            Self::Text { content } => Self::Text {
                content: sanitize_text(&content),
            },
            select @ Self::Select { .. } => select,
        }
    }
}

/// Strip C0 controls except tab and newline; CR is always stripped.
#[must_use]
pub fn sanitize_text(raw: &str) -> String {
    raw.chars()
        .filter(|&c| c == '\t' || c == '\n' || c > '\u{1f}')
        .collect()
}
