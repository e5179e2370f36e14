//! Semantic events produced by scenes and consumed by channels.

use serde::{Deserialize, Serialize};

use crate::text::Line;

/// Rendering style of an emitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStyle {
    /// Free-flowing program output.
    Text,
    /// A delimited unit, e.g. an echoed command line.
    Block,
}

/// One selectable option of a question or permission prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A high-level event derived from consecutive snapshots.
///
/// `SceneStateChanged` is emitted only by the gateway when the composite's
/// diagnostic state label changes between updates; individual scenes never
/// produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneEvent {
    IndicatorChanged {
        active: bool,
        text: String,
    },
    MessageCreated {
        style: MessageStyle,
        content: Vec<Line>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        echo: Option<bool>,
    },
    LastMessageUpdated {
        style: MessageStyle,
        /// `None` deletes the previously created message.
        content: Option<Vec<Line>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        echo: Option<bool>,
    },
    InputChanged {
        active: bool,
        text: String,
    },
    QuestionCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        question: String,
        options: Vec<QuestionOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    LastQuestionUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        question: String,
        options: Vec<QuestionOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    PermissionRequired {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        options: Vec<QuestionOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    SceneStateChanged {
        state: Option<String>,
    },
}
