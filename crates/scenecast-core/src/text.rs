//! Rich text lines: the per-line content model shared by snapshots, deltas,
//! and scene events.
//!
//! A line is either a plain string (the fast path for unstyled content) or an
//! ordered run of segments, where each segment is itself plain or styled. The
//! two shapes are **structurally distinct**: `Line::Plain("x")` never equals
//! `Line::Rich(vec![Segment::plain("x")])`, and the distinction survives
//! serialization (a bare JSON string vs. a one-element array). Collapsing the
//! two would silently change delta output between writer and reader.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A terminal color: a 256-color palette index or an explicit RGB triple.
///
/// Serializes as a bare integer (`3`) for palette entries and a `#rrggbb`
/// string for RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Palette index 0–255.
    Indexed(u8),
    /// 24-bit RGB.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Parse a `#rrggbb` hex triple.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::Rgb(r, g, b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexed(n) => write!(f, "{n}"),
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Indexed(n) => serializer.serialize_u8(*n),
            Self::Rgb(r, g, b) => serializer.serialize_str(&format!("#{r:02x}{g:02x}{b:02x}")),
        }
    }
}

struct ColorVisitor;

impl Visitor<'_> for ColorVisitor {
    type Value = Color;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a palette index 0-255 or a \"#rrggbb\" string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Color, E> {
        u8::try_from(v)
            .map(Color::Indexed)
            .map_err(|_| E::custom(format!("palette index out of range: {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Color, E> {
        u8::try_from(v)
            .map(Color::Indexed)
            .map_err(|_| E::custom(format!("palette index out of range: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Color, E> {
        Color::from_hex(v).ok_or_else(|| E::custom(format!("invalid color literal: {v:?}")))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ColorVisitor)
    }
}

/// SGR attributes carried by a styled segment.
///
/// All fields default to off; only set fields appear in the serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<Color>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dim: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverse: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overline: bool,
}

impl Style {
    /// Whether every attribute is at its default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Reset all attributes to default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Text plus its SGR attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledText {
    pub text: String,
    #[serde(flatten)]
    pub style: Style,
}

/// One run of a rich line: unstyled text or a styled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Plain(String),
    Styled(StyledText),
}

impl Segment {
    /// An unstyled segment.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    /// A styled segment.
    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self::Styled(StyledText {
            text: text.into(),
            style,
        })
    }

    /// The segment's text, ignoring styling.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Styled(st) => &st.text,
        }
    }

    /// Whether this segment carries no attributes.
    #[must_use]
    pub fn is_unstyled(&self) -> bool {
        match self {
            Self::Plain(_) => true,
            Self::Styled(st) => st.style.is_default(),
        }
    }
}

/// A rich text line: the plain-string shorthand or a run of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Line {
    Plain(String),
    Rich(Vec<Segment>),
}

impl Line {
    /// An empty plain line.
    #[must_use]
    pub fn empty() -> Self {
        Self::Plain(String::new())
    }

    /// A plain line.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    /// Concatenated text content, styling ignored.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Rich(segments) => segments.iter().map(Segment::text).collect(),
        }
    }

    /// Whether the line is empty or whitespace-only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Plain(s) => s.trim().is_empty(),
            Self::Rich(segments) => segments.iter().all(|s| s.text().trim().is_empty()),
        }
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Self::Plain(s.to_string())
    }
}

impl From<String> for Line {
    fn from(s: String) -> Self {
        Self::Plain(s)
    }
}
