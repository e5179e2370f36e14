#![forbid(unsafe_code)]

//! Core data model for scenecast.
//!
//! # Why this exists
//! Every other crate in the workspace exchanges the same few value types: rich
//! text lines, snapshots, snapshot deltas, scene events, and channel input.
//! Keeping them in one dependency-light crate lets the terminal side, the dump
//! format, and the scene engine evolve independently.
//!
//! # Modules
//!
//! - [`text`] - Rich text lines, segments, styles, colors.
//! - [`snapshot`] - The [`Snapshot`] capture type and absolute addressing
//!   helpers.
//! - [`delta`] - [`compute_diff`] / [`apply_diff`] and the round-trip
//!   contract the dump format relies on.
//! - [`event`] - The [`SceneEvent`] taxonomy.
//! - [`input`] - [`SceneInput`] and text sanitization.

pub mod delta;
pub mod event;
pub mod input;
pub mod snapshot;
pub mod text;

pub use delta::{DeltaSummary, LineEdit, SnapshotDelta, apply_diff, compute_diff};
pub use event::{MessageStyle, QuestionOption, SceneEvent};
pub use input::{SceneInput, sanitize_text};
pub use snapshot::{Cursor, Snapshot};
pub use text::{Color, Line, Segment, Style, StyledText};
