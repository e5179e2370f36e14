#![forbid(unsafe_code)]

//! Scene classification: snapshots in, semantic events out.
//!
//! A [`Scene`] is a small state machine that watches consecutive snapshots
//! and narrates them as [`SceneEvent`]s. The [`CompositeScene`] orchestrates
//! several scenes with a priority + continuation + preemption discipline; the
//! [`ShellScene`] is the concrete reference implementation for an ordinary
//! shell prompt.
//!
//! # Modules
//!
//! - [`composite`] - Priority selection, firm/tentative continuation,
//!   preemption scan.
//! - [`shell`] - The reference shell scene.
//! - [`input_encode`] - Key-sequence helpers for scenes that translate
//!   structured input into PTY bytes.

use scenecast_core::{SceneEvent, SceneInput, Snapshot};

pub mod composite;
pub mod input_encode;
pub mod shell;

pub use composite::CompositeScene;
pub use shell::{ShellScene, ShellSceneOptions};

/// The outcome of a scene's stateful continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    pub events: Vec<SceneEvent>,
    /// A firm match is decisive: the composite skips its preemption scan.
    /// A tentative match invites higher-confidence scenes to take over.
    pub firm: bool,
}

impl Continuation {
    /// A firm continuation carrying the given events.
    #[must_use]
    pub fn firm(events: Vec<SceneEvent>) -> Self {
        Self { events, firm: true }
    }

    /// A tentative continuation carrying the given events.
    #[must_use]
    pub fn tentative(events: Vec<SceneEvent>) -> Self {
        Self {
            events,
            firm: false,
        }
    }
}

/// A classifier mapping snapshots to semantic events.
///
/// Scenes own internal state for the lifetime of the process (or until
/// replaced). `detect` asks "does this snapshot look like your territory?"
/// from a cold start; `continue_scene` advances an already-active scene and
/// releases it by returning `None`.
pub trait Scene {
    /// Ordering among scenes; lower priorities are tried first.
    fn priority(&self) -> i32;

    /// Diagnostic state label, `None` while inactive.
    fn state(&self) -> Option<String>;

    /// Cold-start check. A non-`None` return activates the scene; the events
    /// describe the newly recognized state.
    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>>;

    /// Advance an active scene. `None` releases it.
    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<Continuation>;

    /// Translate structured input into PTY bytes; `None` declines.
    fn encode_input(&mut self, input: &SceneInput) -> Option<Vec<u8>> {
        let _ = input;
        None
    }
}
