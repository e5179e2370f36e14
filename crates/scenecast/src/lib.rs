#![forbid(unsafe_code)]

//! Scenecast public facade crate.
//!
//! # Role in scenecast
//! This crate is the user-facing entry point. It re-exports the commonly
//! used types from the internal crates (core/term/dump/scene/pty/gateway) so
//! embedders do not need to wire each crate individually.
//!
//! # How it fits in the system
//! - Data model: provided by `scenecast-core`
//! - Terminal emulation and capture: provided by `scenecast-term`
//! - Dump recording and replay: provided by `scenecast-dump`
//! - Scene classification: provided by `scenecast-scene`
//! - PTY sessions: provided by `scenecast-pty`
//! - Gateway, config, and the record engine: provided by `scenecast-gateway`
//!
//! If you only depend on one crate in your application, it should be
//! `scenecast`.

// --- Core re-exports -------------------------------------------------------

pub use scenecast_core::{
    Color, Cursor, DeltaSummary, Line, MessageStyle, QuestionOption, SceneEvent, SceneInput,
    Segment, Snapshot, SnapshotDelta, Style, StyledText, apply_diff, compute_diff, sanitize_text,
};

// --- Terminal re-exports ---------------------------------------------------

pub use scenecast_term::{
    CaptureState, Emulator, FlushScheduler, Marker, VirtualTerm, VirtualTermOptions,
};

// --- Dump re-exports -------------------------------------------------------

pub use scenecast_dump::{
    DumpError, DumpHeader, DumpReader, DumpStats, DumpWriter, ReplayEntry, WriterOptions,
    export_asciicast,
};

// --- Scene re-exports ------------------------------------------------------

pub use scenecast_scene::{
    CompositeScene, Continuation, Scene, ShellScene, ShellSceneOptions, input_encode,
};

// --- PTY re-exports --------------------------------------------------------

pub use scenecast_pty::{PtyConfig, PtySession, spawn, spawn_command};

// --- Gateway re-exports ----------------------------------------------------

pub use scenecast_gateway::{
    Channel, ChannelError, ChannelUpdate, Gateway, GatewayConfig, GatewayError, InputSender,
    RecordError, RecordScript, build_scene, expand_placeholders, run_script,
};
