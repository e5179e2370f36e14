#![forbid(unsafe_code)]

//! Wiring for the observation pipeline: scenes to channels, configuration,
//! and scripted recording.
//!
//! # Modules
//!
//! - [`gateway`] - [`Gateway`]: composite scene fan-out to [`Channel`]s,
//!   channel-originated input routing.
//! - [`config`] - Scene/channel entries and `${NAME}` placeholder expansion.
//! - [`record`] - Script-driven deterministic dump capture.

pub mod config;
pub mod gateway;
pub mod record;

pub use config::{
    ChannelEntry, ConfigError, GatewayConfig, SceneEntry, build_scene, expand_env_placeholders,
    expand_placeholders,
};
pub use gateway::{
    Channel, ChannelError, ChannelUpdate, Gateway, GatewayError, InputSender, PtyWriter,
};
pub use record::{RecordError, RecordScript, Step, StepKeyword, WaitSpec, run_script};
