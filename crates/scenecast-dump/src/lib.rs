#![forbid(unsafe_code)]

//! Binary session dumps: keyframe + delta recording and replay.
//!
//! # Format
//!
//! A dump is `header, (keyframe | delta)*` where each record is a
//! length-prefixed typed frame ([`frame`]). The first snapshot record is
//! always a keyframe; any snapshot can then be reconstructed by seeking to
//! the nearest preceding keyframe and replaying deltas forward.
//!
//! # Modules
//!
//! - [`frame`] - The on-disk envelope and lazy payload decoding.
//! - [`writer`] - Append-only writing with adaptive keyframing.
//! - [`reader`] - Index, binary-search seek, forward replay.
//! - [`asciicast`] - Asciicast v2 export for playback tooling.

pub mod asciicast;
pub mod frame;
pub mod reader;
pub mod writer;

pub use asciicast::{export_asciicast, export_asciicast_string};
pub use frame::{DumpHeader, Frame, FrameKind, FramePayload, PayloadError};
pub use reader::{DumpError, DumpReader, DumpStats, RecordKind, Replay, ReplayEntry};
pub use writer::{
    DEFAULT_KEYFRAME_INTERVAL_MS, DEFAULT_KEYFRAME_SIZE_RATIO, DumpWriter, WriterOptions,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
