//! Append-only dump writing with adaptive keyframing.
//!
//! The writer opens with a `header` frame, then appends one frame per
//! snapshot. The first snapshot is always a keyframe. After that a delta is
//! preferred, falling back to a keyframe when any of:
//!
//! 1. the keyframe interval elapsed (replay seeks stay cheap),
//! 2. cumulative delta bytes since the last keyframe exceed
//!    `keyframe_size_ratio` times the last keyframe's size,
//! 3. the delta codec reported "keyframe required" (tracking loss or a
//!    backward offset).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use scenecast_core::{Snapshot, compute_diff};

use crate::frame::{DumpHeader, FrameKind, encode_frame};

/// Default keyframe interval in milliseconds.
pub const DEFAULT_KEYFRAME_INTERVAL_MS: u64 = 5000;
/// Default cumulative-delta to keyframe-size ratio.
pub const DEFAULT_KEYFRAME_SIZE_RATIO: f64 = 2.0;

/// Keyframing policy knobs.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub keyframe_interval_ms: u64,
    pub keyframe_size_ratio: f64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            keyframe_interval_ms: DEFAULT_KEYFRAME_INTERVAL_MS,
            keyframe_size_ratio: DEFAULT_KEYFRAME_SIZE_RATIO,
        }
    }
}

/// Append-only keyframe/delta stream writer.
pub struct DumpWriter<W: Write> {
    out: W,
    options: WriterOptions,
    last_snapshot: Option<Snapshot>,
    last_keyframe_timestamp: u64,
    last_keyframe_size: usize,
    delta_bytes_since_keyframe: usize,
    keyframes: u64,
    deltas: u64,
}

impl DumpWriter<BufWriter<File>> {
    /// Create a dump file and write its header frame.
    pub fn create(
        path: impl AsRef<Path>,
        command: &[String],
        options: WriterOptions,
    ) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Self::new(file, command, options)
    }
}

impl<W: Write> DumpWriter<W> {
    /// Wrap a sink and write the header frame.
    pub fn new(mut out: W, command: &[String], options: WriterOptions) -> io::Result<Self> {
        let header = DumpHeader {
            command: command.to_vec(),
        };
        let payload = serde_json::to_vec(&header).map_err(io::Error::other)?;
        out.write_all(&encode_frame(
            FrameKind::Header,
            crate::now_ms(),
            &payload,
        ))?;
        Ok(Self {
            out,
            options,
            last_snapshot: None,
            last_keyframe_timestamp: 0,
            last_keyframe_size: 0,
            delta_bytes_since_keyframe: 0,
            keyframes: 0,
            deltas: 0,
        })
    }

    /// Append one snapshot, choosing keyframe vs delta per policy.
    pub fn append(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let delta_payload = match &self.last_snapshot {
            None => None,
            Some(last) => {
                let interval_elapsed = snapshot
                    .timestamp
                    .saturating_sub(self.last_keyframe_timestamp)
                    >= self.options.keyframe_interval_ms;
                let size_exceeded = self.delta_bytes_since_keyframe as f64
                    > self.options.keyframe_size_ratio * self.last_keyframe_size as f64;
                if interval_elapsed || size_exceeded {
                    None
                } else {
                    compute_diff(last, snapshot)
                        .map(|delta| serde_json::to_vec(&delta).map_err(io::Error::other))
                        .transpose()?
                }
            }
        };

        match delta_payload {
            Some(payload) => {
                self.delta_bytes_since_keyframe += payload.len();
                self.out.write_all(&encode_frame(
                    FrameKind::Delta,
                    snapshot.timestamp,
                    &payload,
                ))?;
                self.deltas += 1;
            }
            None => {
                let payload = serde_json::to_vec(snapshot).map_err(io::Error::other)?;
                self.last_keyframe_size = payload.len();
                self.last_keyframe_timestamp = snapshot.timestamp;
                self.delta_bytes_since_keyframe = 0;
                self.out.write_all(&encode_frame(
                    FrameKind::Keyframe,
                    snapshot.timestamp,
                    &payload,
                ))?;
                self.keyframes += 1;
            }
        }

        self.last_snapshot = Some(snapshot.clone());
        Ok(())
    }

    /// Keyframes written so far.
    #[must_use]
    pub fn keyframes(&self) -> u64 {
        self.keyframes
    }

    /// Deltas written so far.
    #[must_use]
    pub fn deltas(&self) -> u64 {
        self.deltas
    }

    /// Flush buffered bytes to the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Flush and close, returning the sink.
    pub fn end(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
