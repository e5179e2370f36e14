//! Length-prefixed typed frames: the on-disk envelope of a dump.
//!
//! Each frame is:
//!
//! ```text
//! +------+--------------------+--------------------+------------------+
//! | tag  | timestamp          | payload length     | payload          |
//! | u8   | f64 big-endian ms  | u32 big-endian     | JSON bytes       |
//! +------+--------------------+--------------------+------------------+
//! ```
//!
//! Tags: 1 = header, 2 = keyframe, 3 = delta. Unknown tags are skippable
//! (their envelope still declares a length); a truncated envelope or payload
//! ends iteration without error. The payload is decoded lazily: the envelope
//! is parsed eagerly, the JSON body only on first access, then cached.

use std::cell::OnceCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use scenecast_core::{Snapshot, SnapshotDelta};

/// Envelope size: tag + timestamp + length.
pub const ENVELOPE_LEN: usize = 1 + 8 + 4;

pub const TAG_HEADER: u8 = 1;
pub const TAG_KEYFRAME: u8 = 2;
pub const TAG_DELTA: u8 = 3;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Header,
    Keyframe,
    Delta,
}

impl FrameKind {
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Header => TAG_HEADER,
            Self::Keyframe => TAG_KEYFRAME,
            Self::Delta => TAG_DELTA,
        }
    }

    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_HEADER => Some(Self::Header),
            TAG_KEYFRAME => Some(Self::Keyframe),
            TAG_DELTA => Some(Self::Delta),
            _ => None,
        }
    }
}

/// The `header` frame payload: how the recorded session was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpHeader {
    pub command: Vec<String>,
}

/// Decoded payload of a frame, cached after first access.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Header(DumpHeader),
    Keyframe(Snapshot),
    Delta(SnapshotDelta),
}

/// Payload decode failure.
#[derive(Debug)]
pub struct PayloadError {
    pub kind: FrameKind,
    pub source: serde_json::Error,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {:?} frame payload: {}", self.kind, self.source)
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A parsed frame envelope with a lazily decoded payload.
#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    /// Milliseconds since epoch, from the envelope.
    pub timestamp: u64,
    raw: Vec<u8>,
    cache: OnceCell<FramePayload>,
}

impl Frame {
    /// Raw payload bytes.
    #[must_use]
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw
    }

    /// Decode the payload (first call decodes and caches).
    pub fn payload(&self) -> Result<&FramePayload, PayloadError> {
        if let Some(decoded) = self.cache.get() {
            return Ok(decoded);
        }
        let decoded = match self.kind {
            FrameKind::Header => {
                FramePayload::Header(serde_json::from_slice(&self.raw).map_err(|source| {
                    PayloadError {
                        kind: self.kind,
                        source,
                    }
                })?)
            }
            FrameKind::Keyframe => {
                let mut snapshot: Snapshot =
                    serde_json::from_slice(&self.raw).map_err(|source| PayloadError {
                        kind: self.kind,
                        source,
                    })?;
                // Keyframes are stored without a timestamp; the envelope owns it.
                snapshot.timestamp = self.timestamp;
                FramePayload::Keyframe(snapshot)
            }
            FrameKind::Delta => {
                FramePayload::Delta(serde_json::from_slice(&self.raw).map_err(|source| {
                    PayloadError {
                        kind: self.kind,
                        source,
                    }
                })?)
            }
        };
        Ok(self.cache.get_or_init(|| decoded))
    }
}

/// Encode one frame.
pub fn encode_frame(kind: FrameKind, timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_LEN + payload.len());
    out.push(kind.tag());
    out.extend_from_slice(&(timestamp as f64).to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// One step of an envelope scan.
#[derive(Debug)]
pub enum FrameScan {
    /// A known frame and the offset just past it.
    Frame(Frame, usize),
    /// An unknown tag was skipped; resume at the offset.
    Skip(usize),
    /// End of data (clean end or truncated frame).
    End,
}

/// Parse the frame starting at `offset`.
///
/// Unknown tags produce [`FrameScan::Skip`] using the declared length;
/// truncated envelopes or payloads produce [`FrameScan::End`]. Neither
/// corrupts the scan position for the caller.
#[must_use]
pub fn read_frame(data: &[u8], offset: usize) -> FrameScan {
    let Some(rest) = data.get(offset..) else {
        return FrameScan::End;
    };
    if rest.len() < ENVELOPE_LEN {
        return FrameScan::End;
    }
    let tag = rest[0];
    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(&rest[1..9]);
    let timestamp_ms = f64::from_be_bytes(ts_bytes);
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&rest[9..13]);
    let len = u32::from_be_bytes(len_bytes) as usize;

    if rest.len() < ENVELOPE_LEN + len {
        return FrameScan::End;
    }
    let next = offset + ENVELOPE_LEN + len;

    let Some(kind) = FrameKind::from_tag(tag) else {
        return FrameScan::Skip(next);
    };

    let timestamp = if timestamp_ms.is_finite() && timestamp_ms >= 0.0 {
        timestamp_ms as u64
    } else {
        0
    };

    FrameScan::Frame(
        Frame {
            kind,
            timestamp,
            raw: rest[ENVELOPE_LEN..ENVELOPE_LEN + len].to_vec(),
            cache: OnceCell::new(),
        },
        next,
    )
}
