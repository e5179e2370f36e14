//! Dump reading: index, seek, and keyframe+delta replay.
//!
//! The reader loads the whole file, scans frame envelopes once, and records a
//! small index entry `(offset, kind, timestamp)` per snapshot frame. Payloads
//! stay undecoded until replay touches them.
//!
//! A dump must start with a header frame, and every delta must be preceded by
//! at least one keyframe; violations are format errors. Unknown frame tags
//! are skipped and truncation ends the scan silently (partial writes are
//! tolerated).

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use scenecast_core::{DeltaSummary, Snapshot, apply_diff, compute_diff};

use crate::frame::{DumpHeader, FrameKind, FramePayload, FrameScan, PayloadError, read_frame};

/// Malformed or unreadable dump.
#[derive(Debug)]
pub enum DumpError {
    Io(io::Error),
    /// The first frame is missing or not a header.
    NoHeader,
    /// A delta frame appeared before any keyframe.
    DeltaBeforeKeyframe { offset: usize },
    /// A frame payload failed to decode during replay.
    Payload(PayloadError),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "dump i/o error: {e}"),
            Self::NoHeader => write!(f, "dump has no header frame"),
            Self::DeltaBeforeKeyframe { offset } => {
                write!(f, "delta frame at byte {offset} precedes any keyframe")
            }
            Self::Payload(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Payload(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DumpError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<PayloadError> for DumpError {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

/// Snapshot frame kind in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Keyframe,
    Delta,
}

/// One snapshot frame in the dump.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: usize,
    kind: RecordKind,
    timestamp: u64,
}

/// Aggregate facts about a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpStats {
    pub keyframes: u64,
    pub deltas: u64,
    /// First and last snapshot timestamps; `None` for an empty dump.
    pub duration: Option<(u64, u64)>,
}

/// One replayed snapshot plus the shape of the transition that produced it.
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    pub snapshot: Snapshot,
    /// What changed relative to the previous snapshot; `None` for a keyframe
    /// with no reconstructible base.
    pub summary: Option<DeltaSummary>,
}

/// An open dump with its frame index.
pub struct DumpReader {
    data: Vec<u8>,
    header: DumpHeader,
    index: Vec<IndexEntry>,
}

impl DumpReader {
    /// Read and index a dump file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Index a dump already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DumpError> {
        let (header, first_offset) = match read_frame(&data, 0) {
            FrameScan::Frame(frame, next) if frame.kind == FrameKind::Header => {
                let FramePayload::Header(header) = frame.payload()?.clone() else {
                    return Err(DumpError::NoHeader);
                };
                (header, next)
            }
            _ => return Err(DumpError::NoHeader),
        };

        let mut index = Vec::new();
        let mut seen_keyframe = false;
        let mut offset = first_offset;
        loop {
            match read_frame(&data, offset) {
                FrameScan::Frame(frame, next) => {
                    match frame.kind {
                        FrameKind::Keyframe => {
                            seen_keyframe = true;
                            index.push(IndexEntry {
                                offset,
                                kind: RecordKind::Keyframe,
                                timestamp: frame.timestamp,
                            });
                        }
                        FrameKind::Delta => {
                            if !seen_keyframe {
                                return Err(DumpError::DeltaBeforeKeyframe { offset });
                            }
                            index.push(IndexEntry {
                                offset,
                                kind: RecordKind::Delta,
                                timestamp: frame.timestamp,
                            });
                        }
                        FrameKind::Header => {
                            // Later headers carry nothing we use; skip them.
                        }
                    }
                    offset = next;
                }
                FrameScan::Skip(next) => {
                    tracing::debug!(offset, "skipping frame with unknown tag");
                    offset = next;
                }
                FrameScan::End => break,
            }
        }

        Ok(Self {
            data,
            header,
            index,
        })
    }

    /// The dump's header record.
    #[must_use]
    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    /// Counts and time span.
    #[must_use]
    pub fn stats(&self) -> DumpStats {
        let keyframes = self
            .index
            .iter()
            .filter(|e| e.kind == RecordKind::Keyframe)
            .count() as u64;
        let deltas = self.index.len() as u64 - keyframes;
        let duration = match (self.index.first(), self.index.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        };
        DumpStats {
            keyframes,
            deltas,
            duration,
        }
    }

    /// Number of snapshot frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the dump holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Replay every snapshot from the beginning.
    #[must_use]
    pub fn snapshots(&self) -> Replay<'_> {
        Replay {
            reader: self,
            position: 0,
            current: None,
            emit_from: None,
            done: self.index.is_empty(),
        }
    }

    /// Replay snapshots at or after `from` (milliseconds).
    ///
    /// Seeks with a lower-bound binary search, walks back to the nearest
    /// preceding keyframe, and replays forward, yielding only entries at or
    /// after the target.
    #[must_use]
    pub fn snapshots_from(&self, from: u64) -> Replay<'_> {
        let lower = self.index.partition_point(|e| e.timestamp < from);
        if lower >= self.index.len() {
            return Replay {
                reader: self,
                position: 0,
                current: None,
                emit_from: None,
                done: true,
            };
        }
        let start = self.keyframe_at_or_before(lower);
        Replay {
            reader: self,
            position: start,
            current: None,
            emit_from: Some(from),
            done: false,
        }
    }

    /// The single snapshot whose timestamp is the maximum `<= ts`, or `None`
    /// if `ts` precedes the first snapshot.
    pub fn snapshot_nearest_to(&self, ts: u64) -> Result<Option<ReplayEntry>, DumpError> {
        let upper = self.index.partition_point(|e| e.timestamp <= ts);
        if upper == 0 {
            return Ok(None);
        }
        let target = upper - 1;
        let start = self.keyframe_at_or_before(target);

        let mut current: Option<Snapshot> = None;
        let mut entry = None;
        for position in start..=target {
            entry = Some(self.replay_step(position, &mut current)?);
        }
        Ok(entry)
    }

    /// Index of the nearest keyframe at or before `position`.
    ///
    /// The open-time validation guarantees one exists.
    fn keyframe_at_or_before(&self, position: usize) -> usize {
        self.index[..=position]
            .iter()
            .rposition(|e| e.kind == RecordKind::Keyframe)
            .unwrap_or(0)
    }

    /// Decode the frame at `position` and advance `current` through it.
    fn replay_step(
        &self,
        position: usize,
        current: &mut Option<Snapshot>,
    ) -> Result<ReplayEntry, DumpError> {
        let entry = self.index[position];
        let FrameScan::Frame(frame, _) = read_frame(&self.data, entry.offset) else {
            // The index was built from a successful scan; a frame that no
            // longer parses means the buffer changed underneath us.
            return Err(DumpError::NoHeader);
        };
        match frame.payload()? {
            FramePayload::Keyframe(snapshot) => {
                let summary = current
                    .as_ref()
                    .and_then(|prev| compute_diff(prev, snapshot))
                    .map(|delta| delta.summary());
                *current = Some(snapshot.clone());
                Ok(ReplayEntry {
                    snapshot: snapshot.clone(),
                    summary,
                })
            }
            FramePayload::Delta(delta) => {
                let base = current.as_ref().ok_or(DumpError::DeltaBeforeKeyframe {
                    offset: entry.offset,
                })?;
                let snapshot = apply_diff(base, delta, entry.timestamp);
                let summary = Some(delta.summary());
                *current = Some(snapshot.clone());
                Ok(ReplayEntry { snapshot, summary })
            }
            FramePayload::Header(_) => Err(DumpError::NoHeader),
        }
    }
}

/// Lazy forward replay over a dump.
pub struct Replay<'a> {
    reader: &'a DumpReader,
    position: usize,
    current: Option<Snapshot>,
    /// Entries before this timestamp are replayed but not yielded.
    emit_from: Option<u64>,
    done: bool,
}

impl Iterator for Replay<'_> {
    type Item = Result<ReplayEntry, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.position < self.reader.index.len() {
            let position = self.position;
            self.position += 1;
            let timestamp = self.reader.index[position].timestamp;
            match self.reader.replay_step(position, &mut self.current) {
                Ok(entry) => {
                    if self.emit_from.is_none_or(|from| timestamp >= from) {
                        return Some(Ok(entry));
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
