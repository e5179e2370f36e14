//! Script-driven capture of deterministic snapshot dumps.
//!
//! A record script names a command, terminal geometry, and an ordered step
//! list: write input, wait for a condition, or take a snapshot. Snapshots
//! get synthetic timestamps (`1000 * index`) so repeated runs of the same
//! script produce byte-comparable dumps.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use regex_lite::Regex;
use serde::Deserialize;
use tracing::debug;

use scenecast_dump::{DumpWriter, WriterOptions};
use scenecast_pty::{PtyConfig, PtySession};
use scenecast_term::{VirtualTerm, VirtualTermOptions};

fn default_cols() -> u16 {
    80
}
fn default_rows() -> u16 {
    24
}
fn default_scrollback() -> usize {
    24
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_poll_ms() -> u64 {
    50
}

/// A recording procedure.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordScript {
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_cols")]
    pub cols: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_scrollback")]
    pub scrollback: usize,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl RecordScript {
    /// Parse a script document.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        serde_json::from_str(text).map_err(RecordError::Parse)
    }
}

/// One script step.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Input { input: String },
    Wait { wait: WaitSpec },
    Keyword(StepKeyword),
}

/// Bare-string steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKeyword {
    Snapshot,
}

/// A wait condition with polling parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitSpec {
    /// Wait until this pattern matches the screen text.
    #[serde(default)]
    pub content: Option<String>,
    /// Wait until the screen has been unchanged for this many milliseconds.
    #[serde(default)]
    pub stable: Option<u64>,
    /// Wait until cursor visibility matches.
    #[serde(default)]
    pub cursor: Option<CursorCondition>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CursorCondition {
    pub visible: bool,
}

/// Recording failures.
#[derive(Debug)]
pub enum RecordError {
    Parse(serde_json::Error),
    Io(io::Error),
    BadWaitPattern { step: usize, message: String },
    WaitTimeout { step: usize },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "record script parse error: {e}"),
            Self::Io(e) => write!(f, "record i/o error: {e}"),
            Self::BadWaitPattern { step, message } => {
                write!(f, "step {step}: bad wait pattern: {message}")
            }
            Self::WaitTimeout { step } => write!(f, "step {step}: wait timed out"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Run a script, writing the dump to `out_path`. Returns the snapshot count.
///
/// The child is spawned headless; its output is drained into a virtual
/// terminal between steps. On any failure (including wait timeouts) the
/// child is terminated before the error is returned.
pub fn run_script(script: &RecordScript, out_path: impl AsRef<Path>) -> Result<usize, RecordError> {
    let mut config = PtyConfig::default().with_size(script.cols, script.rows);
    for (key, value) in &script.env {
        config = config.with_env(key, value);
    }
    let mut session = scenecast_pty::spawn(&script.command, config)?;

    let mut term = VirtualTerm::new(
        VirtualTermOptions {
            cols: script.cols,
            rows: script.rows,
            scrollback: script.scrollback,
            ..VirtualTermOptions::default()
        },
        Box::new(|_snapshot, _previous| {}),
    );

    let mut writer = DumpWriter::create(&out_path, &script.command, WriterOptions::default())?;

    let result = run_steps(script, &mut session, &mut term, &mut writer);

    // Terminate the child whether or not the steps succeeded.
    let _ = session.shutdown(Duration::from_millis(500));
    term.dispose();
    let ended = writer.end();

    let count = result?;
    ended?;
    Ok(count)
}

fn run_steps(
    script: &RecordScript,
    session: &mut PtySession,
    term: &mut VirtualTerm,
    writer: &mut DumpWriter<io::BufWriter<std::fs::File>>,
) -> Result<usize, RecordError> {
    let mut snapshots = 0usize;
    for (index, step) in script.steps.iter().enumerate() {
        drain(session, term, Duration::ZERO)?;
        match step {
            Step::Input { input } => {
                session.write(input.as_bytes())?;
            }
            Step::Wait { wait } => {
                wait_for(session, term, wait, index)?;
            }
            Step::Keyword(StepKeyword::Snapshot) => {
                // Give in-flight output a brief chance to land, then capture.
                drain(session, term, Duration::from_millis(20))?;
                term.flush();
                let mut snapshot = term.take_snapshot();
                snapshot.timestamp = 1000 * snapshots as u64;
                writer.append(&snapshot)?;
                snapshots += 1;
                debug!(index = snapshots, "snapshot recorded");
            }
        }
    }
    Ok(snapshots)
}

/// Move available PTY output into the terminal, waiting at most `wait` for
/// the first chunk.
fn drain(
    session: &mut PtySession,
    term: &mut VirtualTerm,
    wait: Duration,
) -> Result<(), RecordError> {
    let bytes = session.read_available(wait)?;
    if !bytes.is_empty() {
        term.write(&bytes);
    }
    Ok(())
}

fn wait_for(
    session: &mut PtySession,
    term: &mut VirtualTerm,
    spec: &WaitSpec,
    step: usize,
) -> Result<(), RecordError> {
    let pattern = spec
        .content
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| RecordError::BadWaitPattern {
            step,
            message: e.to_string(),
        })?;

    let deadline = Instant::now() + Duration::from_millis(spec.timeout_ms);
    let poll = Duration::from_millis(spec.poll_ms.max(1));
    let mut last_screen = term.take_snapshot();
    let mut stable_since = Instant::now();

    loop {
        drain(session, term, poll)?;

        let snapshot = term.take_snapshot();
        if !snapshot.same_content(&last_screen) {
            stable_since = Instant::now();
            last_screen = snapshot.clone();
        }

        let content_ok = pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&snapshot.text()));
        let stable_ok = spec.stable.is_none_or(|ms| {
            stable_since.elapsed() >= Duration::from_millis(ms)
        });
        let cursor_ok = spec
            .cursor
            .is_none_or(|c| snapshot.cursor.visible == c.visible);

        if content_ok && stable_ok && cursor_ok {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RecordError::WaitTimeout { step });
        }
    }
}
