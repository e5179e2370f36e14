#![forbid(unsafe_code)]

//! Headless PTY sessions for scenecast.
//!
//! # Why this exists
//! The observation pipeline needs the wrapped program's raw byte stream
//! without touching the user's terminal. This crate spawns a child under a
//! pseudo-terminal and hands its output to the caller through a non-blocking
//! drain, so a single-threaded pump loop can interleave PTY reads with
//! snapshot captures.
//!
//! # Safety / policy
//! - This crate forbids unsafe code.
//! - `portable-pty` is the cross-platform PTY abstraction.
//!
//! # Design
//! A dedicated reader thread moves bytes from the PTY into an `mpsc`
//! channel; [`PtySession::read_available`] drains that channel with an
//! optional wait. Everything else (emulator, scenes, dump writer) stays on
//! the caller's thread.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{CommandBuilder, ExitStatus, PtySize};
use tracing::debug;

/// Configuration for a PTY-backed session.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// PTY width in columns.
    pub cols: u16,
    /// PTY height in rows.
    pub rows: u16,
    /// TERM for the child (defaults to xterm-256color).
    pub term: Option<String>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            term: Some("xterm-256color".to_string()),
            env: Vec::new(),
        }
    }
}

impl PtyConfig {
    /// Override PTY dimensions.
    #[must_use]
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    /// Add an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug)]
enum ReaderMsg {
    Data(Vec<u8>),
    Eof,
    Err(io::Error),
}

/// A spawned child on a pseudo-terminal.
pub struct PtySession {
    master: Box<dyn portable_pty::MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    rx: mpsc::Receiver<ReaderMsg>,
    reader_thread: Option<thread::JoinHandle<()>>,
    eof: bool,
}

impl fmt::Debug for PtySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtySession")
            .field("child_pid", &self.child.process_id())
            .field("eof", &self.eof)
            .finish()
    }
}

/// Spawn `command` (argv form) into a new headless PTY.
pub fn spawn(command: &[String], config: PtyConfig) -> io::Result<PtySession> {
    let Some((program, args)) = command.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command",
        ));
    };
    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    spawn_command(config, cmd)
}

/// Spawn a prepared [`CommandBuilder`] into a new headless PTY.
pub fn spawn_command(config: PtyConfig, mut cmd: CommandBuilder) -> io::Result<PtySession> {
    if let Some(term) = &config.term {
        cmd.env("TERM", term);
    }
    for (k, v) in &config.env {
        cmd.env(k, v);
    }

    let pty_system = portable_pty::native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(pty_error)?;

    let child = pair.slave.spawn_command(cmd).map_err(pty_error)?;
    let mut reader = pair.master.try_clone_reader().map_err(pty_error)?;
    let writer = pair.master.take_writer().map_err(pty_error)?;

    let (tx, rx) = mpsc::channel::<ReaderMsg>();
    let reader_thread = thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(ReaderMsg::Eof);
                    break;
                }
                Ok(n) => {
                    if tx.send(ReaderMsg::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(ReaderMsg::Err(err));
                    break;
                }
            }
        }
    });

    Ok(PtySession {
        master: pair.master,
        child,
        writer,
        rx,
        reader_thread: Some(reader_thread),
        eof: false,
    })
}

impl PtySession {
    /// Send input bytes to the child.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    /// Resize the PTY (delivers SIGWINCH to the child).
    pub fn resize(&mut self, cols: u16, rows: u16) -> io::Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)
    }

    /// Drain whatever output is available, waiting up to `timeout` for the
    /// first chunk. Returns the new bytes (possibly empty on timeout or EOF).
    pub fn read_available(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.eof {
            return Ok(out);
        }

        let first = if timeout.is_zero() {
            match self.rx.try_recv() {
                Ok(msg) => Some(msg),
                Err(mpsc::TryRecvError::Empty) => None,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.eof = true;
                    None
                }
            }
        } else {
            match self.rx.recv_timeout(timeout) {
                Ok(msg) => Some(msg),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.eof = true;
                    None
                }
            }
        };

        let Some(mut msg) = first else {
            return Ok(out);
        };
        loop {
            match msg {
                ReaderMsg::Data(bytes) => out.extend_from_slice(&bytes),
                ReaderMsg::Eof => {
                    self.eof = true;
                    break;
                }
                ReaderMsg::Err(err) => return Err(err),
            }
            match self.rx.try_recv() {
                Ok(next) => msg = next,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.eof = true;
                    break;
                }
            }
        }

        if !out.is_empty() {
            debug!(bytes = out.len(), "pty output drained");
        }
        Ok(out)
    }

    /// Whether the output stream has ended.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Terminate the child.
    pub fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    /// Wait for the child to exit.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Kill, wait, and drain any output still in flight.
    pub fn shutdown(&mut self, drain_timeout: Duration) -> io::Result<()> {
        let _ = self.kill();
        let _ = self.wait()?;
        let deadline = Instant::now() + drain_timeout;
        while !self.eof && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let _ = self.read_available(remaining.min(Duration::from_millis(50)))?;
        }
        Ok(())
    }

    /// Child process id, if the platform exposes one.
    #[must_use]
    pub fn child_pid(&self) -> Option<u32> {
        self.child.process_id()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let _ = self.child.kill();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

fn pty_error<E: fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}
