//! The gateway: one composite scene fanned out to many channels.
//!
//! `update(snapshot)` runs the composite, appends a `scene_state_changed`
//! event when the composite's diagnostic state moved (including the first
//! `None -> state` transition), and broadcasts `{snapshot, events}` to every
//! channel. One channel's failure never starves the others: errors are
//! trapped and logged per channel.
//!
//! Channel-originated input arrives through the [`InputSender`] handed to
//! each channel at start, queues on an `mpsc` channel, and is drained on the
//! gateway's own thread by [`Gateway::pump_input`], so scene state is only
//! ever touched from that single update path.

use std::fmt;
use std::sync::mpsc;

use scenecast_core::{SceneEvent, SceneInput, Snapshot};
use scenecast_scene::{CompositeScene, Scene};
use tracing::{debug, warn};

/// One broadcast unit: the snapshot plus the events it produced.
#[derive(Debug, Clone)]
pub struct ChannelUpdate {
    pub snapshot: Snapshot,
    pub events: Vec<SceneEvent>,
}

/// Failure reported by a channel operation.
#[derive(Debug)]
pub struct ChannelError(pub String);

impl ChannelError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel error: {}", self.0)
    }
}

impl std::error::Error for ChannelError {}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Handle a channel uses to push input back into the gateway.
///
/// Sends enqueue; the gateway drains the queue on its update thread. A send
/// after the gateway is gone is silently dropped (best-effort contract).
#[derive(Clone)]
pub struct InputSender {
    tx: mpsc::Sender<SceneInput>,
}

impl InputSender {
    pub fn send(&self, input: SceneInput) {
        let _ = self.tx.send(input);
    }
}

/// An output sink for snapshot/event frames.
///
/// `stop` must be idempotent. `receive` is best-effort: a channel may drop
/// frames under backpressure.
pub trait Channel {
    /// Called once before any `receive`; completes when the channel is ready.
    fn start(&mut self, sender: InputSender) -> Result<(), ChannelError>;

    /// Completes when the channel has fully stopped. Idempotent.
    fn stop(&mut self) -> Result<(), ChannelError>;

    /// Deliver one update.
    fn receive(&mut self, update: &ChannelUpdate) -> Result<(), ChannelError>;
}

/// Gateway-level failures that must reach the caller.
#[derive(Debug)]
pub enum GatewayError {
    /// `replace_channels` re-entered while a replacement was in progress.
    ReplaceInProgress,
    /// A channel failed to start; already-started channels were rolled back
    /// and the gateway is left with no channels.
    ChannelStart(ChannelError),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceInProgress => write!(f, "channel replacement already in progress"),
            Self::ChannelStart(e) => write!(f, "channel failed to start: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Bytes destined for the wrapped program's PTY.
pub type PtyWriter = Box<dyn FnMut(&[u8])>;

/// Wires a composite scene to a set of channels.
pub struct Gateway {
    composite: Option<CompositeScene>,
    channels: Vec<Box<dyn Channel>>,
    pty_writer: PtyWriter,
    input_tx: mpsc::Sender<SceneInput>,
    input_rx: mpsc::Receiver<SceneInput>,
    last_snapshot: Option<Snapshot>,
    replacing_channels: bool,
}

impl Gateway {
    #[must_use]
    pub fn new(pty_writer: PtyWriter) -> Self {
        let (input_tx, input_rx) = mpsc::channel();
        Self {
            composite: None,
            channels: Vec::new(),
            pty_writer,
            input_tx,
            input_rx,
            last_snapshot: None,
            replacing_channels: false,
        }
    }

    /// The composite's diagnostic state label.
    #[must_use]
    pub fn state(&self) -> Option<String> {
        self.composite.as_ref().and_then(CompositeScene::active_state)
    }

    /// Process one snapshot and broadcast the result.
    pub fn update(&mut self, snapshot: &Snapshot) {
        let prev_state = self.state();
        let mut events = match &mut self.composite {
            Some(composite) => composite.process(snapshot).events,
            None => Vec::new(),
        };
        let state = self.state();
        if state != prev_state {
            events.push(SceneEvent::SceneStateChanged { state });
        }
        self.last_snapshot = Some(snapshot.clone());
        self.broadcast(ChannelUpdate {
            snapshot: snapshot.clone(),
            events,
        });
    }

    /// Swap the scene set. Channels observe the teardown as a
    /// `scene_state_changed { state: None }` against the last snapshot.
    pub fn replace_scenes(&mut self, scenes: Vec<Box<dyn Scene>>) {
        let prior_state = self.state();
        self.composite = (!scenes.is_empty()).then(|| CompositeScene::new(scenes));
        if prior_state.is_some()
            && let Some(snapshot) = self.last_snapshot.clone()
        {
            self.broadcast(ChannelUpdate {
                snapshot,
                events: vec![SceneEvent::SceneStateChanged { state: None }],
            });
        }
    }

    /// Stop the current channels and start the new set in order.
    ///
    /// If any `start` fails, the already-started new channels are stopped and
    /// the gateway is left with an empty channel set; the error surfaces.
    /// Concurrent replacement attempts are rejected rather than interleaved.
    pub fn replace_channels(
        &mut self,
        mut channels: Vec<Box<dyn Channel>>,
    ) -> Result<(), GatewayError> {
        if self.replacing_channels {
            return Err(GatewayError::ReplaceInProgress);
        }
        self.replacing_channels = true;
        let result = self.replace_channels_inner(&mut channels);
        if result.is_ok() {
            self.channels = channels;
        } else {
            self.channels = Vec::new();
        }
        self.replacing_channels = false;
        result
    }

    fn replace_channels_inner(
        &mut self,
        channels: &mut [Box<dyn Channel>],
    ) -> Result<(), GatewayError> {
        for old in &mut self.channels {
            if let Err(e) = old.stop() {
                warn!(error = %e, "channel stop failed");
            }
        }
        self.channels.clear();

        for index in 0..channels.len() {
            let sender = InputSender {
                tx: self.input_tx.clone(),
            };
            if let Err(e) = channels[index].start(sender) {
                // Roll back the ones that made it.
                for started in &mut channels[..index] {
                    if let Err(stop_err) = started.stop() {
                        warn!(error = %stop_err, "rollback stop failed");
                    }
                }
                return Err(GatewayError::ChannelStart(e));
            }
        }
        Ok(())
    }

    /// Stop every channel (idempotent per the channel contract).
    pub fn stop_channels(&mut self) {
        for channel in &mut self.channels {
            if let Err(e) = channel.stop() {
                warn!(error = %e, "channel stop failed");
            }
        }
        self.channels.clear();
    }

    /// Drain queued channel input into the PTY. Call from the same loop that
    /// drives [`update`](Self::update).
    pub fn pump_input(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            self.send(input);
        }
    }

    /// Route one input: the active scene's `encode_input` first, then the
    /// text fallback (`content + CR`). Unhandled selections are dropped.
    pub fn send(&mut self, input: SceneInput) {
        let input = input.sanitized();
        if let Some(bytes) = self
            .composite
            .as_mut()
            .and_then(|composite| composite.encode_input(&input))
        {
            (self.pty_writer)(&bytes);
            return;
        }
        match input {
            SceneInput::Text { content } => {
                let mut bytes = content.into_bytes();
                bytes.push(b'\r');
                (self.pty_writer)(&bytes);
            }
            SceneInput::Select { index } => {
                debug!(index, "select input dropped: no scene handler");
            }
        }
    }

    /// The snapshot most recently passed to [`update`](Self::update).
    #[must_use]
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    fn broadcast(&mut self, update: ChannelUpdate) {
        for channel in &mut self.channels {
            if let Err(e) = channel.receive(&update) {
                warn!(error = %e, "channel receive failed");
            }
        }
    }
}
