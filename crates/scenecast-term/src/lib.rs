#![forbid(unsafe_code)]

//! Terminal emulation and snapshot capture for scenecast.
//!
//! # Why this exists
//! The wrapped program only speaks bytes. This crate turns that byte stream
//! into stable [`scenecast_core::Snapshot`] values: a grid-level emulator with
//! an addressable scrollback, rich-text extraction with marker-based offset
//! tracking, and debounced change delivery.
//!
//! # Modules
//!
//! - [`emulator`] - Grid state machine, ANSI interpretation, scrollback
//!   [`Marker`]s.
//! - [`capture`] - Cell rows to rich lines; the scrollback marker protocol.
//! - [`scheduler`] - Debounce + max-interval flush pacing.
//! - [`virtual_term`] - [`VirtualTerm`]: emulator + scheduler + change dedup.

pub mod capture;
pub mod emulator;
pub mod scheduler;
pub mod virtual_term;

pub use capture::{CaptureState, cells_to_line};
pub use emulator::{Cell, Emulator, Marker};
pub use scheduler::{DEFAULT_DEBOUNCE, DEFAULT_MAX_INTERVAL, FlushScheduler};
pub use virtual_term::{OnChange, VirtualTerm, VirtualTermOptions, now_ms};
