//! Key-sequence helpers for scenes that translate structured input.
//!
//! Scenes that present selectable options (questions, permission prompts)
//! usually navigate them with arrow keys and confirm with a carriage return.
//! These helpers build those byte sequences so each scene does not hand-roll
//! escape codes.

/// Cursor up, CSI A.
pub const KEY_UP: &[u8] = b"\x1b[A";
/// Cursor down, CSI B.
pub const KEY_DOWN: &[u8] = b"\x1b[B";
/// Carriage return: the confirm key for line-oriented programs.
pub const KEY_ENTER: &[u8] = b"\r";

/// Arrow presses moving a selection from `current` to `target`, followed by
/// a confirm.
#[must_use]
pub fn select_with_arrows(current: usize, target: usize) -> Vec<u8> {
    let mut out = Vec::new();
    if target >= current {
        for _ in current..target {
            out.extend_from_slice(KEY_DOWN);
        }
    } else {
        for _ in target..current {
            out.extend_from_slice(KEY_UP);
        }
    }
    out.extend_from_slice(KEY_ENTER);
    out
}

/// Text typed as-is, with newlines normalized to carriage returns (terminal
/// line discipline expects CR for "enter").
#[must_use]
pub fn type_text(content: &str) -> Vec<u8> {
    content.replace('\n', "\r").into_bytes()
}
