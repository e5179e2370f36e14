//! Property-based invariants for the emulator and snapshot capture.
//!
//! 1. The parser never panics on arbitrary byte streams.
//! 2. Captured snapshots respect the structural invariants: bounded line
//!    count, cursor-within-lines when visible, monotone offsets.

use proptest::prelude::*;
use scenecast_term::{CaptureState, Emulator};

fn dims() -> impl Strategy<Value = (u16, u16, usize)> {
    (1u16..=40, 1u16..=12, 0usize..=8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn parser_never_panics(
        (cols, rows, scrollback) in dims(),
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
    ) {
        let mut emu = Emulator::new(cols, rows, scrollback);
        for chunk in &chunks {
            emu.feed(chunk);
        }
        let _ = emu.screen_text();
    }

    #[test]
    fn captured_snapshots_hold_invariants(
        (cols, rows, scrollback) in dims(),
        chunks in prop::collection::vec("[ -~\r\n\t]{0,48}", 1..12),
    ) {
        let mut emu = Emulator::new(cols, rows, scrollback);
        let mut state = CaptureState::new();
        let mut last_offset: Option<u64> = None;

        for chunk in &chunks {
            emu.feed(chunk.as_bytes());
            let snap = state.capture(&emu, 0);

            prop_assert!(snap.lines.len() <= usize::from(rows) + scrollback);
            if snap.cursor.visible && !snap.lines.is_empty() {
                prop_assert!(snap.cursor.y <= snap.lines.len() - 1);
                let idx = snap.cursor_line_index().unwrap();
                prop_assert!(idx >= snap.lines_start());
                prop_assert!(idx < snap.lines_end());
            }
            if let (Some(prev), Some(curr)) = (last_offset, snap.lines_offset) {
                prop_assert!(curr >= prev, "offset regressed: {curr} < {prev}");
            }
            last_offset = snap.lines_offset;
        }
    }

    #[test]
    fn escape_sequences_never_break_capture(
        (cols, rows, scrollback) in dims(),
        seqs in prop::collection::vec(
            prop_oneof![
                Just(b"\x1b[2J".to_vec()),
                Just(b"\x1b[?1049h".to_vec()),
                Just(b"\x1b[?1049l".to_vec()),
                Just(b"\x1b[?25l".to_vec()),
                Just(b"\x1b[?25h".to_vec()),
                Just(b"\x1b[31;1mstyled\x1b[0m".to_vec()),
                Just(b"text\r\n".to_vec()),
                Just(b"\x1b[3J".to_vec()),
                Just(b"\x1bc".to_vec()),
            ],
            1..16,
        ),
    ) {
        let mut emu = Emulator::new(cols, rows, scrollback);
        let mut state = CaptureState::new();
        for seq in &seqs {
            emu.feed(seq);
            let snap = state.capture(&emu, 0);
            prop_assert!(snap.lines.len() <= usize::from(rows) + scrollback);
        }
    }
}
