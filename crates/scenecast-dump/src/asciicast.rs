//! Asciicast v2 export of a dump.
//!
//! Converts a replayed dump into the
//! [asciicast v2 format](https://docs.asciinema.org/manual/asciicast/v2/):
//! a JSON header line followed by `[time, "o", data]` output events. The
//! reconstruction is screen-oriented: each snapshot becomes a clear-screen
//! plus a full repaint of its text, which plays back faithfully even though
//! it does not reproduce the original byte stream.

use std::io::{self, Write};

use scenecast_core::{Line, Segment, Snapshot};

use crate::reader::{DumpError, DumpReader};

/// Write a dump as asciicast v2 into `out`. Returns the event count.
pub fn export_asciicast<W: Write>(reader: &DumpReader, out: &mut W) -> Result<u64, DumpError> {
    let stats = reader.stats();
    let start = stats.duration.map_or(0, |(start, _)| start);

    let mut first_dims: Option<(u16, u16)> = None;
    let mut events: Vec<(f64, String)> = Vec::new();
    for entry in reader.snapshots() {
        let entry = entry?;
        let snapshot = &entry.snapshot;
        if first_dims.is_none() {
            first_dims = Some((snapshot.cols, snapshot.rows));
        }
        let time = snapshot.timestamp.saturating_sub(start) as f64 / 1000.0;
        events.push((time, repaint(snapshot)));
    }

    let (cols, rows) = first_dims.unwrap_or((80, 24));
    writeln!(
        out,
        r#"{{"version": 2, "width": {cols}, "height": {rows}, "timestamp": {}}}"#,
        start / 1000
    )
    .map_err(DumpError::Io)?;

    let count = events.len() as u64;
    for (time, data) in events {
        writeln!(out, r#"[{time:.3}, "o", "{}"]"#, escape_json(&data)).map_err(DumpError::Io)?;
    }
    Ok(count)
}

/// Clear-and-repaint byte sequence for one snapshot. Only the viewport tail
/// of the line list fits on screen.
fn repaint(snapshot: &Snapshot) -> String {
    let rows = usize::from(snapshot.rows);
    let skip = snapshot.lines.len().saturating_sub(rows);
    let mut out = String::from("\x1b[2J\x1b[H");
    for (i, line) in snapshot.lines[skip..].iter().enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        out.push_str(&render_line(line));
    }
    out
}

fn render_line(line: &Line) -> String {
    match line {
        Line::Plain(text) => text.clone(),
        Line::Rich(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    Segment::Plain(text) => out.push_str(text),
                    Segment::Styled(styled) => {
                        out.push_str(&sgr_prefix(&styled.style));
                        out.push_str(&styled.text);
                        out.push_str("\x1b[0m");
                    }
                }
            }
            out
        }
    }
}

fn sgr_prefix(style: &scenecast_core::Style) -> String {
    let mut params: Vec<String> = Vec::new();
    if style.bold {
        params.push("1".into());
    }
    if style.dim {
        params.push("2".into());
    }
    if style.italic {
        params.push("3".into());
    }
    if style.underline {
        params.push("4".into());
    }
    if style.inverse {
        params.push("7".into());
    }
    if style.strikethrough {
        params.push("9".into());
    }
    if style.overline {
        params.push("53".into());
    }
    if let Some(color) = style.fg {
        params.push(color_params(color, 38));
    }
    if let Some(color) = style.bg {
        params.push(color_params(color, 48));
    }
    if params.is_empty() {
        String::new()
    } else {
        format!("\x1b[{}m", params.join(";"))
    }
}

fn color_params(color: scenecast_core::Color, base: u8) -> String {
    match color {
        scenecast_core::Color::Indexed(n) => format!("{base};5;{n}"),
        scenecast_core::Color::Rgb(r, g, b) => format!("{base};2;{r};{g};{b}"),
    }
}

fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write as _;
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Convenience: export straight into a string.
pub fn export_asciicast_string(reader: &DumpReader) -> Result<String, DumpError> {
    let mut buf = Vec::new();
    export_asciicast(reader, &mut buf)?;
    String::from_utf8(buf).map_err(|e| DumpError::Io(io::Error::other(e)))
}
