//! Writer–reader fidelity: any snapshot sequence written to a dump reads
//! back equal, including at timestamps that forced keyframes.

use pretty_assertions::assert_eq;
use scenecast_core::{Cursor, Line, Segment, Snapshot, Style};
use scenecast_dump::{DumpReader, DumpWriter, WriterOptions};

fn synthetic_sequence(count: usize) -> Vec<Snapshot> {
    let mut snaps = Vec::with_capacity(count);
    let mut offset: u64 = 0;
    for i in 0..count {
        // Scroll a little every third snapshot; lose tracking every 25th.
        if i > 0 && i % 3 == 0 {
            offset += 2;
        }
        let lines: Vec<Line> = (0..8)
            .map(|row| {
                if (i + row) % 5 == 0 {
                    Line::Rich(vec![Segment::styled(
                        format!("styled {i}:{row}"),
                        Style {
                            bold: row % 2 == 0,
                            ..Style::default()
                        },
                    )])
                } else {
                    Line::plain(format!("snap {i} row {row}"))
                }
            })
            .collect();
        snaps.push(Snapshot {
            lines,
            cursor: Cursor {
                x: i % 80,
                y: i % 3,
                visible: i % 7 != 0,
            },
            cols: 80,
            rows: 24,
            alternate: i % 11 == 0,
            lines_offset: if i % 25 == 24 { None } else { Some(offset) },
            timestamp: (i as u64) * 37,
        });
    }
    snaps
}

#[test]
fn hundred_snapshots_round_trip_through_a_file() {
    let snaps = synthetic_sequence(100);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.dump");

    // A 50ms keyframe interval against 37ms spacing injects keyframes often.
    let options = WriterOptions {
        keyframe_interval_ms: 50,
        ..WriterOptions::default()
    };
    let mut writer =
        DumpWriter::create(&path, &["demo".to_string()], options).unwrap();
    for snap in &snaps {
        writer.append(snap).unwrap();
    }
    writer.end().unwrap();

    let reader = DumpReader::open(&path).unwrap();
    let stats = reader.stats();
    assert!(stats.keyframes > 10, "expected many keyframes: {stats:?}");
    assert!(stats.deltas > 0);
    assert_eq!(stats.keyframes + stats.deltas, 100);
    assert_eq!(stats.duration, Some((0, 99 * 37)));

    let replayed: Vec<_> = reader
        .snapshots()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(replayed.len(), snaps.len());
    for (entry, original) in replayed.iter().zip(&snaps) {
        assert_eq!(&entry.snapshot, original);
    }
}

#[test]
fn seeking_yields_the_same_tail_as_full_replay() {
    let snaps = synthetic_sequence(60);
    let mut writer = DumpWriter::new(
        Vec::new(),
        &[],
        WriterOptions {
            keyframe_interval_ms: 200,
            ..WriterOptions::default()
        },
    )
    .unwrap();
    for snap in &snaps {
        writer.append(snap).unwrap();
    }
    let reader = DumpReader::from_bytes(writer.end().unwrap()).unwrap();

    for from in [0u64, 1, 37 * 20, 37 * 20 + 1, 37 * 59] {
        let seeked: Vec<_> = reader
            .snapshots_from(from)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let expected: Vec<_> = snaps
            .iter()
            .filter(|s| s.timestamp >= from)
            .cloned()
            .collect();
        assert_eq!(seeked.len(), expected.len(), "from={from}");
        for (entry, original) in seeked.iter().zip(&expected) {
            assert_eq!(&entry.snapshot, original, "from={from}");
        }
    }
}

#[test]
fn nearest_to_is_the_floor_across_the_whole_run() {
    let snaps = synthetic_sequence(30);
    let mut writer = DumpWriter::new(Vec::new(), &[], WriterOptions::default()).unwrap();
    for snap in &snaps {
        writer.append(snap).unwrap();
    }
    let reader = DumpReader::from_bytes(writer.end().unwrap()).unwrap();

    for ts in (0..30 * 37).step_by(11) {
        let expected = snaps.iter().filter(|s| s.timestamp <= ts).next_back();
        let actual = reader.snapshot_nearest_to(ts).unwrap();
        match expected {
            Some(snap) => assert_eq!(&actual.unwrap().snapshot, snap, "ts={ts}"),
            None => assert!(actual.is_none(), "ts={ts}"),
        }
    }
}
