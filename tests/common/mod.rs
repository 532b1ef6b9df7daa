#![allow(dead_code)]

use std::fmt::Write;

use motility::{Sample, Track, TrajectoryTable};

/// `n` consecutive frames starting at `start`, moving by `(vx, vy)` per frame.
pub fn line_track(id: u32, start: u32, n: u32, vx: f64, vy: f64) -> Track {
    let samples = (0..n)
        .map(|k| Sample::new(start + k, vx * k as f64, vy * k as f64))
        .collect();
    Track::new(id, samples).unwrap()
}

/// `n` consecutive frames sitting at `(x, y)`.
pub fn stationary_track(id: u32, n: u32, x: f64, y: f64) -> Track {
    let samples = (0..n).map(|f| Sample::new(f, x, y)).collect();
    Track::new(id, samples).unwrap()
}

pub fn table(tracks: Vec<Track>, frame_interval: f64) -> TrajectoryTable {
    TrajectoryTable::new(tracks, frame_interval, "micron", "sec").unwrap()
}

/// Directed tracks with slightly different speeds, enough to populate every analysis.
pub fn directed_population(n_tracks: u32, n_frames: u32) -> Vec<Track> {
    (0..n_tracks)
        .map(|id| {
            let v = 0.01 + 0.001 * id as f64;
            line_track(id, 0, n_frames, v, 0.5 * v)
        })
        .collect()
}

/// TrackMate XML export of `tracks` (one `<particle>` per track).
pub fn trackmate_xml(frame_interval: f64, tracks: &[Track]) -> String {
    let mut xml = String::new();
    writeln!(
        xml,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Tracks nTracks="{}" spaceUnits="micron" frameInterval="{frame_interval}" timeUnits="sec" generationDateTime="Mon, 2 Mar 2026 10:00:00" from="TrackMate v7.11.1">"#,
        tracks.len()
    )
    .unwrap();
    for track in tracks {
        writeln!(xml, r#"  <particle nSpots="{}">"#, track.len()).unwrap();
        for s in track.samples() {
            writeln!(
                xml,
                r#"    <detection t="{}" x="{}" y="{}" z="0.0" />"#,
                s.frame, s.x, s.y
            )
            .unwrap();
        }
        writeln!(xml, "  </particle>").unwrap();
    }
    xml.push_str("</Tracks>\n");
    xml
}
