//! TrackMate "Tracks" XML reader.
//!
//! The export carries the acquisition metadata as attributes of the root element and one
//! `<particle>` per track, each holding its `<detection>`s:
//!
//! ```text
//! <Tracks nTracks="2" spaceUnits="micron" frameInterval="2.0" timeUnits="sec">
//!   <particle nSpots="3">
//!     <detection t="0" x="10.1" y="4.2" z="0.0" />
//!     ...
//!   </particle>
//! </Tracks>
//! ```
//!
//! Track identifiers are the position of the `<particle>` element in the file. Every
//! structural problem (missing attribute, unparsable number, empty particle, frames going
//! backwards) is reported as [`MotilityError::MalformedInput`].
use camino::Utf8Path;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::{
    constants::{Frame, TrackId},
    motility_errors::MotilityError,
};

use super::{Sample, Track, TrajectoryTable};

#[derive(Debug, Deserialize)]
struct TrackmateTracks {
    #[serde(rename = "@frameInterval")]
    frame_interval: f64,

    #[serde(rename = "@timeUnits")]
    time_units: String,

    #[serde(rename = "@spaceUnits")]
    space_units: String,

    #[serde(rename = "particle", default)]
    particles: Vec<Particle>,
}

#[derive(Debug, Deserialize)]
struct Particle {
    #[serde(rename = "detection", default)]
    detections: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    #[serde(rename = "@t")]
    t: Frame,
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
}

impl Particle {
    fn into_track(self, id: TrackId) -> Result<Track, MotilityError> {
        let samples = self
            .detections
            .into_iter()
            .map(|d| Sample::new(d.t, d.x, d.y))
            .collect();
        Track::new(id, samples)
    }
}

/// Parse a TrackMate XML document held in memory.
///
/// Arguments
/// -----------------
/// * `xml`: The full document.
///
/// Return
/// ----------
/// * A validated [`TrajectoryTable`] whose tracks follow the `<particle>` order.
/// * `Err(MotilityError::MalformedInput)` on any syntactic or structural problem.
pub fn parse_trackmate_xml(xml: &str) -> Result<TrajectoryTable, MotilityError> {
    let doc: TrackmateTracks = from_str(xml)
        .map_err(|e| MotilityError::MalformedInput(format!("invalid TrackMate XML: {e}")))?;

    let tracks = doc
        .particles
        .into_iter()
        .enumerate()
        .map(|(i, particle)| particle.into_track(i as TrackId))
        .collect::<Result<Vec<_>, _>>()?;

    TrajectoryTable::new(
        tracks,
        doc.frame_interval,
        doc.space_units,
        doc.time_units,
    )
}

/// Read and parse a TrackMate XML file.
///
/// I/O failures are returned as [`MotilityError::IoError`]; content problems as
/// [`MotilityError::MalformedInput`].
pub fn read_trackmate_xml(path: &Utf8Path) -> Result<TrajectoryTable, MotilityError> {
    let xml = std::fs::read_to_string(path)?;
    parse_trackmate_xml(&xml)
}

#[cfg(test)]
mod trackmate_reader_test {
    use super::*;

    const TWO_TRACKS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Tracks nTracks="2" spaceUnits="micron" frameInterval="2.0" timeUnits="sec" from="TrackMate v3.5.1">
  <particle nSpots="3">
    <detection t="0" x="1.0" y="2.0" z="0.0" />
    <detection t="1" x="1.5" y="2.0" z="0.0" />
    <detection t="3" x="2.5" y="2.0" z="0.0" />
  </particle>
  <particle nSpots="1">
    <detection t="7" x="-4.25" y="1e-1" z="0.0" />
  </particle>
</Tracks>"#;

    #[test]
    fn test_parse_two_tracks() {
        let table = parse_trackmate_xml(TWO_TRACKS).unwrap();

        assert_eq!(table.frame_interval(), 2.0);
        assert_eq!(table.space_unit(), "micron");
        assert_eq!(table.time_unit(), "sec");
        assert_eq!(table.len(), 2);

        let first = &table.tracks()[0];
        assert_eq!(first.id(), 0);
        assert_eq!(first.len(), 3);
        assert_eq!(first.samples()[2], Sample::new(3, 2.5, 2.0));

        let second = &table.tracks()[1];
        assert_eq!(second.id(), 1);
        assert_eq!(second.samples()[0], Sample::new(7, -4.25, 0.1));
    }

    #[test]
    fn test_missing_frame_interval() {
        let xml = r#"<Tracks spaceUnits="micron" timeUnits="sec">
  <particle><detection t="0" x="1.0" y="2.0" /></particle>
</Tracks>"#;
        assert!(matches!(
            parse_trackmate_xml(xml),
            Err(MotilityError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_empty_particle_is_rejected() {
        let xml = r#"<Tracks spaceUnits="micron" frameInterval="1.0" timeUnits="sec">
  <particle nSpots="0"></particle>
</Tracks>"#;
        assert_eq!(
            parse_trackmate_xml(xml),
            Err(MotilityError::MalformedInput("track 0 has no samples".into()))
        );
    }

    #[test]
    fn test_backwards_frames_are_rejected() {
        let xml = r#"<Tracks spaceUnits="micron" frameInterval="1.0" timeUnits="sec">
  <particle>
    <detection t="4" x="1.0" y="2.0" />
    <detection t="2" x="1.0" y="2.0" />
  </particle>
</Tracks>"#;
        assert!(matches!(
            parse_trackmate_xml(xml),
            Err(MotilityError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_not_xml() {
        assert!(parse_trackmate_xml("TRACK_ID,FRAME,X,Y\n0,0,1.0,2.0").is_err());
    }
}
