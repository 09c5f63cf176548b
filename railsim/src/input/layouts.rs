//! Generated demo layouts.

use super::topology::{Direction, Orientation, StaticTopology, TopologyBuilder, TopologyError, TrackSide};

/// Distance from a track boundary to the signal protecting entry there.
const SIGNAL_OFFSET: f64 = 2.0;

/// A single line of `segments` tracks `L1..Ln`, open at both ends, with a
/// signal for each direction at the entry of every segment.
pub fn line(segments: usize, segment_length: f64) -> Result<StaticTopology, TopologyError> {
    let mut b = TopologyBuilder::new();
    let segments = segments.max(1);
    for i in 1..(segments + 1) {
        let id = format!("L{}", i);
        b.track(&id, &id, segment_length)
            .signal(&format!("{}u", id), &id, Direction::Up, SIGNAL_OFFSET)
            .signal(&format!("{}d", id), &id, Direction::Down, segment_length - SIGNAL_OFFSET);
        if i > 1 {
            b.link(&format!("L{}.end", i - 1), &format!("{}.begin", id));
        }
    }
    b.open_end("L1", TrackSide::Begin)
        .open_end(&format!("L{}", segments), TrackSide::End);
    b.build()
}

/// A passing loop: west approach `W1`, `W2`, switch `SW1` splitting into the
/// main track `M` and siding `S`, which merge again at `SW2` into the east
/// approach `E2`, `E1`.
pub fn passing_loop() -> Result<StaticTopology, TopologyError> {
    let mut b = TopologyBuilder::new();
    b.track("W1", "west", 600.0)
        .track("W2", "west points", 60.0)
        .track("M", "main", 1000.0)
        .track("S", "siding", 1000.0)
        .track("E2", "east points", 60.0)
        .track("E1", "east", 600.0)
        .open_end("W1", TrackSide::Begin)
        .open_end("E1", TrackSide::End)
        .link("W1.end", "W2.begin")
        .link("E2.end", "E1.begin")
        .switch("SW1", "W2", 60.0, Orientation::Outgoing, "straight", &["straight", "left"])
        .link("SW1.straight", "M.begin")
        .link("SW1.left", "S.begin")
        .switch("SW2", "E2", 0.0, Orientation::Incoming, "straight", &["straight", "right"])
        .link("SW2.straight", "M.end")
        .link("SW2.right", "S.end")
        .signal("M_up", "M", Direction::Up, SIGNAL_OFFSET)
        .signal("S_up", "S", Direction::Up, SIGNAL_OFFSET)
        .signal("M_down", "M", Direction::Down, 1000.0 - SIGNAL_OFFSET)
        .signal("S_down", "S", Direction::Down, 1000.0 - SIGNAL_OFFSET)
        .signal("W_up", "W1", Direction::Up, 550.0)
        .signal("E_down", "E1", Direction::Down, 50.0);
    b.build()
}

pub fn by_name(name: &str) -> Option<Result<StaticTopology, TopologyError>> {
    match name {
        "line" => Some(line(3, 1000.0)),
        "loop" => Some(passing_loop()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_layouts_build() {
        let l = line(3, 1000.0).unwrap();
        assert_eq!(l.tracks.len(), 3);
        assert_eq!(l.signals.len(), 6);
        assert_eq!(l.open_ends(), vec![(0, TrackSide::Begin), (2, TrackSide::End)]);

        let p = passing_loop().unwrap();
        assert_eq!(p.switches.len(), 2);
        assert!(p.siblings(p.track_id("W2").unwrap()).is_empty());
        assert!(by_name("nowhere").is_none());
    }
}
