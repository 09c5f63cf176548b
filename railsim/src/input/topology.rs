use failure::Fail;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

pub type TrackId = usize;
pub type SwitchId = usize;
pub type SignalId = usize;
pub type ConnectorId = usize;

pub type NameMap = HashMap<String, usize>;

const BOUNDARY_TOLERANCE: f64 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// +1 when travelling towards increasing positions.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TrackSide {
    Begin,
    End,
}

impl TrackSide {
    /// The side a train leaves through when travelling in `dir`.
    pub fn exit_of(dir: Direction) -> TrackSide {
        match dir {
            Direction::Up => TrackSide::End,
            Direction::Down => TrackSide::Begin,
        }
    }

    /// Direction of a train that has just entered through this side.
    pub fn entry_direction(self) -> Direction {
        match self {
            TrackSide::Begin => Direction::Up,
            TrackSide::End => Direction::Down,
        }
    }
}

/// Whether a switch splits traffic leaving its parent track (`Outgoing`,
/// sits at the parent's end) or splits traffic entering it backwards, i.e.
/// merges traffic running up into the parent (`Incoming`, sits at the
/// parent's begin).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Outgoing,
    Incoming,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectorOwner {
    Track(TrackId, TrackSide),
    SwitchTrunk(SwitchId),
    SwitchBranch(SwitchId, usize),
}

#[derive(Clone, Debug)]
pub struct Connector {
    pub name: String,
    pub owner: ConnectorOwner,
    pub link: Option<ConnectorId>,
}

#[derive(Clone, Debug)]
pub struct TrackEnd {
    pub connector: ConnectorId,
    pub open_end: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackSignal {
    pub signal: SignalId,
    pub dir: Direction,
    pub pos: f64,
}

#[derive(Clone, Debug)]
pub struct StaticTrack {
    pub id: String,
    /// Segments sharing a name are drawn pieces of the same line.
    pub name: String,
    pub length: f64,
    pub signals: SmallVec<[TrackSignal; 4]>,
    pub begin: TrackEnd,
    pub end: TrackEnd,
}

impl StaticTrack {
    pub fn end(&self, side: TrackSide) -> &TrackEnd {
        match side {
            TrackSide::Begin => &self.begin,
            TrackSide::End => &self.end,
        }
    }

    pub fn boundary(&self, side: TrackSide) -> f64 {
        match side {
            TrackSide::Begin => 0.0,
            TrackSide::End => self.length,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticSignal {
    pub id: String,
    pub track: TrackId,
    pub dir: Direction,
    pub pos: f64,
}

#[derive(Clone, Debug)]
pub struct Branch {
    pub course: String,
    pub connector: ConnectorId,
}

#[derive(Clone, Debug)]
pub struct StaticSwitch {
    pub id: String,
    pub track: TrackId,
    pub side: TrackSide,
    pub continue_course: String,
    pub orientation: Orientation,
    pub branches: SmallVec<[Branch; 2]>,
}

impl StaticSwitch {
    /// Branch selected by the switch lying in normal (`false`) or reverse
    /// (`true`) position.
    pub fn branch_for(&self, reverse: bool) -> Option<usize> {
        self.branches.iter().position(|b| (b.course == self.continue_course) != reverse)
    }
}

#[derive(Debug, Default)]
pub struct TopologyNames {
    pub tracks: NameMap,
    pub switches: NameMap,
    pub signals: NameMap,
    pub connectors: NameMap,
}

#[derive(Debug)]
pub struct StaticTopology {
    pub tracks: Vec<StaticTrack>,
    pub switches: Vec<StaticSwitch>,
    pub signals: Vec<StaticSignal>,
    pub connectors: Vec<Connector>,
    pub names: TopologyNames,
    siblings: Vec<SmallVec<[TrackId; 2]>>,
}

impl StaticTopology {
    pub fn track_id(&self, id: &str) -> Option<TrackId> {
        self.names.tracks.get(id).cloned()
    }

    pub fn switch_id(&self, id: &str) -> Option<SwitchId> {
        self.names.switches.get(id).cloned()
    }

    pub fn signal_id(&self, id: &str) -> Option<SignalId> {
        self.names.signals.get(id).cloned()
    }

    /// The connector on the other side of `c`, if it is linked.
    pub fn far_side(&self, c: ConnectorId) -> Option<(ConnectorId, &Connector)> {
        let far = self.connectors.get(c)?.link?;
        self.connectors.get(far).map(|conn| (far, conn))
    }

    /// Other tracks carrying the same name as `track`.
    pub fn siblings(&self, track: TrackId) -> &[TrackId] {
        self.siblings.get(track).map(|s| &s[..]).unwrap_or(&[])
    }

    /// Track ends marked as open ends, in track order.
    pub fn open_ends(&self) -> Vec<(TrackId, TrackSide)> {
        let mut ends = Vec::new();
        for (idx, track) in self.tracks.iter().enumerate() {
            if track.begin.open_end {
                ends.push((idx, TrackSide::Begin));
            }
            if track.end.open_end {
                ends.push((idx, TrackSide::End));
            }
        }
        ends
    }
}

#[derive(Debug, Fail, PartialEq)]
pub enum TopologyError {
    #[fail(display = "switch \"{}\" at position {} is not at a boundary of track \"{}\" (length {})", _0, _1, _2, _3)]
    SwitchNotAtBoundary(String, f64, String, f64),
    #[fail(display = "switch \"{}\" is {:?} but sits at the {:?} of track \"{}\"", _0, _1, _2, _3)]
    OrientationMismatch(String, Orientation, TrackSide, String),
    #[fail(display = "switch \"{}\" needs its continuing course \"{}\" and at least one diverging course", _0, _1)]
    MissingCourse(String, String),
    #[fail(display = "the {:?} of track \"{}\" already carries a switch", _0, _1)]
    SwitchesCollide(TrackSide, String),
    #[fail(display = "unknown {} \"{}\"", _0, _1)]
    UnknownName(String, String),
    #[fail(display = "duplicate {} \"{}\"", _0, _1)]
    DuplicateId(String, String),
    #[fail(display = "connector \"{}\" is linked more than once", _0)]
    AlreadyLinked(String),
    #[fail(display = "open end at connector \"{}\" is also linked", _0)]
    OpenEndLinked(String),
    #[fail(display = "track \"{}\" has invalid length {}", _0, _1)]
    InvalidLength(String, f64),
    #[fail(display = "signal \"{}\" at {} lies outside track \"{}\"", _0, _1, _2)]
    SignalOutsideTrack(String, f64, String),
}

struct TrackSpec {
    id: String,
    name: String,
    length: f64,
}

struct SignalSpec {
    id: String,
    track: String,
    dir: Direction,
    pos: f64,
}

struct SwitchSpec {
    id: String,
    track: String,
    pos: f64,
    orientation: Orientation,
    continue_course: String,
    courses: Vec<String>,
}

/// Assembles a `StaticTopology` from named parts and validates it.
///
/// Every track gets two connectors, `<track>.begin` and `<track>.end`; every
/// switch gets `<switch>.trunk`, which is linked to its parent track
/// automatically, and one `<switch>.<course>` connector per course. All other
/// links are given explicitly by connector name.
#[derive(Default)]
pub struct TopologyBuilder {
    tracks: Vec<TrackSpec>,
    signals: Vec<SignalSpec>,
    switches: Vec<SwitchSpec>,
    open_ends: Vec<(String, TrackSide)>,
    links: Vec<(String, String)>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn track(&mut self, id: &str, name: &str, length: f64) -> &mut Self {
        self.tracks.push(TrackSpec {
            id: id.to_string(),
            name: name.to_string(),
            length: length,
        });
        self
    }

    pub fn open_end(&mut self, track: &str, side: TrackSide) -> &mut Self {
        self.open_ends.push((track.to_string(), side));
        self
    }

    pub fn signal(&mut self, id: &str, track: &str, dir: Direction, pos: f64) -> &mut Self {
        self.signals.push(SignalSpec {
            id: id.to_string(),
            track: track.to_string(),
            dir: dir,
            pos: pos,
        });
        self
    }

    pub fn switch(&mut self,
                  id: &str,
                  track: &str,
                  pos: f64,
                  orientation: Orientation,
                  continue_course: &str,
                  courses: &[&str])
                  -> &mut Self {
        self.switches.push(SwitchSpec {
            id: id.to_string(),
            track: track.to_string(),
            pos: pos,
            orientation: orientation,
            continue_course: continue_course.to_string(),
            courses: courses.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn link(&mut self, a: &str, b: &str) -> &mut Self {
        self.links.push((a.to_string(), b.to_string()));
        self
    }

    pub fn build(&self) -> Result<StaticTopology, TopologyError> {
        let mut names = TopologyNames::default();
        let mut connectors: Vec<Connector> = Vec::new();
        let mut tracks = Vec::new();

        let new_connector = |names: &mut TopologyNames,
                                 connectors: &mut Vec<Connector>,
                                 name: String,
                                 owner: ConnectorOwner|
         -> Result<ConnectorId, TopologyError> {
            let id = connectors.len();
            if names.connectors.insert(name.clone(), id).is_some() {
                return Err(TopologyError::DuplicateId("connector".to_string(), name));
            }
            connectors.push(Connector { name: name, owner: owner, link: None });
            Ok(id)
        };

        for spec in &self.tracks {
            let idx = tracks.len();
            if names.tracks.insert(spec.id.clone(), idx).is_some() {
                return Err(TopologyError::DuplicateId("track".to_string(), spec.id.clone()));
            }
            if !(spec.length > 0.0) || !spec.length.is_finite() {
                return Err(TopologyError::InvalidLength(spec.id.clone(), spec.length));
            }
            let begin = new_connector(&mut names, &mut connectors,
                                      format!("{}.begin", spec.id),
                                      ConnectorOwner::Track(idx, TrackSide::Begin))?;
            let end = new_connector(&mut names, &mut connectors,
                                    format!("{}.end", spec.id),
                                    ConnectorOwner::Track(idx, TrackSide::End))?;
            tracks.push(StaticTrack {
                id: spec.id.clone(),
                name: spec.name.clone(),
                length: spec.length,
                signals: SmallVec::new(),
                begin: TrackEnd { connector: begin, open_end: false },
                end: TrackEnd { connector: end, open_end: false },
            });
        }

        let mut signals = Vec::new();
        for spec in &self.signals {
            let track = lookup(&names.tracks, "track", &spec.track)?;
            if names.signals.insert(spec.id.clone(), signals.len()).is_some() {
                return Err(TopologyError::DuplicateId("signal".to_string(), spec.id.clone()));
            }
            if spec.pos < 0.0 || spec.pos > tracks[track].length {
                return Err(TopologyError::SignalOutsideTrack(spec.id.clone(), spec.pos, spec.track.clone()));
            }
            tracks[track].signals.push(TrackSignal {
                signal: signals.len(),
                dir: spec.dir,
                pos: spec.pos,
            });
            signals.push(StaticSignal {
                id: spec.id.clone(),
                track: track,
                dir: spec.dir,
                pos: spec.pos,
            });
        }

        let mut switches: Vec<StaticSwitch> = Vec::new();
        for spec in &self.switches {
            let idx = switches.len();
            let track = lookup(&names.tracks, "track", &spec.track)?;
            if names.switches.insert(spec.id.clone(), idx).is_some() {
                return Err(TopologyError::DuplicateId("switch".to_string(), spec.id.clone()));
            }

            let length = tracks[track].length;
            let side = if (spec.pos - 0.0).abs() <= BOUNDARY_TOLERANCE {
                TrackSide::Begin
            } else if (spec.pos - length).abs() <= BOUNDARY_TOLERANCE {
                TrackSide::End
            } else {
                return Err(TopologyError::SwitchNotAtBoundary(spec.id.clone(), spec.pos,
                                                              spec.track.clone(), length));
            };

            match (spec.orientation, side) {
                (Orientation::Outgoing, TrackSide::End) |
                (Orientation::Incoming, TrackSide::Begin) => {}
                _ => return Err(TopologyError::OrientationMismatch(spec.id.clone(), spec.orientation,
                                                                   side, spec.track.clone())),
            }

            if switches.iter().any(|s| s.track == track && s.side == side) {
                return Err(TopologyError::SwitchesCollide(side, spec.track.clone()));
            }

            let has_continue = spec.courses.iter().any(|c| *c == spec.continue_course);
            let has_diverging = spec.courses.iter().any(|c| *c != spec.continue_course);
            if !has_continue || !has_diverging {
                return Err(TopologyError::MissingCourse(spec.id.clone(), spec.continue_course.clone()));
            }

            let trunk = new_connector(&mut names, &mut connectors,
                                      format!("{}.trunk", spec.id),
                                      ConnectorOwner::SwitchTrunk(idx))?;
            let mut branches = SmallVec::new();
            for (b, course) in spec.courses.iter().enumerate() {
                let connector = new_connector(&mut names, &mut connectors,
                                              format!("{}.{}", spec.id, course),
                                              ConnectorOwner::SwitchBranch(idx, b))?;
                branches.push(Branch { course: course.clone(), connector: connector });
            }

            let parent_end = tracks[track].end(side).connector;
            connect(&mut connectors, parent_end, trunk)?;

            switches.push(StaticSwitch {
                id: spec.id.clone(),
                track: track,
                side: side,
                continue_course: spec.continue_course.clone(),
                orientation: spec.orientation,
                branches: branches,
            });
        }

        for &(ref a, ref b) in &self.links {
            let a = lookup(&names.connectors, "connector", a)?;
            let b = lookup(&names.connectors, "connector", b)?;
            connect(&mut connectors, a, b)?;
        }

        for &(ref track, side) in &self.open_ends {
            let track = lookup(&names.tracks, "track", track)?;
            let end = match side {
                TrackSide::Begin => &mut tracks[track].begin,
                TrackSide::End => &mut tracks[track].end,
            };
            if connectors[end.connector].link.is_some() {
                return Err(TopologyError::OpenEndLinked(connectors[end.connector].name.clone()));
            }
            end.open_end = true;
        }

        let mut by_name: HashMap<&str, SmallVec<[TrackId; 2]>> = HashMap::new();
        for (idx, track) in tracks.iter().enumerate() {
            by_name.entry(track.name.as_str()).or_insert_with(SmallVec::new).push(idx);
        }
        let siblings = tracks
            .iter()
            .enumerate()
            .map(|(idx, track)| {
                by_name[track.name.as_str()].iter().cloned().filter(|t| *t != idx).collect()
            })
            .collect();

        Ok(StaticTopology {
            tracks: tracks,
            switches: switches,
            signals: signals,
            connectors: connectors,
            names: names,
            siblings: siblings,
        })
    }
}

fn lookup(names: &NameMap, kind: &str, name: &str) -> Result<usize, TopologyError> {
    names.get(name)
        .cloned()
        .ok_or_else(|| TopologyError::UnknownName(kind.to_string(), name.to_string()))
}

fn connect(connectors: &mut Vec<Connector>, a: ConnectorId, b: ConnectorId) -> Result<(), TopologyError> {
    for &c in &[a, b] {
        if connectors[c].link.is_some() {
            return Err(TopologyError::AlreadyLinked(connectors[c].name.clone()));
        }
    }
    connectors[a].link = Some(b);
    connectors[b].link = Some(a);
    Ok(())
}
