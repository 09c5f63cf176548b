use super::dynamics::TrainParams;
use super::*;
use crate::input::topology::StaticTopology;
use smallvec::SmallVec;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct TrackState {
    /// Trains whose logical occupation covers this track.
    pub occupants: SmallVec<[TrainId; 2]>,
}

impl TrackState {
    pub fn is_occupied(&self) -> bool {
        !self.occupants.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct SignalState {
    pub aspect: Aspect,
    pub pending: Option<Aspect>,
}

#[derive(Clone, Debug)]
pub struct SwitchDynamic {
    pub state: SwitchState,
    pub target: SwitchPosition,
    pub started_at: f64,
    pub duration: f64,
}

impl SwitchDynamic {
    /// Position the switch lies in or is heading for.
    pub fn effective(&self) -> SwitchPosition {
        match self.state {
            SwitchState::Normal => SwitchPosition::Normal,
            SwitchState::Reverse => SwitchPosition::Reverse,
            SwitchState::Moving => self.target,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    pub params: TrainParams,
    pub speed: f64,
    pub track: TrackId,
    pub position: f64,
    pub direction: Direction,
    /// Tracks the train body physically covers, head first.
    pub physical: SmallVec<[TrackId; 4]>,
    /// `physical` plus same-named sibling tracks.
    pub occupied: SmallVec<[TrackId; 4]>,
    pub waiting: Option<SignalId>,
    pub generation: u64,
}

/// Mutable state of the railway.
#[derive(Debug)]
pub struct World {
    pub tracks: Vec<TrackState>,
    pub switches: Vec<SwitchDynamic>,
    pub signals: Vec<SignalState>,
    pub trains: BTreeMap<TrainId, Train>,
    next_train: TrainId,
}

impl World {
    pub fn new(topology: &StaticTopology) -> World {
        World {
            tracks: topology.tracks.iter().map(|_| TrackState::default()).collect(),
            switches: topology.switches
                .iter()
                .map(|_| SwitchDynamic {
                    state: SwitchState::Normal,
                    target: SwitchPosition::Normal,
                    started_at: 0.0,
                    duration: 0.0,
                })
                .collect(),
            signals: topology.signals
                .iter()
                .map(|_| SignalState { aspect: Aspect::Proceed, pending: None })
                .collect(),
            trains: BTreeMap::new(),
            next_train: 0,
        }
    }

    /// Registers a standing train at a position. Occupancy is left empty;
    /// it is computed by the occupancy tracker.
    pub fn add_train(&mut self,
                     name: Option<String>,
                     params: TrainParams,
                     track: TrackId,
                     position: f64,
                     direction: Direction)
                     -> TrainId {
        let id = self.next_train;
        self.next_train += 1;
        let name = name.unwrap_or_else(|| format!("T{}", id + 1));
        self.trains.insert(id, Train {
            id: id,
            name: name,
            params: params,
            speed: 0.0,
            track: track,
            position: position,
            direction: direction,
            physical: SmallVec::new(),
            occupied: SmallVec::new(),
            waiting: None,
            generation: 0,
        });
        id
    }

    /// Removes a train and scrubs it from every occupant list.
    pub fn remove_train(&mut self, id: TrainId) -> Option<Train> {
        let train = self.trains.remove(&id)?;
        for track in self.tracks.iter_mut() {
            track.occupants.retain(|t| *t != id);
        }
        Some(train)
    }

    pub fn any_track_occupied(&self) -> bool {
        self.tracks.iter().any(|t| t.is_occupied())
    }

    pub fn any_switch_moving(&self) -> bool {
        self.switches.iter().any(|s| s.state == SwitchState::Moving)
    }

    pub fn trains_waiting_at(&self, signal: SignalId) -> Vec<TrainId> {
        self.trains
            .values()
            .filter(|t| t.waiting == Some(signal))
            .map(|t| t.id)
            .collect()
    }
}
