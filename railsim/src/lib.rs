pub mod input;
pub mod output;
pub mod eventsim;
pub mod railway;
pub mod simulation;

#[cfg(test)]
mod tests;

use failure::format_err;
use input::dispatch::{Dispatch, DispatchAction};
use input::settings::Settings;
use input::topology::StaticTopology;
use output::history::{recorder, History};
use simulation::Simulation;
use std::path::Path;

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f: &Path) -> AppResult<String> {
    use std::fs::File;
    use std::io::prelude::*;
    use std::io::BufReader;

    let file = File::open(f)?;
    let mut file = BufReader::new(&file);
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn get_dispatch(s: &Path) -> AppResult<Dispatch> {
    let contents = read_file(s)?;
    let d = input::dispatch::parse_dispatch(&contents)?;
    Ok(d)
}

/// Applies one scenario command. Names are resolved against the topology.
pub fn apply(sim: &mut Simulation, action: &DispatchAction) -> AppResult<()> {
    match *action {
        DispatchAction::Start => sim.start(),
        DispatchAction::Stop => sim.stop(),
        DispatchAction::Advance(t) => {
            sim.advance_to(t);
        }
        DispatchAction::Wait(dt) => {
            sim.advance_by(dt);
        }
        DispatchAction::Switch(ref name, pos) => {
            let id = sim.topology.switch_id(name).ok_or_else(|| format_err!("unknown switch \"{}\"", name))?;
            sim.command_switch(id, pos);
        }
        DispatchAction::Signal(ref name, aspect) => {
            let id = sim.topology.signal_id(name).ok_or_else(|| format_err!("unknown signal \"{}\"", name))?;
            sim.request_aspect(id, aspect);
        }
        DispatchAction::Train(ref track, pos, dir) => {
            let id = sim.topology.track_id(track).ok_or_else(|| format_err!("unknown track \"{}\"", track))?;
            sim.place_train(id, pos, dir)
                .ok_or_else(|| format_err!("cannot place train on \"{}\" at {}", track, pos))?;
        }
    }
    Ok(())
}

/// Runs a scenario script on a fresh simulation and returns what happened.
pub fn evaluate(topology: StaticTopology, settings: Settings, dispatch: &Dispatch) -> AppResult<(Simulation, History)> {
    let mut sim = Simulation::new(topology, settings);
    let (history, observer) = recorder();
    sim.subscribe(observer);
    for action in &dispatch.actions {
        apply(&mut sim, action)?;
    }
    let h = history.replace(History::default());
    Ok((sim, h))
}
