use super::history::History;
use crate::input::topology::StaticTopology;
use failure::Error;
use serde::Serialize;
use std::io;

#[derive(Serialize)]
struct Names<'a> {
    tracks: Vec<&'a str>,
    switches: Vec<&'a str>,
    signals: Vec<&'a str>,
}

#[derive(Serialize)]
struct JsonHistory<'a> {
    infrastructure: Names<'a>,
    history: &'a History,
}

/// Writes the history as JSON. Ids in the history index the name lists in
/// `infrastructure`.
pub fn json_history<W: io::Write>(topo: &StaticTopology, history: &History, f: &mut W) -> Result<(), Error> {
    let doc = JsonHistory {
        infrastructure: Names {
            tracks: topo.tracks.iter().map(|t| t.id.as_str()).collect(),
            switches: topo.switches.iter().map(|s| s.id.as_str()).collect(),
            signals: topo.signals.iter().map(|s| s.id.as_str()).collect(),
        },
        history: history,
    };
    serde_json::to_writer_pretty(&mut *f, &doc)?;
    writeln!(f)?;
    Ok(())
}

pub fn javascript_history<W: io::Write>(topo: &StaticTopology, history: &History, f: &mut W) -> Result<(), Error> {
    write!(f, "var data = ")?;
    json_history(topo, history, f)?;
    write!(f, ";")?;
    Ok(())
}
