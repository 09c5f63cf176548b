use crate::railway::{Aspect, Direction, SwitchPosition};
use failure::Fail;
use regex::Regex;

#[derive(Debug, PartialEq)]
pub struct Dispatch {
    pub actions: Vec<DispatchAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    Start,
    Stop,
    /// Advance to an absolute time.
    Advance(f64),
    /// Advance by a duration.
    Wait(f64),
    Switch(String, SwitchPosition),
    Signal(String, Aspect),
    Train(String, f64, Direction),
}

#[derive(Debug, Fail, PartialEq)]
pub enum ParseError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "error converting number on line {}: {}", _0, _1)]
    NumberError(usize, String),
    #[fail(display = "unrecognized dispatch on line {}: {}", _0, _1)]
    Unrecognized(usize, String),
}

/// Parses a scenario script, one command per line:
///
/// * start
/// * stop
/// * advance 120.0
/// * wait 10
/// * switch SW1 reverse
/// * signal M_up stop
/// * train L1 25.0 up
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_dispatch(input: &str) -> Result<Dispatch, ParseError> {
    let re = |s: &str| Regex::new(s).map_err(|e| ParseError::RegexError(format!("{:?}", e)));
    let start_re = re(r"^\s*start\s*$")?;
    let stop_re = re(r"^\s*stop\s*$")?;
    let advance_re = re(r"^\s*advance\s+([\d\.]+)\s*$")?;
    let wait_re = re(r"^\s*wait\s+([\d\.]+)\s*$")?;
    let switch_re = re(r"^\s*switch\s+([\w\.]+)\s+(normal|reverse)\s*$")?;
    let signal_re = re(r"^\s*signal\s+([\w\.]+)\s+(stop|proceed)\s*$")?;
    let train_re = re(r"(?x) ^ \s* train \s+ (?P<track>[\w\.]+) \s+
            (?P<pos>[\d\.]+) \s+
            (?P<dir>up|down) \s* $")?;

    let mut actions = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        let number = |s: &str| s.parse::<f64>().map_err(|_e| ParseError::NumberError(lineno, s.to_string()));

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if start_re.is_match(line) {
            actions.push(DispatchAction::Start);
            continue;
        }
        if stop_re.is_match(line) {
            actions.push(DispatchAction::Stop);
            continue;
        }
        if let Some(groups) = advance_re.captures(line) {
            actions.push(DispatchAction::Advance(number(&groups[1])?));
            continue;
        }
        if let Some(groups) = wait_re.captures(line) {
            actions.push(DispatchAction::Wait(number(&groups[1])?));
            continue;
        }
        if let Some(groups) = switch_re.captures(line) {
            let pos = match &groups[2] {
                "reverse" => SwitchPosition::Reverse,
                _ => SwitchPosition::Normal,
            };
            actions.push(DispatchAction::Switch(groups[1].to_string(), pos));
            continue;
        }
        if let Some(groups) = signal_re.captures(line) {
            let aspect = match &groups[2] {
                "stop" => Aspect::Stop,
                _ => Aspect::Proceed,
            };
            actions.push(DispatchAction::Signal(groups[1].to_string(), aspect));
            continue;
        }
        if let Some(groups) = train_re.captures(line) {
            let dir = match &groups["dir"] {
                "up" => Direction::Up,
                _ => Direction::Down,
            };
            actions.push(DispatchAction::Train(groups["track"].to_string(), number(&groups["pos"])?, dir));
            continue;
        }
        return Err(ParseError::Unrecognized(lineno, line.to_string()));
    }

    Ok(Dispatch { actions: actions })
}
