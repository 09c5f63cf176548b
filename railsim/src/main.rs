use failure::format_err;
use log::{Level, LevelFilter, Log, Metadata, Record};
use railsim::input::{dispatch, layouts, settings::Settings};
use railsim::output::history::{format_time, recorder, train_table};
use railsim::output::json::{javascript_history, json_history};
use railsim::simulation::Simulation;
use railsim::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use structopt::StructOpt;

/// railsim -- discrete event simulation of rail traffic
#[derive(StructOpt, Debug)]
#[structopt(name = "railsim")]
struct Opt {
    /// Verbose mode (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Demo layout: line | loop
    #[structopt(short = "l", long = "layout", default_value = "loop")]
    layout: String,

    /// Settings file (JSON); missing fields take default values
    #[structopt(short = "s", long = "settings", parse(from_os_str))]
    settings: Option<PathBuf>,

    /// Scenario script. Without one the simulation is started and run
    /// until `--until`.
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Simulated time to run to, in seconds
    #[structopt(short = "u", long = "until", default_value = "3600")]
    until: f64,

    /// Random seed, overrides the settings file
    #[structopt(long = "seed")]
    seed: Option<u64>,

    /// Do not spawn trains travelling up
    #[structopt(long = "no-spawn-up")]
    no_spawn_up: bool,

    /// Do not spawn trains travelling down
    #[structopt(long = "no-spawn-down")]
    no_spawn_down: bool,

    /// Output JSON history file
    #[structopt(short = "j", long = "json", parse(from_os_str))]
    json: Option<PathBuf>,

    /// Output JSON history as JavaScript
    #[structopt(short = "J", long = "javascript", parse(from_os_str))]
    javascript: Option<PathBuf>,
}

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let tag = match record.level() {
                Level::Error => "error",
                Level::Warn => "warning",
                Level::Info => "info",
                Level::Debug => "debug",
                Level::Trace => "trace",
            };
            eprintln!("{:>7} {}", tag, record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: u8) -> AppResult<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    log::set_boxed_logger(Box::new(StderrLogger { level: level }))
        .map_err(|e| format_err!("cannot install logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

fn run(opt: &Opt) -> AppResult<()> {
    let mut settings = match opt.settings {
        Some(ref path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(seed) = opt.seed {
        settings.seed = seed;
    }
    if opt.no_spawn_up {
        settings.train_spawn_up = false;
    }
    if opt.no_spawn_down {
        settings.train_spawn_down = false;
    }

    let topology = layouts::by_name(&opt.layout)
        .ok_or_else(|| format_err!("unknown layout \"{}\"", opt.layout))??;
    if opt.verbose >= 2 {
        println!("Infrastructure:");
        for t in &topology.tracks {
            println!("  * track {} ({}) length {}", t.id, t.name, t.length);
        }
        for s in &topology.switches {
            println!("  * switch {} on {} {:?}", s.id, topology.tracks[s.track].id, s.orientation);
        }
        for s in &topology.signals {
            println!("  * signal {} on {} at {} {:?}", s.id, topology.tracks[s.track].id, s.pos, s.dir);
        }
    }

    let mut sim = Simulation::new(topology, settings);
    let (history, observer) = recorder();
    sim.subscribe(observer);

    match opt.script {
        Some(ref path) => {
            let d = dispatch::parse_dispatch(&read_file(path)?)?;
            for action in &d.actions {
                apply(&mut sim, action)?;
            }
        }
        None => {
            sim.start();
            while sim.is_running() && sim.time() < opt.until {
                let target = (sim.time() + 1.0).min(opt.until);
                let time = sim.advance_to(target);
                if opt.verbose >= 1 {
                    println!("{} trains={} pending={}", format_time(time), sim.world.trains.len(),
                             sim.pending_events());
                }
            }
        }
    }

    let h = history.borrow();
    print!("{}", train_table(&h)?);
    match sim.accident() {
        Some(a) => println!("halted: {}", a.description),
        None => println!("finished at {}", format_time(sim.time())),
    }

    if let Some(ref f) = opt.json {
        let mut out = BufWriter::new(File::create(f)?);
        json_history(&sim.topology, &h, &mut out)?;
    }
    if let Some(ref f) = opt.javascript {
        let mut out = BufWriter::new(File::create(f)?);
        javascript_history(&sim.topology, &h, &mut out)?;
    }
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    if let Err(e) = init_logging(opt.verbose) {
        eprintln!("{}", e);
    }
    match run(&opt) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
