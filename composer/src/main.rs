//! Modular rig composer.
//!
//! Builds a modular rig from a module graph model (`rig.json`) and a library
//! of declarative rig types (`types.toml`), then prints its module tree, runs
//! events or resolves connectors. Engine diagnostics go to stderr and turn
//! the exit code into [`exit_codes::DEGRADED`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use composer::engine::ModularRig;
use composer::exit_codes;
use composer::io::init::{InitOptions, init_workspace};
use composer::io::model_store::load_model;
use composer::logging;
use composer::session::{Session, SessionFiles, render_matches, render_queue, render_tree};

#[derive(Parser)]
#[command(
    name = "composer",
    version,
    about = "Compose modular rigs and run their events"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct Inputs {
    /// Module graph model.
    #[arg(default_value = "rig.json")]
    model: PathBuf,
    /// Type library.
    #[arg(long, default_value = "types.toml")]
    types: PathBuf,
    /// Composer configuration; defaults apply when missing.
    #[arg(long, default_value = "composer.toml")]
    config: PathBuf,
}

impl Inputs {
    fn files(&self) -> SessionFiles {
        SessionFiles {
            model: self.model.clone(),
            types: self.types.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create `composer.toml`, `rig.json` and `types.toml` if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a model against the schema and invariants.
    Validate {
        #[arg(default_value = "rig.json")]
        model: PathBuf,
    },
    /// Build the rig and print its module tree.
    Tree {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Build the rig, run events and print the execution queue.
    Run {
        #[command(flatten)]
        inputs: Inputs,
        /// Event to run; repeatable. Defaults to `evaluate_events` from the config.
        #[arg(short, long = "event")]
        events: Vec<String>,
        /// Print the queue as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Build the rig and list candidate targets of a connector.
    Resolve {
        #[command(flatten)]
        inputs: Inputs,
        /// Connector name, namespaced (`Spine/Arm:parent`) or as displayed.
        #[arg(short, long)]
        connector: String,
        /// Print the matches as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Validate { model } => cmd_validate(&model),
        Command::Tree { inputs } => cmd_tree(&inputs),
        Command::Run {
            inputs,
            events,
            json,
        } => cmd_run(&inputs, &events, json),
        Command::Resolve {
            inputs,
            connector,
            json,
        } => cmd_resolve(&inputs, &connector, json),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let paths = init_workspace(Path::new("."), &InitOptions { force })?;
    println!("initialized {}", paths.model_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(model: &Path) -> Result<i32> {
    let model = load_model(model)?;
    println!(
        "ok: {} modules, {} connections",
        model.modules.len(),
        model.connections.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_tree(inputs: &Inputs) -> Result<i32> {
    let session = Session::open(&inputs.files())?;
    print!("{}", render_tree(&session.rig));
    Ok(finish(session.rig))
}

fn cmd_run(inputs: &Inputs, events: &[String], json: bool) -> Result<i32> {
    let mut session = Session::open(&inputs.files())?;
    let events = session.events_or_default(events);
    session.evaluate(&events);
    if json {
        print_json(session.rig.queue())?;
    } else {
        print!("{}", render_queue(&session.rig));
    }
    Ok(finish(session.rig))
}

fn cmd_resolve(inputs: &Inputs, connector: &str, json: bool) -> Result<i32> {
    let mut session = Session::open(&inputs.files())?;
    let matches = session.resolve(connector);
    if json {
        print_json(&matches)?;
    } else {
        print!("{}", render_matches(&session.rig, &matches));
    }
    Ok(finish(session.rig))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report diagnostics on stderr and pick the exit code.
fn finish(mut rig: ModularRig) -> i32 {
    let diagnostics = rig.take_diagnostics();
    for diagnostic in diagnostics.iter().filter(|d| d.is_problem()) {
        eprintln!("{diagnostic}");
    }
    if diagnostics.iter().any(|d| d.is_problem()) {
        exit_codes::DEGRADED
    } else {
        exit_codes::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["composer", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["composer", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_with_repeated_events() {
        let cli = Cli::parse_from([
            "composer",
            "run",
            "model.json",
            "--event",
            "Construction",
            "-e",
            "Forwards Solve",
        ]);
        let Command::Run { inputs, events, json } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(inputs.model, PathBuf::from("model.json"));
        assert_eq!(inputs.types, PathBuf::from("types.toml"));
        assert_eq!(events, vec!["Construction", "Forwards Solve"]);
        assert!(!json);
    }

    #[test]
    fn parse_resolve_requires_connector() {
        assert!(Cli::try_parse_from(["composer", "resolve"]).is_err());
        let cli = Cli::parse_from(["composer", "resolve", "--connector", "parent"]);
        assert!(matches!(cli.command, Command::Resolve { .. }));
    }
}
