// SPDX-License-Identifier: MIT OR Apache-2.0
//! `FlowStep` debugger - step through dataflow graphs node by node.
//!
//! Usage:
//!
//! ```text
//! flowstep [CONFIG] [--demo NAME]   debug a demo graph
//! flowstep --init [PATH]            write a starter config
//! ```
//!
//! Without `CONFIG`, `flowstep.ron` in the working directory is used when it
//! exists. Log output is controlled with `RUST_LOG`.

mod commands;
mod config;
mod demo;

use clap::Parser;
use commands::{Command, Session};
use config::{DebuggerConfig, CONFIG_FILE_NAME};
use demo::Demo;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command line
#[derive(Debug, Parser)]
#[command(name = "flowstep", version, about = "Step through dataflow graphs node by node")]
struct Args {
    /// Config file (defaults to flowstep.ron when present)
    config: Option<PathBuf>,

    /// Demo graph to load, overriding the config
    #[arg(long, value_enum)]
    demo: Option<Demo>,

    /// Write a starter config and exit
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = CONFIG_FILE_NAME)]
    init: Option<PathBuf>,
}

fn load_config(args: &Args) -> std::io::Result<DebuggerConfig> {
    let mut config = match &args.config {
        Some(path) => DebuggerConfig::load(path)?,
        None if Path::new(CONFIG_FILE_NAME).exists() => DebuggerConfig::load(Path::new(CONFIG_FILE_NAME))?,
        None => DebuggerConfig::default(),
    };
    if let Some(demo) = args.demo {
        config.demo = demo;
    }
    Ok(config)
}

fn repl(session: &mut Session<'_>) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        write!(stdout, "(flowstep) ")?;
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => return Ok(()),
            Ok(command) => match session.execute(command) {
                Ok(output) => write!(stdout, "{output}")?,
                Err(e) => writeln!(stdout, "error: {e}")?,
            },
            Err(e) => writeln!(stdout, "{e}")?,
        }
    }
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flowstep_debugger=info,flowstep_graph=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Some(path) = &args.init {
        return match DebuggerConfig::default().save(path) {
            Ok(()) => {
                tracing::info!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {e}", path.display());
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let demo_graph = match config.demo.build() {
        Ok(demo_graph) => demo_graph,
        Err(e) => {
            tracing::error!("Failed to build demo {}: {e}", config.demo);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Starting FlowStep debugger v{} on demo {} ({} nodes)",
        env!("CARGO_PKG_VERSION"),
        config.demo,
        demo_graph.graph.node_count()
    );

    let mut session = Session::new(&demo_graph.graph, &config);
    if let Err(e) = repl(&mut session) {
        tracing::error!("Debugger crashed: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(result) = demo_graph.result(session.processor().context()) {
        tracing::info!("{}.{} = {}", config.demo, demo_graph.result_field, result);
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("flowstep").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["session.ron", "--demo", "macro"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("session.ron")));
        assert_eq!(parsed.demo, Some(Demo::Macro));
        assert!(parsed.init.is_none());

        let parsed = args(&["--demo", "for_each"]).unwrap();
        assert_eq!(parsed.demo, Some(Demo::ForEach));
        assert!(parsed.config.is_none());

        let parsed = args(&["--init"]).unwrap();
        assert_eq!(parsed.init, Some(PathBuf::from(CONFIG_FILE_NAME)));

        let parsed = args(&["--init", "custom.ron"]).unwrap();
        assert_eq!(parsed.init, Some(PathBuf::from("custom.ron")));

        assert!(args(&["--demo"]).is_err());
        assert!(args(&["--demo", "nope"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
