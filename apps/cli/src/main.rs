//! agent-context CLI: install package-provided agent context and keep a
//! project's agent document up to date.
//!
//! Discovers installed packages that ship a `context/` directory, copies
//! their fragments into `.context/`, and merges a generated summary into the
//! `## Context` section of `AGENT.md`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
