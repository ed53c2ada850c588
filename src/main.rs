mod app;
mod catalog;
mod config;
mod fetch;
mod game;
mod install;
mod locate;
mod select;
mod steam;
mod workspace;

use anyhow::Result;
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("Mapsmith");
                println!("  Interactive installer for Source engine map packs.");
                println!("  Run without arguments to open the menu.");
                println!("  Settings: $MAPSMITH_CONFIG or the local data dir (mapsmith/config.json).");
                return Ok(());
            }
            "--version" | "-V" => {
                println!("Mapsmith v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => eprintln!("ignoring unknown argument: {other}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let app = app::App::initialize()?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let color = stdout.is_terminal();
    let mut prompt = select::Prompt::new(stdin.lock(), stdout).with_color(color);
    app.run(&mut prompt)
}
