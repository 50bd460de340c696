//! `playwire`: probe media metadata or play a file through the playback engine.
//!
//! ## Commands
//! - `probe`: print discovered stream metadata, as text or JSON.
//! - `play`: open, pre-roll and play a resource, pumping the engine on a fixed tick
//!   until end of stream (unless looping) or Ctrl-C.

use anyhow::Result;
use clap::Parser;
use playwire_cli::{cli, runtime};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,playwire=info,playwire_cli=info")
        }))
        .init();

    runtime::run(args)
}
