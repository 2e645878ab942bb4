//! sist CLI: register directories, queue tasks, run the scheduler.

use anyhow::Result;
use clap::Parser;
use sist::engine::arg_parser::Cli;
use sist::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
