use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Install the process logger. `role` tags lines from spawned worker processes (e.g. `worker`).
/// Safe to call more than once; later calls are no-ops.
pub fn setup_logging(verbose: bool, role: Option<&str>) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let label = match role {
        Some(r) => format!("{}:{}", env!("CARGO_PKG_NAME"), r),
        None => env!("CARGO_PKG_NAME").to_string(),
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // dependencies: warnings only
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(move |buf, record| {
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        _ => "ERROR".red(),
                    };
                    let target = record.target().to_string().white();
                    format!("[{} {} {}] {}", label.cyan(), level_str, target, record.args())
                }
                _ => format!("[{}] {}", label.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
