pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod settings_toml;

pub use config::*;
pub use fd_limit::{cap_parse_threads, max_open_fds, max_workers_by_fd_limit};
pub use logger::setup_logging;
pub use settings_toml::{load_settings, resolve_config_path};
