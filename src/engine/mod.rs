//! Command line surface and the helpers shared by the parsers.

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;
pub mod tools;

pub use arg_parser::{Cli, Commands};
pub use cli::handle_run;
pub use hashing::{ChecksumAlgorithm, checksum_file, parse_checksum_option};
pub use tools::path_relative_to;
