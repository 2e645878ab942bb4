//! Task scheduling: the single-flight orchestrator and the isolated worker processes it drives.

pub mod launcher;
pub mod orchestrator;
pub mod thumbnail;
pub mod worker;

pub use launcher::{ProcessLauncher, TaskLauncher, WorkerHandle, WorkerStatus};
pub use orchestrator::{Orchestrator, OrchestratorState, TickOutcome};
pub use thumbnail::{ThumbnailOptions, ThumbnailSummary, generate_thumbnails};
pub use worker::{WorkerArgs, index_directory, run_worker};
