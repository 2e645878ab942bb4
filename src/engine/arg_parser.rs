use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::TaskKind;

/// Crawl directories into a search index and run indexing tasks one at a time.
#[derive(Clone, Parser)]
#[command(name = "sist")]
#[command(about = "Crawl, parse and index directories; schedule indexing tasks.")]
pub struct Cli {
    /// Config file. Default: $SIST_CONFIG, else ./sist.toml.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run the task scheduler until Ctrl+C.
    Serve,
    /// Register a directory for crawling.
    AddDir {
        path: PathBuf,
        /// Display name. Default: the directory's file name.
        #[arg(long)]
        name: Option<String>,
        /// Per-directory option, e.g. -o MimeGuesser=content. Repeatable.
        #[arg(long = "option", short = 'o', value_name = "KEY=VALUE", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },
    /// List registered directories.
    Dirs,
    /// Queue an index task for a directory.
    Index { directory_id: i64 },
    /// Queue a thumbnail task for a directory.
    Thumbnails { directory_id: i64 },
    /// Ask the scheduler to cancel a task.
    Cancel { task_id: i64 },
    /// Index a directory in the foreground, without the scheduler.
    Crawl { directory_id: i64 },
    #[command(hide = true)]
    Worker(WorkerCommand),
}

/// Arguments the scheduler passes to a worker process.
#[derive(Clone, Args)]
pub struct WorkerCommand {
    #[arg(long)]
    pub task_id: i64,
    #[arg(long, value_enum)]
    pub kind: TaskKind,
    #[arg(long)]
    pub directory_id: i64,
    /// Shared progress counters file.
    #[arg(long)]
    pub progress: PathBuf,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if k.trim().is_empty() {
        return Err(format!("empty option name in {s:?}"));
    }
    Ok((k.trim().to_string(), v.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_args_parse() {
        let cli = Cli::parse_from([
            "sist",
            "worker",
            "--task-id",
            "3",
            "--kind",
            "generate-thumbnails",
            "--directory-id",
            "1",
            "--progress",
            "/tmp/p",
            "--config",
            "x.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        let Commands::Worker(w) = cli.command else {
            panic!("expected worker");
        };
        assert_eq!((w.task_id, w.kind, w.directory_id), (3, TaskKind::GenerateThumbnails, 1));
    }

    #[test]
    fn add_dir_options() {
        let cli = Cli::parse_from(["sist", "add-dir", "/data", "-o", "MimeGuesser=content"]);
        let Commands::AddDir { options, .. } = cli.command else {
            panic!("expected add-dir");
        };
        assert_eq!(options, vec![("MimeGuesser".to_string(), "content".to_string())]);
        assert!(parse_key_value("novalue").is_err());
    }
}
