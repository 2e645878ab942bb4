//! End-to-end runs of the `sist` binary against a scratch config.

use sist::search::{SearchIndex, SqliteIndex};
use sist::storage::{SqliteStorage, Storage};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};

struct Env {
    scratch: tempfile::TempDir,
    config: PathBuf,
    data: PathBuf,
}

impl Env {
    fn new() -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let data = scratch.path().join("data");
        fs::create_dir_all(data.join("docs")).unwrap();
        fs::write(data.join("readme.txt"), "hello index").unwrap();
        fs::write(data.join("docs").join("notes.md"), "# notes").unwrap();
        fs::write(data.join("docs").join("blob.bin"), [0u8, 159, 146, 150]).unwrap();

        let config = scratch.path().join("sist.toml");
        let root = scratch.path().display().to_string();
        fs::write(
            &config,
            format!(
                r#"
[settings]
db_path = "{root}/local_storage.db"
data_dir = "{root}/.sist"
thumbnail_dir = "{root}/thumbnails"
index_every = 2
parse_threads = 2
poll_interval_ms = 50

[index]
backend = "sqlite"
path = "{root}/documents.db"
"#
            ),
        )
        .unwrap();
        Env {
            scratch,
            config,
            data,
        }
    }

    fn sist(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sist"));
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        let out = self.sist().args(args).output().unwrap();
        assert!(
            out.status.success(),
            "sist {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        out
    }

    fn path(&self, name: &str) -> PathBuf {
        self.scratch.path().join(name)
    }

    fn add_data_dir(&self) -> i64 {
        let out = self.run(&["add-dir", self.data.to_str().unwrap(), "--name", "data"]);
        let stdout = String::from_utf8_lossy(&out.stdout);
        stdout.split('\t').next().unwrap().trim().parse().unwrap()
    }
}

fn document_count(path: &Path) -> u64 {
    SqliteIndex::open(path).unwrap().document_count().unwrap()
}

#[test]
fn test_add_dir_and_foreground_crawl() {
    let env = Env::new();
    let id = env.add_data_dir();

    let out = env.run(&["dirs"]);
    assert!(String::from_utf8_lossy(&out.stdout).contains("\tdata\t"));

    env.run(&["crawl", &id.to_string()]);
    assert_eq!(document_count(&env.path("documents.db")), 3);

    // Re-indexing replaces rather than duplicates.
    env.run(&["crawl", &id.to_string()]);
    assert_eq!(document_count(&env.path("documents.db")), 3);
}

#[test]
fn test_duplicate_add_dir_fails() {
    let env = Env::new();
    env.add_data_dir();
    let out = env
        .sist()
        .args(["add-dir", env.data.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_scheduler_runs_queued_index_task() {
    let env = Env::new();
    let id = env.add_data_dir();
    env.run(&["index", &id.to_string()]);

    let storage = SqliteStorage::open(&env.path("local_storage.db")).unwrap();
    assert_eq!(storage.list_pending_tasks().unwrap().len(), 1);

    let mut serve = env.sist().arg("serve").spawn().unwrap();
    let deadline = Instant::now() + Duration::from_secs(60);
    while !storage.list_pending_tasks().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
    }
    let _ = serve.kill();
    let _ = serve.wait();

    assert!(storage.list_pending_tasks().unwrap().is_empty());
    assert_eq!(document_count(&env.path("documents.db")), 3);
}
