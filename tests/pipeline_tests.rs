//! Crawl pipeline tests: batching, failure isolation, dispatch and counters.

use anyhow::Result;
use sist::parsing::{FileParser, GenericFileParser, MimeGuesser, ParserRegistry};
use sist::pipeline::{CrawlOptions, Crawler};
use sist::search::{SearchIndex, SqliteIndex};
use sist::types::{DocumentSummary, ParsedDocument};
use sist::SharedProgress;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Index double that records every flushed batch.
#[derive(Default)]
struct RecordingIndex {
    batches: Mutex<Vec<Vec<ParsedDocument>>>,
    fail: bool,
}

impl RecordingIndex {
    fn batches(&self) -> Vec<Vec<ParsedDocument>> {
        self.batches.lock().unwrap().clone()
    }
}

impl SearchIndex for RecordingIndex {
    fn delete_directory(&self, _directory_id: i64) -> Result<()> {
        Ok(())
    }

    fn index_batch(&self, documents: &[ParsedDocument], _directory_id: i64) -> Result<()> {
        if self.fail {
            anyhow::bail!("index unavailable");
        }
        self.batches.lock().unwrap().push(documents.to_vec());
        Ok(())
    }

    fn get_all_documents(&self, _directory_id: i64) -> Result<Vec<DocumentSummary>> {
        Ok(Vec::new())
    }

    fn document_count(&self) -> Result<u64> {
        Ok(self.batches.lock().unwrap().iter().map(|b| b.len() as u64).sum())
    }
}

/// Mime by extension, with made-up types for the misbehaving parsers.
struct TestGuesser;

impl MimeGuesser for TestGuesser {
    fn guess_mime(&self, path: &Path) -> String {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bad") => "application/x-bad",
            Some("boom") => "application/x-boom",
            Some("slow") => "application/x-slow",
            Some("txt") => "text/plain",
            _ => "application/x-unregistered",
        }
        .to_string()
    }
}

struct FailingParser;

impl FileParser for FailingParser {
    fn name(&self) -> &'static str {
        "failing"
    }
    fn mime_types(&self) -> &[&'static str] {
        &["application/x-bad"]
    }
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        anyhow::bail!("cannot parse {}", path.display())
    }
}

struct PanickingParser;

impl FileParser for PanickingParser {
    fn name(&self) -> &'static str {
        "panicking"
    }
    fn mime_types(&self) -> &[&'static str] {
        &["application/x-boom"]
    }
    fn parse(&self, _path: &Path) -> Result<ParsedDocument> {
        panic!("parser bug")
    }
}

/// Takes longer per file than the consumer is willing to wait.
struct SlowParser;

impl FileParser for SlowParser {
    fn name(&self) -> &'static str {
        "slow"
    }
    fn mime_types(&self) -> &[&'static str] {
        &["application/x-slow"]
    }
    fn parse(&self, _path: &Path) -> Result<ParsedDocument> {
        std::thread::sleep(Duration::from_millis(300));
        let mut doc = ParsedDocument::new();
        doc.insert("parser", "slow");
        Ok(doc)
    }
}

/// Tags documents so dispatch can be observed.
struct TaggingParser;

impl FileParser for TaggingParser {
    fn name(&self) -> &'static str {
        "tagging"
    }
    fn mime_types(&self) -> &[&'static str] {
        &["text/plain"]
    }
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let mut doc = ParsedDocument::new();
        doc.insert("parser", "tagging");
        doc.insert("file", path.file_name().unwrap().to_string_lossy().into_owned());
        Ok(doc)
    }
}

fn write_files(root: &Path, names: &[&str]) {
    for name in names {
        let p = root.join(name);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, format!("contents of {name}")).unwrap();
    }
}

fn registry(root: &Path) -> ParserRegistry {
    ParserRegistry::new(vec![
        Arc::new(GenericFileParser::new(vec![], root.to_path_buf())),
        Arc::new(TaggingParser),
        Arc::new(FailingParser),
        Arc::new(PanickingParser),
        Arc::new(SlowParser),
    ])
    .unwrap()
}

fn opts(index_every: usize, threads: usize) -> CrawlOptions {
    CrawlOptions {
        parse_threads: threads,
        index_every,
        input_queue_cap: 4,
        consumer_idle_timeout: Duration::from_secs(30),
        ..CrawlOptions::default()
    }
}

fn crawl(root: &Path, index: &dyn SearchIndex, o: CrawlOptions) -> (SharedProgress, Result<sist::CrawlSummary>) {
    let progress = SharedProgress::anonymous().unwrap();
    let crawler = Crawler::new(registry(root), Box::new(TestGuesser), index, 1, o);
    let result = crawler.crawl(root, &progress);
    (progress, result)
}

#[test]
fn test_seven_documents_flush_three_three_one() {
    let dir = tempfile::tempdir().unwrap();
    write_files(
        dir.path(),
        &["a.txt", "b.txt", "c.txt", "d.txt", "sub/e.txt", "sub/f.txt", "sub/deep/g.txt"],
    );
    let index = RecordingIndex::default();
    let (progress, summary) = crawl(dir.path(), &index, opts(3, 4));
    let summary = summary.unwrap();

    let sizes: Vec<usize> = index.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(summary.flush_sizes, vec![3, 3, 1]);
    assert_eq!(progress.total(), 7);
    assert_eq!(progress.parsed(), 7);
    assert!(!progress.is_done());
}

#[test]
fn test_failing_files_are_skipped_and_crawl_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_files(
        dir.path(),
        &["ok1.txt", "ok2.txt", "broken.bad", "crash.boom", "ok3.txt"],
    );
    let index = RecordingIndex::default();
    let (progress, summary) = crawl(dir.path(), &index, opts(2, 3));
    let summary = summary.unwrap();

    let docs: Vec<ParsedDocument> = index.batches().into_iter().flatten().collect();
    let files: HashSet<String> = docs
        .iter()
        .map(|d| d.get_text("file").unwrap().to_string())
        .collect();
    assert_eq!(
        files,
        HashSet::from(["ok1.txt".to_string(), "ok2.txt".to_string(), "ok3.txt".to_string()])
    );
    assert_eq!(summary.failed, 2);
    assert_eq!(progress.total(), 5);
    assert_eq!(progress.parsed(), 3);
    assert!(progress.parsed() <= progress.total());
}

#[test]
fn test_unregistered_mime_goes_to_default_parser() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["notes.txt", "blob.xyz"]);
    let index = RecordingIndex::default();
    let (_progress, summary) = crawl(dir.path(), &index, opts(10, 2));
    summary.unwrap();

    let docs: Vec<ParsedDocument> = index.batches().into_iter().flatten().collect();
    assert_eq!(docs.len(), 2);
    let blob = docs
        .iter()
        .find(|d| d.get_text("name") == Some("blob"))
        .expect("generic document for blob.xyz");
    assert_eq!(blob.get_text("mime"), Some("application/x-unregistered"));
    assert_eq!(blob.get_text("extension"), Some("xyz"));
    assert!(!blob.contains_key("parser"));

    let notes = docs
        .iter()
        .find(|d| d.get_text("parser") == Some("tagging"))
        .expect("tagged document for notes.txt");
    assert_eq!(notes.get_text("mime"), Some("text/plain"));
}

#[test]
fn test_every_document_flushed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..57).map(|i| format!("d{}/f{i}.txt", i % 5)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    write_files(dir.path(), &refs);

    let index = RecordingIndex::default();
    let (progress, summary) = crawl(dir.path(), &index, opts(8, 6));
    summary.unwrap();

    let files: Vec<String> = index
        .batches()
        .into_iter()
        .flatten()
        .map(|d| d.get_text("file").unwrap().to_string())
        .collect();
    let unique: HashSet<&String> = files.iter().collect();
    assert_eq!(files.len(), 57);
    assert_eq!(unique.len(), 57);
    assert_eq!(progress.parsed(), 57);
    assert!(index.batches().iter().all(|b| b.len() <= 8));
}

#[test]
fn test_empty_directory_flushes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let index = RecordingIndex::default();
    let (progress, summary) = crawl(dir.path(), &index, opts(3, 2));
    assert_eq!(summary.unwrap().flush_sizes, Vec::<usize>::new());
    assert!(index.batches().is_empty());
    assert_eq!((progress.total(), progress.parsed()), (0, 0));
}

#[test]
fn test_failed_flush_is_the_crawl_error() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.txt", "b.txt", "c.txt"]);
    let index = RecordingIndex {
        fail: true,
        ..Default::default()
    };
    let (progress, summary) = crawl(dir.path(), &index, opts(2, 2));
    assert!(summary.is_err());
    assert!(!progress.is_done());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing: PathBuf = dir.path().join("nope");
    let index = RecordingIndex::default();
    let (_progress, summary) = crawl(&missing, &index, opts(3, 2));
    assert!(summary.is_err());
}

#[test]
fn test_excluded_files_are_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["keep.txt", "skip.tmp", ".DS_Store"]);
    let index = RecordingIndex::default();
    let mut o = opts(10, 2);
    o.exclude = vec!["*.tmp".to_string()];
    let (progress, summary) = crawl(dir.path(), &index, o);
    summary.unwrap();
    assert_eq!(progress.total(), 1);
    assert_eq!(index.document_count().unwrap(), 1);
}

#[test]
fn test_parallel_walk_into_sqlite_index() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["x/1.txt", "x/2.txt", "y/3.bin", "4.txt"]);
    let index = SqliteIndex::open_in_memory().unwrap();
    let mut o = opts(3, 2);
    o.parallel_walk = true;
    let (progress, summary) = crawl(dir.path(), &index, o);
    summary.unwrap();

    assert_eq!(progress.parsed(), 4);
    assert_eq!(index.document_count().unwrap(), 4);
    let generic = index
        .get_all_documents(1)
        .unwrap()
        .into_iter()
        .find(|d| d.name == "3")
        .expect("generic document for y/3.bin");
    assert_eq!(generic.path, "y");
    assert_eq!(generic.extension, "bin");
    assert_eq!(generic.full_path(dir.path()), dir.path().join("y").join("3.bin"));
}

#[test]
fn test_consumer_idle_timeout_fails_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["a.slow", "b.slow", "c.slow"]);
    let index = RecordingIndex::default();
    let mut o = opts(10, 1);
    o.consumer_idle_timeout = Duration::from_millis(100);
    let (progress, summary) = crawl(dir.path(), &index, o);

    assert!(summary.is_err());
    assert!(progress.parsed() < progress.total());
    assert!(!progress.is_done());
}
