//! Application configuration: constants, per-directory option defaults and runtime settings.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    config_env: String,
    db_filename: String,
    index_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                config_env: format!("{}_CONFIG", pkg.to_uppercase()),
                db_filename: "local_storage.db".to_string(),
                index_filename: "documents.db".to_string(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Default config file name, looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable naming an alternative config file.
    pub fn config_env(&self) -> &str {
        &self.config_env
    }

    pub fn db_filename(&self) -> &str {
        &self.db_filename
    }

    pub fn index_filename(&self) -> &str {
        &self.index_filename
    }
}

// ---- Per-directory option defaults ----

/// Option names are part of the stored data; do not rename.
pub const DEFAULT_OPTIONS: &[(&str, &str)] = &[
    ("ThumbnailQuality", "85"),
    ("ThumbnailSize", "272"),
    ("ThumbnailColor", "FF00FF"),
    ("TextFileContentLength", "2000"),
    ("PdfFileContentLength", "2000"),
    ("DocxContentLength", "2000"),
    ("SpreadSheetContentLength", "2000"),
    ("EbookContentLength", "2000"),
    // extension, content
    ("MimeGuesser", "extension"),
    // md5, sha1, sha256, blake3
    ("CheckSumCalculators", ""),
    ("FileParsers", "text, picture, pdf, docx, spreadsheet, ebook"),
];

pub fn default_option(key: &str) -> Option<&'static str> {
    DEFAULT_OPTIONS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

// ---- Pipeline ----

/// Queue timeouts and retry intervals used by the crawl pipeline.
pub struct QueueConsts;

impl QueueConsts {
    /// Walker retries a full input queue after this long.
    pub const WALKER_SEND_TIMEOUT: Duration = Duration::from_secs(10);
    /// Parser workers wake up this often to look at the shutdown flag.
    pub const WORKER_RECV_TIMEOUT: Duration = Duration::from_secs(1);
    /// How often the queue join re-checks the shutdown flag.
    pub const JOIN_POLL: Duration = Duration::from_millis(200);
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}

/// Bytes read from the head of a file for content sniffing.
pub const SNIFF_LEN: usize = 8 * 1024;

// ---- Runtime settings ----

/// Which [`SearchIndex`](crate::search::SearchIndex) implementation to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBackend {
    Sqlite { path: PathBuf },
    Elasticsearch { url: String, name: String },
}

/// Runtime settings. Defaults here; `sist.toml` overrides them (see [`crate::utils::settings_toml`]).
#[derive(Clone, Debug)]
pub struct Settings {
    /// Task / directory database.
    pub db_path: PathBuf,
    /// Scratch directory for progress files.
    pub data_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    /// Flush to the index after every `index_every` parsed documents.
    pub index_every: usize,
    pub parse_threads: usize,
    pub tn_threads: usize,
    pub poll_interval: Duration,
    pub input_queue_cap: usize,
    /// Consumer gives up (and flushes) after this long without a document.
    pub consumer_idle_timeout: Duration,
    pub parallel_walk: bool,
    pub follow_links: bool,
    pub exclude: Vec<String>,
    pub index: IndexBackend,
}

impl Settings {
    pub const INDEX_EVERY: usize = 10_000;
    pub const PARSE_THREADS: usize = 32;
    pub const TN_THREADS: usize = 32;
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const INPUT_QUEUE_CAP: usize = 50_000;
    pub const CONSUMER_IDLE_SECS: u64 = 600;
    pub const ELASTICSEARCH_URL: &'static str = "http://localhost:9200";
}

impl Default for Settings {
    fn default() -> Self {
        let paths = PackagePaths::get();
        Self {
            db_path: PathBuf::from(paths.db_filename()),
            data_dir: PathBuf::from(format!(".{}", paths.pkg_name())),
            thumbnail_dir: PathBuf::from("static/thumbnails"),
            index_every: Self::INDEX_EVERY,
            parse_threads: Self::PARSE_THREADS,
            tn_threads: Self::TN_THREADS,
            poll_interval: Duration::from_millis(Self::POLL_INTERVAL_MS),
            input_queue_cap: Self::INPUT_QUEUE_CAP,
            consumer_idle_timeout: Duration::from_secs(Self::CONSUMER_IDLE_SECS),
            parallel_walk: false,
            follow_links: false,
            exclude: Vec::new(),
            index: IndexBackend::Sqlite {
                path: PathBuf::from(paths.index_filename()),
            },
        }
    }
}
