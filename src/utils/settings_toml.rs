//! Load `sist.toml` into [`Settings`]. Only fields present in the file override the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::{IndexBackend, PackagePaths, Settings};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SistToml {
    #[serde(default)]
    settings: SettingsSection,
    #[serde(default)]
    index: IndexSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    thumbnail_dir: Option<PathBuf>,
    index_every: Option<usize>,
    parse_threads: Option<usize>,
    tn_threads: Option<usize>,
    poll_interval_ms: Option<u64>,
    input_queue_cap: Option<usize>,
    consumer_idle_secs: Option<u64>,
    parallel_walk: Option<bool>,
    follow_links: Option<bool>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexSection {
    backend: Option<String>,
    path: Option<PathBuf>,
    url: Option<String>,
    name: Option<String>,
}

/// Overwrite a settings field from the file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $settings:expr, $field:ident) => {
        if let Some(v) = $sec.$field.clone() {
            $settings.$field = v;
        }
    };
}

pub(crate) fn parse_sist_toml(s: &str) -> Result<SistToml, toml::de::Error> {
    toml::from_str(s)
}

/// Apply file config on top of `settings`. Zero counts are ignored (they would stall the pipeline).
pub(crate) fn apply_file_to_settings(file: &SistToml, settings: &mut Settings) {
    let sec = &file.settings;
    apply_file_opt!(sec, settings, db_path);
    apply_file_opt!(sec, settings, data_dir);
    apply_file_opt!(sec, settings, thumbnail_dir);
    apply_file_opt!(sec, settings, parallel_walk);
    apply_file_opt!(sec, settings, follow_links);
    apply_file_opt!(sec, settings, exclude);
    if let Some(n) = sec.index_every.filter(|n| *n > 0) {
        settings.index_every = n;
    }
    if let Some(n) = sec.parse_threads.filter(|n| *n > 0) {
        settings.parse_threads = n;
    }
    if let Some(n) = sec.tn_threads.filter(|n| *n > 0) {
        settings.tn_threads = n;
    }
    if let Some(n) = sec.input_queue_cap.filter(|n| *n > 0) {
        settings.input_queue_cap = n;
    }
    if let Some(ms) = sec.poll_interval_ms {
        settings.poll_interval = Duration::from_millis(ms.max(1));
    }
    if let Some(secs) = sec.consumer_idle_secs {
        settings.consumer_idle_timeout = Duration::from_secs(secs.max(1));
    }

    let idx = &file.index;
    match idx.backend.as_deref() {
        Some("elasticsearch") => {
            settings.index = IndexBackend::Elasticsearch {
                url: idx
                    .url
                    .clone()
                    .unwrap_or_else(|| Settings::ELASTICSEARCH_URL.to_string()),
                name: idx
                    .name
                    .clone()
                    .unwrap_or_else(|| PackagePaths::get().pkg_name().to_string()),
            };
        }
        Some("sqlite") | None => {
            if let Some(ref p) = idx.path {
                settings.index = IndexBackend::Sqlite { path: p.clone() };
            }
        }
        Some(other) => log::warn!("unknown index backend {other:?}; keeping sqlite"),
    }
}

/// Load settings from `path`. A missing file gives the defaults; a malformed one is reported and ignored.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();
    let Ok(s) = std::fs::read_to_string(path) else {
        log::debug!("no config at {}; using defaults", path.display());
        return settings;
    };
    match parse_sist_toml(&s) {
        Ok(file) => apply_file_to_settings(&file, &mut settings),
        Err(e) => log::warn!("{}: {}", path.display(), e),
    }
    settings
}

/// Config path: explicit flag, else the `SIST_CONFIG` env var, else `sist.toml` in the working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    let paths = PackagePaths::get();
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(paths.config_env()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(paths.config_filename()))
}
