//! Search index collaborators: the interface the crawl and thumbnail jobs write to and read from.

pub mod elastic;
pub mod sqlite;

use anyhow::Result;

use crate::types::{DocumentSummary, ParsedDocument};
use crate::utils::config::{IndexBackend, Settings};

pub use elastic::ElasticIndex;
pub use sqlite::SqliteIndex;

/// A document store partitioned by directory.
///
/// `index_batch` is a plain add: calling it twice with the same documents stores them twice.
/// Re-indexing a directory is done by `delete_directory` followed by a fresh crawl.
pub trait SearchIndex: Send + Sync {
    /// Remove every document of `directory_id`.
    fn delete_directory(&self, directory_id: i64) -> Result<()>;

    fn index_batch(&self, documents: &[ParsedDocument], directory_id: i64) -> Result<()>;

    /// Location fields of every document of `directory_id`.
    fn get_all_documents(&self, directory_id: i64) -> Result<Vec<DocumentSummary>>;

    /// Number of documents across all directories.
    fn document_count(&self) -> Result<u64>;
}

/// Index selected by `settings`.
pub fn open_index(settings: &Settings) -> Result<Box<dyn SearchIndex>> {
    Ok(match &settings.index {
        IndexBackend::Sqlite { path } => Box::new(SqliteIndex::open(path)?),
        IndexBackend::Elasticsearch { url, name } => Box::new(ElasticIndex::new(url, name)?),
    })
}
