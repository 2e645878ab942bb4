//! Elasticsearch backend over its HTTP API (`_bulk`, `_delete_by_query`, scroll search).

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::types::{DocumentSummary, ParsedDocument};

use super::SearchIndex;

const SCROLL_KEEP_ALIVE: &str = "3m";
const SCROLL_PAGE_SIZE: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index_name: String,
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl BulkResponse {
    /// Rejected items make the whole batch a failed flush.
    fn check(&self, sent: usize) -> Result<()> {
        if !self.errors {
            return Ok(());
        }
        let mut rejected = self
            .items
            .iter()
            .filter_map(|item| item.pointer("/index/error"));
        let first = rejected.next().cloned();
        let failed = first.as_ref().map_or(0, |_| 1 + rejected.count());
        match first {
            Some(err) => anyhow::bail!(
                "{} of {} documents rejected by the index; first error: {}",
                failed,
                sent,
                err
            ),
            None => anyhow::bail!("bulk request of {} documents reported errors", sent),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: DocumentSummary,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

impl ElasticIndex {
    pub fn new(base_url: &str, index_name: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Newline-delimited `_bulk` body: an action line and a source line per document.
    pub fn bulk_body(&self, documents: &[ParsedDocument], directory_id: i64) -> Result<String> {
        let action = json!({ "index": { "_index": self.index_name } }).to_string();
        let mut body = String::new();
        for doc in documents {
            let mut source = serde_json::to_value(doc).context("encode document")?;
            if let Value::Object(ref mut map) = source {
                map.insert("directory".to_string(), json!(directory_id));
            }
            body.push_str(&action);
            body.push('\n');
            body.push_str(&source.to_string());
            body.push('\n');
        }
        Ok(body)
    }

    fn collect_hits(out: &mut Vec<DocumentSummary>, page: SearchResponse) -> (usize, Option<String>) {
        let n = page.hits.hits.len();
        for hit in page.hits.hits {
            let mut summary = hit.source;
            summary.id = hit.id;
            out.push(summary);
        }
        (n, page.scroll_id)
    }
}

impl SearchIndex for ElasticIndex {
    fn delete_directory(&self, directory_id: i64) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&format!(
                "{}/_delete_by_query?conflicts=proceed&refresh=true",
                self.index_name
            )))
            .json(&json!({ "query": { "term": { "directory": directory_id } } }))
            .send()
            .context("delete_by_query request")?;
        if resp.status() == StatusCode::NOT_FOUND {
            log::debug!("index {} does not exist yet; nothing to delete", self.index_name);
            return Ok(());
        }
        resp.error_for_status().context("delete_by_query")?;
        Ok(())
    }

    fn index_batch(&self, documents: &[ParsedDocument], directory_id: i64) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let body = self.bulk_body(documents, directory_id)?;
        let resp: BulkResponse = self
            .client
            .post(self.url("_bulk"))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .context("bulk request")?
            .error_for_status()
            .context("bulk index")?
            .json()
            .context("decode bulk response")?;
        resp.check(documents.len())
    }

    fn get_all_documents(&self, directory_id: i64) -> Result<Vec<DocumentSummary>> {
        let query = json!({
            "size": SCROLL_PAGE_SIZE,
            "_source": { "includes": ["path", "name", "mime", "extension"] },
            "query": { "term": { "directory": directory_id } }
        });
        let first: SearchResponse = self
            .client
            .post(self.url(&format!(
                "{}/_search?scroll={}",
                self.index_name, SCROLL_KEEP_ALIVE
            )))
            .json(&query)
            .send()
            .context("search request")?
            .error_for_status()
            .context("search")?
            .json()
            .context("decode search response")?;

        let mut out = Vec::new();
        let (mut n, mut scroll_id) = Self::collect_hits(&mut out, first);
        while n > 0 {
            let Some(id) = scroll_id.clone() else { break };
            let page: SearchResponse = self
                .client
                .post(self.url("_search/scroll"))
                .json(&json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": id }))
                .send()
                .context("scroll request")?
                .error_for_status()
                .context("scroll")?
                .json()
                .context("decode scroll response")?;
            (n, scroll_id) = Self::collect_hits(&mut out, page);
        }
        if let Some(id) = scroll_id {
            let _ = self
                .client
                .delete(self.url("_search/scroll"))
                .json(&json!({ "scroll_id": id }))
                .send();
        }
        Ok(out)
    }

    fn document_count(&self) -> Result<u64> {
        let resp: CountResponse = self
            .client
            .get(self.url(&format!("{}/_count", self.index_name)))
            .send()
            .context("count request")?
            .error_for_status()
            .context("count")?
            .json()
            .context("decode count response")?;
        Ok(resp.count)
    }
}
