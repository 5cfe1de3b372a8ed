//! Read-only catalog proxy. Listings and single-book lookups go to Open
//! Library; free-text search goes to Google Books.
//!
//! Listing and search never fail the request: upstream trouble yields an
//! empty page. Single-book lookups fall back to a placeholder flagged as
//! degraded. Open Library calls are retried with exponential backoff before
//! either fallback kicks in.

mod book;

pub use book::{
    from_google_volume, from_open_library_doc, from_open_library_record, BookView, CatalogSource,
    GoogleVolume, OpenLibraryDoc, OpenLibraryRecord, PLACEHOLDER_IMAGE,
};

use std::cmp::Ordering;

use moka::future::Cache;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::CatalogConfig;
use crate::{BookstoreError, Result};

const DEFAULT_QUERY: &str = "book";
const MAX_PAGE_SIZE: u32 = 40;
const CLIENT_AGENT: &str = concat!("bookstore/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("invalid catalog url: {0}")]
    InvalidUrl(String),
}

impl CatalogError {
    /// Transport failures and 5xx answers; a 4xx or an undecodable body
    /// will not change on a second try.
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode(),
            Self::Status(status) => *status >= 500,
            Self::InvalidUrl(_) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "relevance")]
    Relevance,
    #[serde(rename = "title-asc")]
    TitleAsc,
    #[serde(rename = "title-desc")]
    TitleDesc,
    #[serde(rename = "newest")]
    Newest,
    #[serde(rename = "oldest")]
    Oldest,
}

/// Query string for `GET /api/books`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub sort_by: SortOrder,
    pub start_index: u32,
    pub max_results: Option<u32>,
}

impl ListQuery {
    fn page_size(&self) -> u32 {
        self.max_results.unwrap_or(10).clamp(1, MAX_PAGE_SIZE)
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{:?}|{}|{}",
            self.query.as_deref().unwrap_or_default(),
            self.category.as_deref().unwrap_or_default(),
            self.sort_by,
            self.start_index,
            self.page_size()
        )
    }
}

/// Query string for `GET /api/books/search`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub start_index: u32,
    pub max_results: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub start_index: u32,
    pub max_results: u32,
    pub has_more: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BookPage {
    pub books: Vec<BookView>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    docs: Vec<OpenLibraryDoc>,
    #[serde(rename = "numFound")]
    num_found: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubjectResponse {
    works: Vec<OpenLibraryDoc>,
    work_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VolumesResponse {
    items: Vec<GoogleVolume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorRecord {
    name: Option<String>,
}

#[derive(Clone)]
pub struct CatalogGateway {
    http: reqwest::Client,
    config: CatalogConfig,
    listings: Cache<String, BookPage>,
}

impl CatalogGateway {
    pub fn new(config: CatalogConfig) -> std::result::Result<Self, CatalogError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let listings = Cache::builder().max_capacity(1_000).time_to_live(config.cache_ttl).build();
        Ok(Self { http, config, listings })
    }

    /// One page of books for a category or free-text query.
    #[instrument(skip(self))]
    pub async fn list_books(&self, query: &ListQuery) -> BookPage {
        let key = query.cache_key();
        if let Some(page) = self.listings.get(&key).await {
            tracing::debug!(%key, "listing cache hit");
            return page;
        }

        match self.fetch_listing(query).await {
            Ok(page) => {
                if !page.books.is_empty() {
                    self.listings.insert(key, page.clone()).await;
                }
                page
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog listing failed, returning empty page");
                BookPage::default()
            }
        }
    }

    /// Free-text search. A blank query is a client error; upstream failure
    /// is an empty result.
    #[instrument(skip(self))]
    pub async fn search_books(&self, query: &SearchQuery) -> Result<Vec<BookView>> {
        let text = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| BookstoreError::validation("Search query is required"))?;
        let limit = query.max_results.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);
        let params = [
            ("q", text.to_string()),
            ("startIndex", query.start_index.to_string()),
            ("maxResults", limit.to_string()),
        ];

        match self.fetch_json::<VolumesResponse>(&self.config.google_books_base_url, &params).await {
            Ok(found) => Ok(found.items.into_iter().filter_map(from_google_volume).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "catalog search failed, returning no results");
                Ok(vec![])
            }
        }
    }

    /// Never fails: an unreachable catalog yields [`BookView::placeholder`].
    #[instrument(skip(self))]
    pub async fn get_book(&self, raw_id: &str) -> BookView {
        let key = qualify_book_key(raw_id);
        match self.fetch_record(&key).await {
            Ok((key, record)) => {
                let author = self.author_name(&record).await;
                from_open_library_record(&key, record, author, &mut rand::thread_rng())
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "book lookup failed, serving placeholder");
                BookView::placeholder(key)
            }
        }
    }

    async fn fetch_listing(&self, query: &ListQuery) -> std::result::Result<BookPage, CatalogError> {
        let size = query.page_size();
        let base = &self.config.open_library_base_url;
        let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

        let (docs, total) = match (query.query.as_deref().map(str::trim).filter(|q| !q.is_empty()), category) {
            (None, Some(subject)) => {
                let url = subject_url(base, subject)?;
                let params = [("offset", query.start_index.to_string()), ("limit", size.to_string())];
                let found: SubjectResponse = self.fetch_open_library(url.as_str(), &params).await?;
                (found.works, found.work_count)
            }
            (text, subject) => {
                let mut params = vec![
                    ("q", text.unwrap_or(DEFAULT_QUERY).to_string()),
                    ("offset", query.start_index.to_string()),
                    ("limit", size.to_string()),
                ];
                if let Some(subject) = subject {
                    params.push(("subject", subject.to_string()));
                }
                let found: SearchResponse = self.fetch_open_library(&format!("{base}/search.json"), &params).await?;
                (found.docs, found.num_found)
            }
        };

        let mut rng = rand::thread_rng();
        let mut books: Vec<BookView> = docs.into_iter().map(|doc| from_open_library_doc(doc, &mut rng)).collect();
        sort_books(&mut books, query.sort_by);

        let returned = u64::try_from(books.len()).unwrap_or(u64::MAX);
        Ok(BookPage {
            pagination: Pagination {
                total,
                start_index: query.start_index,
                max_results: size,
                has_more: u64::from(query.start_index).saturating_add(returned) < total,
            },
            books,
        })
    }

    /// Tries the key as given, then as an edition when a work lookup fails.
    async fn fetch_record(&self, key: &str) -> std::result::Result<(String, OpenLibraryRecord), CatalogError> {
        let base = &self.config.open_library_base_url;
        match self.fetch_open_library(&format!("{base}{key}.json"), &[]).await {
            Ok(record) => Ok((key.to_string(), record)),
            Err(e) => match key.strip_prefix("/works/") {
                Some(bare) => {
                    tracing::debug!(%key, error = %e, "work lookup failed, trying edition");
                    let edition = format!("/books/{bare}");
                    let record = self.fetch_open_library(&format!("{base}{edition}.json"), &[]).await?;
                    Ok((edition, record))
                }
                None => Err(e),
            },
        }
    }

    async fn author_name(&self, record: &OpenLibraryRecord) -> Option<String> {
        let author_key = record.authors.as_ref()?.iter().find_map(|a| a.author_key())?;
        let url = format!("{}{author_key}.json", self.config.open_library_base_url);
        match self.fetch_open_library::<AuthorRecord>(&url, &[]).await {
            Ok(author) => author.name,
            Err(e) => {
                tracing::debug!(author_key, error = %e, "author lookup failed");
                None
            }
        }
    }

    /// Retries transient failures `retry_attempts` times, sleeping
    /// `retry_backoff * 2^n` before retry `n`.
    async fn fetch_open_library<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, CatalogError> {
        let mut attempt = 0;
        loop {
            match self.fetch_json(url, params).await {
                Err(e) if e.is_transient() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    let delay = self.config.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    tracing::debug!(url, attempt, ?delay, error = %e, "retrying catalog request");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> std::result::Result<T, CatalogError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_AGENT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// `{base}/subjects/{slug}.json` with the slug percent-encoded as a single
/// path segment.
fn subject_url(base: &str, subject: &str) -> std::result::Result<reqwest::Url, CatalogError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| CatalogError::InvalidUrl(format!("{base}: {e}")))?;
    let slug = format!("{}.json", subject.to_lowercase().replace(' ', "_"));
    url.path_segments_mut()
        .map_err(|()| CatalogError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["subjects", slug.as_str()]);
    Ok(url)
}

/// `OL1W` and `works/OL1W` both become `/works/OL1W`; `books/` keys are kept.
pub fn qualify_book_key(raw: &str) -> String {
    let bare = raw.trim().trim_start_matches('/');
    if bare.starts_with("works/") || bare.starts_with("books/") {
        format!("/{bare}")
    } else {
        format!("/works/{bare}")
    }
}

fn sort_books(books: &mut [BookView], order: SortOrder) {
    let by: fn(&BookView, &BookView) -> Ordering = match order {
        SortOrder::Relevance => return,
        SortOrder::TitleAsc => |a, b| a.title.cmp(&b.title),
        SortOrder::TitleDesc => |a, b| b.title.cmp(&a.title),
        SortOrder::Newest => |a, b| b.published_year().cmp(&a.published_year()),
        SortOrder::Oldest => |a, b| a.published_year().cmp(&b.published_year()),
    };
    books.sort_by(by);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ONE_DOC: &str = r#"{"docs":[{"key":"/works/OL1W","title":"Dune"}],"numFound":1}"#;

    fn gateway_for(base: &str) -> CatalogGateway {
        CatalogGateway::new(CatalogConfig {
            open_library_base_url: base.into(),
            google_books_base_url: base.into(),
            timeout: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(60),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(5),
        })
        .unwrap()
    }

    struct Upstream {
        base: String,
        hits: Arc<AtomicUsize>,
        request_lines: Arc<Mutex<Vec<String>>>,
    }

    impl Upstream {
        fn hits(&self) -> usize {
            self.hits.load(AtomicOrdering::SeqCst)
        }
    }

    /// Local upstream answering the nth request with `statuses[n]` (the last
    /// entry repeats) and `ONE_DOC` on 200.
    async fn scripted_upstream(statuses: Vec<u16>) -> Upstream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let request_lines = Arc::new(Mutex::new(Vec::new()));
        let counter = hits.clone();
        let lines = request_lines.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let n = counter.fetch_add(1, AtomicOrdering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => request.extend_from_slice(&buf[..read]),
                    }
                }
                let head = String::from_utf8_lossy(&request);
                lines.lock().unwrap().push(head.lines().next().unwrap_or_default().to_string());
                let body = if status == 200 { ONE_DOC } else { "" };
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Upstream { base, hits, request_lines }
    }

    fn book(title: &str, year: &str) -> BookView {
        BookView { title: title.into(), published_date: year.into(), degraded: false, ..BookView::placeholder(title) }
    }

    fn unreachable_gateway() -> CatalogGateway {
        gateway_for("http://127.0.0.1:9")
    }

    #[test]
    fn test_qualify_book_key() {
        assert_eq!(qualify_book_key("OL1W"), "/works/OL1W");
        assert_eq!(qualify_book_key("works/OL1W"), "/works/OL1W");
        assert_eq!(qualify_book_key("/works/OL1W"), "/works/OL1W");
        assert_eq!(qualify_book_key("books/OL2M"), "/books/OL2M");
    }

    #[test]
    fn test_subject_url_encodes_one_segment() {
        let url = subject_url("https://openlibrary.org", "Science Fiction").unwrap();
        assert_eq!(url.as_str(), "https://openlibrary.org/subjects/science_fiction.json");
        let url = subject_url("http://127.0.0.1:8080/", "a/b?c#d").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/subjects/a%2Fb%3Fc%23d.json");
        assert!(subject_url("not a url", "x").is_err());
    }

    #[tokio::test]
    async fn test_listing_retries_after_server_error() {
        let upstream = scripted_upstream(vec![503, 200]).await;
        let page = gateway_for(&upstream.base).list_books(&ListQuery::default()).await;
        assert_eq!(upstream.hits(), 2);
        assert_eq!(page.books.len(), 1);
        assert_eq!(page.books[0].title, "Dune");
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let upstream = scripted_upstream(vec![503]).await;
        let page = gateway_for(&upstream.base).list_books(&ListQuery::default()).await;
        assert!(page.books.is_empty());
        assert_eq!(upstream.hits(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let upstream = scripted_upstream(vec![404]).await;
        let page = gateway_for(&upstream.base).list_books(&ListQuery::default()).await;
        assert!(page.books.is_empty());
        assert_eq!(upstream.hits(), 1);
    }

    #[tokio::test]
    async fn test_listing_query_defaults() {
        let upstream = scripted_upstream(vec![200]).await;
        let gateway = gateway_for(&upstream.base);
        gateway.list_books(&ListQuery::default()).await;
        let blank: ListQuery = serde_json::from_value(serde_json::json!({ "query": "  ", "startIndex": 20 })).unwrap();
        gateway.list_books(&blank).await;
        let subject: ListQuery = serde_json::from_value(serde_json::json!({ "category": "Science Fiction" })).unwrap();
        gateway.list_books(&subject).await;

        let lines = upstream.request_lines.lock().unwrap().clone();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("GET /search.json?q=book&offset=0&limit=10 "));
        assert!(lines[1].starts_with("GET /search.json?q=book&offset=20&limit=10 "));
        assert!(lines[2].starts_with("GET /subjects/science_fiction.json?offset=0&limit=10 "));
    }

    #[test]
    fn test_sort_books() {
        let mut books = vec![book("B", "1999"), book("A", "N/A"), book("C", "2005")];
        sort_books(&mut books, SortOrder::TitleAsc);
        assert_eq!(books.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(), ["A", "B", "C"]);
        sort_books(&mut books, SortOrder::Newest);
        assert_eq!(books[0].title, "C");
        sort_books(&mut books, SortOrder::Oldest);
        assert_eq!(books[0].title, "A");
    }

    #[test]
    fn test_list_query_parsing_and_clamp() {
        let q: ListQuery = serde_json::from_value(serde_json::json!({ "sortBy": "title-desc", "maxResults": 500 })).unwrap();
        assert_eq!(q.sort_by, SortOrder::TitleDesc);
        assert_eq!(q.page_size(), MAX_PAGE_SIZE);
        assert_eq!(ListQuery::default().page_size(), 10);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_degrades() {
        let gateway = unreachable_gateway();
        let page = gateway.list_books(&ListQuery::default()).await;
        assert!(page.books.is_empty());
        assert_eq!(page.pagination, Pagination::default());

        let found = gateway.search_books(&SearchQuery { query: Some("dune".into()), ..Default::default() }).await.unwrap();
        assert!(found.is_empty());

        let placeholder = gateway.get_book("OL1W").await;
        assert!(placeholder.degraded);
        assert_eq!(placeholder.id, "/works/OL1W");
    }

    #[tokio::test]
    async fn test_blank_search_is_rejected() {
        let gateway = unreachable_gateway();
        let err = gateway.search_books(&SearchQuery { query: Some("  ".into()), ..Default::default() }).await;
        assert!(matches!(err, Err(BookstoreError::Validation(_))));
    }
}
