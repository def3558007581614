//! Listing page fetch + extraction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;
use vacantes_core::VacancyRecord;
use vacantes_storage::{FetchError, HttpFetcher};

pub mod extract;

pub use extract::{resolve_detail_url, ExtractError, ListingExtractor, ListingSelectors, ROW_SELECTOR};

pub const CRATE_NAME: &str = "vacantes-harvest";

/// Identifier used in log fields.
pub const SENA_APE_SOURCE_ID: &str = "sena-ape";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Where the listing page comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn source_id(&self) -> &str;

    async fn fetch_page(&self) -> Result<FetchedPage, FetchError>;
}

/// Fetches the listing page over HTTP with the shared fetcher's identification header.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    fetcher: HttpFetcher,
    url: String,
}

impl HttpPageSource {
    pub fn new(fetcher: HttpFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn source_id(&self) -> &str {
        SENA_APE_SOURCE_ID
    }

    async fn fetch_page(&self) -> Result<FetchedPage, FetchError> {
        let fetched = self.fetcher.get_text(&self.url).await?;
        Ok(FetchedPage {
            url: fetched.url,
            body: fetched.text,
            fetched_at: fetched.fetched_at,
        })
    }
}

/// Scheme + host (+ port) of `source_url`, used to absolutize detail links.
pub fn site_origin(source_url: &str) -> Result<Url, url::ParseError> {
    let parsed = Url::parse(source_url)?;
    Url::parse(&parsed.origin().ascii_serialization())
}

pub struct Harvester {
    source: Arc<dyn PageSource>,
    extractor: ListingExtractor,
}

impl Harvester {
    pub fn new(source: Arc<dyn PageSource>, extractor: ListingExtractor) -> Self {
        Self { source, extractor }
    }

    pub fn extractor(&self) -> &ListingExtractor {
        &self.extractor
    }

    /// Fetch the listing page and extract every well-formed listing.
    ///
    /// A fetch failure is returned as-is so the caller can abort the cycle before
    /// touching the store. A page without listing rows yields an empty vector.
    pub async fn harvest(&self, today: NaiveDate) -> Result<Vec<VacancyRecord>, FetchError> {
        let page = self.source.fetch_page().await?;
        debug!(url = %page.url, fetched_at = %page.fetched_at, bytes = page.body.len(), "listing page fetched");
        Ok(self.extract_page(&page.body, today))
    }

    /// Extract listings from an already fetched page; malformed rows are logged and skipped.
    pub fn extract_page(&self, html: &str, today: NaiveDate) -> Vec<VacancyRecord> {
        let document = Html::parse_document(html);
        let mut rows = 0usize;
        let mut skipped = 0usize;
        let mut records = Vec::new();

        for (index, row) in document.select(self.extractor.row_selector()).enumerate() {
            rows += 1;
            match self.extractor.extract(row, today) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(index, "row has no code; not a listing"),
                Err(err) => {
                    skipped += 1;
                    warn!(index, error = %err, "skipping malformed listing row");
                }
            }
        }

        info!(
            source = self.source.source_id(),
            rows,
            listings = records.len(),
            skipped,
            "extracted listing page"
        );
        records
    }
}
