//! Source file discovery on the open-data portal
//!
//! The portal publishes monthly CSV files under hashed subpaths, so the exact
//! download URL cannot be templated. Instead the dataset landing page is
//! fetched and scanned for an anchor whose href ends with the canonical file
//! name for the target month.

use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::IngestError;
use super::fetcher::{fetch_with_retry, RetryConfig};

/// Resolves a canonical file name to its current download URL.
///
/// Kept behind its own type so the scrape-based discovery can be swapped for
/// a templated URL scheme without touching the fetcher or the pipeline.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    client: Client,
    landing_url: Url,
    retry: RetryConfig,
}

impl SourceLocator {
    pub fn new(client: Client, landing_url: Url, retry: RetryConfig) -> Self {
        Self {
            client,
            landing_url,
            retry,
        }
    }

    /// Fetch the landing page and resolve the absolute URL for `file_name`.
    ///
    /// The page fetch uses the same retry budget and backoff as the file
    /// download. A page that loads fine but lists no matching link is a
    /// distinct failure from a transport fault: the file most likely does
    /// not exist for that period yet.
    pub async fn resolve(
        &self,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Url, IngestError> {
        debug!(%self.landing_url, file_name, "resolving source file URL");

        let body = fetch_with_retry(&self.client, &self.landing_url, &self.retry, cancel).await?;
        let html = String::from_utf8_lossy(&body);

        let href = extract_file_link(&html, file_name).ok_or_else(|| IngestError::FileNotListed {
            file_name: file_name.to_string(),
        })?;

        let url = self
            .landing_url
            .join(&href)
            .map_err(|e| IngestError::InvalidUrl {
                url: href.clone(),
                message: e.to_string(),
            })?;

        info!(file_name, %url, "resolved source file URL");
        Ok(url)
    }
}

/// Scan `html` for the first anchor whose href ends with `file_name`.
///
/// `Html` is not `Send`, so parsing happens in this synchronous helper and
/// the document never crosses an await point.
fn extract_file_link(html: &str, file_name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a").unwrap();

    document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .find(|href| href.ends_with(file_name))
        .map(|href| href.to_string())
}
