//! rating_histogram tool implementation.
//!
//! Aggregates the rating histogram of a paginated listing, serving a cached
//! result when one is still valid.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tally_client::{HtmlRatingParser, canonicalize, resource_id};
use tally_core::{
    AppConfig, CacheKey, Engine, Error, Histogram, HistogramCache, PageRef, PageSource, Progress, RefreshGate, Session,
    SessionOrigin, TraversalOptions,
};

use crate::tools::json_result;

const MAX_PAGES_LIMIT: u32 = 1000;
const CONCURRENCY_LIMIT: u32 = 32;

/// Input parameters for the rating_histogram tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RatingHistogramParams {
    /// URL of the first page of the listing.
    pub url: String,

    /// Recompute even if a valid cached histogram exists.
    #[serde(default)]
    pub refresh: bool,

    /// Override the page ceiling for this call (1..=1000).
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Override the number of speculative requests; 0 or 1 is sequential.
    #[serde(default)]
    pub concurrency: Option<u32>,
}

/// Output structure for the rating_histogram tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RatingHistogramOutput {
    /// Canonical URL the traversal started from.
    pub url: String,
    /// Vote counts for ratings 1 through 6.
    pub histogram: Histogram,
    pub total: u64,
    /// Pages merged by this call; 0 when served from cache.
    pub pages_merged: u32,
    pub origin: SessionOrigin,
    pub cache_key: Option<CacheKey>,
    pub cache_written: bool,
    /// Snapshots delivered while aggregating.
    pub snapshots: u32,
}

fn traversal_options(config: &AppConfig, params: &RatingHistogramParams) -> Result<TraversalOptions, Error> {
    let mut options = TraversalOptions::from(config);

    if let Some(max_pages) = params.max_pages {
        if max_pages == 0 || max_pages > MAX_PAGES_LIMIT {
            return Err(Error::InvalidInput(format!("max_pages must be between 1 and {MAX_PAGES_LIMIT}")));
        }
        options.max_pages = max_pages;
    }

    if let Some(concurrency) = params.concurrency {
        if concurrency > CONCURRENCY_LIMIT {
            return Err(Error::InvalidInput(format!("concurrency must be at most {CONCURRENCY_LIMIT}")));
        }
        options.concurrency_width = concurrency;
    }

    Ok(options)
}

/// Implementation of the rating_histogram tool.
///
/// Source and parse failures end the traversal early; the partial histogram
/// is still returned, with the stop reason in `origin`.
pub async fn histogram_impl<S: PageSource>(
    cache: &HistogramCache, config: &AppConfig, source: S, parser: &HtmlRatingParser, params: RatingHistogramParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let options = traversal_options(config, &params)?;
    let initial = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let id = resource_id(&params.url, &config.parser.page_param).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let engine = Engine::new(source, parser, options);
    let session = Session::new(&engine, cache, &id);
    let gate = if params.refresh { RefreshGate::triggered() } else { RefreshGate::never() };

    let mut snapshots = 0u32;
    let mut count_snapshots = |_: &Histogram, _: Progress| snapshots += 1;
    let outcome = session
        .run(&PageRef::from(initial.to_string()), &mut count_snapshots, gate)
        .await;

    json_result(&RatingHistogramOutput {
        url: initial.to_string(),
        histogram: outcome.histogram,
        total: outcome.histogram.total(),
        pages_merged: outcome.pages_merged,
        origin: outcome.origin,
        cache_key: outcome.cache_key,
        cache_written: outcome.cache_written,
        snapshots,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use tally_core::{CacheDb, RawPage, StopReason};

    use super::*;
    use crate::tools::output_text;

    const LISTING: &str = "https://shop.example.com/item/7/reviews";

    /// Three HTML pages of a listing; anything else is unavailable.
    struct Shop {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl Shop {
        fn new() -> Self {
            let page = |ratings: &[u8], next: Option<u32>| {
                let items: String =
                    ratings.iter().map(|r| format!(r#"<li data-rating="{r}">review</li>"#)).collect();
                let next = next.map(|n| format!(r#"<a rel="next" href="?page={n}">Next</a>"#)).unwrap_or_default();
                format!(r#"<html><body><ul class="reviews">{items}</ul>{next}</body></html>"#)
            };

            let pages = HashMap::from([
                (LISTING.to_string(), page(&[5, 5, 1], Some(2))),
                (format!("{LISTING}?page=2"), page(&[4, 5], Some(3))),
                (format!("{LISTING}?page=3"), page(&[6], None)),
            ]);
            Self { pages, requests: Mutex::new(Vec::new()) }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl PageSource for Shop {
        async fn retrieve(&self, page_ref: &PageRef) -> Result<RawPage, Error> {
            self.requests.lock().unwrap().push(page_ref.to_string());
            self.pages
                .get(page_ref.as_str())
                .map(|body| RawPage::new(page_ref.clone(), body.as_str()))
                .ok_or_else(|| Error::SourceUnavailable(format!("404 for {page_ref}")))
        }
    }

    async fn make_cache() -> HistogramCache {
        let db = CacheDb::open_in_memory().await.unwrap();
        HistogramCache::new(db, "tally:", Duration::from_secs(7 * 86_400))
    }

    fn params(url: &str) -> RatingHistogramParams {
        RatingHistogramParams { url: url.to_string(), refresh: false, max_pages: None, concurrency: None }
    }

    fn parser() -> HtmlRatingParser {
        HtmlRatingParser::new(&AppConfig::default().parser).unwrap()
    }

    async fn run(cache: &HistogramCache, shop: &Shop, params: RatingHistogramParams) -> RatingHistogramOutput {
        let result = histogram_impl(cache, &AppConfig::default(), shop, &parser(), params).await.unwrap();
        serde_json::from_str(&output_text(&result)).unwrap()
    }

    #[tokio::test]
    async fn test_aggregates_and_caches() {
        let cache = make_cache().await;
        let shop = Shop::new();

        let output = run(&cache, &shop, params(LISTING)).await;

        assert_eq!(output.histogram, Histogram::new([1, 0, 0, 1, 3, 1]));
        assert_eq!(output.total, 6);
        assert_eq!(output.pages_merged, 3);
        assert_eq!(output.origin, SessionOrigin::Traversal(StopReason::Terminal));
        assert!(output.cache_written);
        assert!(output.snapshots >= 4);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cache = make_cache().await;
        let shop = Shop::new();

        run(&cache, &shop, params(LISTING)).await;
        let fetched = shop.request_count();

        let output = run(&cache, &shop, params(&format!("{LISTING}?page=2"))).await;

        assert_eq!(output.origin, SessionOrigin::Cache);
        assert_eq!(output.histogram, Histogram::new([1, 0, 0, 1, 3, 1]));
        assert_eq!(output.pages_merged, 0);
        assert_eq!(output.snapshots, 2);
        assert!(!output.cache_written);
        assert_eq!(shop.request_count(), fetched);
    }

    #[tokio::test]
    async fn test_refresh_recomputes() {
        let cache = make_cache().await;
        let shop = Shop::new();
        let key = cache.derive_key(LISTING).unwrap();
        cache.write(Some(&key), &Histogram::new([9, 9, 9, 9, 9, 9])).await.unwrap();

        let output = run(&cache, &shop, RatingHistogramParams { refresh: true, ..params(LISTING) }).await;

        assert_eq!(output.histogram, Histogram::new([1, 0, 0, 1, 3, 1]));
        assert!(output.cache_written);
        assert_eq!(cache.read(&key).await.unwrap().unwrap().histogram, output.histogram);
    }

    #[tokio::test]
    async fn test_sequential_with_page_ceiling() {
        let cache = make_cache().await;
        let shop = Shop::new();

        let output = run(
            &cache,
            &shop,
            RatingHistogramParams { max_pages: Some(2), concurrency: Some(1), ..params(LISTING) },
        )
        .await;

        assert_eq!(output.histogram, Histogram::new([1, 0, 0, 1, 3, 0]));
        assert_eq!(output.origin, SessionOrigin::Traversal(StopReason::BudgetExhausted));
        assert_eq!(shop.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_listing_is_not_cached() {
        let cache = make_cache().await;
        let shop = Shop::new();

        let output = run(&cache, &shop, params("https://shop.example.com/item/404/reviews")).await;

        assert!(output.histogram.is_empty());
        assert_eq!(output.origin, SessionOrigin::Traversal(StopReason::Failed));
        assert!(!output.cache_written);
    }

    #[tokio::test]
    async fn test_rejects_bad_params() {
        let cache = make_cache().await;
        let shop = Shop::new();
        let config = AppConfig::default();
        let parser = parser();

        let empty = histogram_impl(&cache, &config, &shop, &parser, params("  ")).await;
        assert!(empty.is_err());

        let zero_pages = RatingHistogramParams { max_pages: Some(0), ..params(LISTING) };
        assert!(histogram_impl(&cache, &config, &shop, &parser, zero_pages).await.is_err());

        let too_wide = RatingHistogramParams { concurrency: Some(64), ..params(LISTING) };
        assert!(histogram_impl(&cache, &config, &shop, &parser, too_wide).await.is_err());

        let bad_scheme = histogram_impl(&cache, &config, &shop, &parser, params("ftp://shop.example.com/r")).await;
        assert!(bad_scheme.is_err());
        assert_eq!(shop.request_count(), 0);
    }
}
