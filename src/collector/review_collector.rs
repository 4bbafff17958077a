use tokio::time::sleep;
use tracing::{error, info, warn};

use super::{Admission, CollectorError, PageCursor, SeenSet};
use crate::config::{CollectorConfig, FetchFailurePolicy};
use crate::fetcher::{PageFetcher, PageRequest};
use crate::models::Review;
use crate::processor::ReviewParser;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Enough consecutive pages produced no parsed reviews
    EmptyPage { page: u32 },
    /// `max_pages` pages were requested
    PageCeiling,
}

/// Result of one collection run.
#[derive(Debug)]
pub struct CollectionOutcome {
    /// Unique reviews in first-seen order
    pub reviews: Vec<Review>,
    /// Last page number requested
    pub last_page: u32,
    pub stop_reason: StopReason,
    /// Pages whose fetch failed
    pub failed_pages: Vec<u32>,
    pub duplicates_dropped: usize,
    /// Reviews dropped because both title and body were blank
    pub degenerate_dropped: usize,
    /// Review blocks the parser could not turn into a record
    pub malformed_skipped: usize,
    /// Every fingerprint known at the end of the run, seed included
    pub seen: SeenSet,
}

/// Walks a source's review pages in order, deduplicating by content fingerprint.
///
/// Pages are fetched strictly one after another with a randomized wait in between. The
/// collector never inspects which site it is talking to; URL building, fetching and
/// parsing all come from the configuration, the fetcher and the parser.
pub struct ReviewCollector<F, P> {
    fetcher: F,
    parser: P,
    config: CollectorConfig,
}

impl<F: PageFetcher, P: ReviewParser> ReviewCollector<F, P> {
    pub fn new(fetcher: F, parser: P, config: CollectorConfig) -> Result<Self, CollectorError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            parser,
            config,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Hand the fetcher back so its session can be released.
    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    pub async fn collect(&self) -> Result<CollectionOutcome, CollectorError> {
        self.collect_seeded(SeenSet::new()).await
    }

    /// Run with fingerprints that must not be emitted again (another source's reviews, or
    /// a snapshot from a previous run).
    pub async fn collect_seeded(&self, seen: SeenSet) -> Result<CollectionOutcome, CollectorError> {
        let config = &self.config;
        let source = config.source_tag;
        let mut cursor = PageCursor::new(seen);
        let mut failed_pages = Vec::new();
        let mut duplicates_dropped = 0;
        let mut degenerate_dropped = 0;
        let mut malformed_skipped = 0;

        info!(
            "Collecting {} reviews for {} (up to {} pages, {} fingerprints seeded)",
            source,
            config.target_id,
            config.max_pages,
            cursor.seen.len()
        );

        let stop_reason = loop {
            if cursor.page >= config.max_pages {
                info!("Reached page ceiling ({}) for {}", config.max_pages, source);
                break StopReason::PageCeiling;
            }

            let page = cursor.advance();
            let url = config.page_url(page);

            if page > 1 || config.delay_first_request {
                sleep(config.delay.sample()).await;
            }

            info!("--> {} page {}: {}", source, page, url);
            let request = PageRequest::new(url, page).with_session(config.session.clone());

            // `None` means the page is ignored for termination purposes.
            let parsed_count = match self.fetcher.fetch(&request).await {
                Ok(html) => {
                    let parsed = self.parser.parse_page(&html, source);
                    let count = parsed.reviews.len();
                    malformed_skipped += parsed.skipped;

                    let mut accepted = 0;
                    for review in parsed.reviews {
                        match cursor.admit(review) {
                            Admission::Accepted => accepted += 1,
                            Admission::Duplicate => duplicates_dropped += 1,
                            Admission::Degenerate => {
                                degenerate_dropped += 1;
                                warn!(
                                    "Dropping review with empty title and body on {} page {}",
                                    source, page
                                );
                            }
                        }
                    }

                    info!(
                        "  -> {} parsed, {} new, {} total so far",
                        count,
                        accepted,
                        cursor.collected()
                    );
                    Some(count)
                }
                Err(e) if e.is_fatal() => {
                    error!("Stopping {} collection at page {}: {}", source, page, e);
                    return Err(CollectorError::fatal(page, e));
                }
                Err(e) => {
                    warn!("Failed to fetch {} page {}: {}", source, page, e);
                    failed_pages.push(page);
                    match config.on_fetch_failure {
                        FetchFailurePolicy::TreatAsEmpty => Some(0),
                        FetchFailurePolicy::Skip => None,
                    }
                }
            };

            match parsed_count {
                Some(0) => {
                    cursor.consecutive_empty += 1;
                    if cursor.consecutive_empty >= config.max_consecutive_empty_pages {
                        info!("No more {} reviews found after page {}", source, page);
                        break StopReason::EmptyPage { page };
                    }
                }
                Some(_) => cursor.consecutive_empty = 0,
                None => {}
            }
        };

        info!(
            "Collected {} unique {} reviews ({} duplicates, {} blank, {} failed pages)",
            cursor.collected(),
            source,
            duplicates_dropped,
            degenerate_dropped,
            failed_pages.len()
        );

        Ok(CollectionOutcome {
            reviews: cursor.reviews,
            last_page: cursor.page,
            stop_reason,
            failed_pages,
            duplicates_dropped,
            degenerate_dropped,
            malformed_skipped,
            seen: cursor.seen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use crate::models::{SessionContext, SessionCookie, SourceTag};
    use crate::processor::PageParse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    enum Scripted {
        Page(String),
        Fail,
        SessionExpired,
    }

    /// Serves canned pages and records which pages were requested.
    #[derive(Default)]
    struct ScriptedFetcher {
        pages: HashMap<u32, Scripted>,
        requested: Mutex<Vec<u32>>,
        sessions_seen: Mutex<Vec<bool>>,
    }

    impl ScriptedFetcher {
        fn with_pages(pages: &[&str]) -> Self {
            let mut fetcher = Self::default();
            for (i, page) in pages.iter().enumerate() {
                fetcher
                    .pages
                    .insert(i as u32 + 1, Scripted::Page(page.to_string()));
            }
            fetcher
        }

        fn set(mut self, page: u32, scripted: Scripted) -> Self {
            self.pages.insert(page, scripted);
            self
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(request.page);
            self.sessions_seen
                .lock()
                .unwrap()
                .push(request.session.is_some());

            match self.pages.get(&request.page).cloned() {
                Some(Scripted::Page(html)) => Ok(html),
                Some(Scripted::Fail) => Err(FetchError::Status {
                    url: request.url.clone(),
                    status: 503,
                }),
                Some(Scripted::SessionExpired) => Err(FetchError::SessionExpired {
                    url: request.url.clone(),
                }),
                None => Ok(String::new()),
            }
        }
    }

    /// One review per line as `title|body[|author]`; a line `!` is a malformed block.
    struct LineParser;

    impl ReviewParser for LineParser {
        fn parse_page(&self, html: &str, source: SourceTag) -> PageParse {
            let mut page = PageParse::default();
            for line in html.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if line == "!" {
                    page.skipped += 1;
                    continue;
                }
                let mut parts = line.split('|');
                let title = parts.next().unwrap_or_default();
                let body = parts.next().unwrap_or_default();
                let mut review = Review::new(title, body, source);
                review.author = parts.next().map(str::to_string);
                page.reviews.push(review);
            }
            page
        }
    }

    fn config(max_pages: u32) -> CollectorConfig {
        CollectorConfig::new("B0CS69DGSW", max_pages, SourceTag::Amazon).with_delay(0.0, 0.0)
    }

    fn titles(outcome: &CollectionOutcome) -> Vec<String> {
        outcome.reviews.iter().map(|r| r.title.clone()).collect()
    }

    async fn run(fetcher: ScriptedFetcher, config: CollectorConfig) -> (CollectionOutcome, Vec<u32>) {
        let collector = ReviewCollector::new(fetcher, LineParser, config).unwrap();
        let outcome = collector.collect().await.unwrap();
        let requested = collector.fetcher().requested();
        (outcome, requested)
    }

    #[tokio::test]
    async fn test_stops_on_first_empty_page() {
        let fetcher = ScriptedFetcher::with_pages(&["a|1\nb|2", "c|3", "", "d|4\ne|5\nf|6\ng|7\nh|8"]);
        let (outcome, requested) = run(fetcher, config(4)).await;

        assert_eq!(outcome.reviews.len(), 3);
        assert_eq!(titles(&outcome), vec!["a", "b", "c"]);
        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage { page: 3 });
        assert_eq!(outcome.last_page, 3);
    }

    #[tokio::test]
    async fn test_page_ceiling_respected() {
        let fetcher =
            ScriptedFetcher::with_pages(&["a|1", "b|2", "c|3", "d|4", "e|5", "f|6", "g|7"]);
        let (outcome, requested) = run(fetcher, config(5)).await;

        assert_eq!(requested, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcome.reviews.len(), 5);
        assert_eq!(outcome.stop_reason, StopReason::PageCeiling);
        assert_eq!(outcome.last_page, 5);
    }

    #[tokio::test]
    async fn test_repeated_pages_do_not_change_result() {
        let once = ScriptedFetcher::with_pages(&["a|1\nb|2", "c|3"]);
        let repeated = ScriptedFetcher::with_pages(&["a|1\nb|2", "a|1\nb|2", "c|3", "a|1\nb|2"]);

        let (first, _) = run(once, config(2)).await;
        let (second, requested) = run(repeated, config(4)).await;

        assert_eq!(titles(&first), titles(&second));
        assert_eq!(second.duplicates_dropped, 4);
        // A page made only of duplicates is not an empty page.
        assert_eq!(requested, vec![1, 2, 3, 4]);
        assert_eq!(second.stop_reason, StopReason::PageCeiling);
    }

    #[tokio::test]
    async fn test_first_seen_copy_wins() {
        let forward = ScriptedFetcher::with_pages(&["a|1|first\nb|2", "c|3\na|1|second"]);
        let (outcome, _) = run(forward, config(2)).await;

        assert_eq!(titles(&outcome), vec!["a", "b", "c"]);
        assert_eq!(outcome.reviews[0].author.as_deref(), Some("first"));

        let swapped = ScriptedFetcher::with_pages(&["c|3\na|1|second", "a|1|first\nb|2"]);
        let (outcome, _) = run(swapped, config(2)).await;

        assert_eq!(titles(&outcome), vec!["c", "a", "b"]);
        assert_eq!(outcome.reviews[1].author.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_cross_source_collision_keeps_first_source() {
        let amazon = ReviewCollector::new(
            ScriptedFetcher::with_pages(&["Nice|Good camera\nMeh|Average battery"]),
            LineParser,
            config(1),
        )
        .unwrap();
        let amazon_outcome = amazon.collect().await.unwrap();

        let flipkart_config = CollectorConfig::new(
            "https://www.flipkart.com/x/product-reviews/itm1?pid=P1",
            2,
            SourceTag::Flipkart,
        )
        .with_delay(0.0, 0.0);
        let flipkart = ReviewCollector::new(
            ScriptedFetcher::with_pages(&["Nice|Good camera\nLoved it|Fast delivery"]),
            LineParser,
            flipkart_config,
        )
        .unwrap();
        let flipkart_outcome = flipkart
            .collect_seeded(amazon_outcome.seen.clone())
            .await
            .unwrap();

        assert_eq!(flipkart_outcome.duplicates_dropped, 1);
        assert_eq!(flipkart_outcome.reviews.len(), 1);
        assert_eq!(flipkart_outcome.reviews[0].title, "Loved it");
        assert_eq!(flipkart_outcome.reviews[0].source, SourceTag::Flipkart);
        assert_eq!(flipkart_outcome.seen.len(), 3);

        let merged: Vec<_> = amazon_outcome
            .reviews
            .iter()
            .chain(flipkart_outcome.reviews.iter())
            .collect();
        let nice = merged.iter().find(|r| r.title == "Nice").unwrap();
        assert_eq!(nice.source, SourceTag::Amazon);
        assert_eq!(merged.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_skipped_when_configured() {
        let fetcher = ScriptedFetcher::with_pages(&["a|1", "", "c|3", "d|4"]).set(2, Scripted::Fail);
        let config = config(4).with_fetch_failure_policy(FetchFailurePolicy::Skip);
        let (outcome, requested) = run(fetcher, config).await;

        assert_eq!(titles(&outcome), vec!["a", "c", "d"]);
        assert_eq!(requested, vec![1, 2, 3, 4]);
        assert_eq!(outcome.failed_pages, vec![2]);
        assert_eq!(outcome.stop_reason, StopReason::PageCeiling);
    }

    #[tokio::test]
    async fn test_fetch_failure_treated_as_empty_by_default() {
        let fetcher = ScriptedFetcher::with_pages(&["a|1", "", "c|3", "d|4"]).set(2, Scripted::Fail);
        let (outcome, requested) = run(fetcher, config(4)).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(requested, vec![1, 2]);
        assert_eq!(outcome.failed_pages, vec![2]);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage { page: 2 });
    }

    #[tokio::test]
    async fn test_zero_records_still_stop_when_failures_are_skipped() {
        let fetcher = ScriptedFetcher::with_pages(&["a|1", "", "", "d|4"]).set(2, Scripted::Fail);
        let config = config(4).with_fetch_failure_policy(FetchFailurePolicy::Skip);
        let (outcome, requested) = run(fetcher, config).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(outcome.failed_pages, vec![2]);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage { page: 3 });
    }

    #[tokio::test]
    async fn test_blank_reviews_are_dropped_and_counted() {
        let fetcher = ScriptedFetcher::with_pages(&["|\na|1", "|\nb|2"]);
        let (outcome, requested) = run(fetcher, config(2)).await;

        assert_eq!(titles(&outcome), vec!["a", "b"]);
        assert_eq!(outcome.degenerate_dropped, 2);
        assert_eq!(outcome.duplicates_dropped, 0);
        assert!(outcome.reviews.iter().all(|r| !r.is_degenerate()));
        assert_eq!(requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_page_of_only_blank_reviews_is_not_empty() {
        let fetcher = ScriptedFetcher::with_pages(&["|", "a|1"]);
        let (outcome, requested) = run(fetcher, config(2)).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(outcome.degenerate_dropped, 1);
        assert_eq!(requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_malformed_blocks_skipped() {
        let fetcher = ScriptedFetcher::with_pages(&["!\na|1\n!", "!", "c|3"]);
        let (outcome, requested) = run(fetcher, config(3)).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(outcome.malformed_skipped, 3);
        // Page 2 had blocks but no parsable review.
        assert_eq!(requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_session_failure_is_fatal() {
        let fetcher =
            ScriptedFetcher::with_pages(&["a|1", "b|2", "c|3"]).set(2, Scripted::SessionExpired);
        let collector = ReviewCollector::new(fetcher, LineParser, config(3)).unwrap();

        let err = collector.collect().await.unwrap_err();
        assert!(err.is_session_failure());
        assert!(matches!(err, CollectorError::Session { page: 2, .. }));
        assert_eq!(collector.fetcher().requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_consecutive_empty_tolerance() {
        let fetcher = ScriptedFetcher::with_pages(&["a|1", "", "b|2", "", "", "c|3"]);
        let mut config = config(6);
        config.max_consecutive_empty_pages = 2;
        let (outcome, requested) = run(fetcher, config).await;

        assert_eq!(titles(&outcome), vec!["a", "b"]);
        assert_eq!(requested, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage { page: 5 });
    }

    #[tokio::test]
    async fn test_seeded_run_skips_previous_reviews() {
        let first_run = ScriptedFetcher::with_pages(&["a|1\nb|2"]);
        let (previous, _) = run(first_run, config(1)).await;

        let collector = ReviewCollector::new(
            ScriptedFetcher::with_pages(&["c|3\na|1\nb|2"]),
            LineParser,
            config(1),
        )
        .unwrap();
        let outcome = collector.collect_seeded(previous.seen).await.unwrap();

        assert_eq!(titles(&outcome), vec!["c"]);
        assert_eq!(outcome.duplicates_dropped, 2);
        assert_eq!(outcome.seen.len(), 3);
    }

    #[tokio::test]
    async fn test_session_forwarded_to_fetcher() {
        let session = SessionContext {
            cookies: vec![SessionCookie {
                name: "session-id".to_string(),
                value: "1".to_string(),
                domain: None,
            }],
            user_agent: None,
        };
        let collector = ReviewCollector::new(
            ScriptedFetcher::with_pages(&["a|1", "b|2"]),
            LineParser,
            config(2).with_session(session),
        )
        .unwrap();
        collector.collect().await.unwrap();

        assert_eq!(*collector.fetcher().sessions_seen.lock().unwrap(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_page_urls_built_from_template() {
        struct UrlRecorder(Mutex<Vec<String>>);

        #[async_trait]
        impl PageFetcher for UrlRecorder {
            async fn fetch(&self, request: &PageRequest) -> Result<String, FetchError> {
                self.0.lock().unwrap().push(request.url.clone());
                Ok("x|y".to_string())
            }
        }

        let config = config(2).with_url_template("https://example.com/{target}/reviews?p={page}");
        let collector =
            ReviewCollector::new(UrlRecorder(Mutex::new(Vec::new())), LineParser, config).unwrap();
        collector.collect().await.unwrap();

        let urls = collector.into_fetcher().0.into_inner().unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/B0CS69DGSW/reviews?p=1",
                "https://example.com/B0CS69DGSW/reviews?p=2"
            ]
        );
    }

    #[tokio::test]
    async fn test_delay_before_requests() {
        let mut config = config(2).with_delay(0.05, 0.05);
        config.delay_first_request = false;

        let started = Instant::now();
        run(ScriptedFetcher::with_pages(&["a|1", "b|2"]), config.clone()).await;
        assert!(started.elapsed() >= Duration::from_millis(50));

        config.delay_first_request = true;
        let started = Instant::now();
        run(ScriptedFetcher::with_pages(&["a|1", "b|2"]), config).await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unavailable_fetcher_is_fatal() {
        struct DeadDriver;

        #[async_trait]
        impl PageFetcher for DeadDriver {
            async fn fetch(&self, _request: &PageRequest) -> Result<String, FetchError> {
                Err(FetchError::Unavailable("driver crashed".to_string()))
            }
        }

        let collector = ReviewCollector::new(DeadDriver, LineParser, config(3)).unwrap();
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectorError::FetcherUnavailable { page: 1, .. }));
        assert!(!err.is_session_failure());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ReviewCollector::new(ScriptedFetcher::default(), LineParser, config(0));
        assert!(matches!(result, Err(CollectorError::InvalidConfig(_))));
    }
}
