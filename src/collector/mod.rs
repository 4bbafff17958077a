pub mod cursor;
pub mod fingerprint;
pub mod review_collector;

pub use cursor::{Admission, PageCursor, SeenSet};
pub use fingerprint::Fingerprint;
pub use review_collector::{CollectionOutcome, ReviewCollector, StopReason};

use thiserror::Error;

use crate::fetcher::FetchError;

/// Errors that end a collection run. Per-page and per-record problems never surface here.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid collector config: {0}")]
    InvalidConfig(String),

    #[error("session rejected at page {page}: {source}")]
    Session {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("fetcher unavailable at page {page}: {source}")]
    FetcherUnavailable {
        page: u32,
        #[source]
        source: FetchError,
    },
}

impl CollectorError {
    /// Wrap a fetch error that `FetchError::is_fatal` classified as run-ending.
    pub(crate) fn fatal(page: u32, source: FetchError) -> Self {
        match source {
            FetchError::SessionExpired { .. } => CollectorError::Session { page, source },
            _ => CollectorError::FetcherUnavailable { page, source },
        }
    }

    pub fn is_session_failure(&self) -> bool {
        matches!(self, CollectorError::Session { .. })
    }
}
