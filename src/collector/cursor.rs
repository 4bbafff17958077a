use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use super::Fingerprint;
use crate::models::Review;

/// Fingerprints already accepted. Can be seeded into a run and snapshotted out of it, so
/// a caller may carry deduplication across sources or across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet(HashSet<Fingerprint>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        Self(reviews.into_iter().map(Fingerprint::of).collect())
    }

    /// Returns `false` if the fingerprint was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.0.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a snapshot written by `save`. A missing file is an empty set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No seen-set snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seen-set snapshot: {}", path.display()))?;
        let set: SeenSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seen-set snapshot: {}", path.display()))?;

        info!("Loaded {} fingerprints from {}", set.len(), path.display());
        Ok(set)
    }

    /// Write the snapshot as a sorted JSON array, so files diff cleanly between runs.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut sorted: Vec<&Fingerprint> = self.0.iter().collect();
        sorted.sort();
        let json = serde_json::to_string_pretty(&sorted)?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write seen-set snapshot: {}", path.display()))?;

        info!("Saved {} fingerprints to {}", self.len(), path.display());
        Ok(())
    }
}

/// Loop state of one collection run.
#[derive(Debug)]
pub struct PageCursor {
    /// Page about to be (or last) requested, 1-based
    pub page: u32,
    pub seen: SeenSet,
    pub reviews: Vec<Review>,
    pub consecutive_empty: u32,
}

/// What happened to one parsed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Duplicate,
    Degenerate,
}

impl PageCursor {
    pub fn new(seen: SeenSet) -> Self {
        Self {
            page: 0,
            seen,
            reviews: Vec::new(),
            consecutive_empty: 0,
        }
    }

    pub fn advance(&mut self) -> u32 {
        self.page += 1;
        self.page
    }

    /// Keep the review if its fingerprint is new. Reviews with a blank title and body are
    /// never kept: their fingerprint would merge unrelated reviews.
    pub fn admit(&mut self, review: Review) -> Admission {
        if review.is_degenerate() {
            return Admission::Degenerate;
        }

        if self.seen.insert(Fingerprint::of(&review)) {
            self.reviews.push(review);
            Admission::Accepted
        } else {
            Admission::Duplicate
        }
    }

    pub fn collected(&self) -> usize {
        self.reviews.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTag;

    fn review(title: &str, body: &str) -> Review {
        Review::new(title, body, SourceTag::Amazon)
    }

    #[test]
    fn test_admit_dedups_and_keeps_order() {
        let mut cursor = PageCursor::new(SeenSet::new());

        assert_eq!(cursor.admit(review("A", "1")), Admission::Accepted);
        assert_eq!(cursor.admit(review("B", "2")), Admission::Accepted);
        assert_eq!(cursor.admit(review("A", "1")), Admission::Duplicate);
        assert_eq!(cursor.admit(review("", "")), Admission::Degenerate);

        let titles: Vec<_> = cursor.reviews.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(cursor.seen.len(), 2);
    }

    #[test]
    fn test_seeded_cursor_rejects_known() {
        let seed = SeenSet::from_reviews(&[review("A", "1")]);
        let mut cursor = PageCursor::new(seed);

        assert_eq!(cursor.admit(review("A", "1")), Admission::Duplicate);
        assert_eq!(cursor.collected(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!("seen-{}.json", uuid::Uuid::new_v4()));

        let set = SeenSet::from_reviews(&[review("A", "1"), review("B", "2")]);
        set.save(&path).unwrap();

        let loaded = SeenSet::load(&path).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
        assert!(SeenSet::load(&path).unwrap().is_empty());
    }
}
