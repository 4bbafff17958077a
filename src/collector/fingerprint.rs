use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::Review;
use crate::processor::text::clean_text;

/// Content key of a review: SHA-256 over the whitespace-normalized title and body.
///
/// Stable across processes and platforms. The review's source is deliberately not part of
/// the key, so the same text from two marketplaces is one logical review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(title: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(clean_text(title).as_bytes());
        hasher.update([0u8]);
        hasher.update(clean_text(body).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn of(review: &Review) -> Self {
        Self::compute(&review.title, &review.body)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTag;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Fingerprint::compute("a", "b").as_str(),
            "59b271ae1bbcb1d31d41929817f4b16fb439eb4f31520b5ad1d5ce98920a7138"
        );
        assert_eq!(
            Fingerprint::compute(" Great  phone", "Works\twell ").as_str(),
            "69ca886b3a8737070d693e9b80010e229e38029c16d1068cea5f01b3ed7993ef"
        );
    }

    #[test]
    fn test_whitespace_normalized() {
        assert_eq!(
            Fingerprint::compute("  Great   phone ", "Works\nwell"),
            Fingerprint::compute("Great phone", "Works well")
        );
    }

    #[test]
    fn test_case_and_order_sensitive() {
        assert_ne!(
            Fingerprint::compute("Great phone", "x"),
            Fingerprint::compute("great phone", "x")
        );
        assert_ne!(
            Fingerprint::compute("ab", "c"),
            Fingerprint::compute("a", "bc")
        );
        assert_ne!(Fingerprint::compute("a", "b"), Fingerprint::compute("b", "a"));
    }

    #[test]
    fn test_source_ignored() {
        let amazon = Review::new("Nice", "Good camera", SourceTag::Amazon);
        let flipkart = Review::new("Nice", "Good camera", SourceTag::Flipkart);
        assert_eq!(Fingerprint::of(&amazon), Fingerprint::of(&flipkart));
    }
}
