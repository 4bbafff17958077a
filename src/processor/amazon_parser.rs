use anyhow::Result;
use scraper::Html;
use tracing::debug;

use super::selectors::CompiledSelectors;
use super::text::{non_empty, parse_rating, strip_read_more, strip_stars_prefix};
use super::{PageParse, ReviewParser};
use crate::config::ReviewSelectors;
use crate::models::{Review, SourceTag};

/// Amazon review listing pages (`[data-hook=review]` blocks).
pub struct AmazonReviewParser {
    selectors: CompiledSelectors,
}

impl AmazonReviewParser {
    pub fn new(selectors: &ReviewSelectors) -> Result<Self> {
        Ok(Self {
            selectors: CompiledSelectors::compile(selectors)?,
        })
    }
}

impl ReviewParser for AmazonReviewParser {
    fn parse_page(&self, html: &str, source: SourceTag) -> PageParse {
        let document = Html::parse_document(html);
        let mut page = PageParse::default();

        for block in self.selectors.review_blocks(&document) {
            let fields = self.selectors.extract_fields(block);

            // A block with neither a title nor a body element is not a review.
            if fields.title.is_none() && fields.body.is_none() {
                page.skipped += 1;
                continue;
            }

            let mut review = Review::new(
                strip_stars_prefix(&fields.title.unwrap_or_default()),
                strip_read_more(&fields.body.unwrap_or_default()),
                source,
            );
            review.rating = fields.rating.as_deref().and_then(parse_rating);
            review.author = fields.author.and_then(non_empty);
            review.posted_at = fields.date.and_then(non_empty);

            page.reviews.push(review);
        }

        debug!(
            "Amazon page parsed: {} reviews, {} skipped blocks",
            page.reviews.len(),
            page.skipped
        );
        page
    }
}
