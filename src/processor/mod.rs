pub mod amazon_parser;
pub mod flipkart_parser;
pub mod metadata;
pub mod review_frame;
pub mod selectors;
pub mod text;

pub use amazon_parser::AmazonReviewParser;
pub use flipkart_parser::FlipkartReviewParser;
pub use metadata::{AmazonMetadataParser, FlipkartMetadataParser, MetadataParser};
pub use review_frame::ReviewFrameBuilder;

use anyhow::Result;

use crate::config::ReviewSelectors;
use crate::models::{Review, SourceTag};

/// Reviews parsed from one page.
#[derive(Debug, Clone, Default)]
pub struct PageParse {
    pub reviews: Vec<Review>,
    /// Review blocks that were found but could not be turned into a record
    pub skipped: usize,
}

/// Turns one page of raw markup into review records.
pub trait ReviewParser: Send + Sync {
    fn parse_page(&self, html: &str, source: SourceTag) -> PageParse;
}

impl<T: ReviewParser + ?Sized> ReviewParser for Box<T> {
    fn parse_page(&self, html: &str, source: SourceTag) -> PageParse {
        (**self).parse_page(html, source)
    }
}

/// Parser for a source, using its configured (or built-in) selectors.
pub fn parser_for(source: SourceTag, selectors: &ReviewSelectors) -> Result<Box<dyn ReviewParser>> {
    Ok(match source {
        SourceTag::Amazon => Box::new(AmazonReviewParser::new(selectors)?),
        SourceTag::Flipkart => Box::new(FlipkartReviewParser::new(selectors)?),
    })
}

/// Product page parser for a source.
pub fn metadata_parser_for(source: SourceTag) -> Result<Box<dyn MetadataParser>> {
    Ok(match source {
        SourceTag::Amazon => Box::new(AmazonMetadataParser::new()?),
        SourceTag::Flipkart => Box::new(FlipkartMetadataParser::new()?),
    })
}
