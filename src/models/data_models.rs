use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace (and page type) a review was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Amazon,
    Flipkart,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Amazon => "Amazon",
            SourceTag::Flipkart => "Flipkart",
        }
    }

    /// Review listing URL template used when a source does not configure its own.
    pub fn default_url_template(&self) -> &'static str {
        match self {
            SourceTag::Amazon => {
                "https://www.amazon.in/product-reviews/{target}/?ie=UTF8&reviewerType=all_reviews&pageNumber={page}&sortBy=recent"
            }
            SourceTag::Flipkart => "{target}&page={page}",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(SourceTag::Amazon),
            "flipkart" => Ok(SourceTag::Flipkart),
            other => Err(anyhow!("Unknown review source: {}", other)),
        }
    }
}

/// One user review extracted from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub title: String,
    pub body: String,
    pub rating: Option<f64>,
    pub author: Option<String>,
    /// Free text as shown on the page, e.g. "Reviewed in India on 3 March 2024".
    pub posted_at: Option<String>,
    pub source: SourceTag,
}

impl Review {
    pub fn new(title: impl Into<String>, body: impl Into<String>, source: SourceTag) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            rating: None,
            author: None,
            posted_at: None,
            source,
        }
    }

    /// True when both title and body are blank, which makes the fingerprint meaningless.
    pub fn is_degenerate(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }
}

/// Product attributes scraped from the product page, exported next to every review row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub product_name: Option<String>,
    pub product_id: Option<String>,
    pub brand: Option<String>,
    pub price: Option<String>,
    pub mrp: Option<String>,
    pub discount: Option<String>,
    pub stock_status: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub seller: Option<String>,
    pub product_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ProductMetadata {
    /// Column name / value pairs in export order. Missing values are exported as "N/A".
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());

        vec![
            ("product_name", or_na(&self.product_name)),
            ("product_id", or_na(&self.product_id)),
            ("brand", or_na(&self.brand)),
            ("price", or_na(&self.price)),
            ("mrp", or_na(&self.mrp)),
            ("discount", or_na(&self.discount)),
            ("stock_status", or_na(&self.stock_status)),
            ("product_rating", or_na(&self.rating)),
            ("review_count", or_na(&self.review_count)),
            ("seller", or_na(&self.seller)),
            ("product_url", self.product_url.clone()),
            (
                "scraped_at",
                self.scraped_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ]
    }
}

/// Final, deduplicated output of a pipeline run handed to a `RecordSink`.
#[derive(Debug, Clone)]
pub struct ReviewBatch {
    /// Identifier used for output naming (product id or slug).
    pub target: String,
    pub reviews: Vec<Review>,
    pub metadata: Option<ProductMetadata>,
}

impl ReviewBatch {
    pub fn new(target: impl Into<String>, reviews: Vec<Review>) -> Self {
        Self {
            target: target.into(),
            reviews,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ProductMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }
}
