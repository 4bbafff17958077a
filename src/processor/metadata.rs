use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::selectors::{compile_all, first_document_text};
use crate::models::ProductMetadata;

/// Extracts product attributes from a product detail page.
pub trait MetadataParser: Send + Sync {
    fn parse_metadata(&self, html: &str, product_url: &str) -> ProductMetadata;
}

fn selectors(values: &[&str]) -> Result<Vec<Selector>> {
    compile_all(&values.iter().map(|s| s.to_string()).collect::<Vec<_>>())
}

pub struct AmazonMetadataParser {
    name: Vec<Selector>,
    brand: Vec<Selector>,
    price_whole: Vec<Selector>,
    price_fraction: Vec<Selector>,
    mrp: Vec<Selector>,
    discount: Vec<Selector>,
    stock: Vec<Selector>,
    rating: Vec<Selector>,
    review_count: Vec<Selector>,
    seller: Vec<Selector>,
    asin_pattern: Regex,
}

impl AmazonMetadataParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            name: selectors(&["#productTitle"])?,
            brand: selectors(&["#bylineInfo"])?,
            price_whole: selectors(&[".a-price .a-price-whole"])?,
            price_fraction: selectors(&[".a-price .a-price-fraction"])?,
            mrp: selectors(&[".basisPrice .a-offscreen", ".a-text-strike"])?,
            discount: selectors(&[".savingsPercentage", ".a-color-price"])?,
            stock: selectors(&["#availability"])?,
            rating: selectors(&["#acrPopover .a-icon-alt", ".a-icon-alt"])?,
            review_count: selectors(&["#acrCustomerReviewText"])?,
            seller: selectors(&["#sellerProfileTriggerId", "#merchant-info a"])?,
            asin_pattern: Regex::new(r"/(?:dp|product-reviews|gp/product)/([A-Z0-9]{10})")?,
        })
    }
}

impl MetadataParser for AmazonMetadataParser {
    fn parse_metadata(&self, html: &str, product_url: &str) -> ProductMetadata {
        let document = Html::parse_document(html);
        let text = |list: &[Selector]| first_document_text(&document, list);

        // The whole part keeps its trailing "." separator, so the two parts concatenate.
        let price = match (text(&self.price_whole), text(&self.price_fraction)) {
            (Some(whole), Some(fraction)) => Some(format!("{}{}", whole, fraction)),
            (Some(whole), None) => Some(whole.trim_end_matches('.').to_string()),
            _ => None,
        };

        ProductMetadata {
            product_name: text(&self.name),
            product_id: self
                .asin_pattern
                .captures(product_url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
            brand: text(&self.brand),
            price,
            mrp: text(&self.mrp),
            discount: text(&self.discount),
            stock_status: text(&self.stock),
            rating: text(&self.rating),
            review_count: text(&self.review_count),
            seller: text(&self.seller),
            product_url: product_url.to_string(),
            scraped_at: Utc::now(),
        }
    }
}

pub struct FlipkartMetadataParser {
    name: Vec<Selector>,
    brand: Vec<Selector>,
    price: Vec<Selector>,
    mrp: Vec<Selector>,
    discount: Vec<Selector>,
    stock: Vec<Selector>,
    rating: Vec<Selector>,
    review_count: Vec<Selector>,
    seller: Vec<Selector>,
    json_ld: Selector,
    pid_pattern: Regex,
}

impl FlipkartMetadataParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            name: selectors(&["span.B_NuCI", "span._35KyD6", "span.VU-ZEz", "div._1Mh3u3 h1"])?,
            brand: selectors(&["span._2apC", "span.mEh187"])?,
            price: selectors(&["div._30jeq3._16Jk6d", "div._30jeq3", "div.Nx9bqj"])?,
            mrp: selectors(&["div._3I9_wc._2p6lqe", "div._3I9_wc", "div.yRaY8j"])?,
            discount: selectors(&["div._3Ay6Sb._31Dcoz", "div._3Ay6Sb", "div.UkUFwK"])?,
            stock: selectors(&["div._16FRp0", "div._2o7WAb"])?,
            rating: selectors(&["div._3LWZlK", "div.XQDdHH"])?,
            review_count: selectors(&["span._2_R_DZ", "span.Wphh3N"])?,
            seller: selectors(&["#sellerName span", "div._3k-BhJ"])?,
            json_ld: Selector::parse("script[type='application/ld+json']")
                .map_err(|e| anyhow::anyhow!("Invalid JSON-LD selector: {}", e))?,
            pid_pattern: Regex::new(r"[?&]pid=([A-Z0-9]+)")?,
        })
    }

    /// `sku` / `mpn` / `productID` from the page's JSON-LD block.
    fn json_ld_id(&self, document: &Html) -> Option<String> {
        document.select(&self.json_ld).find_map(|script| {
            let value: Value = serde_json::from_str(&script.inner_html()).ok()?;
            let product = match value {
                Value::Array(items) => items.into_iter().next()?,
                other => other,
            };
            ["sku", "mpn", "productID"]
                .iter()
                .find_map(|key| product.get(key).and_then(|v| v.as_str()).map(str::to_string))
        })
    }
}

fn strip_currency(text: String) -> String {
    text.replace(['₹', ','], "").trim().to_string()
}

impl MetadataParser for FlipkartMetadataParser {
    fn parse_metadata(&self, html: &str, product_url: &str) -> ProductMetadata {
        let document = Html::parse_document(html);
        let text = |list: &[Selector]| first_document_text(&document, list);

        let product_id = self.json_ld_id(&document).or_else(|| {
            self.pid_pattern
                .captures(product_url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });

        let product_name = text(&self.name);
        let brand = text(&self.brand).or_else(|| {
            product_name
                .as_deref()
                .and_then(|n| n.split_whitespace().next())
                .map(str::to_string)
        });

        ProductMetadata {
            product_name,
            product_id,
            brand,
            price: text(&self.price).map(strip_currency),
            mrp: text(&self.mrp).map(strip_currency),
            discount: text(&self.discount),
            stock_status: text(&self.stock),
            rating: text(&self.rating),
            review_count: text(&self.review_count),
            seller: text(&self.seller),
            product_url: product_url.to_string(),
            scraped_at: Utc::now(),
        }
    }
}
