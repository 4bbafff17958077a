use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

use super::text::clean_text;
use crate::config::ReviewSelectors;

/// `ReviewSelectors` parsed once, up front.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub review_block: Vec<Selector>,
    pub title: Vec<Selector>,
    pub body: Vec<Selector>,
    pub rating: Vec<Selector>,
    pub author: Vec<Selector>,
    pub date: Vec<Selector>,
}

/// Text of a review block's fields, whitespace-normalized. `None` means no element matched.
#[derive(Debug, Clone, Default)]
pub struct RawReviewFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub rating: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

impl CompiledSelectors {
    pub fn compile(config: &ReviewSelectors) -> Result<Self> {
        Ok(Self {
            review_block: compile_all(&config.review_block)?,
            title: compile_all(&config.title)?,
            body: compile_all(&config.body)?,
            rating: compile_all(&config.rating)?,
            author: compile_all(&config.author)?,
            date: compile_all(&config.date)?,
        })
    }

    /// Review blocks matched by the first block selector that finds anything.
    pub fn review_blocks<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.review_block {
            let blocks: Vec<_> = document.select(selector).collect();
            if !blocks.is_empty() {
                return blocks;
            }
        }
        Vec::new()
    }

    pub fn extract_fields(&self, block: ElementRef<'_>) -> RawReviewFields {
        RawReviewFields {
            title: first_text(block, &self.title),
            body: first_text(block, &self.body),
            rating: first_text(block, &self.rating),
            author: first_text(block, &self.author),
            date: first_text(block, &self.date),
        }
    }
}

pub fn compile_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).map_err(|e| anyhow!("Invalid selector '{}': {}", s, e)))
        .collect()
}

/// Cleaned text of the first element under `root` matched by any selector, in order.
pub fn first_text(root: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| root.select(selector).next())
        .map(element_text)
}

/// Cleaned text of the first element in the document matched by any selector.
pub fn first_document_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(element_text)
        .find(|text| !text.is_empty())
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}
