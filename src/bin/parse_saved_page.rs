//! Run the review parser over saved HTML pages, without touching the network.
//!
//! Usage: parse_saved_page <amazon|flipkart> <page.html>... [--out <dir>]

use anyhow::{Context, Result, anyhow};
use review_pipeline::collector::{Admission, PageCursor, SeenSet};
use review_pipeline::config::ReviewSelectors;
use review_pipeline::models::{ReviewBatch, SourceTag};
use review_pipeline::processor::parser_for;
use review_pipeline::storage::{LocalFileSink, RecordSink};
use std::env;

const USAGE: &str = "Usage: parse_saved_page <amazon|flipkart> <page.html>... [--out <dir>]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let source: SourceTag = args
        .next()
        .ok_or_else(|| anyhow!(USAGE))?
        .parse()?;

    let mut files = Vec::new();
    let mut out_dir = None;
    while let Some(arg) = args.next() {
        if arg == "--out" {
            out_dir = Some(args.next().context("--out needs a directory")?);
        } else {
            files.push(arg);
        }
    }

    if files.is_empty() {
        return Err(anyhow!("No HTML files given\n{}", USAGE));
    }

    let parser = parser_for(source, &ReviewSelectors::for_source(source))?;
    let mut cursor = PageCursor::new(SeenSet::new());

    println!("=== PARSING {} SAVED {} PAGES ===\n", files.len(), source);

    for file in &files {
        let page = cursor.advance();
        let html = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file))?;

        let parsed = parser.parse_page(&html, source);
        let found = parsed.reviews.len();
        let mut duplicates = 0;
        for review in parsed.reviews {
            if cursor.admit(review) == Admission::Duplicate {
                duplicates += 1;
            }
        }

        println!(
            "📄 Page {} ({}): {} reviews, {} duplicates, {} unparsable blocks",
            page, file, found, duplicates, parsed.skipped
        );
    }

    println!("\n✅ {} unique reviews", cursor.collected());
    for (i, review) in cursor.reviews.iter().enumerate() {
        let stars = review
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        println!("{:>3}. [{}] {}", i + 1, stars, review.title);
    }

    if let Some(dir) = out_dir {
        let sink = LocalFileSink::new(dir, "parsed_reviews");
        let batch = ReviewBatch::new(source.as_str(), cursor.reviews);
        let location = sink.persist(&batch).await?;
        println!("\n💾 Saved to {}", location);
    }

    Ok(())
}
