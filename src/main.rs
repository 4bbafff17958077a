use anyhow::{Context, Result};
use review_pipeline::collector::{CollectionOutcome, ReviewCollector, SeenSet};
use review_pipeline::config::{MinioConfig, PipelineConfig, ProductPageConfig, SourceConfig};
use review_pipeline::fetcher::{PageFetcher, PageRequest, SourceFetcher};
use review_pipeline::models::{ProductMetadata, Review, ReviewBatch, SessionContext};
use review_pipeline::processor::{metadata_parser_for, parser_for};
use review_pipeline::storage::{LocalFileSink, MinioSink, RecordSink, persist_batch};
use std::env;
use std::path::Path;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PIPELINE_CONFIG: &str = "src/configs/pipeline.toml";
const DEFAULT_MINIO_CONFIG: &str = "src/configs/minio.toml";

/// How a source run ended, from the pipeline's point of view.
enum SourceRun {
    Finished(CollectionOutcome),
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        env::var("REVIEW_PIPELINE_CONFIG").unwrap_or_else(|_| DEFAULT_PIPELINE_CONFIG.to_string());
    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load pipeline configuration from {}", config_path))?;

    let sources = config.enabled_sources();
    info!("🚀 Starting review pipeline with {} sources", sources.len());

    // Sinks are set up first so a broken output config fails before any scraping.
    let sinks = build_sinks(&config).await?;

    let mut seen = match config.output.seen_set_path {
        Some(ref path) => SeenSet::load(path)?,
        None => SeenSet::new(),
    };

    let mut reviews: Vec<Review> = Vec::new();
    let mut metadata: Option<ProductMetadata> = None;
    let mut successful_sources = 0;

    for source in &sources {
        let tag = source.collector.source_tag;
        info!("\n=== Collecting {} reviews ===", tag);

        // The product page is read through the first source on the same marketplace.
        let product = config
            .product
            .as_ref()
            .filter(|p| metadata.is_none() && p.source_tag == tag);

        match run_source(source, &config, product, seen.clone()).await {
            Ok((SourceRun::Finished(outcome), product_metadata)) => {
                info!(
                    "✅ {}: {} new reviews over {} pages ({:?})",
                    tag,
                    outcome.reviews.len(),
                    outcome.last_page,
                    outcome.stop_reason
                );
                if !outcome.failed_pages.is_empty() {
                    warn!(
                        "{} pages failed for {}: {:?}",
                        outcome.failed_pages.len(),
                        tag,
                        outcome.failed_pages
                    );
                }
                metadata = metadata.or(product_metadata);
                seen = outcome.seen;
                reviews.extend(outcome.reviews);
                successful_sources += 1;
            }
            Ok((SourceRun::Interrupted, _)) => {
                warn!("⚠️ Interrupted while collecting {}, skipping remaining sources", tag);
                break;
            }
            Err(e) => {
                error!("❌ Failed to collect {} reviews: {:#}", tag, e);
            }
        }
    }

    info!("\n=== Review Pipeline Summary ===");
    info!(
        "✅ Collected from {} out of {} sources",
        successful_sources,
        sources.len()
    );
    info!("📊 Total unique reviews: {}", reviews.len());

    if reviews.is_empty() {
        warn!("⚠️ No reviews collected, nothing to save");
        return Ok(());
    }

    let target = config.primary_target().unwrap_or("reviews").to_string();
    let mut batch = ReviewBatch::new(target, reviews);
    if let Some(metadata) = metadata {
        batch = batch.with_metadata(metadata);
    }

    let seen_set_path = config.output.seen_set_path.as_deref().map(Path::new);
    persist_batch(&sinks, &batch, &seen, seen_set_path).await?;

    info!("🎉 Review pipeline completed");
    Ok(())
}

/// Collect one source. Ctrl-C stops between pages and still releases the fetcher.
async fn run_source(
    source: &SourceConfig,
    config: &PipelineConfig,
    product: Option<&ProductPageConfig>,
    seen: SeenSet,
) -> Result<(SourceRun, Option<ProductMetadata>)> {
    let collector_config = source.resolved_collector()?;
    let tag = collector_config.source_tag;
    let parser = parser_for(tag, &source.selectors())?;
    let fetcher = SourceFetcher::for_mode(source.fetch_mode, &config.fetcher)
        .await
        .with_context(|| format!("Failed to start {:?} fetcher", source.fetch_mode))?;

    let metadata = match product {
        Some(product) => fetch_metadata(&fetcher, product, &collector_config.session).await,
        None => None,
    };

    let collector = ReviewCollector::new(fetcher, parser, collector_config)?;

    let run = tokio::select! {
        outcome = collector.collect_seeded(seen) => Some(outcome),
        _ = signal::ctrl_c() => None,
    };

    if let Err(e) = collector.into_fetcher().close().await {
        warn!("Failed to release {} fetcher: {}", tag, e);
    }

    match run {
        Some(outcome) => Ok((SourceRun::Finished(outcome?), metadata)),
        None => Ok((SourceRun::Interrupted, metadata)),
    }
}

/// Product details are optional; a failure here never stops collection.
async fn fetch_metadata(
    fetcher: &SourceFetcher,
    product: &ProductPageConfig,
    session: &Option<SessionContext>,
) -> Option<ProductMetadata> {
    info!("Fetching product details from {}", product.url);

    let parser = match metadata_parser_for(product.source_tag) {
        Ok(parser) => parser,
        Err(e) => {
            warn!("No product parser for {}: {}", product.source_tag, e);
            return None;
        }
    };

    let request = PageRequest::new(product.url.clone(), 1).with_session(session.clone());
    match fetcher.fetch(&request).await {
        Ok(html) => {
            let metadata = parser.parse_metadata(&html, &product.url);
            info!("Product: {}", metadata.product_name.as_deref().unwrap_or("N/A"));
            Some(metadata)
        }
        Err(e) => {
            warn!("Failed to fetch product page: {}", e);
            None
        }
    }
}

async fn build_sinks(config: &PipelineConfig) -> Result<Vec<Box<dyn RecordSink>>> {
    let mut sinks: Vec<Box<dyn RecordSink>> =
        vec![Box::new(LocalFileSink::from_config(&config.output))];

    if config.output.upload {
        let minio_path =
            env::var("MINIO_CONFIG").unwrap_or_else(|_| DEFAULT_MINIO_CONFIG.to_string());
        let minio_config = MinioConfig::from_file(&minio_path)
            .context("Failed to load MinIO configuration")?;

        info!(
            "Loaded MinIO configuration: {}@{}",
            minio_config.endpoint, minio_config.bucket_name
        );

        let sink = MinioSink::from_config(&minio_config)
            .await
            .context("Failed to initialize MinIO storage")?;
        sinks.push(Box::new(sink));
    }

    Ok(sinks)
}
