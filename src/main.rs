//! pixserve - Render images through a cached processing pipeline.
//!
//! This binary builds the pipeline from CLI configuration and runs requests
//! through it.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixserve::{
    cache::{CachingDecorator, KeyGenerator, MemoryCache},
    config::{Cli, Command, KeyConfig, RenderConfig},
    handler::{Handler, Pipeline},
    process::{ImageProcessor, ProcessStage},
    source::{create_s3_client, ChainDetector, Fetcher, FileFetcher, S3Fetcher, SourceOrigin},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Render(config) => run_render(config).await,
        Command::Key(config) => run_key(config),
    }
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let params = match config.request.to_params() {
        Ok(params) => params,
        Err(e) => {
            error!("Invalid request: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = match config.cache_capacity().and_then(MemoryCache::new) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher: Arc<dyn Fetcher> = match (&config.root, &config.s3_bucket) {
        (Some(root), _) => {
            info!("Source: directory {}", root.display());
            Arc::new(FileFetcher::new(root))
        }
        (None, Some(bucket)) => {
            info!("Source: s3://{}", bucket);
            if let Some(ref endpoint) = config.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.s3_region);

            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            let mut fetcher = S3Fetcher::new(client, bucket.as_str());
            if let Some(ref prefix) = config.s3_prefix {
                fetcher = fetcher.with_prefix(prefix.as_str());
            }
            Arc::new(fetcher)
        }
        // Rejected by validate()
        (None, None) => return ExitCode::FAILURE,
    };

    info!(
        "Cache: {} bytes, {:?} keys{}",
        cache.capacity(),
        config.keys.digest,
        if config.single_flight {
            ", single-flight"
        } else {
            ""
        }
    );

    let mut caching = CachingDecorator::new(config.keys.key_generator(), cache.clone());
    if config.single_flight {
        caching = caching.with_single_flight();
    }

    let pipeline = Pipeline::origin(SourceOrigin::new(fetcher, ChainDetector::default()))
        .wrap(ProcessStage::new(ImageProcessor::new()))
        .wrap(caching);

    info!("Request: {}", params);

    let mut last = None;
    for run in 1..=config.repeat {
        let start = Instant::now();
        match pipeline.handle(&params).await {
            Ok(image) => {
                info!(
                    run = run,
                    format = image.format(),
                    bytes = image.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Rendered"
                );
                last = Some(image);
            }
            Err(e) => {
                error!(kind = ?e.kind(), param = e.param_name(), "Request failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let stats = cache.stats().await;
    info!(
        "Cache stats: {} hit(s), {} miss(es), {} eviction(s), {} entries, {} bytes",
        stats.hits, stats.misses, stats.evictions, stats.entries, stats.size
    );

    let Some(image) = last else {
        return ExitCode::FAILURE;
    };

    match config.output {
        Some(ref path) => {
            if let Err(e) = tokio::fs::write(path, image.data()).await {
                error!("Failed to write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
            info!("Wrote {} ({} bytes)", path.display(), image.len());
        }
        None => println!("{} {} bytes", image.format(), image.len()),
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Key Command
// =============================================================================

fn run_key(config: KeyConfig) -> ExitCode {
    init_logging(config.verbose);

    let params = match config.request.to_params() {
        Ok(params) => params,
        Err(e) => {
            error!("Invalid request: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let key = config.keys.key_generator().generate(&params);

    let output = serde_json::json!({
        "key": key.to_hex(),
        "digest": format!("{:?}", config.keys.digest).to_lowercase(),
        "namespace": config.keys.namespace,
        "canonical": params.to_string(),
        "params": params,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Initialize logging with the given verbosity.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pixserve=debug"
    } else {
        "pixserve=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
