mod catalog;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use thumbforge_config::{
    ThumbforgeConfig, apply_all_defaults, apply_env_overrides, config_dir, config_file_path,
    load_and_prepare, load_config, validate,
};
use thumbforge_core::{Dimensions, VideoId};
use thumbforge_logging::init_logger;
use thumbforge_media::{
    Canvas, FfmpegBackend, FrameRenderer, RenderCache, RetryPolicy, ThumbnailOrchestrator,
};

use catalog::{Catalog, CatalogMetadata, CatalogResolver};

#[derive(Parser)]
#[command(name = "thumbforge")]
#[command(about = "Render custom video thumbnails from stream frames")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.thumbforge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the custom thumbnail of one video to a PNG
    Render {
        /// Catalog of stream formats and thumbnail submissions
        #[arg(long)]
        catalog: PathBuf,
        /// Video id in the catalog
        #[arg(long)]
        id: String,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 360)]
        height: u32,
        /// Render this timestamp instead of the submitted one
        #[arg(long)]
        timestamp: Option<f64>,
        #[arg(long, default_value = "thumbnail.png")]
        out: PathBuf,
    },
    /// Show the effective configuration and its validation report
    Config {
        /// Print only the config file location
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));

    match cli.command {
        Commands::Render {
            catalog,
            id,
            width,
            height,
            timestamp,
            out,
        } => {
            let config = load_and_prepare(&config_path).await?;
            init_logger(config.log_dir().map(Path::new), config.log_level(), config.log_json());
            render(&config, &catalog, VideoId::new(id), Dimensions::new(width, height), timestamp, &out)
                .await?;
        }
        Commands::Config { path } => {
            if path {
                println!("{}", config_path.display());
                return Ok(());
            }
            // Unlike `load_and_prepare`, report validation errors instead of failing.
            let config = apply_env_overrides(load_config(&config_path).await?)?;
            print_config(&apply_all_defaults(config))?;
        }
    }

    Ok(())
}

async fn render(
    config: &ThumbforgeConfig,
    catalog_path: &Path,
    id: VideoId,
    dimensions: Dimensions,
    timestamp: Option<f64>,
    out: &Path,
) -> Result<()> {
    let resolver = Arc::new(CatalogResolver::new(catalog_path, Catalog::load(catalog_path).await?));
    let metadata = Arc::new(CatalogMetadata::new(CatalogResolver::clone(&resolver)));
    let renderer = FrameRenderer::new(
        Arc::new(RenderCache::new(config.cache_capacity())),
        resolver.clone(),
        Arc::new(FfmpegBackend::from_config(config)),
        RetryPolicy::from_config(config),
    );
    let orchestrator = ThumbnailOrchestrator::new(Arc::new(renderer), resolver, metadata);

    let on_ready = Box::new(|canvas: Canvas| {
        canvas.show();
        info!(dimensions = %canvas.dimensions(), "Thumbnail ready");
    });
    let Some(thumbnail) = orchestrator
        .produce_thumbnail(None, &id, dimensions, timestamp, config.retain_decode_handle(), on_ready)
        .await
    else {
        println!("{id}: no custom thumbnail, keep the default one");
        return Ok(());
    };

    let canvas = thumbnail.canvas.clone();
    if !thumbnail.finished().await {
        bail!("Failed to render a thumbnail for {id}");
    }
    canvas.save_png(out)?;

    let stats = orchestrator.renderer().cache().stats();
    info!(hits = stats.hits, coalesced = stats.coalesced, reuses = stats.reuses, "Render cache");
    println!("{}", out.display());
    Ok(())
}

fn print_config(config: &ThumbforgeConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);

    let report = validate(config);
    for warning in &report.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &report.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    Ok(())
}
