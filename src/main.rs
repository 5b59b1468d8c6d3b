//! `sidemerge` CLI - merge model and product images, or serve the merge API.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sidemerge::image::{self, Loader, OutputFormat};
use sidemerge::server::{self, AppState, OutputStore};
use sidemerge::{Input, LayoutPolicy, MergeRequest, ServerConfig};

/// Merge a model image and a product image side by side.
#[derive(Parser, Debug)]
#[command(name = "sidemerge")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP merge service.
    Serve(ServeArgs),
    /// Merge two local image files.
    Merge(MergeArgs),
}

#[derive(ClapArgs, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Directory merged outputs are written to.
    #[arg(long, env = "SIDEMERGE_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Prefix for returned output URLs (e.g. https://merge.example.com).
    #[arg(long, env = "SIDEMERGE_PUBLIC_URL", value_name = "URL")]
    public_url: Option<String>,

    /// Timeout for fetching remote images, in seconds.
    #[arg(long, env = "SIDEMERGE_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Largest remote image or upload accepted, in MiB.
    #[arg(long, env = "SIDEMERGE_MAX_MB", default_value_t = 50)]
    max_mb: u32,

    /// Largest merged canvas built, in megapixels.
    #[arg(long, env = "SIDEMERGE_MAX_MEGAPIXELS", default_value_t = 40)]
    max_megapixels: u64,

    /// Remove outputs older than this many hours.
    #[arg(long, env = "SIDEMERGE_RETENTION_HOURS", default_value_t = 24)]
    retention_hours: u64,

    /// Minutes between cleanup runs.
    #[arg(long, env = "SIDEMERGE_CLEANUP_MINUTES", default_value_t = 60)]
    cleanup_minutes: u64,
}

#[derive(ClapArgs, Debug)]
struct MergeArgs {
    /// Model/person image (left side).
    #[arg(value_name = "MODEL")]
    model: PathBuf,

    /// Product image (right side).
    #[arg(value_name = "PRODUCT")]
    product: PathBuf,

    /// Output image path; format follows the extension.
    #[arg(value_name = "OUTPUT", default_value = "merged_output.jpg")]
    output: PathBuf,

    /// Target height in pixels. Defaults to the taller of the two inputs.
    #[arg(long, value_name = "INT")]
    height: Option<u32>,

    /// Layout policy: uniform_height or preserve_product_size.
    #[arg(long, default_value = "uniform_height", value_name = "POLICY")]
    layout: LayoutPolicy,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sidemerge={log_level},tower_http={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match args.command {
        Command::Serve(serve) => run_server(serve),
        Command::Merge(merge) => run_merge(&merge),
    };

    if let Err(err) = result {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_server(args: ServeArgs) -> Result<()> {
    let max_bytes = u64::from(args.max_mb) * 1024 * 1024;
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        output_dir: args.output_dir,
        public_base_url: args.public_url,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        max_fetch_bytes: max_bytes,
        max_upload_bytes: usize::try_from(max_bytes).context("Upload limit too large")?,
        max_canvas_pixels: args.max_megapixels.saturating_mul(1_000_000),
        retention: Duration::from_secs(args.retention_hours.saturating_mul(3600)),
        cleanup_interval: Duration::from_secs(args.cleanup_minutes.saturating_mul(60)),
        ..ServerConfig::default()
    };
    config.validate().context("Invalid configuration")?;

    tracing::info!("Starting merge service with config: {config:?}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let store = OutputStore::open(&config.output_dir).context("Failed to open output store")?;
        let loader = Loader::new(config.fetch_timeout, config.max_fetch_bytes)
            .context("Failed to build HTTP client")?;

        let cleanup =
            server::spawn_cleanup(store.clone(), config.cleanup_interval, config.retention);

        let listener = tokio::net::TcpListener::bind(config.addr())
            .await
            .with_context(|| format!("Failed to bind {}", config.addr()))?;

        let state = AppState::new(config, loader, store);
        let served = server::serve(listener, state).await.context("Server error");
        cleanup.abort();
        served
    })
}

fn run_merge(args: &MergeArgs) -> Result<()> {
    // Validate input files exist
    for path in [&args.model, &args.product] {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {}", path.display());
        }
    }

    let format = output_format(&args.output);

    let model =
        image::load_image(&args.model, Input::Model).context("Failed to load model image")?;
    let product =
        image::load_image(&args.product, Input::Product).context("Failed to load product image")?;

    let target_height = args
        .height
        .unwrap_or_else(|| model.height().max(product.height()));

    tracing::info!(
        "Merging {} + {} at height {target_height} ({})",
        args.model.display(),
        args.product.display(),
        args.layout
    );

    let request = MergeRequest {
        target_height,
        format,
        layout: args.layout,
    };
    let composite = sidemerge::merge(model, product, &request).context("Failed to merge images")?;

    image::save_image(&composite.canvas, &args.output, format)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;

    println!(
        "Merged image saved to {} ({}x{}, {format})",
        args.output.display(),
        composite.width(),
        composite.height()
    );

    Ok(())
}

/// Format for a CLI output path; unknown extensions are written as JPEG.
fn output_format(path: &Path) -> OutputFormat {
    OutputFormat::from_path(path).unwrap_or_else(|| {
        tracing::warn!(
            "Unrecognized output extension for {}, writing JPEG",
            path.display()
        );
        OutputFormat::Jpeg
    })
}
