use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nview_cache::RamThumbnailCache;
use nview_core::{MetricsSnapshot, NviewConfig, ThumbnailPipeline, ThumbnailRequest};
use nview_render::{probe_dimensions, BlobStore, FileFetcher, ResourceHost};
use nview_scheduler::{compute_zones, ZoneWindow};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "nview")]
#[command(about = "nview comic reader tools")]
pub struct Cli {
    /// Config file; defaults to the platform config dir
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a gallery thumbnail for an image.
    Thumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        quality: Option<u8>,
        /// Write the canonical rendition whatever size was asked for
        #[arg(long)]
        canonical: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the hot and warm zones around an anchor page.
    Zones {
        #[arg(long)]
        anchor: usize,
        #[arg(long)]
        pages: usize,
        #[arg(long)]
        hot: Option<usize>,
        #[arg(long)]
        warm: Option<usize>,
    },
    /// Print the dimensions of an image.
    Probe {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThumbOutput {
    output: String,
    from_cache: bool,
    mime_type: String,
    bytes: usize,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ZonesOutput {
    anchor: usize,
    page_count: usize,
    hot: Option<WindowOutput>,
    warm: Option<WindowOutput>,
    hot_indices: Vec<usize>,
    warm_indices: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct WindowOutput {
    start: usize,
    end: usize,
}

impl From<ZoneWindow> for WindowOutput {
    fn from(window: ZoneWindow) -> Self {
        Self { start: window.start, end: window.end }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeOutput {
    path: String,
    width: u32,
    height: u32,
    mime_type: String,
    bytes: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = NviewConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Thumb { file, width, height, mime, quality, canonical, output } => {
            let request = ThumbnailRequest {
                target_width: width,
                target_height: height,
                mime_type: mime,
                quality,
                prefer_canonical_output: canonical,
                ..ThumbnailRequest::default()
            };
            run_thumb(&config, &file, request, &output)
        }
        Commands::Zones { anchor, pages, hot, warm } => {
            let hot = hot.unwrap_or(config.residency.hot_radius);
            let warm = warm.unwrap_or(config.residency.warm_radius);
            print_json(&zones_output(anchor, pages, hot, warm))
        }
        Commands::Probe { file } => run_probe(&file),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_thumb(config: &NviewConfig, file: &Path, mut request: ThumbnailRequest, output: &Path) -> Result<()> {
    ensure_file_exists(file)?;
    let source = std::path::absolute(file).with_context(|| format!("failed to resolve {}", file.display()))?;
    request.file_path = source.display().to_string();

    let store = Arc::new(BlobStore::new());
    let cache = Arc::new(RamThumbnailCache::with_mb_limit(config.thumbnail.cache_memory_mb));
    let pipeline = ThumbnailPipeline::new(FileFetcher::new(), store.clone()).with_cache(cache);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let thumbnail = runtime
        .block_on(async {
            let thumbnail = pipeline.fetch_thumbnail(request).await;
            pipeline.flush_pending_stores().await;
            thumbnail
        })
        .context("failed to generate thumbnail")?;

    let bytes = store.bytes(&thumbnail.object_url).context("thumbnail resource is missing")?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &bytes).with_context(|| format!("failed to write thumbnail to {}", output.display()))?;
    tracing::debug!(output = %output.display(), bytes = bytes.len(), "thumbnail written");

    let summary = ThumbOutput {
        output: output.display().to_string(),
        from_cache: thumbnail.from_cache,
        mime_type: thumbnail.mime_type,
        bytes: thumbnail.byte_len,
        metrics: pipeline.metrics().snapshot(),
    };
    store.release_resource(thumbnail.object_url);
    print_json(&summary)
}

fn zones_output(anchor: usize, pages: usize, hot: usize, warm: usize) -> ZonesOutput {
    let zones = compute_zones(anchor, pages, hot, warm);
    ZonesOutput {
        anchor,
        page_count: pages,
        hot: zones.hot.map(WindowOutput::from),
        warm: zones.warm.map(WindowOutput::from),
        hot_indices: zones.hot_indices().collect(),
        warm_indices: zones.warm_indices().collect(),
    }
}

fn run_probe(file: &Path) -> Result<()> {
    ensure_file_exists(file)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let Some(metadata) = probe_dimensions(&bytes) else {
        anyhow::bail!("unsupported or corrupt image: {}", file.display());
    };

    print_json(&ProbeOutput {
        path: file.display().to_string(),
        width: metadata.width,
        height: metadata.height,
        mime_type: metadata.mime_type.to_string(),
        bytes: bytes.len(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
