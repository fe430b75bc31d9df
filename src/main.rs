use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use folio::catalog;
use folio::config::{self, GalleryConfig};
use folio::gallery::Gallery;
use folio::layout::{masonry, CachedLayoutComputer, MasonryLayout};
use folio::models::Artwork;
use folio::perf::PerformanceMonitor;
use folio::platform::{ElementId, HeadlessPlatform, Viewport};
use folio::preload::{FsImageSource, PreloadQueueBuilder, PreloadRequest, PreloadSink};
use tracing::{info, trace};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Responsive masonry gallery layout and preload planner")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Where the artwork list comes from.
#[derive(Args, Clone)]
struct SourceArgs {
    /// Catalog JSON (array or `{"success": true, "data": [...]}`)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Number of synthetic artworks when no catalog is given
    #[arg(long, default_value_t = 24)]
    count: usize,

    /// Maximum records read from the catalog
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the layout for a viewport width and print the columns
    Layout {
        #[arg(long, default_value_t = 1200)]
        width: u32,

        #[arg(long)]
        reduced_motion: bool,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Mount a headless gallery, scroll through it and report
    Simulate {
        #[arg(long, default_value_t = 1200)]
        width: u32,

        #[arg(long, default_value_t = 800)]
        height: u32,

        /// Pixels scrolled per step
        #[arg(long, default_value_t = 600.0)]
        scroll_step: f32,

        #[arg(long, default_value_t = 10)]
        steps: usize,

        /// Simulated milliseconds between steps
        #[arg(long, default_value_t = 250)]
        step_ms: u64,

        #[arg(long)]
        reduced_motion: bool,

        /// Serve images from this directory and decode them for real
        #[arg(long)]
        images: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Scan a directory of images into a catalog JSON
    Scan {
        dir: PathBuf,

        /// Output file (defaults to `<dir>/catalog.json`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a config.toml with every option at its default
    GenConfig,
}

/// Accepts every request without loading anything.
struct DryRunSink;

impl PreloadSink for DryRunSink {
    fn submit(&self, request: PreloadRequest) -> bool {
        trace!(url = %request.url, stage = ?request.stage, "Preload (dry run)");
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio=info".parse().context("Invalid log directive")?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Layout {
            width,
            reduced_motion,
            source,
        } => {
            let settings = load_config(cli.config.as_deref())?;
            let artworks = load_artworks(&source)?;
            run_layout(&settings, &artworks, width, reduced_motion);
        }
        Command::Simulate {
            width,
            height,
            scroll_step,
            steps,
            step_ms,
            reduced_motion,
            images,
            source,
        } => {
            let settings = load_config(cli.config.as_deref())?;
            let artworks = load_artworks(&source)?;
            let platform = HeadlessPlatform::new(Viewport::new(width, height));
            platform.set_reduced_motion(reduced_motion);
            let plan = SimulationPlan {
                scroll_step,
                steps,
                step: Duration::from_millis(step_ms),
            };
            run_simulation(&settings, artworks, platform, plan, images.as_deref())?;
        }
        Command::Scan { dir, output } => {
            let artworks = catalog::scan_directory(&dir).await?;
            let output = output.unwrap_or_else(|| catalog::default_catalog_path(&dir));
            catalog::save_catalog(&output, &artworks)?;
            println!("Wrote {} artworks to {}", artworks.len(), output.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<GalleryConfig> {
    GalleryConfig::load_or_default(path).context("Failed to load config")
}

fn load_artworks(source: &SourceArgs) -> Result<Vec<Artwork>> {
    match &source.catalog {
        Some(path) => catalog::load_catalog(path, source.limit)
            .with_context(|| format!("Failed to load catalog: {:?}", path)),
        None => Ok((0..source.count)
            .map(|i| {
                Artwork::new(
                    format!("artwork-{i:03}"),
                    format!("Study {}", i + 1),
                    format!("/images/artwork-{i:03}.jpg"),
                )
            })
            .collect()),
    }
}

fn run_layout(settings: &GalleryConfig, artworks: &[Artwork], width: u32, reduced_motion: bool) {
    let config = settings.responsive().resolve(width, reduced_motion);
    let computer = CachedLayoutComputer::new(MasonryLayout::new(settings.layout.strategy));
    let columns = computer.compute(artworks, &config);
    let balance = masonry::BalanceStats::of(&columns);

    println!(
        "{}px → {} · {} columns · gap {} · stagger {}ms",
        width,
        config.breakpoint,
        config.columns,
        config.gap,
        config.animation_delay.as_millis()
    );
    let variants: Vec<&str> = config.card_variants.iter().map(|v| v.as_str()).collect();
    println!("variants: {}", variants.join(", "));
    for column in &columns {
        let items: Vec<String> = column
            .items
            .iter()
            .map(|card| format!("{}({})", card.artwork_id, card.variant))
            .collect();
        println!(
            "column {} [{:.0}px]: {}",
            column.column_index,
            column.height_px,
            items.join(" ")
        );
    }
    println!(
        "balance: max {:.0} · min {:.0} · avg {:.1} · imbalance {:.3}",
        balance.max_height, balance.min_height, balance.avg_height, balance.imbalance_ratio
    );
}

struct SimulationPlan {
    scroll_step: f32,
    steps: usize,
    step: Duration,
}

fn run_simulation(
    settings: &GalleryConfig,
    artworks: Vec<Artwork>,
    platform: HeadlessPlatform,
    plan: SimulationPlan,
    images: Option<&Path>,
) -> Result<()> {
    let perf = PerformanceMonitor::new();
    let start = Instant::now();

    let queue = match images {
        Some(root) => Some(Arc::new(
            PreloadQueueBuilder::new()
                .workers(settings.preload.workers)
                .max_memory_mb(settings.preload.max_memory_mb)
                .build(Arc::new(FsImageSource::new(root)))
                .context("Failed to start preload queue")?,
        )),
        None => None,
    };
    let sink: Box<dyn PreloadSink> = match &queue {
        Some(queue) => Box::new(Arc::clone(queue)),
        None => Box::new(DryRunSink),
    };

    let mut gallery = Gallery::mount(platform.clone(), sink, artworks, settings, perf.clone(), start);
    let width = gallery.viewport().width as f32;
    for (index, rect) in gallery.card_rects(width).into_iter().enumerate() {
        let element = ElementId(index as u64);
        platform.set_element_rect(element, rect);
        gallery.register_card(element, index);
    }

    let mut now = start;
    let mut update = gallery.pump(now);
    info!(revealed = update.revealed.len(), "Initial render");

    let max_scroll = (gallery.content_height() - gallery.viewport().height as f32).max(0.0);
    for step in 1..=plan.steps {
        now += plan.step;
        let target = (step as f32 * plan.scroll_step).min(max_scroll);
        platform.scroll_to(target);
        gallery.pump(now);
        platform.advance_frame();
        update = gallery.pump(now);
        println!(
            "step {:>2} · scroll {:>6.0} · revealed {:>2} · visible {:>3}/{}",
            step,
            target,
            update.revealed.len(),
            gallery.scheduler().visible_count(),
            gallery.artworks().len()
        );
    }

    if let Some(queue) = &queue {
        for result in queue.wait_idle(Duration::from_secs(30)) {
            perf.record_preload(&result);
        }
        println!(
            "image cache: {} images · {:.1} MiB",
            queue.cache().len(),
            queue.cache().memory_usage() as f64 / (1024.0 * 1024.0)
        );
    }

    let stats = gallery.preload_stats();
    println!(
        "preload: {} critical · {} next batch · {} scroll · {} declined",
        stats.critical, stats.next_batch, stats.scroll, stats.declined
    );
    let balance = gallery.balance();
    println!(
        "layout: {} · {} columns · imbalance {:.3}",
        gallery.breakpoint(),
        gallery.columns().len(),
        balance.imbalance_ratio
    );
    for metric in perf.report() {
        println!(
            "{:<15} n={:<4} avg {:>7.3}ms · p50 {:>7.3}ms · p95 {:>7.3}ms · max {:>7.3}ms",
            metric.name, metric.count, metric.avg_ms, metric.p50_ms, metric.p95_ms, metric.max_ms
        );
    }

    gallery.unmount();
    Ok(())
}
