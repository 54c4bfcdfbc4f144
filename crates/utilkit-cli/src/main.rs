//! Command-line interface for utilkit

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::DynamicImage;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use utilkit_core::config::ImageFormat;
use utilkit_core::utils::{file, performance, system};
use utilkit_core::watermark::{self, mark_text};
use utilkit_core::{
    init, thumb_crop_image, thumb_image, version, AppConfig, Color, ConfigManager, Logger, LoggerOptions, PhaseParam,
    ProgressBar, RotateConfig, Tee, TextMark, Units, WatermarkPosition, Watermarker,
};

#[derive(Parser)]
#[command(name = "utilkit")]
#[command(about = "Progress, logging and image watermark utilities")]
#[command(version = version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a two-phase job pool and render its progress
    ProgressDemo {
        /// Number of items to process
        #[arg(short, long, visible_alias = "items", default_value_t = 20)]
        total: u64,

        /// Parallel workers per phase
        #[arg(short, long)]
        workers: Option<usize>,

        /// File copied in the second phase; generated data when absent
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Size of the generated data in bytes
        #[arg(long, default_value_t = 1024 * 1024)]
        size: usize,

        /// Pause between ticks of the first phase, in milliseconds
        #[arg(long, default_value_t = 20)]
        delay_ms: u64,
    },

    /// Write sample plain, tee and rotating JSON logs
    LogDemo {
        /// Directory the log files are written to
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Add an image or text watermark
    Watermark {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,

        /// Watermark image
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        image: Option<PathBuf>,

        /// Watermark image scale factor
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Watermark text
        #[arg(long)]
        text: Option<String>,

        /// Font used for text watermarks
        #[arg(long)]
        font: Option<PathBuf>,

        /// Glyph height in pixels
        #[arg(long)]
        size: Option<f32>,

        /// Text color as RRGGBB or RRGGBBAA
        #[arg(long, default_value = "ffffffff")]
        color: String,

        /// Watermark position (upper-left, center, bottom-right, ...)
        #[arg(short, long)]
        position: Option<WatermarkPosition>,

        /// Horizontal distance from the anchored edge
        #[arg(long, default_value_t = 0)]
        hpad: u32,

        /// Vertical distance from the anchored edge
        #[arg(long, default_value_t = 0)]
        vpad: u32,

        /// Quality setting for lossy output (1-100)
        #[arg(short, long)]
        quality: Option<u8>,
    },

    /// Create a thumbnail
    Thumbnail {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,

        /// Thumbnail width
        #[arg(short, long)]
        width: u32,

        /// Crop to this height instead of keeping the aspect ratio
        #[arg(long)]
        height: Option<u32>,

        /// Quality setting for lossy output (1-100)
        #[arg(short, long)]
        quality: Option<u8>,
    },

    /// Show system information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.config().clone();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    let _guard = init(&config)?;
    info!("Utilkit CLI v{} starting", version());

    match cli.command {
        Commands::ProgressDemo {
            total,
            workers,
            file,
            size,
            delay_ms,
        } => {
            let workers = workers.unwrap_or_else(system::optimal_worker_count);
            progress_demo(&config, total, workers, file, size, Duration::from_millis(delay_ms)).await?;
        }

        Commands::LogDemo { dir } => log_demo(&dir)?,

        Commands::Watermark {
            input,
            output,
            image,
            scale,
            text,
            font,
            size,
            color,
            position,
            hpad,
            vpad,
            quality,
        } => {
            let position = position.unwrap_or(config.image.default_position);
            let quality = quality.unwrap_or(config.image.quality);
            let bg = open_image(&input)?;

            let marked = match (image, text) {
                (Some(mark_path), _) => {
                    let watermarker = Watermarker::new(open_image(&mark_path)?)
                        .with_placement(position, scale, hpad, vpad)?
                        .with_quality(quality)?;
                    watermarker.mark(&bg)?
                }
                (None, Some(text)) => {
                    let font_path = font
                        .or_else(|| config.image.font_path.clone())
                        .context("text watermarks need --font or image.font_path in the config")?;
                    let mut mark = TextMark::new(
                        watermark::load_font(&font_path)?,
                        size.unwrap_or(config.image.font_size),
                    );
                    mark.color = Color::from_hex(&color)?;
                    mark.position = position;
                    mark.h_padding = hpad;
                    mark.v_padding = vpad;
                    mark_text(&bg, &text, &mark)?
                }
                (None, None) => bail!("either --image or --text is required"),
            };

            save_image(&DynamicImage::ImageRgba8(marked), &output, quality)?;
            println!("Watermarked {} -> {}", input.display(), output.display());
        }

        Commands::Thumbnail {
            input,
            output,
            width,
            height,
            quality,
        } => {
            let img = open_image(&input)?;
            let thumb = match height {
                Some(height) => thumb_crop_image(&img, width, height)?,
                None => thumb_image(&img, width)?,
            };

            save_image(&thumb, &output, quality.unwrap_or(config.image.quality))?;
            println!(
                "Thumbnail {}x{} written to {}",
                thumb.width(),
                thumb.height(),
                output.display()
            );
        }

        Commands::Info => {
            println!("Utilkit v{}", version());
            println!("Progress, logging and image watermark utilities");
            println!("\nSystem Information:");
            println!("  CPU cores: {}", system::cpu_count());
            println!("  Default workers: {}", system::optimal_worker_count());
            println!("  Platform: {}", std::env::consts::OS);
            println!("  Architecture: {}", std::env::consts::ARCH);
            println!("\nConfiguration:");
            println!("  File: {}", manager.config_path().display());
            println!("  Log level: {}", config.logging.level);
            println!("  Image quality: {}", config.image.quality);
        }
    }

    Ok(())
}

/// Scan every item, then copy a payload through a byte-counting tracker
async fn progress_demo(
    config: &AppConfig,
    total: u64,
    workers: usize,
    source: Option<PathBuf>,
    size: usize,
    delay: Duration,
) -> Result<()> {
    let payload: Arc<Vec<u8>> = Arc::new(match &source {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => (0..size).map(|i| (i % 251) as u8).collect(),
    });

    let bar = Arc::new(ProgressBar::with_config(
        total,
        vec![
            PhaseParam::new("Scanning", workers, Units::Count),
            PhaseParam::new("Copying", workers, Units::Bytes),
        ],
        &config.progress,
    )?);
    let next = Arc::new(AtomicU64::new(0));
    let timer = performance::Timer::new("progress-demo");

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let bar = Arc::clone(&bar);
        let next = Arc::clone(&next);
        let payload = Arc::clone(&payload);
        handles.push(tokio::spawn(async move {
            loop {
                let item = next.fetch_add(1, Ordering::SeqCst);
                if item >= total {
                    return Ok::<_, anyhow::Error>(());
                }
                process_item(&bar, item, &payload, delay).await?;
            }
        }));
    }

    for handle in handles {
        handle.await??;
    }

    bar.stop();
    let summary = bar.summary();
    let throughput = performance::calculate_throughput(payload.len() as u64 * total, timer.elapsed());
    for line in summary.lines() {
        println!("{}", line);
    }
    println!(">> Throughput: {:.2} MiB/s", throughput);
    Ok(())
}

async fn process_item(bar: &ProgressBar, item: u64, payload: &Arc<Vec<u8>>, delay: Duration) -> Result<()> {
    const STEPS: u64 = 10;

    let scan = bar.create_tracker(0, &format!("item #{}", item), STEPS).await?;
    for _ in 0..STEPS {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        scan.increment(1);
    }
    bar.mark_as_done(scan)?;

    let copy = bar
        .create_tracker(1, &format!("item #{}", item), payload.len() as u64)
        .await?;
    let payload = Arc::clone(payload);
    let copy = tokio::task::spawn_blocking(move || -> Result<_> {
        let path = file::get_temp_path("bin");
        {
            let mut out = copy.wrap_write(File::create(&path)?);
            io::copy(&mut payload.as_slice(), &mut out)?;
        }
        std::fs::remove_file(&path)?;
        Ok(copy)
    })
    .await??;
    bar.mark_as_done(copy)?;

    debug!(item, "item processed");
    Ok(())
}

/// Plain, tee and rotating loggers writing into `dir`
fn log_demo(dir: &Path) -> Result<()> {
    file::ensure_directory_exists(dir)?;
    let options = LoggerOptions::default().with_caller();

    let plain = Logger::new(File::create(dir.join("plain.log"))?, Level::INFO, options);
    plain.debug("filtered out below info");
    plain.info("plain logger ready");
    plain.warn("plain logger warning");
    plain.sync();

    let tee = Logger::tee(
        vec![
            Tee::new(File::create(dir.join("access.log"))?, |level| *level == Level::INFO),
            Tee::at_least(File::create(dir.join("error.log"))?, Level::WARN),
        ],
        options.with_stacktrace(Level::ERROR),
    );
    tee.info("request served");
    tee.warn("slow request");
    tee.error("request failed");
    tee.sync();

    let mut rotate = RotateConfig::new(dir, "rotating");
    rotate.max_files = Some(3);
    let rotating = Logger::with_rotation(&rotate, Level::INFO, options)?;
    rotating.in_scope(|| {
        for i in 0..5 {
            tracing::info!(entry = i, "rotating logger entry");
        }
    });
    rotating.sync();

    println!("Logs written to {}", dir.display());
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        println!("  {}", path.display());
    }
    Ok(())
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    image::load_from_memory(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
}

fn save_image(img: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let format = ImageFormat::from_path(path)?;
    let encoded = watermark::encode(img, format, quality)?;
    file::ensure_parent_exists(path)?;
    std::fs::write(path, &encoded).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = encoded.len(), format = format.extension(), "image saved");
    Ok(())
}
