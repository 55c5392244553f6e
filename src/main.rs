use clap::{Parser, Subcommand};
use pixel_budget::asset::{SourceAsset, mime_for_extension};
use pixel_budget::compress::Compressor;
use pixel_budget::config::{self, CompressionOptions, PipelineConfig};
use pixel_budget::imaging::{OutputFormat, Quality, RustBackend};
use pixel_budget::output::{self, FileReport};
use pixel_budget::units::mb_to_bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pixel-budget")]
#[command(about = "Shrink photos to fit an upload byte budget")]
#[command(long_about = "\
Shrink photos to fit an upload byte budget

Each input is scaled down to fit the bounding box, encoded as WebP (or JPEG
where WebP is unavailable), and re-encoded at lower quality until it fits the
target size or reaches the quality floor of 0.5.

HEIC/HEIF input is converted to JPEG first when built with the `heic` feature.

Settings come from config.toml in the working directory (or --config), and
command-line flags override them. Run 'pixel-budget gen-config' for a
documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every decode and encode step
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override `[compression]` for one run.
#[derive(clap::Args, Clone)]
struct CompressArgs {
    /// Image files or directories (directories are not descended into)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(long, short, default_value = "compressed")]
    out: PathBuf,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// Starting quality, 0.0-1.0
    #[arg(long)]
    quality: Option<f32>,

    /// Output byte budget in megabytes
    #[arg(long)]
    target_mb: Option<f64>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

impl CompressArgs {
    fn apply(&self, mut options: CompressionOptions) -> CompressionOptions {
        if let Some(w) = self.max_width {
            options.max_width = w;
        }
        if let Some(h) = self.max_height {
            options.max_height = h;
        }
        if let Some(q) = self.quality {
            options.quality = Quality::new(q);
        }
        if let Some(mb) = self.target_mb {
            options.target_size_mb = mb;
        }
        if let Some(format) = self.format {
            options.format = format;
        }
        options
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compress images into the output directory
    Compress(CompressArgs),
    /// Report which output and input formats this build supports
    Probe,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Compress(args) => {
            let config = load_config(cli.config.as_deref())?;
            let failed = run_compress(&args, config).await?;
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Probe => {
            let config = load_config(cli.config.as_deref())?;
            let compressor = Compressor::with_config(Arc::new(RustBackend::new()), config);
            output::print_probe(
                compressor.supports_modern_format().await,
                compressor.supports_heic(),
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

/// Compress every input one at a time. Returns the number of failures.
async fn run_compress(
    args: &CompressArgs,
    config: PipelineConfig,
) -> Result<usize, Box<dyn std::error::Error>> {
    let options = args.apply(config.compression.clone());
    options.validate()?;
    let upload_limit = mb_to_bytes(config.limits.max_upload_mb);

    let inputs = collect_inputs(&args.inputs)?;
    if inputs.is_empty() {
        return Err("no image files found in the given inputs".into());
    }
    std::fs::create_dir_all(&args.out)?;

    let compressor = Compressor::with_config(Arc::new(RustBackend::new()), config);
    let mut reports = Vec::new();
    let mut written = HashSet::new();
    let mut failed = 0;

    for (i, path) in inputs.iter().enumerate() {
        let index = i + 1;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let asset = match SourceAsset::from_path(path) {
            Ok(asset) => asset,
            Err(e) => {
                failed += 1;
                log::debug!("{}: read failed: {}", path.display(), e);
                if args.json {
                    reports.push(FileReport::failure(path, 0, &e));
                } else {
                    output::print_lines(&output::format_read_error(index, &display_name, &e));
                }
                continue;
            }
        };
        let original_bytes = asset.byte_len();
        let source_dims = image::image_dimensions(path).ok();

        match compressor.compress(asset, &options).await {
            Ok(result) => {
                let target = args.out.join(&result.file_name);
                if !written.insert(target.clone()) {
                    log::warn!("{} overwrites an earlier output", target.display());
                }
                std::fs::write(&target, &result.bytes)?;
                if args.json {
                    reports.push(FileReport::success(path, &result, &target, upload_limit));
                } else {
                    output::print_lines(&output::format_result(
                        index,
                        &display_name,
                        source_dims,
                        &result,
                        &target,
                        upload_limit,
                    ));
                }
            }
            Err(e) => {
                failed += 1;
                if args.json {
                    reports.push(FileReport::failure(path, original_bytes, &e));
                } else {
                    output::print_lines(&output::format_error(index, &display_name, &e));
                }
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!();
        println!("{}", output::format_summary(inputs.len() - failed, failed));
    }
    Ok(failed)
}

/// Expand directories (one level) into the image files they contain.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(input).min_depth(1).max_depth(1) {
            let entry = entry?;
            let is_image = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| mime_for_extension(e).is_some());
            if entry.file_type().is_file() && is_image {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}
