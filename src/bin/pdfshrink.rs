//! CLI binary for pdfshrink.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `CompressionConfig`, writes the result and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfshrink::pipeline::input::{default_output_path, read_pdf, write_atomic};
use pdfshrink::{
    compress, format_size, inspect, CancellationFlag, CompressionConfig,
    CompressionProgressCallback, CompressionStatus, Preset, ProgressCallback, KIB,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while a build runs and one log line
/// per finished trial.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CompressionProgressCallback for CliProgressCallback {
    fn on_compression_start(&self, page_count: usize, target_bytes: Option<u64>) {
        let goal = match target_bytes {
            Some(t) => format!("target {}", format_size(t)),
            None => "fixed quality".to_string(),
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Compressing {page_count} pages ({goal})…"))
        ));
        self.bar.set_prefix("Searching");
    }

    fn on_trial_start(&self, trial: usize, quality: u8) {
        self.bar
            .set_message(format!("trial {trial}: building at quality {quality}"));
    }

    fn on_trial_complete(&self, trial: usize, quality: u8, size_bytes: u64, within_budget: bool) {
        self.bar.println(format!(
            "  {} Trial {:>2}  q={:<3} {}",
            if within_budget { green("✓") } else { red("✗") },
            trial,
            quality,
            dim(&format!("{:>9}", format_size(size_bytes))),
        ));
    }

    fn on_compression_complete(&self, status: CompressionStatus, quality: u8, size_bytes: u64) {
        self.bar.finish_and_clear();
        match status {
            CompressionStatus::BudgetUnreachable => eprintln!(
                "{} budget not reachable: smallest output is {} at quality {}",
                yellow("⚠"),
                bold(&format_size(size_bytes)),
                quality
            ),
            _ => eprintln!(
                "{} {} at quality {}",
                green("✔"),
                bold(&format_size(size_bytes)),
                quality
            ),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fit a scan under 100 KB (writes compressed_100kb_scan.pdf)
  pdfshrink scan.pdf

  # 200 KB preset, explicit output
  pdfshrink --preset 200kb form.pdf -o form-small.pdf

  # Any budget: 150k, 300KB, 1.5MB or plain bytes
  pdfshrink --target 1.5MB thesis.pdf

  # One quick pass at fixed quality, no size target
  pdfshrink --preset quick photo-album.pdf

  # Sharper pages, fewer of them fit: render at 1.5× and search 20–90
  pdfshrink --scale 1.5 --min-quality 20 --max-quality 90 id-card.pdf

  # Page count and sizes only
  pdfshrink --inspect-only scan.pdf

  # Machine-readable result
  pdfshrink --json scan.pdf > result.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH     Directory containing libpdfium
  PDFSHRINK_*         Every flag can be set as PDFSHRINK_<FLAG>
  RUST_LOG            Override log filtering (e.g. pdfshrink=debug)

NOTES:
  Every page is rasterised and re-encoded as JPEG, so text in the output is
  no longer selectable. When even the lowest quality exceeds the target, the
  smallest document found is still written and a warning is printed.
"#;

/// Recompress PDFs to fit a size limit.
#[derive(Parser, Debug)]
#[command(
    name = "pdfshrink",
    version,
    about = "Recompress PDF files to fit a target size",
    long_about = "Rasterise every page of a PDF, re-encode it as JPEG and search the JPEG \
quality for the best-looking document that still fits a byte budget (100 KB by default).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the PDF here instead of compressed_<label>_<name>.pdf next to the input.
    #[arg(short, long, env = "PDFSHRINK_OUTPUT")]
    output: Option<PathBuf>,

    /// Size budget: 100k, 200KB, 1.5MB or plain bytes. Overrides the preset's target.
    #[arg(short, long, env = "PDFSHRINK_TARGET", value_parser = parse_size,
          conflicts_with = "quality")]
    target: Option<u64>,

    /// Named profile: 100kb, 200kb or quick.
    #[arg(long, env = "PDFSHRINK_PRESET", value_enum, default_value = "100kb")]
    preset: PresetArg,

    /// Skip the search and encode every page at this JPEG quality (1–100).
    #[arg(long, env = "PDFSHRINK_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Render scale relative to the native page size (0.1–8.0).
    #[arg(long, env = "PDFSHRINK_SCALE")]
    scale: Option<f32>,

    /// Lowest JPEG quality the search may use.
    #[arg(long, env = "PDFSHRINK_MIN_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    min_quality: Option<u8>,

    /// Highest JPEG quality the search may use.
    #[arg(long, env = "PDFSHRINK_MAX_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    max_quality: Option<u8>,

    /// Stop refining once the quality bracket is this narrow.
    #[arg(long, env = "PDFSHRINK_WINDOW",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    window: Option<u8>,

    /// Pages rendered and encoded in parallel.
    #[arg(short, long, env = "PDFSHRINK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Re-render pages on every trial instead of caching them (lower memory).
    #[arg(long, env = "PDFSHRINK_NO_CACHE")]
    no_cache: bool,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "PDFSHRINK_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// Refuse inputs larger than this, e.g. 50MB or 20m.
    #[arg(long, env = "PDFSHRINK_MAX_INPUT", value_parser = parse_size,
          default_value = "50MB")]
    max_input: u64,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the result as JSON on stdout (the PDF is still written).
    #[arg(long, env = "PDFSHRINK_JSON")]
    json: bool,

    /// Print page count and sizes only, no compression.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress output.
    #[arg(long, env = "PDFSHRINK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSHRINK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSHRINK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    #[value(name = "100kb")]
    Kb100,
    #[value(name = "200kb")]
    Kb200,
    Quick,
}

impl From<PresetArg> for Preset {
    fn from(v: PresetArg) -> Self {
        match v {
            PresetArg::Kb100 => Preset::Budget100Kb,
            PresetArg::Kb200 => Preset::Budget200Kb,
            PresetArg::Quick => Preset::Quick,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress output replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let bytes = read_pdf(&cli.input, cli.max_input)
        .await
        .with_context(|| format!("Cannot read {}", cli.input.display()))?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None, CancellationFlag::new())?;
        let meta = inspect(bytes, &config.renderer)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(src) = meta.source_bytes {
                println!("Size:         {}", format_size(src));
            }
            println!("Pages:        {}", meta.page_count);
            println!("Orientation:  {:?}", meta.orientation);
            if meta.mixed_orientation {
                println!("              (mixed: later pages will be reframed)");
            }
            for (i, size) in meta.page_sizes.iter().enumerate() {
                println!(
                    "  page {:>3}   {:.0} × {:.0} pt",
                    i + 1,
                    size.width,
                    size.height
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CompressionProgressCallback>)
    } else {
        None
    };

    let cancellation = CancellationFlag::new();
    {
        let flag = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.cancel();
            }
        });
    }

    let config = build_config(&cli, progress_cb, cancellation)?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, output_label(&cli).as_deref()));

    // ── Run compression ──────────────────────────────────────────────────
    let output = compress(bytes, &config)
        .await
        .context("Compression failed")?;

    write_atomic(&output_path, &output.artifact)
        .await
        .context("Failed to save compressed PDF")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.stats;
        let reduction = if stats.source_bytes.is_some() {
            format!("  ({:.1}% smaller)", stats.reduction_percent())
        } else {
            String::new()
        };
        eprintln!(
            "{}  {} → {}{}  {} builds  {}ms",
            if output.status == CompressionStatus::BudgetUnreachable {
                yellow("⚠")
            } else {
                green("✔")
            },
            stats
                .source_bytes
                .map(format_size)
                .unwrap_or_else(|| "?".to_string()),
            bold(&format_size(output.size_bytes)),
            reduction,
            stats.trials.len(),
            stats.total_duration_ms,
        );
        eprintln!("   {}", dim(&output_path.display().to_string()));
        if output.status == CompressionStatus::BudgetUnreachable {
            eprintln!("   {}", yellow(&output.summary()));
        } else if stats.is_marginal() {
            eprintln!(
                "   {}",
                dim("This PDF was already optimised; minimal reduction achieved.")
            );
        }
    }

    Ok(())
}

/// Map CLI args to `CompressionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancellation: CancellationFlag,
) -> Result<CompressionConfig> {
    let mut builder = CompressionConfig::from_preset(cli.preset.into())
        .concurrency(cli.concurrency)
        .cache_renders(!cli.no_cache)
        .max_rendered_pixels(cli.max_pixels)
        .max_input_bytes(cli.max_input)
        .cancellation(cancellation);

    if let Some(target) = cli.target {
        builder = builder.target_bytes(target);
    }
    if let Some(quality) = cli.quality {
        builder = builder.fixed_quality(quality);
    }
    if let Some(scale) = cli.scale {
        builder = builder.scale(scale);
    }
    if cli.min_quality.is_some() || cli.max_quality.is_some() {
        builder = builder.quality_bounds(cli.min_quality.unwrap_or(5), cli.max_quality.unwrap_or(95));
    }
    if let Some(window) = cli.window {
        builder = builder.convergence_window(window);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// File-name label for the default output path.
fn output_label(cli: &Cli) -> Option<String> {
    if cli.quality.is_some() {
        return None;
    }
    match cli.target {
        Some(t) if t % KIB == 0 => Some(format!("{}kb", t / KIB)),
        Some(t) => Some(format!("{t}b")),
        None => Preset::from(cli.preset).file_label().map(str::to_string),
    }
}

/// Parse `--target`: `100k`, `100kb`, `1.5MB`, `2m` or plain bytes (1 KB = 1024 B).
fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().to_lowercase();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("Invalid size '{s}': expected e.g. 100k, 1.5MB or 204800"))?;
    let multiplier = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KIB,
        "m" | "mb" | "mib" => KIB * KIB,
        other => return Err(format!("Unknown size unit '{other}' (use b, kb or mb)")),
    };
    let bytes = (number * multiplier as f64).round();
    if !(bytes >= 1.0 && bytes.is_finite()) {
        return Err(format!("Size must be at least 1 byte, got '{s}'"));
    }
    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("100k"), Ok(100 * 1024));
        assert_eq!(parse_size("200KB"), Ok(200 * 1024));
        assert_eq!(parse_size("1.5MB"), Ok(1_572_864));
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size(" 2 m "), Ok(2 * 1024 * 1024));
        assert!(parse_size("0").is_err());
        assert!(parse_size("ten kb").is_err());
        assert!(parse_size("5gb").is_err());
    }

    #[test]
    fn label_follows_target_or_preset() {
        let cli = Cli::parse_from(["pdfshrink", "a.pdf"]);
        assert_eq!(output_label(&cli).as_deref(), Some("100kb"));

        let cli = Cli::parse_from(["pdfshrink", "a.pdf", "--target", "150k"]);
        assert_eq!(output_label(&cli).as_deref(), Some("150kb"));

        let cli = Cli::parse_from(["pdfshrink", "a.pdf", "--preset", "quick"]);
        assert_eq!(output_label(&cli), None);
    }

    #[test]
    fn cli_flags_reach_the_config() {
        let cli = Cli::parse_from([
            "pdfshrink",
            "a.pdf",
            "--target",
            "300kb",
            "--scale",
            "1.5",
            "--min-quality",
            "20",
            "--window",
            "3",
        ]);
        let config = build_config(&cli, None, CancellationFlag::new()).unwrap();
        assert_eq!(config.target_bytes(), Some(300 * 1024));
        assert_eq!(config.scale, 1.5);
        assert_eq!(config.quality_bounds.min, 20);
        assert_eq!(config.quality_bounds.max, 95);
        assert_eq!(config.convergence_window, 3);
        assert_eq!(config.max_input_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn max_input_flag_sets_the_size_limit() {
        let cli = Cli::parse_from(["pdfshrink", "a.pdf", "--max-input", "20mb"]);
        assert_eq!(cli.max_input, 20 * 1024 * 1024);
        let config = build_config(&cli, None, CancellationFlag::new()).unwrap();
        assert_eq!(config.max_input_bytes, 20 * 1024 * 1024);
    }
}
