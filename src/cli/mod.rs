//! # CLI Module
//!
//! Command-line interface for the duplicate image finder.
//!
//! ## Usage
//! ```bash
//! # Scan a directory for duplicates
//! image-dedup scan ~/Pictures
//!
//! # Stricter matching, keep set-aside files out of the scan
//! image-dedup scan ~/Pictures --threshold 5 --trash ~/Pictures/trash --exclude-trash
//!
//! # JSON output
//! image-dedup scan ~/Pictures --output json
//!
//! # Cache maintenance
//! image-dedup cache prune
//! ```
//!
//! The CLI only reports. It never moves or deletes images.

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use duplicate_image_finder::config::{self, FinderConfig, DEFAULT_CONFIG_FILE};
use duplicate_image_finder::core::cache::{
    CacheBackend, InMemoryCache, JsonFileCache, DEFAULT_CACHE_FILE,
};
use duplicate_image_finder::error::{ConfigError, DuplicateFinderError, Result};
use duplicate_image_finder::events::{Event, EventChannel, EventReceiver, Next};
use duplicate_image_finder::{init_tracing, DuplicatePair, DuplicateFinder, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Delay between polls of an empty duplicate stream
const POLL_DELAY: Duration = Duration::from_millis(50);

/// Duplicate Image Finder - find near-duplicate images, delete nothing
#[derive(Parser, Debug)]
#[command(name = "image-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory for near-duplicate images
    Scan(ScanArgs),

    /// Inspect or maintain the hash cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache file path
        #[arg(long, global = true)]
        cache: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Directory to scan (falls back to [paths] image_folder in the config file)
    image_folder: Option<PathBuf>,

    /// Folder duplicates are set aside in
    #[arg(long)]
    trash: Option<PathBuf>,

    /// Skip the trash folder while scanning
    #[arg(long)]
    exclude_trash: bool,

    /// Maximum Hamming distance for a match (lower = stricter, 0-64)
    #[arg(short, long)]
    threshold: Option<u32>,

    /// Initial worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Initial files per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop enumerating after this many images
    #[arg(long)]
    max_images: Option<usize>,

    /// Hash cache file path
    #[arg(long, conflicts_with = "no_cache")]
    cache: Option<PathBuf>,

    /// Do not read or write the hash cache
    #[arg(long)]
    no_cache: bool,

    /// Config file path
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Keep thread count and batch size fixed
    #[arg(long)]
    no_adaptive: bool,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum CacheAction {
    /// Show entry count and location
    Stats,
    /// Drop entries for files that no longer exist
    Prune,
    /// Remove every entry
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (one tab-separated pair per line)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            init_tracing(args.verbose);
            run_scan(args)
        }
        Commands::Cache { action, cache } => {
            init_tracing(false);
            run_cache(action, cache.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE)))
        }
    }
}

fn build_config(args: &ScanArgs) -> Result<FinderConfig> {
    let file = config::load(&args.config)?;

    let image_folder = args
        .image_folder
        .clone()
        .or_else(|| file.paths.image_folder.clone())
        .ok_or(ConfigError::Invalid {
            field: "image_folder",
            reason: format!(
                "pass IMAGE_FOLDER or set [paths] image_folder in {}",
                args.config.display()
            ),
        })?;

    let mut builder = file.apply(FinderConfig::builder(image_folder));
    if let Some(trash) = &args.trash {
        builder = builder.trash_folder(trash);
    }
    if args.exclude_trash {
        builder = builder.exclude_trash(true);
    }
    if let Some(threshold) = args.threshold {
        builder = builder.similarity_threshold(threshold);
    }
    if let Some(threads) = args.threads {
        builder = builder.num_threads(threads);
    }
    if let Some(batch_size) = args.batch_size {
        builder = builder.batch_size(batch_size);
    }
    if let Some(max_images) = args.max_images {
        builder = builder.max_images(max_images);
    }
    if let Some(cache) = &args.cache {
        builder = builder.cache_path(cache);
    }
    if args.no_adaptive {
        builder = builder.adaptive(false);
    }

    Ok(builder.build()?)
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let term = Term::stderr();
    let config = build_config(&args)?;
    let output = args.output;

    if output == OutputFormat::Pretty {
        term.write_line(&format!(
            "{} {}",
            style("Duplicate Image Finder").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line(&format!(
            "  Scanning {} (threshold {})",
            style(display_path(config.image_folder())).bold(),
            config.similarity_threshold()
        ))
        .ok();
        term.write_line("").ok();
    }

    let cache: Arc<dyn CacheBackend> = if args.no_cache {
        Arc::new(InMemoryCache::new())
    } else {
        Arc::new(JsonFileCache::load(config.cache_path()))
    };

    let finder = DuplicateFinder::builder(config).cache(cache).build();
    let (sender, receiver) = EventChannel::new();
    finder.subscribe(Arc::new(sender));
    let stream = finder.duplicates();

    let progress = (output == OutputFormat::Pretty).then(|| {
        let pb = ProgressBar::new(100);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }
        pb
    });

    let handle = finder.start()?;

    // The consumer owns the retry loop: an empty stream means "not yet"
    let mut pairs = Vec::new();
    loop {
        update_progress(&receiver, progress.as_ref(), finder.pending_count());
        match stream.poll() {
            Next::Pair(pair) => {
                match output {
                    OutputFormat::Pretty => {
                        let line = format_pair(&pair);
                        match &progress {
                            Some(pb) => pb.println(line),
                            None => {
                                term.write_line(&line).ok();
                            }
                        }
                    }
                    OutputFormat::Minimal => {
                        println!("{}\t{}", pair.path.display(), pair.representative.display())
                    }
                    OutputFormat::Json => {}
                }
                pairs.push(pair);
            }
            Next::Pending => thread::sleep(POLL_DELAY),
            Next::Finished => break,
        }
    }

    let summary = handle
        .join()
        .map_err(|_| DuplicateFinderError::WorkerPanicked)??;
    update_progress(&receiver, progress.as_ref(), 0);
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match output {
        OutputFormat::Pretty => print_pretty_summary(&term, &summary),
        OutputFormat::Json => print_json_results(&summary, &pairs),
        OutputFormat::Minimal => {}
    }

    Ok(())
}

/// Apply queued progress events to the bar
fn update_progress(receiver: &EventReceiver, progress: Option<&ProgressBar>, pending: usize) {
    while let Some(event) = receiver.try_recv() {
        let Some(pb) = progress else { continue };
        match event {
            Event::Progress { percent } => pb.set_position(percent.round() as u64),
            Event::ProcessingComplete { .. } => pb.set_position(100),
            Event::DuplicateFound(_) => {}
        }
    }
    if let Some(pb) = progress {
        if pending > 0 {
            pb.set_message(format!("{} pairs queued", pending));
        } else {
            pb.set_message("");
        }
    }
}

fn format_pair(pair: &DuplicatePair) -> String {
    format!(
        "  {} {}\n    {} {} {}",
        style("○").dim(),
        display_path(&pair.path),
        style("≈").yellow(),
        display_path(&pair.representative),
        style(format!("({}, distance {})", pair.match_type, pair.distance)).dim()
    )
}

fn print_pretty_summary(term: &Term, summary: &RunSummary) {
    term.write_line("").ok();
    if summary.cancelled {
        term.write_line(&format!("{} Scan Stopped", style("■").yellow().bold()))
            .ok();
    } else {
        term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
            .ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} images processed in {:.1}s",
        style(summary.processed).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicates of {} distinct images",
        style(summary.duplicates).cyan(),
        style(summary.representatives).cyan()
    ))
    .ok();

    if summary.cache_hits > 0 {
        term.write_line(&format!("  {} cache hits", style(summary.cache_hits).dim()))
            .ok();
    }
    if summary.failures > 0 {
        term.write_line(&format!(
            "  {} images could not be read (run with --verbose for details)",
            style(summary.failures).red()
        ))
        .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style("Remember: No files were moved or deleted. Review carefully before taking action.")
            .dim()
    ))
    .ok();
}

fn print_json_results(summary: &RunSummary, pairs: &[DuplicatePair]) {
    let output = serde_json::json!({
        "summary": summary,
        "duplicates": pairs,
    });

    // Alternate formatting pretty-prints
    println!("{:#}", output);
}

fn run_cache(action: CacheAction, path: PathBuf) -> Result<()> {
    let term = Term::stdout();

    match action {
        CacheAction::Stats => {
            let cache = JsonFileCache::open(&path)?;
            let stats = cache.stats();
            term.write_line(&format!(
                "{} {}",
                style("Cache:").bold(),
                display_path(cache.path())
            ))
            .ok();
            term.write_line(&format!("  {} entries", style(stats.total_entries).cyan()))
                .ok();
        }
        CacheAction::Prune => {
            let cache = JsonFileCache::load(&path);
            let removed = cache.prune_orphans();
            cache.flush()?;
            term.write_line(&format!(
                "Removed {} stale entries, {} remain",
                style(removed).cyan(),
                cache.stats().total_entries
            ))
            .ok();
        }
        CacheAction::Clear => {
            let cache = JsonFileCache::load(&path);
            let before = cache.stats().total_entries;
            cache.clear();
            cache.flush()?;
            term.write_line(&format!("Cleared {} entries", style(before).cyan()))
                .ok();
        }
    }

    Ok(())
}

/// Shorten paths under the home directory to `~/...`
fn display_path(path: &Path) -> String {
    dirs::home_dir()
        .and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf))
        .map(|relative| format!("~/{}", relative.display()))
        .unwrap_or_else(|| path.display().to_string())
}
