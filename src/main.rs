//! Heartlight CLI - Command-line tool for extracting the game's asset volume.
//!
//! This is the main entry point for the `heartlight` command-line application.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use heartlight_volume::{ExtractOptions, Extractor, SizePolicy, VolumeArchive};

/// Heartlight - asset volume extraction tool
#[derive(Parser)]
#[command(name = "heartlight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every asset from the volume
    Extract {
        /// Path to the game executable
        #[arg(short, long, env = "HL_INFILE", default_value = "HL.EXE")]
        infile: PathBuf,

        /// Output directory
        #[arg(short, long, env = "HL_OUTDIR", default_value = "extracted")]
        outdir: PathBuf,

        /// Keep uncompressed entries whose stored size differs from the declared size
        #[arg(long)]
        lenient_sizes: bool,

        /// Number of decoding threads (1 disables parallel decoding)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// List the contents of the volume
    List {
        /// Path to the game executable
        #[arg(short, long, env = "HL_INFILE", default_value = "HL.EXE")]
        infile: PathBuf,

        /// Glob pattern, or a plain substring (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes, escape bytes and offsets
        #[arg(short, long)]
        detailed: bool,
    },

    /// Show the volume footer and totals
    Info {
        /// Path to the game executable
        #[arg(short, long, env = "HL_INFILE", default_value = "HL.EXE")]
        infile: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            infile,
            outdir,
            lenient_sizes,
            jobs,
        } => cmd_extract(&infile, &outdir, lenient_sizes, jobs),
        Commands::List {
            infile,
            filter,
            detailed,
        } => cmd_list(&infile, filter.as_deref(), detailed),
        Commands::Info { infile } => cmd_info(&infile),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };

    // RUST_LOG wins when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn open_volume(infile: &Path) -> Result<VolumeArchive> {
    VolumeArchive::open(infile)
        .with_context(|| format!("Failed to open volume: {}", infile.display()))
}

fn cmd_extract(
    infile: &Path,
    outdir: &Path,
    lenient_sizes: bool,
    jobs: Option<usize>,
) -> Result<()> {
    println!("Opening volume: {}", infile.display());

    let start = Instant::now();
    let archive = open_volume(infile)?;

    println!(
        "Found {} file entries in {:?}",
        archive.entry_count(),
        start.elapsed()
    );

    if let Some(n) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
    }

    let size_policy = if lenient_sizes {
        SizePolicy::Lenient
    } else {
        SizePolicy::Strict
    };
    let options = ExtractOptions::default()
        .with_size_policy(size_policy)
        .with_parallel(jobs != Some(1));

    let pb = ProgressBar::new(archive.entry_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let summary = Extractor::new(&archive, outdir)
        .with_options(options)
        .run_with(|_, entry| {
            pb.set_message(entry.name.clone());
            pb.inc(1);
        });

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            pb.abandon();
            return Err(e).with_context(|| format!("Extraction into {} failed", outdir.display()));
        }
    };

    pb.finish_with_message("Done");
    println!(
        "Extracted {} files ({} bytes) to {} in {:?}",
        summary.entries,
        summary.bytes_written,
        outdir.display(),
        start.elapsed()
    );

    Ok(())
}

fn cmd_list(infile: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let archive = open_volume(infile)?;
    let filter = filter.map(NameFilter::new).transpose()?;

    if detailed {
        println!(
            "{:>8} {:>8} {:>4} {:>10}  {}",
            "size", "stored", "esc", "offset", "name"
        );
    }

    let mut count = 0;
    for entry in archive.iter() {
        if let Some(filter) = &filter {
            if !filter.matches(&entry.name) {
                continue;
            }
        }

        if detailed {
            let escape = if entry.is_compressed {
                format!("{:02x}", entry.escape_byte)
            } else {
                "-".to_string()
            };
            println!(
                "{:>8} {:>8} {:>4} {:>#10x}  {}",
                entry.decoded_size,
                entry.stored_size,
                escape,
                archive.absolute_offset(entry),
                entry.name
            );
        } else {
            println!("{}", entry.name);
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_info(infile: &Path) -> Result<()> {
    let archive = open_volume(infile)?;
    let footer = archive.footer();

    let compressed = archive.iter().filter(|e| e.is_compressed).count();
    let stored: u64 = archive.iter().map(|e| u64::from(e.stored_size)).sum();
    let decoded: u64 = archive.iter().map(|e| u64::from(e.decoded_size)).sum();

    println!("Container:       {} ({} bytes)", archive.name(), archive.container_len());
    println!("Entries:         {} ({} compressed)", footer.entry_count, compressed);
    println!("Data base:       {:#x} (delta {:#x})", archive.data_base(), footer.data_base_delta);
    println!("Reserved:        {:#010x}", footer.reserved);
    println!("Stored bytes:    {}", stored);
    println!("Decoded bytes:   {}", decoded);

    Ok(())
}

/// Listing filter for entry names.
///
/// A pattern with glob metacharacters is matched as a glob; anything else
/// matches as a substring, so `list -f snd` finds every sound. Both are
/// case-insensitive.
enum NameFilter {
    Glob(glob::Pattern),
    Substring(String),
}

impl NameFilter {
    fn new(pattern: &str) -> Result<Self> {
        if pattern.contains(|c: char| matches!(c, '*' | '?' | '[')) {
            let glob = glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid filter pattern: {pattern}"))?;
            Ok(Self::Glob(glob))
        } else {
            Ok(Self::Substring(pattern.to_ascii_lowercase()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob(pattern) => pattern.matches_with(
                name,
                glob::MatchOptions {
                    case_sensitive: false,
                    ..glob::MatchOptions::new()
                },
            ),
            Self::Substring(needle) => name.to_ascii_lowercase().contains(needle.as_str()),
        }
    }
}
