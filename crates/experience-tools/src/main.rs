//! Maintenance CLI for experience files.
//!
//! Offline counterparts of the engine's experience commands: canonical
//! rewrite, n-way merge, signature-only bootstrap, and file statistics.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use experience_core::codec::open_and_detect;
use experience_core::{defrag, merge, touch_file, ExperienceStore, InfoSink, WriteGates};

#[derive(Parser, Debug)]
#[command(name = "exp-tool")]
#[command(about = "Inspect and maintain chess engine experience files")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite a file in canonical form (one record per position/move)
    Defrag {
        file: PathBuf,
    },

    /// Union several experience files into a target
    Merge {
        target: PathBuf,
        /// Source files merged into the target
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Create an empty experience file carrying only the signature
    Touch {
        file: PathBuf,
    },

    /// Report format version and entry statistics
    Stat {
        file: PathBuf,

        /// Load the whole file and count positions and duplicates
        #[arg(long)]
        full: bool,

        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Routes the library's `info string` diagnostics through the logger.
struct LogSink;

impl InfoSink for LogSink {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level),
    );

    match cli.command {
        Command::Defrag { file } => {
            let path = path_str(&file)?;
            if !defrag(path, Arc::new(LogSink)) {
                bail!("defragmentation of {} failed", file.display());
            }
        }

        Command::Merge { target, sources } => {
            let target = path_str(&target)?.to_string();
            let sources: Vec<String> = sources
                .iter()
                .map(|p| path_str(p).map(str::to_string))
                .collect::<Result<_>>()?;
            merge(&target, &sources, Arc::new(LogSink));
        }

        Command::Touch { file } => {
            let path = path_str(&file)?;
            touch_file(path).with_context(|| format!("cannot touch {}", file.display()))?;
        }

        Command::Stat { file, full, json } => {
            stat(&file, full, json)?;
        }
    }

    Ok(())
}

fn stat(file: &Path, full: bool, json: bool) -> Result<()> {
    let path = path_str(file)?;

    let (_, reader) = open_and_detect(path).map_err(|e| anyhow::anyhow!("{e}"))?;
    let len = std::fs::metadata(file)?.len();

    let version = reader.version();
    let entries = reader.entries_count();

    let mut positions = None;
    let mut unique_entries = None;

    if full {
        let mut store = ExperienceStore::with_parts(Arc::new(WriteGates::new()), Arc::new(LogSink));
        if !store.load(path, true) {
            bail!("could not load {}", file.display());
        }
        positions = Some(store.positions());
        unique_entries = Some(store.total_entries());
    }

    if json {
        let mut doc = serde_json::json!({
            "file": path,
            "version": version,
            "size_bytes": len,
            "entries": entries,
        });
        if let (Some(p), Some(u)) = (positions, unique_entries) {
            let duplicates = entries - u;
            doc["positions"] = p.into();
            doc["unique_entries"] = u.into();
            doc["duplicate_entries"] = duplicates.into();
            doc["fragmentation_percent"] = if entries > 0 {
                (100.0 * duplicates as f64 / entries as f64).into()
            } else {
                0.0.into()
            };
        }
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("file     : {path}");
        println!("version  : {version}");
        println!("size     : {len} bytes");
        println!("entries  : {entries}");
        if let (Some(p), Some(u)) = (positions, unique_entries) {
            let duplicates = entries - u;
            println!("positions: {p}");
            println!("unique   : {u}");
            println!("dupes    : {duplicates}");
            if entries > 0 {
                println!(
                    "fragmentation: {:.2}%",
                    100.0 * duplicates as f64 / entries as f64
                );
            }
        }
    }

    Ok(())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("path is not valid UTF-8: {}", path.display()))
}
