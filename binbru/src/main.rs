//! Bru command-line tool for parsing, formatting, checking, and transcoding
//! Bru collection files.
//!
//! Usage: bru [--config FILE] <COMMAND>
//!
//! Commands:
//!   parse FILE [--kind K] [--to json|yaml|cbor] [-o FILE]
//!                          Print the parsed document
//!   fmt FILE [--kind K] [-w]
//!                          Print (or write back) the canonical text
//!   check PATH [--kind K] [--collection DIR]
//!                          Parse every .bru file under PATH, using the
//!                          parsed-file cache (exit 1 if any file fails)
//!   cache stats|clear      Inspect or empty the parsed-file cache
//!
//! The document kind is inferred from the file name when `--kind` is absent:
//! `collection.bru`, `folder.bru`, anything in an `environments` directory,
//! and requests otherwise.

use clap::{Args, Parser, Subcommand};
use libbru::cache::{spawn_cache_service, CacheEntry, CacheStore, ParsedFileCache};
use libbru::{DocumentKind, Engine, EngineConfig};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod transcode;

use transcode::Format;

#[derive(Parser)]
#[command(name = "bru", version, about = "Parse, format and check Bru collection files")]
struct Cli {
    /// TOML file layered over the built-in settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a file and print the document
    Parse(ParseArgs),

    /// Rewrite a file in canonical form
    Fmt(FmtArgs),

    /// Parse every .bru file under a path
    Check(CheckArgs),

    /// Inspect or empty the parsed-file cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
struct ParseArgs {
    file: PathBuf,

    /// Document kind (request, folder, collection, environment)
    #[arg(short, long, value_parser = parse_kind)]
    kind: Option<DocumentKind>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    to: Format,

    /// Write output to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct FmtArgs {
    file: PathBuf,

    #[arg(short, long, value_parser = parse_kind)]
    kind: Option<DocumentKind>,

    /// Write the result back to the file
    #[arg(short, long)]
    write: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// A .bru file or a directory to search recursively
    path: PathBuf,

    /// Parse every file as this kind instead of inferring it
    #[arg(short, long, value_parser = parse_kind)]
    kind: Option<DocumentKind>,

    /// Collection root used for cache keys [default: PATH, or its directory]
    #[arg(long, value_name = "DIR")]
    collection: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print entry counts
    Stats,
    /// Remove every entry
    Clear,
}

fn parse_kind(s: &str) -> Result<DocumentKind, String> {
    s.parse()
}

/// Kind of a file from its name and location.
fn infer_kind(path: &Path) -> DocumentKind {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let in_environments = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "environments");
    match name {
        "collection.bru" => DocumentKind::Collection,
        "folder.bru" => DocumentKind::Folder,
        _ if in_environments => DocumentKind::Environment,
        _ => DocumentKind::Request,
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path),
        None => EngineConfig::load_defaults(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Command::Parse(args) => run_parse(&config, args).await,
        Command::Fmt(args) => run_fmt(&config, args).await,
        Command::Check(args) => run_check(&config, args).await,
        Command::Cache { action } => run_cache(&config, action).await,
    };
    process::exit(exit_code);
}

fn read_file(path: &Path) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        1
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

async fn run_parse(config: &EngineConfig, args: ParseArgs) -> i32 {
    let text = match read_file(&args.file) {
        Ok(text) => text,
        Err(code) => return code,
    };
    let kind = args.kind.unwrap_or_else(|| infer_kind(&args.file));
    let engine = Engine::new(config);

    let document = match engine
        .parse_named(&text, kind, Some(&display_name(&args.file)))
        .await
    {
        Ok(document) => document,
        Err(e) => {
            eprintln!("{}: {}", args.file.display(), e);
            return 1;
        }
    };

    let bytes = match transcode::encode(&document, args.to) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let written = match &args.output {
        Some(path) => fs::write(path, &bytes).map_err(|e| (path.display().to_string(), e)),
        None => io::stdout()
            .write_all(&bytes)
            .map_err(|e| ("stdout".to_string(), e)),
    };
    match written {
        Ok(()) => 0,
        Err((target, e)) => {
            eprintln!("Error writing {} output to {}: {}", args.to.extension(), target, e);
            1
        }
    }
}

async fn run_fmt(config: &EngineConfig, args: FmtArgs) -> i32 {
    let text = match read_file(&args.file) {
        Ok(text) => text,
        Err(code) => return code,
    };
    let kind = args.kind.unwrap_or_else(|| infer_kind(&args.file));
    let engine = Engine::new(config);

    let formatted = match engine
        .parse_named(&text, kind, Some(&display_name(&args.file)))
        .await
    {
        Ok(document) => engine.stringify(&document).await,
        Err(e) => Err(e),
    };
    let formatted = match formatted {
        Ok(formatted) => formatted,
        Err(e) => {
            eprintln!("{}: {}", args.file.display(), e);
            return 1;
        }
    };

    if !args.write {
        print!("{}", formatted);
        return 0;
    }
    if formatted == text {
        debug!(file = %args.file.display(), "already canonical");
        return 0;
    }
    match fs::write(&args.file, formatted) {
        Ok(()) => {
            println!("{}: formatted", args.file.display());
            0
        }
        Err(e) => {
            eprintln!("Error writing {}: {}", args.file.display(), e);
            1
        }
    }
}

/// Start the cache service for the configured store.
///
/// Without a configured path the cache lives in memory for this run. A store
/// that cannot be opened leaves the cache disconnected.
fn start_cache(config: &EngineConfig) -> (ParsedFileCache, Option<JoinHandle<()>>) {
    let store = match &config.cache.path {
        Some(path) => match CacheStore::open(path, config.cache.max_age()) {
            Ok(store) => store,
            Err(e) => {
                warn!(%e, "parsed-file cache unavailable");
                return (ParsedFileCache::disconnected(), None);
            }
        },
        None => CacheStore::in_memory(),
    };
    let (cache, handle) = spawn_cache_service(
        store,
        config.cache.timeout(),
        config.cache.flush_interval(),
    );
    (cache, Some(handle))
}

/// Drop the cache handle and wait for the store to be written.
async fn stop_cache(cache: ParsedFileCache, handle: Option<JoinHandle<()>>) {
    drop(cache);
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            warn!(%e, "cache service did not shut down cleanly");
        }
    }
}

/// Every `.bru` file under `path`, sorted.
fn collect_bru_files(path: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    if !path.is_dir() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_dir() {
            collect_bru_files(&entry_path, files)?;
        } else if entry_path.extension().is_some_and(|e| e == "bru") {
            files.push(entry_path);
        }
    }
    Ok(())
}

fn mtime_ms(path: &Path) -> io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(since_epoch.as_secs_f64() * 1000.0)
}

/// How one file fared.
enum Checked {
    Parsed,
    Cached,
}

async fn check_file(
    engine: &Engine,
    cache: &ParsedFileCache,
    collection: &str,
    path: &Path,
    kind: DocumentKind,
) -> Result<Checked, String> {
    let file_key = path.to_string_lossy();
    let mtime_ms = mtime_ms(path).map_err(|e| e.to_string())?;

    if let Some(entry) = cache.get_entry(collection, &file_key).await {
        if entry.mtime_ms == mtime_ms && entry.parsed_data.kind() == kind {
            return Ok(Checked::Cached);
        }
    }

    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    match engine
        .parse_named(&text, kind, Some(&display_name(path)))
        .await
    {
        Ok(document) => {
            let entry = CacheEntry {
                mtime_ms,
                parsed_data: document,
            };
            cache.set_entry(collection, &file_key, &entry).await;
            Ok(Checked::Parsed)
        }
        Err(e) => {
            cache.invalidate(collection, &file_key).await;
            Err(e.to_string())
        }
    }
}

async fn run_check(config: &EngineConfig, args: CheckArgs) -> i32 {
    let mut files = Vec::new();
    if let Err(e) = collect_bru_files(&args.path, &mut files) {
        eprintln!("Error reading directory {}: {}", args.path.display(), e);
        return 1;
    }
    files.sort();

    let collection = match &args.collection {
        Some(dir) => dir.clone(),
        None if args.path.is_dir() => args.path.clone(),
        None => args
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let collection = collection.to_string_lossy().to_string();

    let engine = Arc::new(Engine::new(config));
    let (cache, service) = start_cache(config);

    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        let engine = Arc::clone(&engine);
        let cache = cache.clone();
        let collection = collection.clone();
        let kind = args.kind.unwrap_or_else(|| infer_kind(&path));
        tasks.spawn(async move {
            let outcome = check_file(&engine, &cache, &collection, &path, kind).await;
            (index, path, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("Error: check task failed: {}", e);
                stop_cache(cache, service).await;
                return 1;
            }
        }
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut had_errors = false;
    for (_, path, outcome) in results {
        match outcome {
            Ok(Checked::Parsed) => println!("{}: ok", path.display()),
            Ok(Checked::Cached) => println!("{}: ok (cached)", path.display()),
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                had_errors = true;
            }
        }
    }

    stop_cache(cache, service).await;
    if had_errors {
        1
    } else {
        0
    }
}

async fn run_cache(config: &EngineConfig, action: CacheAction) -> i32 {
    if config.cache.path.is_none() {
        eprintln!("Error: no cache path configured (set cache.path in --config)");
        return 1;
    }
    let (cache, service) = start_cache(config);

    let code = match action {
        CacheAction::Stats => match cache.get_stats().await {
            Some(stats) => match serde_json::to_string_pretty(&stats) {
                Ok(json) => {
                    println!("{}", json);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            },
            None => {
                eprintln!("Error: cache is unavailable");
                1
            }
        },
        CacheAction::Clear => {
            cache.clear().await;
            println!("cache cleared");
            0
        }
    };

    stop_cache(cache, service).await;
    code
}
