//! skiff CLI
//!
//! Resumable chunked uploads into locally configured stores. Stores
//! live under a data directory, each with a filesystem bytes directory
//! and a JSON record catalog, so interrupted uploads can be resumed and
//! finished files survive restarts.

mod catalog;
mod config;
mod progress;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog::JsonCatalog;
use config::Config;
use skiff_client::{Uploader, UploaderConfig};
use skiff_core::record::FileRecord;
use skiff_core::FileFilter;
use skiff_store::{LocalAdapter, LocalTransport, Registry, Store};

/// Placeholder shown in `--help`; when left untouched the path is
/// resolved through the platform config directory instead.
const DEFAULT_CONFIG_PATH: &str = "~/.config/skiff/config.toml";

/// skiff - resumable chunked uploads with store replication
#[derive(Parser)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output (implies --verbose)
    #[arg(short, long)]
    debug: bool,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Upload a file into a store
    Upload {
        /// File to upload
        #[arg(required = true)]
        file: PathBuf,

        /// Target store (defaults to the first configured store)
        #[arg(short, long)]
        store: Option<String>,

        /// Initial chunk length in bytes
        #[arg(long, default_value = "8192")]
        chunk_size: usize,

        /// Upper bound for adaptive chunk lengths (0 = unbounded)
        #[arg(long, default_value = "0")]
        max_chunk_size: usize,

        /// Target fraction of one second per chunk transfer
        #[arg(long, default_value = "0.9")]
        capacity: f64,

        /// Disable adaptive chunk sizing
        #[arg(long)]
        no_adaptive: bool,

        /// Consecutive-failure ceiling per chunk
        #[arg(long, default_value = "5")]
        max_tries: u32,
    },

    /// List records in a store
    Ls {
        /// Store to list (defaults to the first configured store)
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Remove a file and its stored bytes
    Rm {
        /// Record id to remove
        #[arg(required = true)]
        file_id: String,

        /// Owning store (defaults to the first configured store)
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Show the configured store topology
    Stores,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config_path = if cli.config == DEFAULT_CONFIG_PATH {
        Config::default_path()
    } else {
        expand_tilde(&cli.config)
    };

    if matches!(cli.command, Commands::Init) {
        if config_path.exists() {
            anyhow::bail!("config {} already exists", config_path.display());
        }
        let config = Config::default();
        config.save(&config_path)?;
        println!(
            "{} {}",
            style("wrote").green().bold(),
            config_path.display()
        );
        return Ok(());
    }

    let config = Config::load_or_default(&config_path)?;
    config.validate()?;

    match cli.command {
        Commands::Upload {
            file,
            store,
            chunk_size,
            max_chunk_size,
            capacity,
            no_adaptive,
            max_tries,
        } => {
            let options = UploadOptions {
                chunk_size,
                max_chunk_size,
                capacity,
                adaptive: !no_adaptive,
                max_tries,
            };
            upload(&config, file, store.as_deref(), options).await?;
        }
        Commands::Ls { store } => {
            list_records(&config, store.as_deref()).await?;
        }
        Commands::Rm { file_id, store } => {
            remove_record(&config, &file_id, store.as_deref()).await?;
        }
        Commands::Stores => {
            show_stores(&config);
        }
        Commands::Init => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Build every configured store against a fresh registry.
async fn build_registry(config: &Config) -> anyhow::Result<Arc<Registry>> {
    let registry = Arc::new(Registry::new());
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("cannot create {}", config.data_dir.display()))?;

    for store_config in &config.stores {
        let adapter = LocalAdapter::new("local", config.store_path(store_config))
            .await
            .with_context(|| format!("cannot open store {}", store_config.name))?;
        let catalog = JsonCatalog::open(config.catalog_path(store_config))
            .with_context(|| format!("cannot open catalog for {}", store_config.name))?;

        let mut builder = Store::builder(store_config.name.clone())
            .adapter(adapter)
            .collection(catalog);

        let mut filter = FileFilter::new();
        let mut filtered = false;
        if let Some(min) = store_config.min_size {
            filter = filter.min_size(min);
            filtered = true;
        }
        if let Some(max) = store_config.max_size {
            filter = filter.max_size(max);
            filtered = true;
        }
        if !store_config.extensions.is_empty() {
            filter = filter.extensions(store_config.extensions.iter().cloned());
            filtered = true;
        }
        if filtered {
            builder = builder.filter(filter);
        }
        for target in &store_config.copy_to {
            builder = builder.copy_to(target.clone());
        }
        if let Some(base) = &config.base_url {
            builder = builder.base_url(base.clone());
        }
        builder.build(&registry)?;
    }
    Ok(registry)
}

struct UploadOptions {
    chunk_size: usize,
    max_chunk_size: usize,
    capacity: f64,
    adaptive: bool,
    max_tries: u32,
}

async fn upload(
    config: &Config,
    path: PathBuf,
    store: Option<&str>,
    options: UploadOptions,
) -> anyhow::Result<()> {
    let store_config = config.resolve_store(store)?;
    let registry = build_registry(config).await?;
    let transport = Arc::new(LocalTransport::new(Arc::clone(&registry)));

    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid file name: {}", path.display()))?;

    let mut uploader_config = UploaderConfig::new(store_config.name.clone());
    uploader_config.adaptive = options.adaptive;
    uploader_config.capacity = options.capacity;
    uploader_config.chunk_size = options.chunk_size;
    uploader_config.max_chunk_size = options.max_chunk_size;
    uploader_config.max_tries = options.max_tries;

    let total = data.len() as u64;
    let bar = progress::upload_bar(total);
    let bar_updates = bar.clone();
    let uploader = Arc::new(
        Uploader::new(transport, uploader_config, FileRecord::new(name), data).on_progress(
            move |_file, fraction| {
                bar_updates.set_position((fraction * total as f64) as u64);
            },
        ),
    );

    uploader.start().await?;
    bar.finish_and_clear();

    let file = uploader.file();
    println!("{} {}", style("uploaded").green().bold(), file.name);
    println!("  id:    {}", file.id);
    println!("  size:  {}", progress::format_bytes(file.size));
    if let Some(url) = &file.url {
        println!("  url:   {url}");
    }

    if !store_config.copy_to.is_empty() {
        await_replicas(&registry, &store_config.copy_to, &file.id).await;
    }
    Ok(())
}

/// Replication runs on background tasks; give each configured target a
/// bounded window to land its copy before the process exits.
async fn await_replicas(registry: &Arc<Registry>, targets: &[String], file_id: &str) {
    const REPLICA_WAIT: Duration = Duration::from_secs(30);
    let deadline = tokio::time::Instant::now() + REPLICA_WAIT;

    for target_name in targets {
        let Some(target) = registry.get(target_name) else {
            continue;
        };
        loop {
            let landed = target
                .collection()
                .all()
                .await
                .iter()
                .any(|record| record.original_id.as_deref() == Some(file_id) && record.complete);
            if landed {
                println!(
                    "  {} {}",
                    style("replicated to").dim(),
                    target_name
                );
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                // The target may have filtered the file out, or the copy
                // failed; either way the error was already logged.
                tracing::warn!(target = %target_name, file_id, "replica not confirmed");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn list_records(config: &Config, store: Option<&str>) -> anyhow::Result<()> {
    let store_config = config.resolve_store(store)?;
    let registry = build_registry(config).await?;
    let store = registry
        .get(&store_config.name)
        .context("store not registered")?;

    let mut records = store.collection().all().await;
    records.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));

    if records.is_empty() {
        println!("{}", style("no records").dim());
        return Ok(());
    }
    for record in records {
        let status = if record.complete {
            style("done").green()
        } else if record.uploading {
            style("uploading").yellow()
        } else {
            style("stopped").red()
        };
        println!(
            "{}  {:>10}  {:9}  {}",
            record.id,
            progress::format_bytes(record.size),
            status,
            record.name
        );
    }
    Ok(())
}

async fn remove_record(config: &Config, file_id: &str, store: Option<&str>) -> anyhow::Result<()> {
    let store_config = config.resolve_store(store)?;
    let registry = build_registry(config).await?;
    let store = registry
        .get(&store_config.name)
        .context("store not registered")?;

    store.remove(file_id).await?;
    println!("{} {}", style("removed").green().bold(), file_id);
    Ok(())
}

fn show_stores(config: &Config) {
    for store in &config.stores {
        println!("{}", style(&store.name).cyan().bold());
        println!("  path: {}", config.store_path(store).display());
        if !store.copy_to.is_empty() {
            println!("  copy_to: {}", store.copy_to.join(", "));
        }
        if !store.extensions.is_empty() {
            println!("  extensions: {}", store.extensions.join(", "));
        }
        if let Some(max) = store.max_size {
            println!("  max_size: {}", progress::format_bytes(max));
        }
    }
}
