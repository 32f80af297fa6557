use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use adifpush::{
    config::{AppPaths, CloudlogConfig, ListenerConfig, UploadConfig, wsjtx_log_path},
    ingest::FileIngestor,
    persist::{DupeCache, file::FileDupeCache, sqlite::SqliteDupeCache},
    runtime::listener,
    upload::CloudlogClient,
};

#[derive(Debug, Parser)]
#[command(
    name = "adifpush",
    about = "Forward logged QSOs to Cloudlog, each one once",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long = "sqlite-cache",
        global = true,
        help = "Keep the duplicate cache in SQLite (safe with concurrent runs)"
    )]
    sqlite_cache: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store Cloudlog credentials.
    Configure {
        #[arg(long, help = "Cloudlog base URL")]
        url: String,
        #[arg(long = "api-key", help = "API key from the Cloudlog admin menu")]
        api_key: String,
        #[arg(long = "station-id", help = "Station profile number")]
        station_id: String,
    },
    /// Upload QSOs from WSJT-X multicast broadcasts until interrupted.
    Listen,
    /// Upload new QSOs from the WSJT-X log.
    Sync {
        #[arg(long, value_name = "PATH", help = "Log file instead of the WSJT-X default")]
        log: Option<PathBuf>,
    },
    /// Upload QSOs from an ADIF file.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long = "resend", help = "Send records even if already uploaded")]
        resend: bool,
    },
    /// Forget every uploaded QSO.
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adifpush=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::discover()?;

    match cli.command {
        Command::Configure {
            url,
            api_key,
            station_id,
        } => {
            CloudlogConfig::new(url, api_key, station_id)?.save(&paths.config_file)?;
            println!("Configuration saved to {}", paths.config_file.display());
        }
        Command::ClearCache => {
            open_cache(&paths, cli.sqlite_cache)?.clear()?;
            println!("Duplicate cache cleared");
        }
        Command::Listen => {
            let client = open_client(&paths)?;
            let cache = open_cache(&paths, cli.sqlite_cache)?;
            let handle = listener::start(ListenerConfig::default(), cache, client)?;
            println!("Waiting for WSJT-X QSOs... (Ctrl+C to exit)");

            tokio::select! {
                _ = shutdown_signal() => {
                    let stats = handle.shutdown().await?;
                    println!("{} uploaded, {} failed, {} duplicates", stats.uploaded, stats.failed, stats.duplicates);
                }
                _ = handle.stopped() => bail!("listener stopped: socket closed"),
            }
        }
        Command::Sync { log } => {
            let path = match log {
                Some(path) => path,
                None => wsjtx_log_path()?,
            };
            sync_file(&paths, cli.sqlite_cache, &path, true).await?;
        }
        Command::Upload { file, resend } => {
            if !file.is_file() {
                bail!("file not found: {}", file.display());
            }
            sync_file(&paths, cli.sqlite_cache, &file, !resend).await?;
        }
    }

    Ok(())
}

fn open_client(paths: &AppPaths) -> Result<CloudlogClient> {
    let Some(cfg) = CloudlogConfig::load(&paths.config_file)? else {
        bail!("configuration not found; run `adifpush configure` first");
    };
    info!(url = %cfg.url, station = %cfg.station_id, "using Cloudlog");
    Ok(CloudlogClient::new(&cfg, &UploadConfig::default())?)
}

fn open_cache(paths: &AppPaths, sqlite: bool) -> Result<Box<dyn DupeCache>> {
    if sqlite {
        let cache = SqliteDupeCache::open(&paths.cache_db)
            .with_context(|| format!("opening {}", paths.cache_db.display()))?;
        Ok(Box::new(cache))
    } else {
        Ok(Box::new(FileDupeCache::new(&paths.cache_file)))
    }
}

async fn sync_file(paths: &AppPaths, sqlite: bool, file: &Path, skip_duplicates: bool) -> Result<()> {
    let client = open_client(paths)?;
    println!("POSTing {} to {}", file.display(), client.endpoint());

    let mut ingestor =
        FileIngestor::new(open_cache(paths, sqlite)?, client).skip_duplicates(skip_duplicates);
    let summary = ingestor.ingest_file(file).await?;

    println!(
        "{} successful, {} failed, {} skipped (duplicates)",
        summary.sent, summary.failed, summary.skipped
    );
    for line in summary.report_lines() {
        println!("  {line}");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received Ctrl+C, shutting down");
    }
}
