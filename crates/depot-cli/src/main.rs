//! Depot CLI: maintenance jobs over the files table and its storage backend.
//!
//! Reads the same environment as the library (`DATABASE_URL`, `DEPOT_STORAGE_BACKEND`,
//! `DEPOT_NAMING`, `DEPOT_PUBLIC_BASE_URL`, ...); a `.env` file is honored.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use depot_cli::{init_tracing, render_migration, render_refresh, render_verify, to_json, OutputFormat};
use depot_core::DepotConfig;
use depot_db::{connect, run_migrations, PgFileRepository, UploadTransaction};
use depot_files::{
    migrate_all, refresh_all, verify_all, BaseUrlResolver, FileManager, NamingSpec, UploadSource,
    UrlResolver,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "depot", about = "Content-addressed file storage maintenance")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Init,
    /// Upload local files in one transaction
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Move stored files from an old naming strategy to the configured one
    Migrate {
        /// Naming strategy the files are currently stored under, e.g. `hash` or `hash-split:8+ext`
        #[arg(long, value_name = "NAMING")]
        from: String,
        /// Prefix the old strategy was applied with
        #[arg(long, value_name = "PREFIX")]
        from_prefix: Option<String>,
        /// Records written back per database transaction
        #[arg(long, env = "DEPOT_BATCH_SIZE")]
        batch_size: Option<usize>,
    },
    /// Recompute size, hash and MIME type from stored bytes
    Refresh {
        /// Records written back per database transaction
        #[arg(long, env = "DEPOT_BATCH_SIZE")]
        batch_size: Option<usize>,
    },
    /// Check stored bytes against their records; exits non-zero on any mismatch
    Verify,
}

#[derive(Serialize)]
struct UploadedFile {
    file: String,
    pathname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

fn print_report<T: Serialize>(
    format: OutputFormat,
    report: &T,
    render: fn(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Table => println!("{}", render(report)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = DepotConfig::from_env().context("Invalid configuration")?;
    let pool = connect(&config).await.context("Failed to connect to database")?;

    if let Commands::Init = cli.command {
        run_migrations(&pool).await.context("Failed to run database migrations")?;
        return Ok(());
    }

    let repository = PgFileRepository::new(pool);
    let storage = depot_storage::create_storage(&config)
        .await
        .context("Failed to create storage backend")?;
    let mut manager = FileManager::from_config(storage, &config)?
        .repository(Arc::new(repository.clone()))
        .name("cli")
        .build();

    match cli.command {
        Commands::Init => {}
        Commands::Upload { files } => {
            let mut tx = UploadTransaction::begin(&repository, &mut manager).await?;
            let mut staged = Vec::with_capacity(files.len());
            for file in &files {
                let handle = tx
                    .upload(UploadSource::path(file))
                    .await
                    .with_context(|| format!("Failed to upload {}", file.display()))?;
                staged.push((file.display().to_string(), handle));
            }
            tx.commit().await.context("Failed to commit uploads")?;

            let resolver = BaseUrlResolver::from_config(&config)?;
            let uploaded = staged
                .into_iter()
                .map(|(file, handle)| {
                    let url = match resolver {
                        Some(ref resolver) => Some(resolver.url(handle.record().as_ref())?),
                        None => None,
                    };
                    Ok(UploadedFile {
                        file,
                        pathname: manager.pathname(&handle)?,
                        url,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            match cli.format {
                OutputFormat::Json => println!("{}", to_json(&uploaded)?),
                OutputFormat::Table => {
                    for item in &uploaded {
                        match item.url {
                            Some(ref url) => println!("{}\t{}\t{}", item.file, item.pathname, url),
                            None => println!("{}\t{}", item.file, item.pathname),
                        }
                    }
                }
            }
        }
        Commands::Migrate {
            from,
            from_prefix,
            batch_size,
        } => {
            let old = from
                .parse::<NamingSpec>()?
                .with_prefix(from_prefix)
                .build()?;
            let report = migrate_all(
                &manager,
                &repository,
                old.as_ref(),
                batch_size.unwrap_or(config.batch_size),
            )
            .await?;
            print_report(cli.format, &report, render_migration)?;
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Refresh { batch_size } => {
            let report =
                refresh_all(&manager, &repository, batch_size.unwrap_or(config.batch_size)).await?;
            print_report(cli.format, &report, render_refresh)?;
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Verify => {
            let report = verify_all(&manager, &repository).await?;
            print_report(cli.format, &report, render_verify)?;
            if !report.is_consistent() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
