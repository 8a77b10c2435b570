use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use labtract::pipeline::ReportService;
use labtract::{api, config, logging};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "labtract", about = "Turn diagnostic reports into structured test results")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP extraction service.
    Serve,
    /// Extract one document and print the results CSV.
    Extract {
        /// Path to the report (pdf, png, jpg, or jpeg).
        path: PathBuf,
        /// Produce a narrative analysis instead of the results table.
        #[arg(long)]
        analyze: bool,
        /// Write the output to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve().await,
        Command::Extract {
            path,
            analyze,
            output,
        } => extract(path, analyze, output).await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let app = api::create_router(Arc::new(ReportService::new()));
    let (listener, port) = bind_listener().await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn extract(path: PathBuf, analyze: bool, output: Option<PathBuf>) -> anyhow::Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("Document path has no usable filename")?
        .to_string();
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let service = ReportService::new();
    let rendered = if analyze {
        let outcome = service.analyze(&filename, bytes).await?;
        tracing::info!(
            chunks = outcome.chunk_count,
            failed_chunks = outcome.failed_chunks,
            "Analysis complete"
        );
        outcome.narrative
    } else {
        let outcome = service.extract(&filename, bytes).await?;
        tracing::info!(
            rows = outcome.rows.len(),
            failed_chunks = outcome.failed_chunks,
            csv_artifact = %outcome.artifacts.results_csv,
            "Extraction complete"
        );
        outcome.csv
    };

    match output {
        Some(target) => {
            tokio::fs::write(&target, rendered)
                .await
                .with_context(|| format!("Failed to write {}", target.display()))?;
            tracing::info!(path = %target.display(), "Output written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4600..=4699;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4600-4699",
    ))
}
