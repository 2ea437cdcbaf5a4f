//! Command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use copymill::{
    aggregate, csv_io, report, ChatClient, Config, ConfigError, Generate, PipelineRunner,
    QualityController, RateLimiter, RowProcessor, Stage,
};

/// Bulk article generation and quality control.
#[derive(Parser, Debug)]
#[command(name = "copymill", version, about)]
struct Cli {
    /// Input CSV with titles and metadata
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Output CSV for generated content
    #[arg(long, short = 'o')]
    output: PathBuf,

    /// QC report output file (JSON)
    #[arg(long, short = 'q', default_value = "qc_report.json")]
    qc_report: PathBuf,

    /// Optional JSON config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Maximum rows processed concurrently
    #[arg(long, short = 'w')]
    max_workers: Option<usize>,

    /// Override every stage's rate limit (requests per minute)
    #[arg(long, short = 'r')]
    rate_limit: Option<u32>,

    /// Parse the input and show what would run, without API calls
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` in the working directory, or one level up when running from a
    // subdirectory of the project.
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("copymill=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ConfigError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workers) = cli.max_workers {
        config.concurrency = workers.max(1);
    }
    if let Some(per_minute) = cli.rate_limit {
        for stage in &mut config.stages {
            stage.max_calls = per_minute;
            stage.interval_secs = 60;
        }
    }

    let rows = csv_io::load_rows(&cli.input)?;

    if cli.dry_run {
        let stage_names: Vec<&str> = config.stages.iter().map(|s| s.name.as_str()).collect();
        println!(
            "Dry run: {} rows through stages [{}] at concurrency {}",
            rows.len(),
            stage_names.join(" -> "),
            config.concurrency
        );
        for row in rows.iter().take(5) {
            println!("  {}", row.title);
        }
        if rows.len() > 5 {
            println!("  ... and {} more", rows.len() - 5);
        }
        return Ok(());
    }

    let api_key = config.resolve_credential()?;

    let stages: Vec<Stage> = config
        .stages
        .iter()
        .map(|stage| {
            let limiter = RateLimiter::new(stage.max_calls, stage.interval_secs);
            let client = ChatClient::new(
                stage.url.clone(),
                stage.model.clone(),
                api_key.clone(),
                limiter,
            );
            Stage {
                name: stage.name.clone(),
                kind: stage.kind,
                client: Arc::new(client) as Arc<dyn Generate>,
            }
        })
        .collect();

    info!(
        rows = rows.len(),
        stages = stages.len(),
        concurrency = config.concurrency,
        "starting pipeline"
    );

    let processor = RowProcessor::new(
        stages,
        QualityController::new(config.qc.clone()),
        config.retry.clone(),
        config.stage_timeout_secs.map(Duration::from_secs),
    );
    let runner = PipelineRunner::new(processor, config.concurrency);
    let processed = runner.run(rows).await;

    let failed = processed.iter().filter(|r| r.error.is_some()).count();
    csv_io::write_rows(&processed, &cli.output)?;

    let qc_report = aggregate(&processed, &config.qc);
    report::write_report(&qc_report, &cli.qc_report)?;

    println!(
        "Processed {} rows ({} failed, {} passed QC). Output: {}. QC report: {}.",
        processed.len(),
        failed,
        qc_report.summary.passed_qc,
        cli.output.display(),
        cli.qc_report.display()
    );
    Ok(())
}
