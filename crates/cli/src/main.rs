//! Crossflow CLI entry point
//!
//! Runs the full verification workflow against a deployed WorkFlow Pro
//! instance and exits 0 when every stage and threshold passes, 1 on a
//! verification failure, and 2 when the harness itself could not run.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crossflow_common::config::HarnessConfig;
use crossflow_common::types::Project;
use crossflow_common::Result;
use crossflow_harness::report::{write_report, RunReport};
use crossflow_harness::{ApiClient, ConcurrentCreator, Orchestrator, PlaywrightFactory};

#[derive(Parser, Debug)]
#[command(name = "crossflow")]
#[command(version, about = "End-to-end verification harness for WorkFlow Pro")]
struct Args {
    /// Path to a YAML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the REST API base URL
    #[arg(long, env = "CROSSFLOW_API_URL")]
    api_url: Option<String>,

    /// Override the web UI base URL
    #[arg(long, env = "CROSSFLOW_WEB_URL")]
    web_url: Option<String>,

    /// Run browsers with a visible window
    #[arg(long)]
    headed: bool,

    /// Concurrent creation workers (0 skips the concurrent phase)
    #[arg(long, default_value = "5")]
    workers: usize,

    /// Output directory for the JSON results
    #[arg(short, long, default_value = "crossflow-results")]
    output: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(args).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    if let Some(url) = args.web_url {
        config.web_base_url = url;
    }
    config.validate()?;

    let api = ApiClient::new(&config.api_base_url, config.timing.api_timeout())?;
    let ui = PlaywrightFactory::new(&config.web_base_url, !args.headed, config.timing)?;

    let project = Project::unique(
        "Crossflow Verification",
        config.tenants.authorized.tenant.clone(),
    )
    .with_collaborators(vec![config.tenants.authorized.credentials.email.clone()]);

    let started_at = chrono::Utc::now().to_rfc3339();
    let start = Instant::now();

    info!(api = %config.api_base_url, web = %config.web_base_url, "starting verification workflow");
    let orchestrator = Orchestrator::new(config.clone(), api, ui);
    let workflow = orchestrator.run(&project).await;

    let concurrent = if args.workers > 0 {
        info!(workers = args.workers, "starting concurrent creation phase");
        let api_url = config.api_base_url.clone();
        let timeout = config.timing.api_timeout();
        let creator = ConcurrentCreator::new(
            move || ApiClient::new(&api_url, timeout),
            config.tenants.authorized.clone(),
            "Concurrent Creation",
        );
        Some(creator.run(args.workers).await)
    } else {
        None
    };

    let report = RunReport {
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
        workflow,
        concurrent,
    };
    let path = write_report(&args.output, &report)?;

    let passed = report.passed(config.thresholds.concurrent_ratio);
    if passed {
        info!(report = %path.display(), "verification passed");
    } else {
        if let Some(failure) = &report.workflow.failure {
            warn!(stage = %failure.stage, security = failure.security, "workflow failed: {}", failure.reason);
        }
        if let Some(c) = &report.concurrent {
            if c.ensure_ratio(config.thresholds.concurrent_ratio).is_err() {
                warn!(ratio = c.success_ratio(), "concurrent creation below threshold");
            }
        }
        warn!(report = %path.display(), "verification failed");
    }
    Ok(passed)
}
