use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tessel_engine::analyzer::analyze;
use tessel_engine::config::{ConfigLoader, EngineConfig};
use tessel_engine::formatter::{format_report, format_run};
use tessel_engine::protocol::PageSnapshot;
use tessel_engine::runner::{ScenarioOutcome, run_suite};
use tessel_engine::session::Session;
use tessel_h::HeadlessSession;
use tessel_parser::source::filter_by_tag;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessel", version, about = "Scenario-driven browser test runner")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a page's structure and suggest test scenarios
    Analyze {
        /// Page to open in a headless browser
        #[arg(long, required_unless_present = "snapshot", conflicts_with = "snapshot")]
        url: Option<String>,

        /// Previously captured snapshot (JSON) to analyze offline
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// How long to watch the live page for dynamic activity
        #[arg(long, default_value_t = 3000)]
        observe_ms: u64,

        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
    /// Parse a scenario file and show how each step was understood
    Parse {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Run scenarios against a page
    Run {
        #[arg(long)]
        url: String,

        /// Scenario file (YAML)
        #[arg(long)]
        file: PathBuf,

        /// Directory for step screenshots
        #[arg(long)]
        screenshots: Option<PathBuf>,

        /// Engine config file (else $TESSEL_CONFIG, ./tessel.yaml or ~/.tessel/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only run scenarios carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Run scenarios concurrently, one browser each
        #[arg(long)]
        parallel: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries reports.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Analyze {
            url,
            snapshot,
            format,
            observe_ms,
            visible,
        } => {
            let page = match (url, snapshot) {
                (_, Some(path)) => read_snapshot(&path)?,
                (Some(url), None) => {
                    capture_page(&normalize_url(&url)?, observe_ms, visible).await?
                }
                (None, None) => bail!("either --url or --snapshot is required"),
            };
            let report = analyze(&page);
            match format {
                Format::Text => println!("{}", format_report(&report)),
                Format::Yaml => print!("{}", serde_yaml::to_string(&report)?),
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Parse { file, json } => parse_file(&file, json)?,
        Command::Run {
            url,
            file,
            screenshots,
            config,
            tag,
            parallel,
            json,
            visible,
        } => {
            let config = load_config(config.as_deref()).await?;
            let screenshot_dir = screenshots
                .or_else(|| config.screenshots.dir.clone())
                .unwrap_or_else(|| PathBuf::from("screenshots"));

            let mut scenarios = tessel_parser::load_scenarios(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            if let Some(tag) = &tag {
                scenarios = filter_by_tag(scenarios, tag);
            }
            if scenarios.is_empty() {
                bail!("no scenarios to run in {}", file.display());
            }

            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling running scenarios");
                    signal.cancel();
                }
            });

            let url = normalize_url(&url)?;
            info!("Running {} scenario(s) against {}", scenarios.len(), url);
            let outcomes = run_suite(&scenarios, &url, &config, &cancel, parallel, || {
                HeadlessSession::new()
                    .visible(visible)
                    .with_screenshot_dir(screenshot_dir.clone())
            })
            .await;

            let failed = report_outcomes(&outcomes, json)?;
            if failed > 0 {
                bail!("{} of {} scenario(s) failed", failed, outcomes.len());
            }
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    Ok(config)
}

/// Accepts bare hosts such as `example.com`.
fn normalize_url(raw: &str) -> anyhow::Result<String> {
    let candidate = if raw.contains("://") || raw.starts_with("data:") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = url::Url::parse(&candidate).with_context(|| format!("invalid url '{raw}'"))?;
    Ok(parsed.to_string())
}

fn read_snapshot(path: &Path) -> anyhow::Result<PageSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid snapshot {}", path.display()))
}

/// Captures the page twice: the first capture installs the activity
/// counters, the second reads them after the observation window.
async fn capture_page(url: &str, observe_ms: u64, visible: bool) -> anyhow::Result<PageSnapshot> {
    let mut session = HeadlessSession::new().visible(visible);
    session.launch().await?;

    let captured = async {
        session.navigate(url).await?;
        session.snapshot().await?;
        session.wait_millis(observe_ms).await;
        session.snapshot().await
    }
    .await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser: {}", e);
    }
    Ok(captured?)
}

fn parse_file(path: &Path, json: bool) -> anyhow::Result<()> {
    let scenarios = tessel_parser::load_scenarios(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut parsed = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        let steps = tessel_parser::parse(scenario)
            .with_context(|| format!("scenario '{}'", scenario.name))?;
        parsed.push((scenario.name.as_str(), steps));
    }

    if json {
        let value: Vec<_> = parsed
            .iter()
            .map(|(name, steps)| serde_json::json!({ "scenario": name, "steps": steps }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (name, steps) in &parsed {
        println!("{name}");
        for step in steps {
            let mut line = format!("  {}. [{}] {}", step.index + 1, step.action, step.description);
            if let Some(target) = &step.target {
                line.push_str(&format!(" -> target: {target}"));
            }
            if let Some(value) = &step.value {
                line.push_str(&format!(", value: {value}"));
            }
            println!("{line}");
        }
        let unknown = tessel_parser::unknown_steps(steps);
        if !unknown.is_empty() {
            println!("  {} step(s) not understood", unknown.len());
        }
    }
    Ok(())
}

/// Prints every outcome and returns how many scenarios did not pass.
fn report_outcomes(outcomes: &[ScenarioOutcome], json: bool) -> anyhow::Result<usize> {
    let failed = outcomes
        .iter()
        .filter(|o| !o.result.as_ref().is_ok_and(|run| run.passed()))
        .count();

    if json {
        let value: Vec<_> = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(run) => serde_json::to_value(run),
                Err(e) => Ok(serde_json::json!({
                    "scenario": outcome.scenario,
                    "error": e.to_string(),
                })),
            })
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(failed);
    }

    for outcome in outcomes {
        match &outcome.result {
            Ok(run) => println!("{}\n", format_run(run)),
            Err(e) => println!("ERROR {}: {}\n", outcome.scenario, e),
        }
    }
    println!(
        "{} scenario(s), {} passed, {} failed",
        outcomes.len(),
        outcomes.len() - failed,
        failed
    );
    Ok(failed)
}
