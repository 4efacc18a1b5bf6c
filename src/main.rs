//! herbert-signal CLI entrypoint.
//! Runs the video / site ingest, writes the signals index and renders the
//! catalyst calendar.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use herbert_signal::ingest::config::IngestConfig;
use herbert_signal::ingest::providers::site::SiteProvider;
use herbert_signal::ingest::providers::youtube::YoutubeProvider;
use herbert_signal::ingest::run_provider;
use herbert_signal::{
    load_config_default, load_config_from, report, QuotaTracker, ResilientClient, RetryPolicy,
};

const SAMPLE_YT: &str = "samples/herbert_yt_sample.json";
const SAMPLE_SITE: &str = "samples/herbert_site_milestones_sample.html";
const DEFAULT_ARTIFACTS: &str = "artifacts_herbert_signal_first_run";
const DEFAULT_CALENDAR: &str = "research/Catalyst_Calendar_enriched.md";

#[derive(Parser)]
#[command(
    name = "herbert-signal",
    version,
    about = "Ingest public video and milestone signals into signal event files",
    long_about = None
)]
struct Cli {
    /// Config file (TOML or JSON); defaults to $HERBERT_CONFIG_PATH, then config/herbert.{toml,json}
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest channel videos (sample feed by default)
    IngestYt {
        /// Feed JSON file to parse instead of calling the API
        #[arg(short, long, conflicts_with = "live")]
        input: Option<PathBuf>,

        /// Call the video API with configured credentials
        #[arg(long)]
        live: bool,

        /// Override youtube.max_results
        #[arg(long, requires = "live")]
        max_results: Option<usize>,

        /// Skip the videos.list enrichment call
        #[arg(long, requires = "live")]
        no_enrich: bool,

        /// Output directory for event files
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ingest website milestones (sample HTML by default)
    IngestSite {
        /// HTML file to parse instead of fetching the site
        #[arg(short, long, conflicts_with = "live")]
        input: Option<PathBuf>,

        /// Fetch the configured site (robots.txt-aware)
        #[arg(long)]
        live: bool,

        /// Override site.url
        #[arg(long)]
        url: Option<String>,

        /// Override site.selector
        #[arg(long)]
        selector: Option<String>,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ingest both sample inputs and write the signals index
    IngestAll {
        #[arg(long, default_value = SAMPLE_YT)]
        yt_input: PathBuf,

        #[arg(long, default_value = SAMPLE_SITE)]
        site_input: PathBuf,

        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Directory for signals_index.json
        #[arg(long, default_value = DEFAULT_ARTIFACTS)]
        artifacts: PathBuf,
    },

    /// Render the markdown catalyst calendar from persisted events
    Calendar {
        /// Event directory (defaults to the configured out_dir)
        #[arg(long = "in")]
        in_dir: Option<PathBuf>,

        #[arg(short, long, default_value = DEFAULT_CALENDAR)]
        out: PathBuf,
    },
}

/// RUST_LOG wins; HERBERT_LOG_JSON=1 switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("herbert_signal=info,ingest=info,quota=info,warn"));
    let json = std::env::var("HERBERT_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let cfg = match path {
        Some(p) => load_config_from(p).with_context(|| format!("loading config {}", p.display()))?,
        None => load_config_default().context("loading default config")?,
    };
    Ok(cfg.with_env_fallback())
}

fn build_client(cfg: &IngestConfig) -> Result<ResilientClient> {
    ResilientClient::with_user_agent(
        RetryPolicy::from_settings(&cfg.http),
        QuotaTracker::shared(),
        &cfg.site.user_agent,
    )
    .context("building HTTP client")
}

fn print_quota(client: &ResilientClient) {
    client.quota().log();
    for (op, n) in client.quota().snapshot() {
        println!("quota {op}: {n}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::IngestYt {
            input,
            live,
            max_results,
            no_enrich,
            out,
        } => {
            let out = out.unwrap_or_else(|| cfg.out_dir.0.clone());
            if live {
                if let Some(n) = max_results {
                    cfg.youtube.max_results = n;
                }
                if no_enrich {
                    cfg.youtube.enrich = false;
                }
                let client = build_client(&cfg)?;
                let provider = YoutubeProvider::live(client.clone(), cfg.youtube.clone());
                let res = run_provider(&provider, &out).await;
                print_quota(&client);
                let events = res.context("live video ingest")?;
                println!("Wrote {} video events to {}", events.len(), out.display());
            } else {
                let input = input.unwrap_or_else(|| PathBuf::from(SAMPLE_YT));
                let provider = YoutubeProvider::from_sample_file(&input);
                let events = run_provider(&provider, &out)
                    .await
                    .with_context(|| format!("parsing {}", input.display()))?;
                println!("Wrote {} video events to {}", events.len(), out.display());
            }
        }

        Commands::IngestSite {
            input,
            live,
            url,
            selector,
            out,
        } => {
            let out = out.unwrap_or_else(|| cfg.out_dir.0.clone());
            let selector = selector.unwrap_or_else(|| cfg.site.selector.clone());
            if live {
                let url = url.unwrap_or_else(|| cfg.site.url.clone());
                let client = build_client(&cfg)?;
                let provider = SiteProvider::live(client.clone(), url.clone()).with_selector(selector);
                let res = run_provider(&provider, &out).await;
                print_quota(&client);
                let events = res.with_context(|| format!("live site ingest from {url}"))?;
                println!("Wrote {} site events to {}", events.len(), out.display());
            } else {
                let input = input.unwrap_or_else(|| PathBuf::from(SAMPLE_SITE));
                let provider = SiteProvider::from_sample_file(&input).with_selector(selector);
                let events = run_provider(&provider, &out)
                    .await
                    .with_context(|| format!("parsing {}", input.display()))?;
                println!("Wrote {} site events to {}", events.len(), out.display());
            }
        }

        Commands::IngestAll {
            yt_input,
            site_input,
            out,
            artifacts,
        } => {
            let out = out.unwrap_or_else(|| cfg.out_dir.0.clone());
            let yt = run_provider(&YoutubeProvider::from_sample_file(&yt_input), &out)
                .await
                .with_context(|| format!("parsing {}", yt_input.display()))?;
            let site = run_provider(
                &SiteProvider::from_sample_file(&site_input).with_selector(cfg.site.selector.clone()),
                &out,
            )
            .await
            .with_context(|| format!("parsing {}", site_input.display()))?;
            report::write_signals_index(&artifacts, &out, yt.len(), site.len())
                .context("writing signals index")?;
            println!(
                "HERBERT-SIGNAL ingest complete: {} yt, {} site events.",
                yt.len(),
                site.len()
            );
        }

        Commands::Calendar { in_dir, out } => {
            let in_dir = in_dir.unwrap_or_else(|| cfg.out_dir.0.clone());
            let n = report::write_calendar(&in_dir, &out)
                .with_context(|| format!("rendering calendar from {}", in_dir.display()))?;
            println!("Wrote {} ({n} events)", out.display());
        }
    }

    Ok(())
}
