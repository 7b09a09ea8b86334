use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use campaign_notifier::api::{self, HttpCampaignApi};
use campaign_notifier::auth;
use campaign_notifier::config::{AppConfig, CONFIG_PATH};
use campaign_notifier::detect;
use campaign_notifier::monitor::Monitor;
use campaign_notifier::notify::WebhookNotifier;
use campaign_notifier::store::StateStore;

#[derive(Parser)]
#[command(
    name = "notifier",
    about = "Relay campaign comments, contributions and milestones to chat and automation webhooks"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load config
    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    let mut store = StateStore::open(&config.settings.state_path)?;
    let access_token = auth::stored_access_token(&store)?.to_string();

    let client = api::http_client().context("failed to build HTTP client")?;
    let api = HttpCampaignApi::new(client.clone(), &config.api, &access_token);
    let notifier = WebhookNotifier::new(client, &config.notify);

    // Campaign and account lookups are required for links; failing here is fatal.
    let now = chrono::Utc::now().timestamp();
    let ctx = detect::bootstrap(&api, &mut store, now)
        .await
        .context("failed to load campaign at startup")?;
    info!(
        "Monitoring campaign {} ({}) every {}s",
        ctx.campaign_id, ctx.slug, config.settings.poll_interval_secs
    );

    let mut monitor = Monitor::new(api, notifier, store, ctx, config.settings.poll_interval());

    if args.once {
        let report = monitor.check_now().await;
        if !report.failed.is_empty() {
            warn!("Failed detectors: {:?}", report.failed);
        }
        info!("{} notification(s) sent", report.notified);
        return Ok(());
    }

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
