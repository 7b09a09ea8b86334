//! setup-account — First-time setup for the campaign notifier.
//!
//! Expects `config.toml` to already exist with the API token and campaign id.
//! Exchanges the account credentials for OAuth tokens, stores them in the
//! state file, verifies access to the campaign and seeds the comment and
//! contribution watermarks.
//!
//! The password is always read interactively (hidden input) so it never
//! ends up in shell history.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use campaign_notifier::api::{self, CampaignApi, HttpCampaignApi};
use campaign_notifier::{AUTH_TOKEN_URL, auth};
use campaign_notifier::config::{AppConfig, CONFIG_PATH};
use campaign_notifier::detect::{self, Backlog};
use campaign_notifier::store::{REFRESH_TOKEN, StateStore};

#[derive(Parser)]
#[command(
    name = "setup-account",
    about = "Authenticate, verify campaign access and seed the notifier state file"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Account email used for the password grant
    #[arg(long, required_unless_present = "refresh")]
    email: Option<String>,

    /// Renew the stored tokens with the stored refresh token instead of a password
    #[arg(long, conflicts_with = "email")]
    refresh: bool,

    /// Ignore existing comments and contributions; only notify about new ones
    #[arg(long)]
    skip_backlog: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).with_context(|| {
        format!(
            "{} not found or invalid — create it with [api] api_token and campaign_id first",
            cli.config.display()
        )
    })?;
    let mut store = StateStore::open(&config.settings.state_path)?;
    let client = api::http_client().context("failed to build HTTP client")?;

    println!("=== Campaign Notifier — Account Setup ===\n");

    // ── Step 1: Obtain tokens ──────────────────────────────────────
    let tokens = if cli.refresh {
        println!("Refreshing stored tokens...");
        let refresh_token = store
            .credential(REFRESH_TOKEN)
            .context("no refresh token stored; run setup-account with --email first")?
            .to_string();
        auth::refresh_grant(&client, AUTH_TOKEN_URL, &refresh_token).await?
    } else {
        let Some(email) = cli.email.as_deref() else {
            bail!("--email is required");
        };
        let password =
            rpassword::prompt_password("Password: ").context("failed to read password")?;
        if password.is_empty() {
            bail!("password cannot be empty");
        }
        println!("Authenticating {email}...");
        auth::password_grant(&client, AUTH_TOKEN_URL, email, &password).await?
    };
    auth::store_tokens(&mut store, &tokens)?;
    println!("  Authentication successful");
    println!();

    // ── Step 2: Verify campaign access ─────────────────────────────
    println!("Checking campaign {}...", config.api.campaign_id);
    let api = HttpCampaignApi::new(client, &config.api, &tokens.access_token);
    let account = api
        .current_account()
        .await
        .context("failed to fetch the authenticated account")?;
    let campaign = api
        .campaign()
        .await
        .context("failed to fetch the campaign — check api.campaign_id")?;
    println!("  Account id: {}", account.id);
    println!("  Campaign:   {} ({})", campaign.title, campaign.slug);
    println!("  Funds:      {} of {}", campaign.collected_funds, campaign.goal);
    println!();

    // ── Step 3: Seed state ─────────────────────────────────────────
    let now = chrono::Utc::now().timestamp();
    let backlog = if cli.skip_backlog {
        Backlog::Skip
    } else {
        Backlog::Replay
    };
    detect::seed_watermarks(&mut store, backlog, now)?;
    let marked = detect::mark_reached_milestones(&mut store, &campaign, now)?;
    match backlog {
        Backlog::Skip => println!("Existing comments and contributions will be ignored."),
        Backlog::Replay => {
            println!("Existing comments and contributions will be notified on first run.")
        }
    }
    if !marked.is_empty() {
        println!("Milestones already reached (not notified): {marked:?}");
    }
    println!();

    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  cargo run --bin notifier -- --config {}", cli.config.display());

    Ok(())
}
