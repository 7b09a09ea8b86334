//! Event detectors: compare the live API state with the store and notify
//! about anything new.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

use crate::api::{CampaignApi, StreamItem, parse_timestamp};
use crate::error::ApiError;
use crate::messages::{self, CampaignContext};
use crate::notify::Notifier;
use crate::store::{COMMENT_WATERMARK, CONTRIBUTION_WATERMARK, StateStore};
use crate::types::{Campaign, Comment, Contribution, Notification};

/// Funding milestones in percent of the goal, ascending.
pub const MILESTONES: [u32; 12] = [30, 70, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];

/// Headroom below the stock limit that counts as "almost sold out".
pub const NEAR_SOLD_OUT_MARGIN: u32 = 10;

pub fn milestone_kind(percent: u32) -> String {
    format!("p{percent}")
}

pub fn almost_sold_out_kind(perk_id: u64) -> String {
    format!("almost-{perk_id}")
}

pub fn sold_out_kind(perk_id: u64) -> String {
    format!("soldout-{perk_id}")
}

// ── Streams (comments, contributions) ─────────────────────────────

/// Page through a newest-first stream and collect the items strictly newer
/// than `watermark`, newest first, with their parsed timestamps.
///
/// Stops at the first item at or below the watermark. This relies on the
/// API ordering items newest-first; an out-of-order page makes items behind
/// an old one invisible.
pub async fn collect_new<T: StreamItem, A: CampaignApi>(
    api: &A,
    watermark: i64,
) -> Result<Vec<(i64, T)>, ApiError> {
    let mut fresh = Vec::new();
    let mut page = 1;
    loop {
        let items: Vec<T> = api.fetch_page(page).await?;
        if items.is_empty() {
            break;
        }
        for item in items {
            let ts = parse_timestamp(item.created_at())?;
            if ts <= watermark {
                return Ok(fresh);
            }
            fresh.push((ts, item));
        }
        page += 1;
    }
    Ok(fresh)
}

async fn check_stream<T, A, N, F>(
    api: &A,
    store: &mut StateStore,
    notifier: &N,
    kind: &str,
    render: F,
) -> Result<usize>
where
    T: StreamItem,
    A: CampaignApi,
    N: Notifier,
    F: Fn(&T) -> Notification,
{
    let watermark = store.watermark(kind).unwrap_or(0);
    let fresh = collect_new::<T, A>(api, watermark).await?;

    // First item of the first page is the newest.
    let Some(&(newest, _)) = fresh.first() else {
        info!("No new {} items", T::ENDPOINT.name());
        return Ok(0);
    };
    store.set_watermark(kind, newest)?;
    info!(
        "{} new {} item(s), watermark {watermark} -> {newest}",
        fresh.len(),
        T::ENDPOINT.name()
    );

    for (_, item) in fresh.iter().rev() {
        notifier.notify(&render(item)).await;
    }
    Ok(fresh.len())
}

/// Notify about comments posted since the last check.
pub async fn check_comments<A: CampaignApi, N: Notifier>(
    api: &A,
    store: &mut StateStore,
    notifier: &N,
    ctx: &CampaignContext,
) -> Result<usize> {
    check_stream(api, store, notifier, COMMENT_WATERMARK, |c: &Comment| {
        messages::comment(ctx, c)
    })
    .await
}

/// Notify about contributions made since the last check.
pub async fn check_contributions<A: CampaignApi, N: Notifier>(
    api: &A,
    store: &mut StateStore,
    notifier: &N,
    ctx: &CampaignContext,
) -> Result<usize> {
    check_stream(api, store, notifier, CONTRIBUTION_WATERMARK, |c: &Contribution| {
        messages::contribution(ctx, c)
    })
    .await
}

// ── Campaign status ────────────────────────────────────────────────

/// Whole percent of the goal collected, or `None` for a zero goal.
pub fn achieved_percent(campaign: &Campaign) -> Option<u32> {
    if campaign.goal <= Decimal::ZERO {
        return None;
    }
    (campaign.collected_funds * Decimal::ONE_HUNDRED / campaign.goal)
        .floor()
        .to_u32()
}

/// Notify about the lowest newly crossed funding milestone.
///
/// At most one milestone fires per call even if several were crossed since
/// the last check; the rest fire on later cycles.
pub async fn check_campaign_status<A: CampaignApi, N: Notifier>(
    api: &A,
    store: &mut StateStore,
    notifier: &N,
    ctx: &CampaignContext,
    now: i64,
) -> Result<Option<u32>> {
    let campaign = api.campaign().await?;
    let Some(achieved) = achieved_percent(&campaign) else {
        warn!("Campaign {} has no funding goal, skipping milestones", campaign.id);
        return Ok(None);
    };
    debug!("Campaign at {achieved}% of goal");

    for threshold in MILESTONES {
        if threshold > achieved {
            break;
        }
        if !store.ensure_marked(&milestone_kind(threshold), now)? {
            info!("Milestone {threshold}% reached ({achieved}%)");
            notifier
                .notify(&messages::milestone(ctx, &campaign, achieved))
                .await;
            return Ok(Some(threshold));
        }
    }
    Ok(None)
}

// ── Perk status ────────────────────────────────────────────────────

/// Notify about perks that are nearly or completely sold out. Each perk
/// notifies at most once per threshold, ever.
pub async fn check_perks_status<A: CampaignApi, N: Notifier>(
    api: &A,
    store: &mut StateStore,
    notifier: &N,
    ctx: &CampaignContext,
    now: i64,
) -> Result<usize> {
    let perks = api.perks().await?;
    let mut sent = 0;
    for perk in &perks {
        let Some(available) = perk.limit() else {
            continue;
        };
        let claimed = perk.claimed();

        let near = claimed != available
            && claimed.saturating_add(NEAR_SOLD_OUT_MARGIN) >= available;
        if near && !store.ensure_marked(&almost_sold_out_kind(perk.id), now)? {
            info!("Perk {} almost sold out ({claimed}/{available})", perk.id);
            notifier
                .notify(&messages::perk_almost_sold_out(ctx, perk, available))
                .await;
            sent += 1;
        }

        if claimed >= available && !store.ensure_marked(&sold_out_kind(perk.id), now)? {
            info!("Perk {} sold out ({claimed}/{available})", perk.id);
            notifier
                .notify(&messages::perk_sold_out(ctx, perk, available))
                .await;
            sent += 1;
        }
    }
    Ok(sent)
}

// ── Bootstrap ──────────────────────────────────────────────────────

/// Where stream detection starts when no watermark exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backlog {
    /// Start at 0: every existing comment and contribution is notified.
    Replay,
    /// Start at the current time: only items posted from now on are notified.
    Skip,
}

/// Create the stream watermarks if absent. Existing watermarks win.
pub fn seed_watermarks(store: &mut StateStore, backlog: Backlog, now: i64) -> Result<()> {
    let start = match backlog {
        Backlog::Replay => 0,
        Backlog::Skip => now,
    };
    for kind in [COMMENT_WATERMARK, CONTRIBUTION_WATERMARK] {
        let effective = store.init_watermark(kind, start)?;
        debug!("Watermark {kind} at {effective}");
    }
    Ok(())
}

/// Mark every milestone the campaign has already crossed, without notifying.
/// Returns the newly marked thresholds.
pub fn mark_reached_milestones(
    store: &mut StateStore,
    campaign: &Campaign,
    now: i64,
) -> Result<Vec<u32>> {
    let Some(achieved) = achieved_percent(campaign) else {
        return Ok(Vec::new());
    };
    let mut marked = Vec::new();
    for threshold in MILESTONES.into_iter().filter(|&t| t <= achieved) {
        if !store.ensure_marked(&milestone_kind(threshold), now)? {
            marked.push(threshold);
        }
    }
    Ok(marked)
}

/// Startup pass: resolve the campaign context, make sure the watermarks
/// exist and silently mark milestones crossed before the monitor started.
pub async fn bootstrap<A: CampaignApi>(
    api: &A,
    store: &mut StateStore,
    now: i64,
) -> Result<CampaignContext> {
    let campaign = api.campaign().await?;
    let account = api.current_account().await?;
    seed_watermarks(store, Backlog::Replay, now)?;
    let marked = mark_reached_milestones(store, &campaign, now)?;
    if !marked.is_empty() {
        info!("Milestones already reached at startup: {marked:?}");
    }
    Ok(CampaignContext::new(&campaign, &account))
}
