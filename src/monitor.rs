use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::CampaignApi;
use crate::detect;
use crate::messages::CampaignContext;
use crate::notify::Notifier;
use crate::store::StateStore;

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Notifications handed to the notifier.
    pub notified: usize,
    /// Detectors that failed, in run order.
    pub failed: Vec<&'static str>,
}

impl CycleReport {
    fn record(&mut self, detector: &'static str, result: Result<usize>) {
        match result {
            Ok(n) => self.notified += n,
            Err(e) => {
                warn!("Failed to check {detector}: {e:#}");
                self.failed.push(detector);
            }
        }
    }
}

/// The poll loop: runs every detector, then sleeps for a fixed interval.
///
/// Owns the store exclusively, so detectors read and write it without
/// any locking.
pub struct Monitor<A, N> {
    api: A,
    notifier: N,
    store: StateStore,
    ctx: CampaignContext,
    interval: Duration,
}

impl<A: CampaignApi, N: Notifier> Monitor<A, N> {
    pub fn new(
        api: A,
        notifier: N,
        store: StateStore,
        ctx: CampaignContext,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            notifier,
            store,
            ctx,
            interval,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// One poll cycle: comments, contributions, campaign status, perk
    /// status. A failing detector is logged and the next one still runs.
    pub async fn check_now(&mut self) -> CycleReport {
        let now = chrono::Utc::now().timestamp();
        let mut report = CycleReport::default();

        let result =
            detect::check_comments(&self.api, &mut self.store, &self.notifier, &self.ctx).await;
        report.record("comments", result);

        let result =
            detect::check_contributions(&self.api, &mut self.store, &self.notifier, &self.ctx)
                .await;
        report.record("contributions", result);

        let result = detect::check_campaign_status(
            &self.api,
            &mut self.store,
            &self.notifier,
            &self.ctx,
            now,
        )
        .await
        .map(|fired| usize::from(fired.is_some()));
        report.record("campaign status", result);

        let result = detect::check_perks_status(
            &self.api,
            &mut self.store,
            &self.notifier,
            &self.ctx,
            now,
        )
        .await;
        report.record("perks status", result);

        report
    }

    /// Poll until `shutdown` resolves. Shutdown is only observed while
    /// sleeping between cycles; a cycle in progress always completes.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Self {
        tokio::pin!(shutdown);
        info!(
            "Entering polling loop (interval: {}s). Press Ctrl+C to stop.",
            self.interval.as_secs()
        );
        loop {
            let report = self.check_now().await;
            if report.failed.is_empty() {
                info!("Cycle complete, {} notification(s)", report.notified);
            } else {
                warn!(
                    "Cycle complete with failures in {:?}, {} notification(s)",
                    report.failed, report.notified
                );
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Monitoring stopped");
        self
    }
}
