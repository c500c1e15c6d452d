//! One reconciliation cycle: fetch, load baseline, diff, persist, notify.

use async_trait::async_trait;
use snafu::prelude::*;
use tracing::{error, info, warn};

use trackwatch_core::emit;
use trackwatch_core::metrics::events::{
    NewTracksDetected, NotificationStatus, NotificationsProcessed,
};
use trackwatch_core::polling::{IterationResult, PollingProcessor};

use crate::diff::diff;
use crate::error::{BaselineSnafu, CycleError, FetchSnafu, PersistSnafu};
use crate::model::Snapshot;
use crate::notify::Notifier;
use crate::spotify::{FetchOutcome, SnapshotSource};
use crate::store::SnapshotStore;

/// Summary of a finished cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub playlist: String,
    /// Items in the fetched snapshot missing from the baseline.
    pub new_items: usize,
    pub notified: usize,
    pub failed: usize,
    /// New items left unannounced because the fetch was recovering.
    pub suppressed: usize,
    /// No baseline existed; the fetched snapshot became the baseline.
    pub bootstrapped: bool,
    pub recovering: bool,
}

/// Fetched snapshot paired with the baseline it is compared against.
#[derive(Debug)]
pub struct CycleState {
    pub outcome: FetchOutcome,
    pub baseline: Snapshot,
    pub bootstrapped: bool,
}

/// Drives cycles for one playlist.
pub struct Reconciler<S, N> {
    source: S,
    store: SnapshotStore,
    notifier: N,
}

impl<S, N> Reconciler<S, N>
where
    S: SnapshotSource,
    N: Notifier,
{
    pub fn new(source: S, store: SnapshotStore, notifier: N) -> Self {
        Self {
            source,
            store,
            notifier,
        }
    }

    /// Fetch the playlist and load (or initialize) the stored baseline.
    pub async fn load_state(&mut self) -> Result<CycleState, CycleError> {
        let outcome = self.source.fetch_snapshot().await.context(FetchSnafu)?;
        let key = outcome.snapshot.storage_key();

        let (baseline, bootstrapped) = match self.store.get(&key).await {
            Ok(baseline) => (baseline, false),
            Err(e) if e.is_not_found() => {
                warn!(key = %key, "No stored snapshot, storing the current one as baseline");
                let baseline = self
                    .store
                    .put(&key, outcome.snapshot.clone())
                    .await
                    .context(BaselineSnafu)?;
                (baseline, true)
            }
            Err(e) => return Err(e).context(BaselineSnafu),
        };

        Ok(CycleState {
            outcome,
            baseline,
            bootstrapped,
        })
    }

    /// Diff against the baseline, persist the fetched snapshot, then announce
    /// new items unless the fetch was recovering.
    pub async fn apply(&mut self, state: CycleState) -> Result<CycleReport, CycleError> {
        let CycleState {
            outcome: FetchOutcome {
                snapshot,
                recovering,
            },
            baseline,
            bootstrapped,
        } = state;

        let new_items = diff(&baseline, &snapshot);
        emit!(NewTracksDetected {
            count: new_items.len(),
        });

        let key = snapshot.storage_key();
        let snapshot = self
            .store
            .put(&key, snapshot)
            .await
            .context(PersistSnafu)?;

        let mut report = CycleReport {
            playlist: snapshot.name.clone(),
            new_items: new_items.len(),
            bootstrapped,
            recovering,
            ..Default::default()
        };

        if new_items.is_empty() {
            info!(playlist = %snapshot.name, "No new tracks since last cycle");
            return Ok(report);
        }

        if recovering {
            report.suppressed = new_items.len();
            warn!(
                playlist = %snapshot.name,
                count = new_items.len(),
                "Playlist fetch is recovering, suppressing notifications"
            );
            emit!(NotificationsProcessed {
                status: NotificationStatus::Suppressed,
                count: report.suppressed,
            });
            return Ok(report);
        }

        for item in &new_items {
            info!(track = %item.title, id = %item.item_id, "New track, sending notification");
            match self.notifier.notify(item, &snapshot).await {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    error!(track = %item.title, id = %item.item_id, error = %e, "Notification failed");
                    report.failed += 1;
                }
            }
        }

        emit!(NotificationsProcessed {
            status: NotificationStatus::Sent,
            count: report.notified,
        });
        emit!(NotificationsProcessed {
            status: NotificationStatus::Failed,
            count: report.failed,
        });

        info!(
            playlist = %report.playlist,
            notified = report.notified,
            failed = report.failed,
            "Cycle notifications done"
        );
        Ok(report)
    }

    /// Run a full cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let state = self.load_state().await?;
        self.apply(state).await
    }
}

#[async_trait]
impl<S, N> PollingProcessor for Reconciler<S, N>
where
    S: SnapshotSource,
    N: Notifier,
{
    type State = CycleState;
    type Error = CycleError;

    async fn prepare(&mut self, cold_start: bool) -> Result<CycleState, CycleError> {
        if cold_start {
            info!("First cycle, reading the playlist from the start");
        }
        self.load_state().await
    }

    async fn process(&mut self, state: CycleState) -> Result<IterationResult, CycleError> {
        let report = self.apply(state).await?;
        Ok(if report.recovering {
            IterationResult::Recovering
        } else {
            IterationResult::Completed
        })
    }
}
