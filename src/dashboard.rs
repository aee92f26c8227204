use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::api::{AlertListParams, AlertsApi};
use crate::error::{DashboardError, FETCH_FAILED, GENERATE_FAILED};
use crate::models::{GenerateReceipt, RawEvent, StatusUpdateReceipt};
use crate::store::DashboardStore;
use crate::workflow::{Confirmation, StatusEditor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The operator confirmed the status the alert already had.
    Unchanged,
    Saved(StatusUpdateReceipt),
}

/// Owns the view state and every remote call that feeds it.
///
/// The store lock is only taken between awaits, so each mutation lands
/// whole even when several operations are interleaved on the runtime.
pub struct Dashboard<A> {
    api: A,
    store: Mutex<DashboardStore>,
    alert_limit: u32,
    revision: watch::Sender<u64>,
}

impl<A: AlertsApi> Dashboard<A> {
    pub fn new(api: A, alert_limit: u32) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            api,
            store: Mutex::new(DashboardStore::new()),
            alert_limit,
            revision,
        }
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Receives a new value whenever the view state changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn read<R>(&self, f: impl FnOnce(&DashboardStore) -> R) -> R {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }

    fn update<R>(&self, f: impl FnOnce(&mut DashboardStore) -> R) -> R {
        let result = {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut store)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn deactivate(&self) {
        self.update(DashboardStore::deactivate);
    }

    /// Fetches alerts and stats together. Whatever arrived is applied even if
    /// the other half failed.
    pub async fn refresh(&self) -> Result<(), DashboardError> {
        let ticket = self.update(DashboardStore::begin_fetch);
        let params = AlertListParams::with_limit(self.alert_limit);
        tracing::debug!(?ticket, "refresh started");

        let (alerts, stats) = tokio::join!(self.api.get_alerts(&params), self.api.get_stats());

        let failure = self.update(|store| {
            let mut failure = None;
            match alerts {
                Ok(alerts) => {
                    let count = alerts.len();
                    if !store.apply_alerts(ticket, alerts) {
                        tracing::debug!(?ticket, "discarded stale alert list");
                    } else {
                        tracing::debug!(?ticket, count, "alerts applied");
                    }
                }
                Err(err) => failure = Some(err),
            }
            match stats {
                Ok(stats) => {
                    if !store.apply_stats(ticket, stats) {
                        tracing::debug!(?ticket, "discarded stale stats");
                    }
                }
                Err(err) => failure = failure.or(Some(err)),
            }
            if failure.is_some() {
                store.record_error(FETCH_FAILED);
            }
            store.finish_fetch();
            failure
        });

        match failure {
            Some(err) => {
                tracing::warn!(error = %err, "refresh failed");
                Err(DashboardError::Fetch(err))
            }
            None => Ok(()),
        }
    }

    /// Refetches only the stats snapshot. Failures are reported to the caller
    /// but not shown to the operator.
    pub async fn refresh_stats(&self) -> Result<(), DashboardError> {
        let ticket = self.update(DashboardStore::issue_ticket);
        match self.api.get_stats().await {
            Ok(stats) => {
                if !self.update(|store| store.apply_stats(ticket, stats)) {
                    tracing::debug!(?ticket, "discarded stale stats");
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "error refreshing stats");
                Err(DashboardError::Fetch(err))
            }
        }
    }

    /// Asks the backend to generate alerts, then reloads everything. On
    /// failure the alerts and stats already on screen are kept.
    pub async fn generate_alerts(&self) -> Result<GenerateReceipt, DashboardError> {
        self.update(DashboardStore::begin_generate);

        match self.api.generate_alerts().await {
            Ok(receipt) => {
                tracing::info!(alert_count = receipt.alert_count, "alerts generated");
                let refreshed = self.refresh().await;
                self.update(DashboardStore::end_generate);
                refreshed.map(|()| receipt)
            }
            Err(err) => {
                tracing::warn!(error = %err, "alert generation failed");
                self.update(|store| {
                    store.record_error(GENERATE_FAILED);
                    store.end_generate();
                });
                Err(DashboardError::Generate(err))
            }
        }
    }

    pub fn editor_for(&self, alert_id: &str) -> Result<StatusEditor, DashboardError> {
        self.read(|store| store.find(alert_id).map(StatusEditor::new))
            .ok_or_else(|| DashboardError::UnknownAlert(alert_id.to_string()))
    }

    /// Confirms `editor` and, if the status changed, saves it remotely.
    ///
    /// The loaded record only changes after the backend accepted the update;
    /// stats are then refetched rather than adjusted locally.
    pub async fn submit_status(
        &self,
        editor: &mut StatusEditor,
    ) -> Result<SaveOutcome, DashboardError> {
        let change = match editor.confirm()? {
            Confirmation::Unchanged => return Ok(SaveOutcome::Unchanged),
            Confirmation::Submit(change) => change,
        };

        if let Err(err) = self.update(|store| store.begin_save(&change.alert_id, change.to)) {
            editor.settle(false)?;
            return Err(err.into());
        }

        match self.api.update_alert_status(&change.alert_id, change.to).await {
            Ok(receipt) => {
                self.update(|store| store.confirm_save(&change.alert_id));
                editor.settle(true)?;
                tracing::info!(
                    alert_id = %change.alert_id,
                    from = %change.from,
                    to = %change.to,
                    "alert status updated"
                );
                let _ = self.refresh_stats().await;
                Ok(SaveOutcome::Saved(receipt))
            }
            Err(err) => {
                tracing::warn!(alert_id = %change.alert_id, error = %err, "status update failed");
                self.update(|store| {
                    store.rollback_save(&change.alert_id);
                    store.record_error(DashboardError::update_message(&change.alert_id));
                });
                editor.settle(false)?;
                Err(DashboardError::Update {
                    alert_id: change.alert_id,
                    source: err,
                })
            }
        }
    }

    pub async fn recent_events(&self, hours: u32) -> Result<Vec<RawEvent>, DashboardError> {
        self.api
            .get_recent_events(hours)
            .await
            .map_err(DashboardError::Fetch)
    }
}
