use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::AlertsApi;
use crate::dashboard::Dashboard;

/// Recurring refresh for an active dashboard. Dropping the handle stops it.
pub struct PollHandle<A: AlertsApi + 'static> {
    dashboard: Arc<Dashboard<A>>,
    task: Option<JoinHandle<()>>,
}

/// Fetches immediately, then every `period` until the handle is deactivated.
/// Scheduled refreshes never overlap each other; a manual
/// `Dashboard::refresh` runs independently of the schedule.
pub fn activate<A: AlertsApi + 'static>(
    dashboard: Arc<Dashboard<A>>,
    period: Duration,
) -> PollHandle<A> {
    let worker = Arc::clone(&dashboard);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = worker.refresh().await {
                tracing::warn!(error = %err, "scheduled refresh failed");
            }
        }
    });
    tracing::debug!(period_secs = period.as_secs(), "polling activated");

    PollHandle {
        dashboard,
        task: Some(task),
    }
}

impl<A: AlertsApi + 'static> PollHandle<A> {
    pub fn deactivate(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.dashboard.deactivate();
            tracing::debug!("polling deactivated");
        }
    }
}

impl<A: AlertsApi + 'static> Drop for PollHandle<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
