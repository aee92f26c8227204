use crate::api::ApiError;
use crate::workflow::WorkflowError;

pub const FETCH_FAILED: &str = "Failed to fetch data. Please check if the backend is running.";
pub const GENERATE_FAILED: &str = "Failed to generate alerts. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] ApiError),
    #[error("status update for alert {alert_id} failed: {source}")]
    Update {
        alert_id: String,
        #[source]
        source: ApiError,
    },
    #[error("alert generation failed: {0}")]
    Generate(#[source] ApiError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("alert {0} is not loaded")]
    UnknownAlert(String),
}

impl DashboardError {
    /// Message shown to the operator for a failed status save.
    pub fn update_message(alert_id: &str) -> String {
        format!("Failed to update status for alert {alert_id}. The previous status was kept.")
    }
}
