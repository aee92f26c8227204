use crate::models::{AlertRecord, AlertStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Viewing,
    Editing { pending: AlertStatus },
    Saving { pending: AlertStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub alert_id: String,
    pub from: AlertStatus,
    pub to: AlertStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Pending value equals the current status; nothing to send.
    Unchanged,
    Submit(StatusChange),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("alert {0} is not being edited")]
    NotEditing(String),
    #[error("alert {0} is already being edited")]
    AlreadyEditing(String),
    #[error("a status update for alert {0} is already in flight")]
    SaveInFlight(String),
    #[error("alert {0} has no save in flight")]
    NotSaving(String),
}

/// Status editing for one displayed alert.
///
/// `current` only changes when a save settles successfully, so the status
/// shown while a request is outstanding (or after it fails) is always the last
/// confirmed one.
#[derive(Debug, Clone)]
pub struct StatusEditor {
    alert_id: String,
    current: AlertStatus,
    state: EditState,
}

impl StatusEditor {
    pub fn new(alert: &AlertRecord) -> Self {
        Self {
            alert_id: alert.id.clone(),
            current: alert.status,
            state: EditState::Viewing,
        }
    }

    pub fn alert_id(&self) -> &str {
        &self.alert_id
    }

    pub fn current(&self) -> AlertStatus {
        self.current
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn begin_edit(&mut self) -> Result<(), WorkflowError> {
        match self.state {
            EditState::Viewing => {
                self.state = EditState::Editing {
                    pending: self.current,
                };
                Ok(())
            }
            EditState::Editing { .. } => Err(WorkflowError::AlreadyEditing(self.alert_id.clone())),
            EditState::Saving { .. } => Err(WorkflowError::SaveInFlight(self.alert_id.clone())),
        }
    }

    pub fn select(&mut self, status: AlertStatus) -> Result<(), WorkflowError> {
        match self.state {
            EditState::Editing { .. } => {
                self.state = EditState::Editing { pending: status };
                Ok(())
            }
            EditState::Viewing => Err(WorkflowError::NotEditing(self.alert_id.clone())),
            EditState::Saving { .. } => Err(WorkflowError::SaveInFlight(self.alert_id.clone())),
        }
    }

    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        match self.state {
            EditState::Editing { .. } => {
                self.state = EditState::Viewing;
                Ok(())
            }
            EditState::Viewing => Err(WorkflowError::NotEditing(self.alert_id.clone())),
            EditState::Saving { .. } => Err(WorkflowError::SaveInFlight(self.alert_id.clone())),
        }
    }

    pub fn confirm(&mut self) -> Result<Confirmation, WorkflowError> {
        match self.state {
            EditState::Editing { pending } if pending == self.current => {
                self.state = EditState::Viewing;
                Ok(Confirmation::Unchanged)
            }
            EditState::Editing { pending } => {
                self.state = EditState::Saving { pending };
                Ok(Confirmation::Submit(StatusChange {
                    alert_id: self.alert_id.clone(),
                    from: self.current,
                    to: pending,
                }))
            }
            EditState::Viewing => Err(WorkflowError::NotEditing(self.alert_id.clone())),
            EditState::Saving { .. } => Err(WorkflowError::SaveInFlight(self.alert_id.clone())),
        }
    }

    /// Ends a save. A failed save leaves `current` as it was before the edit.
    pub fn settle(&mut self, succeeded: bool) -> Result<(), WorkflowError> {
        match self.state {
            EditState::Saving { pending } => {
                if succeeded {
                    self.current = pending;
                }
                self.state = EditState::Viewing;
                Ok(())
            }
            _ => Err(WorkflowError::NotSaving(self.alert_id.clone())),
        }
    }
}
