//! Mode selection between creating a new flag and linking an existing one.

use super::types::FlagMode;

/// Error from mode transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("cannot return to the unset mode")]
    CannotUnset,
    #[error("pending change from {expected} is stale; mode is now {actual}")]
    StalePending { expected: FlagMode, actual: FlagMode },
}

/// What the owner of the form must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeEffect {
    /// Mode now in effect
    pub mode: FlagMode,
    /// Reset the form to empty (keeping the project key) and its snapshot
    pub reset_form: bool,
    /// Reload the flag directory listing
    pub reload_directory: bool,
}

impl ModeEffect {
    fn entering(mode: FlagMode) -> Self {
        Self {
            mode,
            reset_form: true,
            reload_directory: mode == FlagMode::Existing,
        }
    }
}

/// A transition waiting for the user to confirm discarding their edits.
///
/// Dropping it is the same as cancelling.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending mode change must be confirmed or cancelled"]
pub struct PendingModeChange {
    from: FlagMode,
    target: FlagMode,
}

impl PendingModeChange {
    pub fn from(&self) -> FlagMode {
        self.from
    }

    pub fn target(&self) -> FlagMode {
        self.target
    }
}

/// Result of asking for a mode change.
#[derive(Debug, PartialEq, Eq)]
pub enum ModeRequest {
    /// Already in the requested mode
    Unchanged,
    /// Transition happened
    Applied(ModeEffect),
    /// Unsaved edits would be lost; ask the user first
    NeedsConfirmation(PendingModeChange),
}

/// Tracks the active workflow.
///
/// `Unset` can only be left, never re-entered. `New` and `Existing` are
/// symmetric and each can switch to the other.
#[derive(Debug, Clone, Default)]
pub struct ModeWorkflow {
    mode: FlagMode,
}

impl ModeWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume in a mode restored from persisted state.
    pub fn resume(mode: FlagMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FlagMode {
        self.mode
    }

    pub fn request(
        &mut self,
        target: FlagMode,
        has_unsaved_changes: bool,
    ) -> Result<ModeRequest, WorkflowError> {
        if target == FlagMode::Unset {
            return Err(WorkflowError::CannotUnset);
        }
        if target == self.mode {
            return Ok(ModeRequest::Unchanged);
        }
        if has_unsaved_changes && self.mode != FlagMode::Unset {
            return Ok(ModeRequest::NeedsConfirmation(PendingModeChange {
                from: self.mode,
                target,
            }));
        }
        Ok(ModeRequest::Applied(self.enter(target)))
    }

    /// Apply a transition the user agreed to.
    pub fn confirm(&mut self, pending: PendingModeChange) -> Result<ModeEffect, WorkflowError> {
        if pending.from != self.mode {
            return Err(WorkflowError::StalePending {
                expected: pending.from,
                actual: self.mode,
            });
        }
        Ok(self.enter(pending.target))
    }

    /// Drop a transition; the mode stays as it was.
    pub fn cancel(&self, pending: PendingModeChange) -> FlagMode {
        tracing::debug!(
            "[workflow] cancelled switch from {} to {}",
            pending.from,
            pending.target
        );
        self.mode
    }

    fn enter(&mut self, target: FlagMode) -> ModeEffect {
        tracing::debug!("[workflow] {} -> {}", self.mode, target);
        self.mode = target;
        ModeEffect::entering(target)
    }
}
