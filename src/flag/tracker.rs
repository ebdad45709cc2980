//! Unsaved-change detection for the flag form.
//!
//! The tracker keeps a snapshot of the last saved (or loaded) form and
//! compares the live form against it on every observation. Only the
//! significant fields count, and each has its own notion of equality so
//! that scaffolding churn does not look like a user edit.

use std::sync::Arc;
use tracing::debug;

use super::types::{FlagFormState, Variation};

/// Host hook that asks for confirmation before navigating away.
///
/// `engage` is called when the form becomes dirty and `release` when it
/// becomes clean again. Calls are edge-triggered: the tracker never
/// engages twice in a row.
pub trait NavigationGuard: Send + Sync {
    fn engage(&self);
    fn release(&self);
}

/// Fields whose changes make the form dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignificantField {
    Name,
    Key,
    Description,
    Variations,
    VariationType,
}

impl SignificantField {
    pub const ALL: [SignificantField; 5] = [
        SignificantField::Name,
        SignificantField::Key,
        SignificantField::Description,
        SignificantField::Variations,
        SignificantField::VariationType,
    ];

    /// Whether this field differs between `old` and `new`.
    pub fn changed(&self, old: &FlagFormState, new: &FlagFormState) -> bool {
        match self {
            SignificantField::Name => text_changed(old.name.as_deref(), new.name.as_deref()),
            SignificantField::Key => text_changed(old.key.as_deref(), new.key.as_deref()),
            SignificantField::Description => {
                text_changed(old.description.as_deref(), new.description.as_deref())
            }
            SignificantField::Variations => variations_changed(&old.variations, &new.variations),
            SignificantField::VariationType => old.variation_type != new.variation_type,
        }
    }
}

/// Significant fields that differ between two states.
pub fn changed_fields(old: &FlagFormState, new: &FlagFormState) -> Vec<SignificantField> {
    SignificantField::ALL
        .into_iter()
        .filter(|field| field.changed(old, new))
        .collect()
}

/// Missing and empty text are the same value.
pub fn text_changed(old: Option<&str>, new: Option<&str>) -> bool {
    old.unwrap_or("") != new.unwrap_or("")
}

/// Order-sensitive deep comparison, except that two boolean default pairs
/// are always equal.
pub fn variations_changed(old: &[Variation], new: &[Variation]) -> bool {
    if is_boolean_default(old) && is_boolean_default(new) {
        return false;
    }
    old != new
}

/// Tags are compared deeply but never make the form dirty.
pub fn tags_changed(old: &[String], new: &[String]) -> bool {
    old != new
}

fn is_boolean_default(variations: &[Variation]) -> bool {
    match variations {
        [first, second] => {
            first.name == "True"
                && first.value.as_bool() == Some(true)
                && second.name == "False"
                && second.value.as_bool() == Some(false)
        }
        _ => false,
    }
}

/// Tracks whether the live form differs from the last saved snapshot.
#[derive(Default)]
pub struct ChangeTracker {
    last_saved: Option<FlagFormState>,
    has_unsaved_changes: bool,
    guard: Option<Arc<dyn NavigationGuard>>,
    guard_engaged: bool,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guard(guard: Arc<dyn NavigationGuard>) -> Self {
        Self {
            last_saved: None,
            has_unsaved_changes: false,
            guard: Some(guard),
            guard_engaged: false,
        }
    }

    /// Evaluate the live form and return whether it has unsaved changes.
    ///
    /// The first observation, and any observation of an empty form, adopts
    /// the state as the new snapshot and reports clean.
    pub fn observe(&mut self, current: &FlagFormState) -> bool {
        let Some(last_saved) = self.last_saved.as_ref() else {
            self.adopt(current.clone());
            return false;
        };

        if current.is_empty() {
            self.adopt(current.clone());
            return false;
        }

        let changed = changed_fields(last_saved, current);
        if !changed.is_empty() {
            debug!("[tracker] changed fields: {:?}", changed);
        }
        self.set_dirty(!changed.is_empty());
        self.has_unsaved_changes
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn last_saved(&self) -> Option<&FlagFormState> {
        self.last_saved.as_ref()
    }

    /// Adopt `current` as the snapshot after a successful persist.
    pub fn mark_as_saved(&mut self, current: &FlagFormState) {
        self.adopt(current.clone());
    }

    /// Replace the snapshot explicitly, e.g. after a deliberate form reset.
    pub fn reset_last_saved_state(&mut self, state: FlagFormState) {
        self.adopt(state);
    }

    fn adopt(&mut self, state: FlagFormState) {
        self.last_saved = Some(state);
        self.set_dirty(false);
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.has_unsaved_changes = dirty;
        if dirty == self.guard_engaged {
            return;
        }
        if let Some(guard) = &self.guard {
            if dirty {
                guard.engage();
            } else {
                guard.release();
            }
        }
        self.guard_engaged = dirty;
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        if self.guard_engaged {
            if let Some(guard) = &self.guard {
                guard.release();
            }
        }
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("last_saved", &self.last_saved)
            .field("has_unsaved_changes", &self.has_unsaved_changes)
            .field("guard_engaged", &self.guard_engaged)
            .finish()
    }
}
