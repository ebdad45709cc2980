//! Flag-linking form engine.

pub mod editor;
pub mod mapping;
pub mod tracker;
pub mod types;
pub mod workflow;

pub use editor::{
    EditorError, EntryStore, ErrorBanner, FlagEditor, FlagSearch, FlagSource, ModeChange,
    StoreError,
};
pub use mapping::{ContentResolver, EntrySummary, LinkedContent, ResolveError};
pub use tracker::{ChangeTracker, NavigationGuard, SignificantField};
pub use types::{
    validate_flag_key, validate_flag_name, FlagFormState, FlagMode, PersistedEntry, Variation,
    VariationType,
};
pub use workflow::{ModeEffect, ModeRequest, ModeWorkflow, PendingModeChange, WorkflowError};
