//! Entry editor session.
//!
//! Owns the form, its change tracker and mode workflow, and the display
//! content for each variation. Host services come in through ports so a
//! session can run without the host environment.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::mapping::{self, ContentResolver, LinkedContent};
use super::tracker::{ChangeTracker, NavigationGuard};
use super::types::{
    validate_flag_key, validate_flag_name, FlagFormState, FlagMode, PersistedEntry, Variation,
    VariationType,
};
use super::workflow::{ModeEffect, ModeRequest, ModeWorkflow, PendingModeChange, WorkflowError};
use crate::directory::{
    CreateFlagRequest, DirectoryError, Flag, SearchDebouncer, SearchResult, SEARCH_DEBOUNCE,
};

/// A finished directory search, tagged with the generation it ran in.
pub type FlagSearch = SearchResult<Result<Vec<Flag>, DirectoryError>>;

/// Error from the host entry store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("entry store: {0}")]
pub struct StoreError(pub String);

/// Reads and writes the entry's persisted fields.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn load(&self) -> Result<PersistedEntry, StoreError>;
    async fn save(&self, entry: &PersistedEntry) -> Result<(), StoreError>;
}

/// Flag listing and creation, usually a [`crate::directory::DirectoryClient`].
#[async_trait]
pub trait FlagSource: Send + Sync {
    async fn list_flags(
        &self,
        project_key: &str,
        search: &str,
    ) -> Result<Vec<Flag>, DirectoryError>;
    async fn create_flag(
        &self,
        project_key: &str,
        flag: &CreateFlagRequest,
    ) -> Result<Flag, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("choose whether to create a new flag or link an existing one first")]
    ModeRequired,
    #[error("this action is only available in {0} mode")]
    WrongMode(FlagMode),
    #[error("flag key cannot change once the flag exists")]
    KeyImmutable,
    #[error("flag has already been created")]
    AlreadyCreated,
    #[error("invalid flag key {0:?}")]
    InvalidKey(String),
    #[error("flag name must be 1 to 100 characters")]
    InvalidName,
    #[error("variation {index} is not a valid {kind} value")]
    InvalidVariation { index: usize, kind: VariationType },
    #[error("variation {index} does not exist (flag has {len})")]
    VariationOutOfRange { index: usize, len: usize },
    #[error("a flag key is required before saving")]
    MissingKey,
    #[error("no project selected")]
    MissingProjectKey,
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Dismissible error message shown above the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBanner {
    message: Option<String>,
}

impl ErrorBanner {
    pub fn show(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn dismiss(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Outcome of [`FlagEditor::request_mode_change`].
#[derive(Debug, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged,
    Applied(FlagMode),
    /// Unsaved edits would be lost; pass this to `confirm_mode_change` or `cancel_mode_change`
    NeedsConfirmation(PendingModeChange),
}

pub struct FlagEditor {
    store: Arc<dyn EntryStore>,
    resolver: Arc<dyn ContentResolver>,
    flags: Arc<dyn FlagSource>,
    form: FlagFormState,
    content: BTreeMap<usize, LinkedContent>,
    tracker: ChangeTracker,
    workflow: ModeWorkflow,
    directory: Vec<Flag>,
    search: SearchDebouncer<Result<Vec<Flag>, DirectoryError>>,
    search_results: mpsc::UnboundedReceiver<FlagSearch>,
    flag_created: bool,
    error: ErrorBanner,
}

impl FlagEditor {
    pub fn new(
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn ContentResolver>,
        flags: Arc<dyn FlagSource>,
    ) -> Self {
        Self::with_tracker(store, resolver, flags, ChangeTracker::new())
    }

    pub fn with_guard(
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn ContentResolver>,
        flags: Arc<dyn FlagSource>,
        guard: Arc<dyn NavigationGuard>,
    ) -> Self {
        Self::with_tracker(store, resolver, flags, ChangeTracker::with_guard(guard))
    }

    fn with_tracker(
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn ContentResolver>,
        flags: Arc<dyn FlagSource>,
        mut tracker: ChangeTracker,
    ) -> Self {
        let form = FlagFormState::default();
        tracker.observe(&form);
        let (search, search_results) = SearchDebouncer::new(SEARCH_DEBOUNCE);
        Self {
            store,
            resolver,
            flags,
            form,
            content: BTreeMap::new(),
            tracker,
            workflow: ModeWorkflow::new(),
            directory: Vec::new(),
            search,
            search_results,
            flag_created: false,
            error: ErrorBanner::default(),
        }
    }

    /// Replace the search debounce delay.
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        let (search, search_results) = SearchDebouncer::new(delay);
        self.search = search;
        self.search_results = search_results;
        self
    }

    pub fn form(&self) -> &FlagFormState {
        &self.form
    }

    pub fn mode(&self) -> FlagMode {
        self.workflow.mode()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.tracker.has_unsaved_changes()
    }

    pub fn content(&self) -> &BTreeMap<usize, LinkedContent> {
        &self.content
    }

    pub fn directory_flags(&self) -> &[Flag] {
        &self.directory
    }

    pub fn error(&self) -> &ErrorBanner {
        &self.error
    }

    pub fn dismiss_error(&mut self) {
        self.error.dismiss();
    }

    /// Hydrate the session from the entry's persisted fields.
    pub async fn load(&mut self) -> Result<(), EditorError> {
        let loaded = self.store.load().await;
        let entry = match loaded {
            Ok(entry) => entry,
            Err(e) => return Err(self.fail(e.into())),
        };

        let mut form = FlagFormState::from_persisted(&entry);
        self.content = mapping::hydrate(&form.content_mappings, self.resolver.as_ref()).await;
        form.content_mappings = mapping::project(&self.content);

        self.flag_created = form.mode == FlagMode::New && !form.key().is_empty();
        self.workflow = ModeWorkflow::resume(form.mode);
        self.tracker.reset_last_saved_state(form.clone());
        self.form = form;
        info!(
            "[editor] loaded entry in {} mode with {} mapped variations",
            self.form.mode,
            self.content.len()
        );

        if self.form.mode == FlagMode::Existing && self.form.project_key.is_some() {
            // A failed listing leaves the loaded form usable
            let _ = self.refresh_flags("").await;
        }
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = Some(name.into());
        self.observe();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.form.description = Some(description.into());
        self.observe();
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> Result<(), EditorError> {
        match self.mode() {
            FlagMode::Unset => return Err(EditorError::ModeRequired),
            FlagMode::Existing => return Err(EditorError::KeyImmutable),
            FlagMode::New if self.flag_created => return Err(EditorError::KeyImmutable),
            FlagMode::New => {}
        }
        self.form.key = Some(key.into());
        self.observe();
        Ok(())
    }

    /// Change the value domain; variations that no longer fit are replaced
    /// by the type's defaults.
    pub fn set_variation_type(&mut self, kind: VariationType) -> Result<(), EditorError> {
        self.require_mode(FlagMode::New)?;
        if self.flag_created {
            return Err(EditorError::AlreadyCreated);
        }
        self.form.variation_type = kind;
        if self.form.variations.is_empty()
            || !self.form.variations.iter().all(|v| kind.accepts(&v.value))
        {
            self.form.variations = kind.default_variations();
        }
        self.observe();
        Ok(())
    }

    pub fn set_variations(&mut self, variations: Vec<Variation>) -> Result<(), EditorError> {
        if self.mode() == FlagMode::Unset {
            return Err(EditorError::ModeRequired);
        }
        let kind = self.form.variation_type;
        if let Some(index) = variations.iter().position(|v| !kind.accepts(&v.value)) {
            return Err(EditorError::InvalidVariation { index, kind });
        }
        self.form.variations = variations;
        self.observe();
        Ok(())
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.form.tags = tags;
        self.observe();
    }

    pub fn set_temporary(&mut self, temporary: bool) {
        self.form.temporary = temporary;
        self.observe();
    }

    pub fn set_project_key(&mut self, project_key: Option<String>) {
        self.form.project_key = project_key.filter(|k| !k.trim().is_empty());
        self.observe();
    }

    /// Link content to a variation.
    pub fn link_content(
        &mut self,
        index: usize,
        content: impl Into<LinkedContent>,
    ) -> Result<(), EditorError> {
        let len = self.form.variations.len();
        if index >= len {
            return Err(EditorError::VariationOutOfRange { index, len });
        }
        self.content.insert(index, content.into());
        self.form.content_mappings = mapping::project(&self.content);
        self.observe();
        Ok(())
    }

    pub fn unlink_content(&mut self, index: usize) -> Option<LinkedContent> {
        let removed = self.content.remove(&index);
        self.form.content_mappings = mapping::project(&self.content);
        self.observe();
        removed
    }

    /// Fill the form from a flag chosen in the directory.
    pub fn select_flag(&mut self, flag: &Flag) -> Result<(), EditorError> {
        self.require_mode(FlagMode::Existing)?;
        self.form.name = Some(flag.name.clone());
        self.form.key = Some(flag.key.clone());
        self.form.description = flag.description.clone();
        self.form.variations = flag.variations.clone();
        if let Some(kind) = flag.kind {
            self.form.variation_type = kind;
        }
        self.form.tags = flag.tags.clone();
        self.form.temporary = flag.temporary;
        self.form.existing_flag_key = Some(flag.key.clone());
        self.observe();
        Ok(())
    }

    /// Ask to switch workflows. Dirty forms outside `Unset` need confirmation.
    pub async fn request_mode_change(
        &mut self,
        target: FlagMode,
    ) -> Result<ModeChange, EditorError> {
        let request = match self.workflow.request(target, self.has_unsaved_changes()) {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e.into())),
        };
        match request {
            ModeRequest::Unchanged => Ok(ModeChange::Unchanged),
            ModeRequest::NeedsConfirmation(pending) => Ok(ModeChange::NeedsConfirmation(pending)),
            ModeRequest::Applied(effect) => {
                self.apply_mode_effect(effect).await;
                Ok(ModeChange::Applied(effect.mode))
            }
        }
    }

    pub async fn confirm_mode_change(
        &mut self,
        pending: PendingModeChange,
    ) -> Result<FlagMode, EditorError> {
        let effect = match self.workflow.confirm(pending) {
            Ok(effect) => effect,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.apply_mode_effect(effect).await;
        Ok(effect.mode)
    }

    pub fn cancel_mode_change(&mut self, pending: PendingModeChange) -> FlagMode {
        self.workflow.cancel(pending)
    }

    /// Reload the directory listing for the current project.
    pub async fn refresh_flags(&mut self, search: &str) -> Result<(), EditorError> {
        let Some(project_key) = self.form.project_key.clone() else {
            return Err(self.fail(EditorError::MissingProjectKey));
        };
        let listed = self.flags.list_flags(&project_key, search).await;
        match listed {
            Ok(flags) => {
                self.directory = flags;
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Schedule a debounced directory search, superseding any pending one.
    ///
    /// Must be called inside a tokio runtime. Collect the outcome with
    /// [`FlagEditor::next_search`].
    pub fn search_flags(&mut self, query: impl Into<String>) -> Result<u64, EditorError> {
        let Some(project_key) = self.form.project_key.clone() else {
            return Err(self.fail(EditorError::MissingProjectKey));
        };
        let flags = self.flags.clone();
        Ok(self.search.submit(query, move |query| async move {
            flags.list_flags(&project_key, &query).await
        }))
    }

    /// Wait for the next search result and apply it.
    pub async fn next_search(&mut self) -> Result<bool, EditorError> {
        let received = self.search_results.recv().await;
        match received {
            Some(result) => self.apply_search(result),
            None => Ok(false),
        }
    }

    /// Apply a search result. Results from a superseded search are
    /// ignored and reported as `Ok(false)`.
    pub fn apply_search(&mut self, result: FlagSearch) -> Result<bool, EditorError> {
        if !self.search.is_current(result.generation) {
            debug!("[editor] ignoring stale search for {:?}", result.query);
            return Ok(false);
        }
        match result.outcome {
            Ok(flags) => {
                self.directory = flags;
                Ok(true)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Create the form's flag upstream. The key is fixed afterwards.
    pub async fn create_flag(&mut self) -> Result<Flag, EditorError> {
        if let Err(e) = self.validate_new_flag() {
            return Err(self.fail(e));
        }
        let Some(project_key) = self.form.project_key.clone() else {
            return Err(self.fail(EditorError::MissingProjectKey));
        };

        let request = CreateFlagRequest {
            name: self.form.name().to_string(),
            key: self.form.key().to_string(),
            description: self.form.description.clone().filter(|d| !d.is_empty()),
            kind: self.form.variation_type,
            variations: self.form.variations.clone(),
            tags: self.form.tags.clone(),
            temporary: self.form.temporary,
        };
        let created = self.flags.create_flag(&project_key, &request).await;
        match created {
            Ok(flag) => {
                info!("[editor] created flag {} in {}", flag.key, project_key);
                self.flag_created = true;
                self.form.existing_flag_key = Some(flag.key.clone());
                self.error.dismiss();
                Ok(flag)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Persist the form. On failure the form and snapshot are untouched.
    pub async fn save(&mut self) -> Result<(), EditorError> {
        if self.form.key().is_empty() {
            return Err(self.fail(EditorError::MissingKey));
        }

        let mut saved = self.form.clone();
        saved.content_mappings = mapping::project(&self.content);
        let stored = self.store.save(&saved.to_persisted()).await;
        if let Err(e) = stored {
            return Err(self.fail(e.into()));
        }

        self.form = saved;
        self.tracker.mark_as_saved(&self.form);
        self.error.dismiss();
        info!("[editor] saved flag mapping for {}", self.form.key());
        Ok(())
    }

    async fn apply_mode_effect(&mut self, effect: ModeEffect) {
        if effect.reset_form {
            self.form = FlagFormState::reset_for(effect.mode, self.form.project_key.clone());
            self.content.clear();
            self.directory.clear();
            self.search.cancel();
            self.flag_created = false;
            self.tracker.reset_last_saved_state(self.form.clone());
        } else {
            self.form.mode = effect.mode;
        }

        if effect.reload_directory && self.form.project_key.is_some() {
            let _ = self.refresh_flags("").await;
        }
    }

    fn validate_new_flag(&self) -> Result<(), EditorError> {
        self.require_mode(FlagMode::New)?;
        if self.flag_created {
            return Err(EditorError::AlreadyCreated);
        }
        if !validate_flag_name(self.form.name()) {
            return Err(EditorError::InvalidName);
        }
        if !validate_flag_key(self.form.key()) {
            return Err(EditorError::InvalidKey(self.form.key().to_string()));
        }
        let kind = self.form.variation_type;
        if let Some(index) = self.form.variations.iter().position(|v| !kind.accepts(&v.value)) {
            return Err(EditorError::InvalidVariation { index, kind });
        }
        Ok(())
    }

    fn require_mode(&self, mode: FlagMode) -> Result<(), EditorError> {
        match self.mode() {
            FlagMode::Unset => Err(EditorError::ModeRequired),
            current if current != mode => Err(EditorError::WrongMode(mode)),
            _ => Ok(()),
        }
    }

    fn observe(&mut self) {
        self.form.mode = self.workflow.mode();
        self.tracker.observe(&self.form);
    }

    fn fail(&mut self, error: EditorError) -> EditorError {
        warn!("[editor] {}", error);
        self.error.show(error.to_string());
        error
    }
}
