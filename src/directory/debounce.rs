//! Debounced flag search.
//!
//! Each submitted query restarts the delay and aborts any pending task.
//! Results carry the generation they were started in; a result whose
//! generation is no longer current is discarded instead of delivered.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Outcome of one debounced search.
#[derive(Debug)]
pub struct SearchResult<T> {
    pub generation: u64,
    pub query: String,
    pub outcome: T,
}

pub struct SearchDebouncer<T> {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    results: mpsc::UnboundedSender<SearchResult<T>>,
}

impl<T: Send + 'static> SearchDebouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<SearchResult<T>>) {
        let (results, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            results,
        };
        (debouncer, rx)
    }

    /// Schedule `fetch(query)` after the delay, replacing any pending search.
    pub fn submit<F, Fut>(&mut self, query: impl Into<String>, fetch: F) -> u64
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        let results = self.results.clone();
        let delay = self.delay;
        let query = query.into();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = fetch(query.clone()).await;

            if current.load(Ordering::SeqCst) != generation {
                debug!("[search] discarding stale result for {:?}", query);
                return;
            }
            let _ = results.send(SearchResult {
                generation,
                query,
                outcome,
            });
        }));

        generation
    }

    /// Drop any pending search; late results are discarded.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

impl<T> Drop for SearchDebouncer<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
