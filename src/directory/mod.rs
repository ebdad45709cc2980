//! Remote flag directory: projects, environments and flags.
//!
//! `upstream` talks to the flag service directly and is what the proxy
//! uses. `client` talks to the proxy and is what the editor uses.

pub mod client;
pub mod debounce;
pub mod error;
pub mod model;
pub mod upstream;

pub use client::{ActionRequest, ActionResponse, DirectoryClient, DEFAULT_TIMEOUT};
pub use debounce::{SearchDebouncer, SearchResult, SEARCH_DEBOUNCE};
pub use error::{error_message, DirectoryError, UpstreamError};
pub use model::{CreateFlagRequest, Environment, Flag, FlagStatus, Page, Project};
pub use upstream::{authorization_header, FlagService, Reply, DEFAULT_BASE_URL, PAGE_SIZE};
