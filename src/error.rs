//! Error taxonomies for the entity store and the resource cache.

use thiserror::Error;

/// Errors surfaced by the entity store.
///
/// Every failed operation is reported to the caller; nothing is silently
/// swallowed. A failed cascading delete reports the whole operation failed
/// and leaves the previous document intact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened (unreadable or corrupt document,
    /// inaccessible directory).
    #[error("store is unavailable: {0}")]
    Unavailable(String),

    /// An operation was invoked before `open()` completed successfully.
    #[error("store has not been opened")]
    NotInitialized,

    /// The record to update does not exist.
    #[error("no point with id {0}")]
    NotFound(u64),

    /// A connection endpoint does not exist in the point collection.
    #[error("connection endpoint {0} does not exist")]
    DanglingReference(u64),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),
}

/// Errors surfaced by the resource cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The request has neither a usable cache entry nor network
    /// reachability. Expected and non-fatal for resources outside the app
    /// shell; should never occur for a navigation after a successful
    /// install.
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// The app-shell manifest could not be fully pre-cached. The previous
    /// generation remains active.
    #[error("app shell install failed: {0}")]
    InstallFailed(String),

    /// Activation was requested before any install succeeded.
    #[error("generation was never installed")]
    NotInstalled,

    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry metadata on disk did not parse. Treated as a miss at the serve
    /// layer.
    #[error("corrupt cache entry: {0}")]
    BadEntry(String),
}

/// Errors from the network transport. All variants are treated uniformly as
/// "network unavailable" for strategy fallback purposes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The network could not be reached at all.
    #[error("network unreachable")]
    Unreachable,
}
