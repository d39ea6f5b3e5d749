//! Resource cache controller: classification, serve strategies, and the
//! generation lifecycle.
//!
//! The controller sits between the application's outbound resource requests
//! and the network. Every GET is classified once against an ordered rule
//! table and served by the matching strategy; non-GET requests pass straight
//! through to the transport. Deployments move through
//! `Installing -> Installed -> Activating -> Active`, and an instance whose
//! generation has been garbage-collected by a newer deployment is
//! `Superseded`.

pub mod classify;

pub use classify::{ClassificationTable, Strategy};

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheStorage, Generation};
use crate::config::Config;
use crate::error::CacheError;
use crate::net::{Method, ResourceRequest, ResourceResponse, Transport};

/// Concurrent fetches while pre-caching the app-shell manifest.
/// Polite to the origin while keeping install latency low.
const MAX_CONCURRENT_INSTALL_FETCHES: usize = 8;

/// Lifecycle of one controller deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Installing,
    Installed,
    Activating,
    Active,
    Superseded,
}

/// Interception layer serving resource requests from a cache generation, the
/// network, or both.
pub struct ResourceCacheController<T: Transport> {
    config: Config,
    storage: CacheStorage,
    table: ClassificationTable,
    transport: Arc<T>,
    state: Mutex<Lifecycle>,
}

impl<T: Transport + 'static> ResourceCacheController<T> {
    pub fn new(config: Config, storage: CacheStorage, transport: T) -> Self {
        let table = ClassificationTable::new(&config.app_shell, &config.tile_hosts);
        Self {
            config,
            storage,
            table,
            transport: Arc::new(transport),
            state: Mutex::new(Lifecycle::Installing),
        }
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.state.lock().await
    }

    /// Install the configured generation: fetch the entire app-shell
    /// manifest into a staging area and commit it atomically. Any fetch
    /// failure aborts the whole install and leaves whatever generation was
    /// previously on disk untouched.
    pub async fn install(&self) -> Result<(), CacheError> {
        *self.state.lock().await = Lifecycle::Installing;
        info!(generation = %self.config.generation, "installing");

        let transport = Arc::clone(&self.transport);
        let fetched: Vec<Result<(String, ResourceResponse), String>> =
            stream::iter(self.config.app_shell.clone())
                .map(|url| {
                    let transport = Arc::clone(&transport);
                    async move {
                        let request = ResourceRequest::get(url.clone());
                        match transport.fetch(&request).await {
                            Ok(response) => Ok((url, response)),
                            Err(e) => Err(format!("{url}: {e}")),
                        }
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_INSTALL_FETCHES)
                .collect()
                .await;

        let mut responses = Vec::with_capacity(fetched.len());
        for result in fetched {
            match result {
                Ok(entry) => responses.push(entry),
                Err(reason) => {
                    warn!(error = %reason, "app shell fetch failed, install aborted");
                    return Err(CacheError::InstallFailed(reason));
                }
            }
        }

        let staging = self.storage.staging(&self.config.generation)?;
        for (url, response) in &responses {
            if let Err(e) = staging.store("GET", url, response) {
                let _ = self.storage.discard_staging(&self.config.generation);
                return Err(e);
            }
        }
        if let Err(e) = self.storage.commit_staging(&self.config.generation) {
            let _ = self.storage.discard_staging(&self.config.generation);
            return Err(e);
        }

        *self.state.lock().await = Lifecycle::Installed;
        info!(
            generation = %self.config.generation,
            urls = responses.len(),
            "app shell cached"
        );
        Ok(())
    }

    /// Activate immediately, bypassing any wait: delete every generation
    /// whose name differs from the configured one and start serving. Refused
    /// until an install has succeeded, so a failed install leaves the prior
    /// generation in charge.
    pub async fn take_over(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().await;
        if !matches!(*state, Lifecycle::Installed | Lifecycle::Active) {
            return Err(CacheError::NotInstalled);
        }
        *state = Lifecycle::Activating;
        let removed = self.storage.retain_only(&self.config.generation)?;
        *state = Lifecycle::Active;
        info!(generation = %self.config.generation, removed, "generation active");
        Ok(())
    }

    /// Handle one intercepted resource request.
    pub async fn serve(&self, request: &ResourceRequest) -> Result<ResourceResponse, CacheError> {
        if request.method != Method::GET {
            debug!(method = %request.method, url = %request.url, "non-GET passthrough");
            return self.passthrough(request).await;
        }

        if !self.cache_active().await {
            return self.passthrough(request).await;
        }

        let generation = self.storage.generation(&self.config.generation)?;
        match self.table.classify(request) {
            Strategy::CacheFirst => self.cache_first(&generation, request).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(&generation, request).await
            }
            Strategy::NetworkFirst => self.network_first(&generation, request).await,
        }
    }

    /// Only an active deployment reads or writes its generation; in every
    /// other state the controller is a plain network proxy. An active
    /// controller whose generation has been deleted was superseded by a
    /// newer deployment and must not resurrect it.
    async fn cache_active(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            Lifecycle::Active if self.storage.exists(&self.config.generation) => true,
            Lifecycle::Active => {
                warn!(
                    generation = %self.config.generation,
                    "generation deleted by a newer deployment"
                );
                *state = Lifecycle::Superseded;
                false
            }
            _ => false,
        }
    }

    async fn passthrough(&self, request: &ResourceRequest) -> Result<ResourceResponse, CacheError> {
        self.transport.fetch(request).await.map_err(|e| {
            debug!(url = %request.url, error = %e, "passthrough fetch failed");
            CacheError::Unavailable(request.url.clone())
        })
    }

    /// Tier 1: cached entry wins outright; the network is only consulted on
    /// a miss. A navigation that can reach neither falls back to the
    /// pre-cached root document so the shell stays reachable offline.
    async fn cache_first(
        &self,
        generation: &Generation,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, CacheError> {
        if let Some(hit) = lookup_logged(generation, request) {
            return Ok(hit);
        }

        match self.transport.fetch(request).await {
            Ok(response) => {
                store_logged(generation, request, &response);
                Ok(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "cache-first fetch failed");
                if request.navigation {
                    let root = ResourceRequest::get(self.config.root_document.clone());
                    if let Some(shell) = lookup_logged(generation, &root) {
                        info!(url = %request.url, "serving root document fallback");
                        return Ok(shell);
                    }
                }
                Err(CacheError::Unavailable(request.url.clone()))
            }
        }
    }

    /// Tier 2: return the cached entry immediately and refresh it in a
    /// detached task; the current response never waits on the refresh. A
    /// miss awaits the fetch instead.
    async fn stale_while_revalidate(
        &self,
        generation: &Generation,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, CacheError> {
        let cached = lookup_logged(generation, request);

        let transport = Arc::clone(&self.transport);
        let refresh_request = request.clone();
        let refresh_generation = generation.clone();
        let refresh = tokio::spawn(async move {
            match transport.fetch(&refresh_request).await {
                Ok(response) => {
                    store_logged(&refresh_generation, &refresh_request, &response);
                    Some(response)
                }
                Err(e) => {
                    debug!(url = %refresh_request.url, error = %e, "revalidation fetch failed");
                    None
                }
            }
        });

        match cached {
            Some(hit) => {
                debug!(url = %request.url, "serving stale entry, revalidating in background");
                Ok(hit)
            }
            None => match refresh.await {
                Ok(Some(response)) => Ok(response),
                _ => Err(CacheError::Unavailable(request.url.clone())),
            },
        }
    }

    /// Tier 3: favor freshness; the cache is only a fallback for a dead
    /// network.
    async fn network_first(
        &self,
        generation: &Generation,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, CacheError> {
        match self.transport.fetch(request).await {
            Ok(response) => {
                store_logged(generation, request, &response);
                Ok(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "falling back to cache");
                lookup_logged(generation, request)
                    .ok_or_else(|| CacheError::Unavailable(request.url.clone()))
            }
        }
    }
}

/// A cache read error is logged and treated as a miss, never a request
/// failure.
fn lookup_logged(generation: &Generation, request: &ResourceRequest) -> Option<ResourceResponse> {
    match generation.lookup(request.method.as_str(), &request.url) {
        Ok(hit) => hit,
        Err(e) => {
            warn!(
                generation = %generation.name(),
                url = %request.url,
                error = %e,
                "cache read failed, treating as miss"
            );
            None
        }
    }
}

/// A cache write error after a successful fetch is logged; the fresh
/// response is still returned to the requester.
fn store_logged(generation: &Generation, request: &ResourceRequest, response: &ResourceResponse) {
    if let Err(e) = generation.store(request.method.as_str(), &request.url, response) {
        warn!(
            generation = %generation.name(),
            url = %request.url,
            error = %e,
            "cache write failed"
        );
    }
}
