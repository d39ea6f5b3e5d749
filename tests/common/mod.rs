//! Shared fixtures for the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use waycache::{Config, ResourceRequest, ResourceResponse, Transport, TransportError};

/// Scripted transport: serves canned responses per URL, counts every fetch,
/// and can be switched offline. Clones share one script, so a test can keep
/// a handle to a transport it handed to a controller.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    routes: Mutex<HashMap<String, ResourceResponse>>,
    offline: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    pub fn route(&self, url: &str, body: &[u8]) {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(url.to_string(), ResourceResponse::ok(body.to_vec()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, TransportError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable);
        }
        match self.inner.routes.lock().unwrap().get(&request.url) {
            Some(response) => Ok(response.clone()),
            None => Err(TransportError::Status(404)),
        }
    }
}

pub const SHELL_INDEX: &str = "https://app.test/index.html";
pub const SHELL_MANIFEST: &str = "https://app.test/manifest.json";
pub const TILE_URL: &str = "https://tiles.example.org/3/4/2.png";

/// Controller configuration over the test app shell and tile host.
pub fn test_config(generation: &str) -> Config {
    Config {
        generation: generation.to_string(),
        app_shell: vec![SHELL_INDEX.to_string(), SHELL_MANIFEST.to_string()],
        root_document: SHELL_INDEX.to_string(),
        tile_hosts: vec!["tiles.example.org".to_string()],
    }
}

/// A transport pre-routed with the test app shell.
pub fn shell_transport() -> FakeTransport {
    let transport = FakeTransport::new();
    transport.route(SHELL_INDEX, b"<html>shell</html>");
    transport.route(SHELL_MANIFEST, b"{\"name\":\"waycache\"}");
    transport
}
