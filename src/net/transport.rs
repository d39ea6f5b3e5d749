use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::TransportError;

pub use reqwest::Method;

/// HTTP request timeout in seconds.
/// Tile servers can be slow; 30s fails fast enough that strategy fallback
/// still feels responsive.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// An intercepted outbound resource request.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: String,
    /// True for a full-page navigation (top-level document load).
    pub navigation: bool,
}

impl ResourceRequest {
    /// A plain GET subresource request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            navigation: false,
        }
    }

    /// A full-page navigation request.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            navigation: true,
        }
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            navigation: false,
        }
    }
}

/// A complete response: status, headers, and the fully received body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResourceResponse {
    /// A 200 response with the given body. Convenient for tests and
    /// fixtures.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Performs the actual network fetch for a resource request.
///
/// Any failure — transport error, timeout, non-success status — is a failed
/// fetch; the strategies treat them all as "network unavailable".
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, TransportError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, TransportError> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        // Full body before returning; callers may cache what they get back.
        let body = response.bytes().await?.to_vec();

        Ok(ResourceResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_constructors() {
        let get = ResourceRequest::get("https://example.test/app.js");
        assert_eq!(get.method, Method::GET);
        assert!(!get.navigation);

        let nav = ResourceRequest::navigation("https://example.test/");
        assert_eq!(nav.method, Method::GET);
        assert!(nav.navigation);

        let post = ResourceRequest::new(Method::POST, "https://example.test/api");
        assert_eq!(post.method, Method::POST);
        assert!(!post.navigation);
    }
}
