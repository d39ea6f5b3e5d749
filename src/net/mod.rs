//! Network transport for resource requests.
//!
//! The `Transport` trait is the seam between the cache controller and the
//! network; `HttpTransport` is the reqwest-backed implementation. Bodies are
//! read in full before a response is returned, so cache writes never observe
//! a partially received body.

pub mod transport;

pub use transport::{HttpTransport, Method, ResourceRequest, ResourceResponse, Transport};
