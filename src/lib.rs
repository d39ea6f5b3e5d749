//! Offline-first core for a map/point-annotation application.
//!
//! Two independently schedulable components:
//!
//! - [`EntityStore`]: durable async CRUD for geographic points and the
//!   directed connections between them, with cascading-delete referential
//!   integrity.
//! - [`ResourceCacheController`]: an interception layer between the
//!   application's outbound resource requests and the network, serving each
//!   GET from a named cache generation, the network, or both, and managing
//!   the generation lifecycle across deployments.
//!
//! The application calls the store directly for domain data and is otherwise
//! unaware of the controller, which operates transparently at the
//! network-interception boundary. UI concerns (rendering, map display,
//! export) live in the consuming application.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod net;
pub mod store;

pub use cache::CacheStorage;
pub use config::Config;
pub use controller::{Lifecycle, ResourceCacheController, Strategy};
pub use error::{CacheError, StoreError, TransportError};
pub use models::{Connection, ConnectionDraft, Point, PointDraft, PointPatch};
pub use net::{HttpTransport, Method, ResourceRequest, ResourceResponse, Transport};
pub use store::EntityStore;
