//! Data models for the entity store.
//!
//! - `Point`: a user-created geographic point with an opaque attribute bag
//! - `Connection`: a directed edge between two points
//!
//! Drafts carry caller payloads into the store; the store assigns surrogate
//! ids and creation timestamps on insert.

pub mod connection;
pub mod point;

pub use connection::{Connection, ConnectionDraft};
pub use point::{Point, PointDraft, PointPatch};
