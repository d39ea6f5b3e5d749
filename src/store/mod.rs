//! Durable entity persistence for points and connections.
//!
//! This module provides the `EntityStore`, a file-backed document store with
//! cascading-delete referential integrity: deleting a point removes every
//! connection that references it, on either side, as a single atomic commit.

pub mod entity;

pub use entity::EntityStore;
