//! Generation-keyed persistent cache for network responses.
//!
//! A generation is a named directory of cached responses. Exactly one
//! generation is servable at a time; bumping the configured generation name
//! and activating is the sole mechanism for invalidating everything cached
//! under the old name.

pub mod generation;

pub use generation::{CacheStorage, Generation};
