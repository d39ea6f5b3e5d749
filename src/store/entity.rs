//! File-backed entity store with cascading-delete referential integrity.
//!
//! Both collections live in one JSON document so that a point delete and the
//! removal of its dependent connections commit as a single rename — either
//! everything lands or the previous document survives intact. Every
//! operation is a read-modify-write serialized on an internal mutex, so a
//! concurrent reader never observes a half-applied cascade.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Connection, ConnectionDraft, Point, PointDraft, PointPatch};

/// Current on-disk schema version.
/// v2 added the connections collection and the destination endpoint.
const SCHEMA_VERSION: u32 = 2;

/// On-disk document holding both collections and the surrogate-key counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Database {
    schema_version: u32,
    next_point_id: u64,
    next_connection_id: u64,
    points: BTreeMap<u64, Point>,
    connections: BTreeMap<u64, Connection>,
}

impl Database {
    fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            next_point_id: 1,
            next_connection_id: 1,
            points: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }
}

/// Asynchronous CRUD store for points and connections.
///
/// The store starts unopened; every operation other than [`open`] fails with
/// [`StoreError::NotInitialized`] until `open()` completes successfully.
///
/// [`open`]: EntityStore::open
pub struct EntityStore {
    path: PathBuf,
    opened: Mutex<bool>,
}

impl EntityStore {
    /// Create a handle for the document at `path`. Nothing touches the disk
    /// until [`open`](EntityStore::open) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            opened: Mutex::new(false),
        }
    }

    /// Open the store, creating the document if absent and migrating it if
    /// the on-disk schema version is older than [`SCHEMA_VERSION`].
    /// Idempotent: re-opening an open store is a logged no-op.
    pub async fn open(&self) -> Result<(), StoreError> {
        let mut opened = self.opened.lock().await;
        if *opened {
            debug!(path = %self.path.display(), "store already open");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let value: Value =
                serde_json::from_str(&raw).map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let (database, migrated) = migrate(value)?;
            if migrated {
                self.write(&database)
                    .map_err(StoreError::Unavailable)?;
                info!(
                    path = %self.path.display(),
                    version = SCHEMA_VERSION,
                    "store schema migrated"
                );
            }
        } else {
            self.write(&Database::empty())
                .map_err(StoreError::Unavailable)?;
            info!(path = %self.path.display(), "created new store");
        }

        *opened = true;
        Ok(())
    }

    /// Insert a new point, assigning its surrogate id and creation
    /// timestamp, and return the stored record.
    pub async fn add_point(&self, draft: PointDraft) -> Result<Point, StoreError> {
        let _guard = self.require_open().await?;
        let mut database = self.read().map_err(StoreError::ReadFailed)?;

        let point = Point {
            id: database.next_point_id,
            name: draft.name.unwrap_or_default(),
            created_at: Utc::now(),
            attributes: draft.attributes,
        };
        database.next_point_id += 1;
        database.points.insert(point.id, point.clone());

        self.write(&database).map_err(StoreError::WriteFailed)?;
        debug!(id = point.id, "point added");
        Ok(point)
    }

    /// List all points in id order. The order is not contractual.
    pub async fn list_points(&self) -> Result<Vec<Point>, StoreError> {
        let _guard = self.require_open().await?;
        let database = self.read().map_err(StoreError::ReadFailed)?;
        Ok(database.points.into_values().collect())
    }

    /// Merge the supplied fields over the stored point and persist the
    /// result. `id` and `created_at` never change.
    pub async fn update_point(&self, id: u64, patch: PointPatch) -> Result<Point, StoreError> {
        let _guard = self.require_open().await?;
        let mut database = self.read().map_err(StoreError::ReadFailed)?;

        let point = database
            .points
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        point.apply(patch);
        let updated = point.clone();

        self.write(&database).map_err(StoreError::WriteFailed)?;
        debug!(id, "point updated");
        Ok(updated)
    }

    /// Delete a point together with every connection that references it on
    /// either side, as one atomic commit. Idempotent on a missing id.
    pub async fn delete_point(&self, id: u64) -> Result<(), StoreError> {
        let _guard = self.require_open().await?;
        let mut database = self.read().map_err(StoreError::DeleteFailed)?;

        let removed = database.points.remove(&id).is_some();
        let before = database.connections.len();
        database.connections.retain(|_, connection| !connection.touches(id));
        let cascaded = before - database.connections.len();

        if !removed && cascaded == 0 {
            debug!(id, "delete of missing point ignored");
            return Ok(());
        }

        self.write(&database).map_err(StoreError::DeleteFailed)?;
        info!(id, cascaded, "point deleted");
        Ok(())
    }

    /// Insert a new connection after validating that both endpoints exist.
    pub async fn add_connection(&self, draft: ConnectionDraft) -> Result<Connection, StoreError> {
        let _guard = self.require_open().await?;
        let mut database = self.read().map_err(StoreError::ReadFailed)?;

        for endpoint in [draft.origin_id, draft.destination_id] {
            if !database.points.contains_key(&endpoint) {
                warn!(endpoint, "rejected connection to missing point");
                return Err(StoreError::DanglingReference(endpoint));
            }
        }

        let connection = Connection {
            id: database.next_connection_id,
            origin_id: draft.origin_id,
            destination_id: draft.destination_id,
            created_at: Utc::now(),
        };
        database.next_connection_id += 1;
        database.connections.insert(connection.id, connection.clone());

        self.write(&database).map_err(StoreError::WriteFailed)?;
        debug!(
            id = connection.id,
            origin = connection.origin_id,
            destination = connection.destination_id,
            "connection added"
        );
        Ok(connection)
    }

    /// List all connections in id order.
    pub async fn list_connections(&self) -> Result<Vec<Connection>, StoreError> {
        let _guard = self.require_open().await?;
        let database = self.read().map_err(StoreError::ReadFailed)?;
        Ok(database.connections.into_values().collect())
    }

    /// Delete a single connection. Idempotent on a missing id.
    pub async fn delete_connection(&self, id: u64) -> Result<(), StoreError> {
        let _guard = self.require_open().await?;
        let mut database = self.read().map_err(StoreError::DeleteFailed)?;

        if database.connections.remove(&id).is_none() {
            debug!(id, "delete of missing connection ignored");
            return Ok(());
        }

        self.write(&database).map_err(StoreError::DeleteFailed)?;
        debug!(id, "connection deleted");
        Ok(())
    }

    /// Acquire the operation lock, failing if the store was never opened.
    async fn require_open(&self) -> Result<tokio::sync::MutexGuard<'_, bool>, StoreError> {
        let guard = self.opened.lock().await;
        if !*guard {
            return Err(StoreError::NotInitialized);
        }
        Ok(guard)
    }

    fn read(&self) -> Result<Database, String> {
        let raw = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    }

    /// Persist the document via temp file + rename so a crash mid-write
    /// leaves the previous document intact.
    fn write(&self, database: &Database) -> Result<(), String> {
        let contents = serde_json::to_string_pretty(database).map_err(|e| e.to_string())?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, contents).map_err(|e| e.to_string())?;
        fs::rename(&staging, &self.path).map_err(|e| e.to_string())
    }
}

/// Bring a raw on-disk document up to [`SCHEMA_VERSION`].
///
/// Missing collections and counters are created without touching existing
/// data; safe to run repeatedly. Legacy connection rows without a
/// destination endpoint cannot satisfy the integrity invariant and are
/// dropped with a warning.
fn migrate(value: Value) -> Result<(Database, bool), StoreError> {
    let version = value
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    if version >= SCHEMA_VERSION {
        let database: Database =
            serde_json::from_value(value).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        return Ok((database, false));
    }

    let mut root = match value {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::Unavailable(format!(
                "store document is not an object: {other}"
            )))
        }
    };

    let points: BTreeMap<u64, Point> = match root.remove("points") {
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| StoreError::Unavailable(format!("points collection: {e}")))?,
        None => BTreeMap::new(),
    };

    let mut connections = BTreeMap::new();
    if let Some(Value::Object(raw)) = root.remove("connections") {
        for (key, entry) in raw {
            match serde_json::from_value::<Connection>(entry) {
                Ok(connection) => {
                    // Legacy cascades only pruned the origin side, so rows
                    // pointing at an already-deleted endpoint may survive on
                    // disk. They cannot satisfy the integrity invariant.
                    match [connection.origin_id, connection.destination_id]
                        .into_iter()
                        .find(|endpoint| !points.contains_key(endpoint))
                    {
                        Some(endpoint) => {
                            warn!(
                                row = %key,
                                endpoint,
                                "dropping legacy connection to missing point"
                            );
                        }
                        None => {
                            connections.insert(connection.id, connection);
                        }
                    }
                }
                Err(e) => {
                    warn!(row = %key, error = %e, "dropping legacy connection row");
                }
            }
        }
    }

    let next_point_id = root
        .get("next_point_id")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| points.keys().max().map_or(1, |max| max + 1));
    let next_connection_id = root
        .get("next_connection_id")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| connections.keys().max().map_or(1, |max| max + 1));

    Ok((
        Database {
            schema_version: SCHEMA_VERSION,
            next_point_id,
            next_connection_id,
            points,
            connections,
        },
        true,
    ))
}
