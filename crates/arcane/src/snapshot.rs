//! Saving and restoring the composite store between runs.
//!
//! A snapshot keeps slot gaps and generations, so handles held by the
//! restored composites stay valid. Native functions are stored by name.

use serde::{Deserialize, Serialize};

use crate::composite::{CompositeId, Store};

pub const VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    composites: &'a Store,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    composites: Store,
}

#[derive(Debug)]
pub enum SnapshotError {
    Json(serde_json::Error),
    Version { found: u32 },
    Dangling { composite: CompositeId, reference: CompositeId },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Json(error) => write!(f, "Malformed snapshot: {error}"),
            SnapshotError::Version { found } => {
                write!(f, "Snapshot version {found} is not supported (expected {VERSION})")
            }
            SnapshotError::Dangling { composite, reference } => {
                write!(f, "Composite {composite} references unknown slot {reference}")
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Json(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(error: serde_json::Error) -> Self {
        SnapshotError::Json(error)
    }
}

pub fn save(store: &Store) -> Result<String, SnapshotError> {
    let snapshot = SnapshotRef {
        version: VERSION,
        composites: store,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Rebuilds a store. References must point at slots of the store; handles
/// to gaps stay stale.
pub fn restore(json: &str) -> Result<Store, SnapshotError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    if snapshot.version != VERSION {
        return Err(SnapshotError::Version {
            found: snapshot.version,
        });
    }

    let store = snapshot.composites;
    for (id, composite) in store.iter() {
        if let Some(reference) = composite.references().into_iter().find(|reference| reference.index as usize >= store.len()) {
            return Err(SnapshotError::Dangling {
                composite: id,
                reference,
            });
        }
    }
    log::debug!("Restored {} composites", store.live_count());
    Ok(store)
}
