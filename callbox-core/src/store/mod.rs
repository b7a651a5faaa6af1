//! Small JSON-file stores. Every read goes back to disk; there is no cache,
//! so a decision always sees the latest write from any process. Writes are
//! whole-file replacements with last-writer-wins semantics, staged in a temp
//! file and renamed into place so a reader never sees a partial file.

pub mod events;
pub mod opt_in;
pub mod snooze;

pub use events::{EventLog, GateUnlockEvent};
pub use opt_in::{OptInRecord, OptInSource, OptInStatus, OptInStore};
pub use snooze::SnoozeStore;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;

/// Reads and parses a JSON file. A missing file is `Ok(None)`.
pub(crate) async fn read_json(path: &Path) -> Result<Option<Value>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    ensure_parent(path).await?;
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = staging_path(path);
    if let Err(source) = tokio::fs::write(&temp_path, bytes).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: temp_path,
            source,
        });
    }
    if let Err(source) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Moves an unreadable store file aside so the next write cannot clobber it.
/// Returns where the old content now lives.
pub(crate) async fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path.with_file_name(format!(
        "{}.corrupt-{}",
        name,
        Utc::now().format("%Y%m%dT%H%M%S%.6fZ")
    ));
    tokio::fs::rename(path, &target)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(target)
}

pub(crate) async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}
