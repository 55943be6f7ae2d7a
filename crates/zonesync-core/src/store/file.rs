// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validated on load
// - Automatic backup: keeps .backup of last known good state
// - Recovery: falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "www:A": {
//       "record": { "name": "www", "type": "A", "data": "1.2.3.4", "ttl": 3600 },
//       "state": "synced",
//       "last_synced": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::record::{RecordKey, StoredRecord};
use crate::traits::record_store::RecordStore;

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based record store with crash recovery
///
/// Persists the local record mirror to a JSON file. Writes are atomic
/// (temp file + rename) and the previous good state is kept in a
/// `.backup` file that is used automatically if the main file fails to
/// parse on load.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    /// Serializes writers: snapshot, temp write, and rename happen under
    /// this lock so concurrent writes for different identities cannot
    /// clobber each other's temp file
    write_lock: tokio::sync::Mutex<()>,
}

#[derive(Debug)]
struct FileState {
    records: HashMap<String, StoredRecord>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: HashMap<String, StoredRecord>,
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Try to load an existing state file
    /// 2. If corruption is detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                records,
                dirty: false,
            })),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Load state from file, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, StoredRecord>, Error> {
        match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("loaded {} records from {}", records.len(), path.display());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "state file {} appears corrupted: {}. attempting backup recovery",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("no backup file found, starting with empty state");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("recovered {} records from backup", records.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "backup also unreadable: {}. starting with empty state",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, StoredRecord>, Error> {
        if !path.exists() {
            tracing::debug!("state file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("failed to read state file {}: {}", path.display(), e))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "state file version mismatch: expected {}, got {}. loading anyway",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.records)
    }

    /// Write state to file atomically
    ///
    /// Only one writer runs at a time; the shared temp path and the
    /// rename would otherwise race between concurrent `put`/`delete`
    /// calls for different identities.
    async fn write_state(&self) -> Result<(), Error> {
        let _writer = self.write_lock.lock().await;

        let json = {
            let state_guard = self.state.read().await;
            let state_file = StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                records: state_guard.records.clone(),
            };
            serde_json::to_string_pretty(&state_file)?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous good state before replacing it
        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("failed to create backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        {
            let mut state_guard = self.state.write().await;
            state_guard.dirty = false;
        }

        tracing::trace!("state written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.records.get(&key.to_string()).cloned())
    }

    async fn put(&self, key: &RecordKey, record: &StoredRecord) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .records
                .insert(key.to_string(), record.clone());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.records.remove(&key.to_string());
            state_guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_keys(&self) -> Result<Vec<RecordKey>, Error> {
        let state_guard = self.state.read().await;
        let mut keys = Vec::with_capacity(state_guard.records.len());
        for raw in state_guard.records.keys() {
            let key = raw
                .parse::<RecordKey>()
                .map_err(|e| Error::store(format!("unparseable storage key '{raw}': {e}")))?;
            keys.push(key);
        }
        Ok(keys)
    }

    async fn flush(&self) -> Result<(), Error> {
        let state_guard = self.state.read().await;
        if state_guard.dirty {
            drop(state_guard);
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
