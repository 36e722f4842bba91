//! Persisted session records and the active binding pointer.
//!
//! Layout under the tether directory:
//! - `sessions/<session_id>.json` - one [`SessionRecord`] per lineage
//! - `ACTIVE` - the [`ActiveBinding`] the CLI is working on
//!
//! All writes are atomic using temp file + rename.

use crate::error::{Result, TetherError};
use crate::types::{ActiveBinding, SessionId, SessionRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Manages session records and the active binding.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    root: PathBuf,
}

impl SessionRegistry {
    /// Creates a registry for the given tether directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn record_path(&self, session_id: &SessionId) -> PathBuf {
        self.root.join("sessions").join(format!("{}.json", session_id))
    }

    /// Reads a session record.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no record exists.
    pub fn load(&self, session_id: &SessionId) -> Result<SessionRecord> {
        let path = self.record_path(session_id);
        if !path.exists() {
            return Err(TetherError::SessionNotFound(session_id.to_string()));
        }
        read_json(&path)
    }

    /// Writes a session record atomically, replacing any previous version.
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self.record_path(&record.session_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_json_atomic(&path, record)
    }

    /// Deletes a session record. Does nothing if none exists.
    pub fn remove(&self, session_id: &SessionId) -> Result<()> {
        match fs::remove_file(self.record_path(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TetherError::Io(e)),
        }
    }

    /// Returns true if a record exists for the session.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.record_path(session_id).exists()
    }

    /// Lists all session records, oldest first.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        let dir = self.root.join("sessions");
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            records.push(read_json::<SessionRecord>(&path)?);
        }

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(records)
    }

    /// Reads the active binding.
    ///
    /// Returns `None` if no binding has been recorded.
    pub fn read_active(&self) -> Result<Option<ActiveBinding>> {
        let path = self.root.join("ACTIVE");
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Writes the active binding atomically.
    pub fn write_active(&self, binding: &ActiveBinding) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        write_json_atomic(&self.root.join("ACTIVE"), binding)
    }

    /// Deletes the active binding.
    ///
    /// Does nothing if no binding exists.
    pub fn clear_active(&self) -> Result<()> {
        let path = self.root.join("ACTIVE");
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        TetherError::Deserialization(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Writes JSON to a file atomically.
///
/// Uses temp file + fsync + rename for crash safety.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| TetherError::Serialization(e.to_string()))?;
    let tmp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;

    // fsync parent directory (Unix-specific for crash safety)
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir_file) = File::open(parent) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}
