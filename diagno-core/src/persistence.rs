//! Atomic file writes and JSON load/save for artifacts.
//!
//! Every artifact goes through the same write-to-`.tmp`-then-rename path so a
//! reader never observes a half-written file.

use crate::error::DiagnoError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Atomically write pretty-printed JSON to `path`.
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), DiagnoError> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to `path`, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), DiagnoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON. Returns `Ok(None)` when the file is absent.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DiagnoError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Load JSON that must exist; a missing file is a configuration error.
pub fn load_required_json<T: DeserializeOwned>(path: &Path) -> Result<T, DiagnoError> {
    load_json(path)?
        .ok_or_else(|| DiagnoError::config(format!("missing artifact: {}", path.display())))
}
