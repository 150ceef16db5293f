//! Auditable session artifacts with digest sidecars.

use std::path::{Path, PathBuf};

use chipforge_state::ContentDigest;

use crate::designer::OptimizationSession;
use crate::domain::{DesignError, Result};

/// Persist `<dir>/<session_id>/session.json` and `<dir>/<session_id>/session.digest`.
pub fn write_session_artifact(session: &OptimizationSession, dir: &Path) -> Result<PathBuf> {
    let session_dir = dir.join(session.session_id.to_string());
    std::fs::create_dir_all(&session_dir)?;

    let path = session_dir.join("session.json");
    let digest_path = session_dir.join("session.digest");
    let json = serde_json::to_vec_pretty(session)?;
    let digest = ContentDigest::from_bytes(&json);

    std::fs::write(&path, &json)?;
    std::fs::write(&digest_path, digest.as_str().as_bytes())?;

    Ok(path)
}

/// Read and verify `<dir>/<session_id>/session.json` integrity.
pub fn read_session_artifact(session_id: &str, dir: &Path) -> Result<OptimizationSession> {
    let session_dir = dir.join(session_id);
    let json = std::fs::read(session_dir.join("session.json"))?;
    let recorded = std::fs::read_to_string(session_dir.join("session.digest"))?;

    let actual = ContentDigest::from_bytes(&json);
    if recorded.trim() != actual.as_str() {
        return Err(DesignError::DigestMismatch {
            expected: recorded.trim().to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
