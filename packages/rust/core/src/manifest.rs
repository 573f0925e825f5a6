//! `run.json`: the record of a run kept in the scratch directory.

use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use issuepress_shared::{
    ArtifactMeta, CURRENT_SCHEMA_VERSION, IssuePressError, OutputArtifact, Result, RunManifest,
    Stage,
};

/// Mark `stage` completed and rewrite the manifest.
pub fn record_stage(path: &Path, manifest: &mut RunManifest, stage: Stage) -> Result<()> {
    manifest.completed.push(stage);
    manifest.updated_at = Utc::now();
    write_manifest(path, manifest)
}

/// Write the manifest atomically (temp file, then rename).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| IssuePressError::validation(format!("JSON serialization failed: {e}")))?;

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json).map_err(|e| IssuePressError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| IssuePressError::io(path, e))?;

    debug!(stages = manifest.completed.len(), "manifest written");
    Ok(())
}

/// Load and validate a manifest.
pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| IssuePressError::io(path, e))?;
    let manifest: RunManifest = serde_json::from_str(&content)
        .map_err(|e| IssuePressError::validation(format!("invalid run.json: {e}")))?;

    if manifest.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(IssuePressError::validation(format!(
            "run.json schema version {} is newer than supported version {CURRENT_SCHEMA_VERSION}",
            manifest.schema_version
        )));
    }
    Ok(manifest)
}

/// SHA-256 and size of an output file.
pub fn artifact_meta(artifact: &OutputArtifact) -> Result<ArtifactMeta> {
    let path = &artifact.path;
    let mut file = std::fs::File::open(path).map_err(|e| IssuePressError::io(path, e))?;
    let mut hasher = Sha256::new();
    let size_bytes = std::io::copy(&mut file, &mut hasher).map_err(|e| IssuePressError::io(path, e))?;

    Ok(ArtifactMeta {
        format: artifact.format,
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes,
    })
}
