//! Zip bundle of the mirrored page, the converter's input.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use issuepress_shared::{IssuePressError, Result};

/// What ended up in the bundle.
#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub path: PathBuf,
    pub entries: Vec<String>,
}

/// Zip every file under `src_dir` into `out`, entry names relative to
/// `src_dir` with `/` separators.
#[instrument(skip_all, fields(src = %src_dir.display(), out = %out.display()))]
pub fn package_bundle(src_dir: &Path, out: &Path) -> Result<BundleSummary> {
    let file = File::create(out).map_err(|e| IssuePressError::io(out, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::new();
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| IssuePressError::Archive(format!("walk {src_dir:?}: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry_name(src_dir, entry.path())?;
        let bytes = std::fs::read(entry.path()).map_err(|e| IssuePressError::io(entry.path(), e))?;

        zip.start_file(name.as_str(), options)
            .map_err(|e| IssuePressError::Archive(format!("{name}: {e}")))?;
        zip.write_all(&bytes)
            .map_err(|e| IssuePressError::Archive(format!("{name}: {e}")))?;
        entries.push(name);
    }

    zip.finish()
        .map_err(|e| IssuePressError::Archive(format!("{}: {e}", out.display())))?;

    info!(entries = entries.len(), "bundle written");
    Ok(BundleSummary {
        path: out.to_path_buf(),
        entries,
    })
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| IssuePressError::Archive(format!("{path:?} outside {root:?}: {e}")))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
