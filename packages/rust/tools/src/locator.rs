//! External executable lookup.
//!
//! All required tools are resolved up front and every missing one is reported
//! together, before any pipeline stage runs.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use tracing::{debug, info};

use issuepress_shared::{IssuePressError, Result};

use crate::runner::ToolProgram;

/// Resolves executables on `PATH` (or an override) and collects diagnostics.
#[derive(Debug)]
pub struct ToolLocator {
    search_path: Option<OsString>,
    cwd: PathBuf,
    errors: Vec<String>,
}

impl ToolLocator {
    /// Look tools up in `search_path`, or in `PATH` when `None`.
    pub fn new(search_path: Option<&OsStr>) -> Self {
        Self {
            search_path: search_path.map(OsStr::to_os_string),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            errors: Vec::new(),
        }
    }

    /// Resolve `exe` without recording a failure.
    pub fn probe(&self, exe: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => which::which_in(exe, Some(paths), &self.cwd),
            None => which::which(exe),
        };
        found.ok()
    }

    /// Resolve `exe`, recording "`exe` not found" on failure.
    pub fn which(&mut self, exe: &str) -> Option<PathBuf> {
        let found = self.probe(exe);
        match &found {
            Some(path) => debug!(exe, path = %path.display(), "tool located"),
            None => self.errors.push(format!("{exe} not found")),
        }
        found
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// ImageMagick entry points used by the cover composer.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    pub montage: ToolProgram,
    pub mogrify: ToolProgram,
}

impl ImageMagick {
    /// Prefer the `magick` multi-call binary (IM7), fall back to the
    /// standalone `montage`/`mogrify` binaries (IM6).
    pub fn locate(locator: &mut ToolLocator) -> Option<Self> {
        if let Some(magick) = locator.probe("magick") {
            return Some(Self {
                montage: ToolProgram::new("montage", &magick).with_leading_arg("montage"),
                mogrify: ToolProgram::new("mogrify", &magick).with_leading_arg("mogrify"),
            });
        }

        let montage = locator.which("montage");
        let mogrify = locator.which("mogrify");
        match (montage, mogrify) {
            (Some(montage), Some(mogrify)) => Some(Self {
                montage: ToolProgram::new("montage", montage),
                mogrify: ToolProgram::new("mogrify", mogrify),
            }),
            _ => {
                locator.add_error("Please install ImageMagick");
                None
            }
        }
    }
}

/// Calibre command-line tools.
#[derive(Debug, Clone)]
pub struct Calibre {
    pub calibredb: ToolProgram,
    pub ebook_convert: ToolProgram,
    pub ebook_meta: ToolProgram,
    pub web2disk: ToolProgram,
}

impl Calibre {
    pub fn locate(locator: &mut ToolLocator) -> Option<Self> {
        let calibredb = locator.which("calibredb");
        let ebook_convert = locator.which("ebook-convert");
        let ebook_meta = locator.which("ebook-meta");
        let web2disk = locator.which("web2disk");

        match (calibredb, ebook_convert, ebook_meta, web2disk) {
            (Some(calibredb), Some(ebook_convert), Some(ebook_meta), Some(web2disk)) => {
                Some(Self {
                    calibredb: ToolProgram::new("calibredb", calibredb),
                    ebook_convert: ToolProgram::new("ebook-convert", ebook_convert),
                    ebook_meta: ToolProgram::new("ebook-meta", ebook_meta),
                    web2disk: ToolProgram::new("web2disk", web2disk),
                })
            }
            _ => {
                locator.add_error("Please install Calibre");
                None
            }
        }
    }
}

/// Every external executable the pipeline needs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub calibre: Calibre,
    pub imagemagick: ImageMagick,
}

impl Toolchain {
    /// Resolve all tools, failing with one aggregated
    /// [`IssuePressError::ToolNotFound`] if anything is missing.
    pub fn locate(search_path: Option<&OsStr>) -> Result<Self> {
        let mut locator = ToolLocator::new(search_path);
        let calibre = Calibre::locate(&mut locator);
        let imagemagick = ImageMagick::locate(&mut locator);

        match (calibre, imagemagick) {
            (Some(calibre), Some(imagemagick)) => {
                let toolchain = Self {
                    calibre,
                    imagemagick,
                };
                info!(tools = toolchain.programs().len(), "external tools located");
                Ok(toolchain)
            }
            _ => Err(IssuePressError::ToolNotFound {
                missing: locator.errors().to_vec(),
            }),
        }
    }

    /// All resolved programs, for reporting.
    pub fn programs(&self) -> Vec<&ToolProgram> {
        vec![
            &self.calibre.calibredb,
            &self.calibre.ebook_convert,
            &self.calibre.ebook_meta,
            &self.calibre.web2disk,
            &self.imagemagick.montage,
            &self.imagemagick.mogrify,
        ]
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn temp_bin_dir(names: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ip-locator-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            let path = dir.join(name);
            std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    }

    const CALIBRE: [&str; 4] = ["calibredb", "ebook-convert", "ebook-meta", "web2disk"];

    #[test]
    fn locates_full_toolchain_via_magick() {
        let mut names = CALIBRE.to_vec();
        names.push("magick");
        let dir = temp_bin_dir(&names);

        let tools = Toolchain::locate(Some(dir.as_os_str())).unwrap();
        assert_eq!(tools.imagemagick.montage.path, dir.join("magick"));
        assert_eq!(tools.imagemagick.montage.leading_args, vec!["montage"]);
        assert_eq!(tools.imagemagick.mogrify.leading_args, vec!["mogrify"]);
        assert_eq!(tools.calibre.web2disk.path, dir.join("web2disk"));
        assert_eq!(tools.programs().len(), 6);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn falls_back_to_standalone_imagemagick_binaries() {
        let mut names = CALIBRE.to_vec();
        names.extend(["montage", "mogrify"]);
        let dir = temp_bin_dir(&names);

        let tools = Toolchain::locate(Some(dir.as_os_str())).unwrap();
        assert_eq!(tools.imagemagick.montage.path, dir.join("montage"));
        assert!(tools.imagemagick.montage.leading_args.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reports_every_missing_tool_at_once() {
        let dir = temp_bin_dir(&["calibredb", "ebook-meta"]);

        let err = Toolchain::locate(Some(dir.as_os_str())).unwrap_err();
        match err {
            IssuePressError::ToolNotFound { missing } => {
                assert!(missing.contains(&"ebook-convert not found".to_string()));
                assert!(missing.contains(&"web2disk not found".to_string()));
                assert!(missing.contains(&"Please install Calibre".to_string()));
                assert!(missing.contains(&"montage not found".to_string()));
                assert!(missing.contains(&"mogrify not found".to_string()));
                assert!(missing.contains(&"Please install ImageMagick".to_string()));
                assert!(!missing.iter().any(|m| m.starts_with("calibredb")));
            }
            other => panic!("unexpected error: {other}"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn non_executable_files_are_ignored() {
        let dir = temp_bin_dir(&[]);
        std::fs::write(dir.join("web2disk"), "not executable").unwrap();

        let mut locator = ToolLocator::new(Some(dir.as_os_str()));
        assert!(locator.which("web2disk").is_none());
        assert_eq!(locator.errors(), ["web2disk not found"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
