//! Page mirroring through Calibre's `web2disk`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use issuepress_shared::{IssuePressError, Result};
use issuepress_tools::{CommandRunner, ToolCommand, ToolProgram};

/// A mirrored page tree with its distinguished root document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredPage {
    /// Directory the page and its assets were written into.
    pub root: PathBuf,
    /// The `.xhtml` file of the page itself.
    pub index: PathBuf,
}

pub struct ContentFetcher {
    web2disk: ToolProgram,
    runner: Arc<dyn CommandRunner>,
}

impl ContentFetcher {
    pub fn new(web2disk: ToolProgram, runner: Arc<dyn CommandRunner>) -> Self {
        Self { web2disk, runner }
    }

    fn command(&self, url: &str, dest: &Path) -> ToolCommand {
        self.web2disk
            .command()
            .arg("-d")
            .path_arg(dest)
            .arg("-r")
            .arg("0")
            .arg("--verbose")
            .arg(url)
    }

    /// Mirror `url` (no recursion) into `dest`.
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<MirroredPage> {
        std::fs::create_dir_all(dest).map_err(|e| IssuePressError::io(dest, e))?;

        let command = self.command(url, dest);
        self.runner.run(&command).await?.checked(&command.tool)?;

        let index = find_index_page(dest)?;
        info!(index = %index.display(), "page mirrored");

        Ok(MirroredPage {
            root: dest.to_path_buf(),
            index,
        })
    }
}

/// First `*.xhtml` file directly inside `dir`, by file name.
pub fn find_index_page(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| IssuePressError::io(dir, e))?;

    let mut pages: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "xhtml"))
        .collect();
    pages.sort();

    pages
        .into_iter()
        .next()
        .ok_or_else(|| IssuePressError::FetchFailed {
            dir: dir.to_path_buf(),
        })
}
