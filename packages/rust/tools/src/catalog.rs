//! Calibre library access through `calibredb`.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument};

use issuepress_shared::{IssuePressError, Result};

use crate::runner::{CommandRunner, ToolCommand, ToolProgram};

static LEADING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)").expect("valid regex"));

/// First line-leading integer in `calibredb list` output.
///
/// The header line (`id title`) never starts with a digit, so the first match
/// is the first entry's id.
pub fn parse_first_id(stdout: &str) -> Option<String> {
    LEADING_ID
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Calibre search expression matching `title` exactly.
pub fn exact_title_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
    format!("title:\"={escaped}\"")
}

pub struct CatalogClient {
    calibredb: ToolProgram,
    runner: Arc<dyn CommandRunner>,
}

impl CatalogClient {
    pub fn new(calibredb: ToolProgram, runner: Arc<dyn CommandRunner>) -> Self {
        Self { calibredb, runner }
    }

    fn list_command(&self, title: &str) -> ToolCommand {
        self.calibredb
            .command()
            .arg("list")
            .arg("--search")
            .arg(exact_title_query(title))
    }

    fn add_command(&self, entry: Option<&str>, file: &Path) -> ToolCommand {
        match entry {
            Some(id) => self
                .calibredb
                .command()
                .arg("add_format")
                .arg(id)
                .path_arg(file),
            None => self.calibredb.command().arg("add").path_arg(file),
        }
    }

    /// Look up the catalog entry whose title equals `title`.
    #[instrument(skip(self))]
    pub async fn find_by_title(&self, title: &str) -> Result<Option<String>> {
        let command = self.list_command(title);
        let output = self.runner.run(&command).await?;
        if !output.success {
            return Err(IssuePressError::Catalog(format!(
                "catalog search for {title:?} failed (exit {:?}): {}",
                output.code,
                output.stderr.trim()
            )));
        }

        let id = parse_first_id(&output.stdout);
        debug!(id = ?id, "catalog lookup");
        Ok(id)
    }

    /// Add `file` as a new entry, or as another format of entry `entry`.
    #[instrument(skip_all, fields(entry = ?entry, file = %file.display()))]
    pub async fn add(&self, entry: Option<&str>, file: &Path) -> Result<()> {
        let command = self.add_command(entry, file);
        let output = self.runner.run(&command).await?;
        if !output.success {
            return Err(IssuePressError::Catalog(format!(
                "missing catalog add confirmation for {} (exit {:?}): {}",
                file.display(),
                output.code,
                output.stderr.trim()
            )));
        }

        match entry {
            Some(id) => info!(id, "format attached to catalog entry"),
            None => info!(stdout = %output.stdout.trim(), "catalog entry added"),
        }
        Ok(())
    }
}
