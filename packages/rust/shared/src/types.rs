//! Core domain types for an IssuePress run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IssuePressError, Result};

/// Current schema version for the `run.json` manifest.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Parameters of one pipeline execution, fixed at startup.
///
/// The "current" date is captured once here and passed explicitly to every
/// stage that needs it.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Month of the run start (1-12).
    pub current_month: u32,
    /// Requested issue month (1-12).
    pub month: u32,
    /// Issue date: the run date moved to the requested month.
    pub date: NaiveDate,
    /// `<Name> - <Month> <Year> issue`.
    pub title: String,
    /// Working directory, recreated at the start of every run.
    pub scratch_dir: PathBuf,
}

impl RunContext {
    /// Derive the run parameters from today's date and the requested month.
    ///
    /// The day of month is clamped to the length of the requested month.
    pub fn new(
        today: NaiveDate,
        month: u32,
        newsletter_name: &str,
        scratch_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(IssuePressError::validation(format!(
                "month {month} out of range (1-12)"
            )));
        }

        let date = (1..=today.day())
            .rev()
            .find_map(|day| NaiveDate::from_ymd_opt(today.year(), month, day))
            .ok_or_else(|| {
                IssuePressError::validation(format!("no valid date in month {month}"))
            })?;

        let title = format!("{newsletter_name} - {} issue", date.format("%B %Y"));

        Ok(Self {
            current_month: today.month(),
            month,
            date,
            title,
            scratch_dir: scratch_dir.into(),
        })
    }

    /// Mirror destination for the fetched page and its assets.
    pub fn html_dir(&self) -> PathBuf {
        self.scratch_dir.join("html")
    }

    /// Zip bundle handed to the converter.
    pub fn bundle_path(&self) -> PathBuf {
        self.scratch_dir.join("bundle.zip")
    }

    /// Generated cover image.
    pub fn cover_path(&self) -> PathBuf {
        self.scratch_dir.join("cover.jpg")
    }

    /// Output path for the given format.
    pub fn artifact_path(&self, format: EbookFormat) -> PathBuf {
        self.scratch_dir
            .join(format!("issue.{}", format.extension()))
    }

    /// Run manifest location.
    pub fn manifest_path(&self) -> PathBuf {
        self.scratch_dir.join("run.json")
    }

    /// Four-digit year of the issue.
    pub fn yyyy(&self) -> String {
        self.date.format("%Y").to_string()
    }

    /// Two-digit month of the issue.
    pub fn mm(&self) -> String {
        self.date.format("%m").to_string()
    }

    /// Two-digit day of the issue.
    pub fn dd(&self) -> String {
        self.date.format("%d").to_string()
    }

    /// Full English month name ("October").
    pub fn month_name(&self) -> String {
        self.date.format("%B").to_string()
    }
}

// ---------------------------------------------------------------------------
// IssueReference
// ---------------------------------------------------------------------------

/// The resolved issue being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReference {
    /// Issue page URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Issue date.
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Ebook formats and artifacts
// ---------------------------------------------------------------------------

/// The two e-reader formats produced per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbookFormat {
    /// Final format, registered in the catalog first.
    Epub,
    /// Intermediate format, attached to the EPUB's catalog entry.
    Mobi,
}

impl EbookFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Mobi => "mobi",
        }
    }
}

impl std::fmt::Display for EbookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Epub => "EPUB",
            Self::Mobi => "MOBI",
        })
    }
}

/// Metadata written into each output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbookMetadata {
    pub title: String,
    pub author: String,
    pub author_sort: String,
    pub tags: Vec<String>,
}

impl EbookMetadata {
    /// Tags in the comma-joined form the metadata editor expects.
    pub fn joined_tags(&self) -> String {
        self.tags.join(",")
    }
}

/// A converted e-reader file plus the metadata last written to it.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub format: EbookFormat,
    pub path: PathBuf,
    /// `None` until the metadata stage has run.
    pub metadata: Option<EbookMetadata>,
}

impl OutputArtifact {
    /// A freshly converted file without metadata.
    pub fn new(format: EbookFormat, path: impl AsRef<Path>) -> Self {
        Self {
            format,
            path: path.as_ref().to_path_buf(),
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolveIssue,
    Fetch,
    Declutter,
    Package,
    ComposeCover,
    Convert,
    WriteMetadata,
    Catalog,
    Publish,
    Done,
}

impl Stage {
    /// All stages in the order they run.
    pub const ALL: [Stage; 10] = [
        Stage::ResolveIssue,
        Stage::Fetch,
        Stage::Declutter,
        Stage::Package,
        Stage::ComposeCover,
        Stage::Convert,
        Stage::WriteMetadata,
        Stage::Catalog,
        Stage::Publish,
        Stage::Done,
    ];

    /// Human-readable progress label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolveIssue => "Resolving issue URL",
            Self::Fetch => "Downloading issue page",
            Self::Declutter => "Cleaning issue page",
            Self::Package => "Packaging HTML bundle",
            Self::ComposeCover => "Composing cover",
            Self::Convert => "Converting to MOBI and EPUB",
            Self::WriteMetadata => "Writing ebook metadata",
            Self::Catalog => "Adding to catalog",
            Self::Publish => "Publishing to site",
            Self::Done => "Done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Publish outcome
// ---------------------------------------------------------------------------

/// What the site publishing stage did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Nothing was written.
    Skipped { reason: String },
    /// A post was rendered and the ebooks copied.
    Published {
        post_path: PathBuf,
        assets: Vec<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// Checksum entry for an output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub format: EbookFormat,
    pub file_name: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// The `run.json` record kept in the scratch directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that performed the run.
    pub tool_version: String,
    pub title: String,
    pub month: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
    /// Stages that completed successfully, in order.
    #[serde(default)]
    pub completed: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutcome>,
}

impl RunManifest {
    /// Start a manifest for a new run.
    pub fn new(ctx: &RunContext, tool_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: tool_version.into(),
            title: ctx.title.clone(),
            month: ctx.month,
            started_at: now,
            updated_at: now,
            issue_url: None,
            completed: Vec::new(),
            artifacts: Vec::new(),
            catalog_id: None,
            publish: None,
        }
    }

    /// The last stage that completed, if any.
    pub fn last_completed(&self) -> Option<Stage> {
        self.completed.last().copied()
    }
}
