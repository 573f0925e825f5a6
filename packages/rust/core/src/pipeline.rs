//! End-to-end publishing run: issue URL → mirror → declutter → bundle →
//! cover → MOBI/EPUB → metadata → catalog → site.
//!
//! Stages run strictly in order. Any failure aborts the run; earlier side
//! effects stay in place and the scratch directory is kept for inspection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use issuepress_crawler::{ContentDeclutterer, ContentFetcher};
use issuepress_discovery::LocatorOptions;
use issuepress_publisher::SitePublisher;
use issuepress_shared::{
    AppConfig, EbookFormat, EbookMetadata, IssuePressError, IssueReference, OutputArtifact,
    PublishOutcome, Result, RunContext, RunManifest, Stage, expand_path,
};
use issuepress_tools::{
    CatalogClient, CommandRunner, CoverComposer, CoverSpec, FormatConverter, MetadataWriter,
    ProcessRunner, Toolchain,
};

use crate::bundle::package_bundle;
use crate::manifest::{artifact_meta, record_stage, write_manifest};

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub app: AppConfig,
    /// Requested issue month (1-12).
    pub month: u32,
    /// Run date; its month is the "current" month.
    pub today: NaiveDate,
    /// Skip the site publishing stage entirely.
    pub skip_publish: bool,
    /// Tool version recorded in `run.json`.
    pub tool_version: String,
    pub locator: LocatorOptions,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct PipelineResult {
    pub issue: IssueReference,
    pub epub: OutputArtifact,
    pub mobi: OutputArtifact,
    pub catalog_id: Option<String>,
    pub publish: PublishOutcome,
    pub manifest_path: PathBuf,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn stage(&self, stage: Stage);
    /// Called when the pipeline completes.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// Locate the external tools, then run the pipeline with real processes.
///
/// Missing tools are reported before anything touches the network or the
/// scratch directory.
pub async fn run_pipeline(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let search_path = config
        .app
        .paths
        .tool_search_path
        .as_deref()
        .map(std::ffi::OsStr::new);
    let toolchain = Toolchain::locate(search_path)?;
    run_pipeline_with(config, &toolchain, Arc::new(ProcessRunner), progress).await
}

/// Run every stage using `toolchain` and `runner` for the external tools.
#[instrument(skip_all, fields(month = config.month, today = %config.today))]
pub async fn run_pipeline_with(
    config: &PipelineConfig,
    toolchain: &Toolchain,
    runner: Arc<dyn CommandRunner>,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let app = &config.app;

    // Everything that can fail on configuration alone is built up front.
    let scratch = expand_path(&app.paths.scratch_dir)?;
    let ctx = RunContext::new(config.today, config.month, &app.newsletter.name, scratch)?;
    let declutterer =
        ContentDeclutterer::new(&app.newsletter.content_selector, &app.newsletter.name)?;
    let cover_spec = CoverSpec::from_config(&app.cover)?;
    let site = SitePublisher::from_config(&app.site)?;
    if !config.skip_publish {
        site.check_template()?;
    }

    let fetcher = ContentFetcher::new(toolchain.calibre.web2disk.clone(), runner.clone());
    let composer = CoverComposer::new(toolchain.imagemagick.clone(), cover_spec, runner.clone());
    let converter = FormatConverter::new(toolchain.calibre.ebook_convert.clone(), runner.clone());
    let meta_writer = MetadataWriter::new(toolchain.calibre.ebook_meta.clone(), runner.clone());
    let catalog = CatalogClient::new(toolchain.calibre.calibredb.clone(), runner);

    info!(title = %ctx.title, scratch = %ctx.scratch_dir.display(), "starting run");

    prepare_scratch(&ctx)?;
    let manifest_path = ctx.manifest_path();
    let mut manifest = RunManifest::new(&ctx, &config.tool_version);
    write_manifest(&manifest_path, &manifest)?;

    // --- ResolveIssue ---
    progress.stage(Stage::ResolveIssue);
    let issue = issuepress_discovery::locate_issue(&ctx, &app.newsletter, &config.locator).await?;
    manifest.issue_url = Some(issue.url.clone());
    record_stage(&manifest_path, &mut manifest, Stage::ResolveIssue)?;

    // --- Fetch ---
    progress.stage(Stage::Fetch);
    let page = fetcher.fetch(&issue.url, &ctx.html_dir()).await?;
    record_stage(&manifest_path, &mut manifest, Stage::Fetch)?;

    // --- Declutter ---
    progress.stage(Stage::Declutter);
    declutterer.declutter_file(&page.index, &ctx.title)?;
    record_stage(&manifest_path, &mut manifest, Stage::Declutter)?;

    // --- Package ---
    progress.stage(Stage::Package);
    let bundle = package_bundle(&page.root, &ctx.bundle_path())?;
    record_stage(&manifest_path, &mut manifest, Stage::Package)?;

    // --- ComposeCover ---
    progress.stage(Stage::ComposeCover);
    let cover = composer.compose(&ctx.title, &ctx.cover_path()).await?;
    record_stage(&manifest_path, &mut manifest, Stage::ComposeCover)?;

    // --- Convert ---
    progress.stage(Stage::Convert);
    let formats = converter
        .convert(
            &bundle.path,
            &cover,
            &ctx.artifact_path(EbookFormat::Mobi),
            &ctx.artifact_path(EbookFormat::Epub),
        )
        .await?;
    let mut epub = formats.epub;
    let mut mobi = formats.mobi;
    manifest.artifacts = vec![artifact_meta(&epub)?, artifact_meta(&mobi)?];
    record_stage(&manifest_path, &mut manifest, Stage::Convert)?;

    // --- WriteMetadata ---
    progress.stage(Stage::WriteMetadata);
    let metadata = EbookMetadata {
        title: ctx.title.clone(),
        author: app.newsletter.author.clone(),
        author_sort: app.newsletter.author_sort.clone(),
        tags: app.newsletter.tags.clone(),
    };
    meta_writer.write(&mut epub, &cover, &metadata).await?;
    meta_writer.write(&mut mobi, &cover, &metadata).await?;
    manifest.artifacts = vec![artifact_meta(&epub)?, artifact_meta(&mobi)?];
    record_stage(&manifest_path, &mut manifest, Stage::WriteMetadata)?;

    // --- Catalog ---
    progress.stage(Stage::Catalog);
    let catalog_id = register_in_catalog(&catalog, &ctx.title, &epub, &mobi).await?;
    manifest.catalog_id = catalog_id.clone();
    record_stage(&manifest_path, &mut manifest, Stage::Catalog)?;

    // --- Publish ---
    progress.stage(Stage::Publish);
    let publish = if config.skip_publish {
        info!("site publishing disabled");
        PublishOutcome::Skipped {
            reason: "publishing disabled".into(),
        }
    } else {
        site.publish(&ctx, &[&epub, &mobi])?
    };
    manifest.publish = Some(publish.clone());
    record_stage(&manifest_path, &mut manifest, Stage::Publish)?;

    record_stage(&manifest_path, &mut manifest, Stage::Done)?;

    let result = PipelineResult {
        issue,
        epub,
        mobi,
        catalog_id,
        publish,
        manifest_path,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        title = %ctx.title,
        catalog_id = ?result.catalog_id,
        elapsed_ms = result.elapsed.as_millis(),
        "run complete"
    );

    Ok(result)
}

/// Remove any previous run's files and recreate the scratch layout.
fn prepare_scratch(ctx: &RunContext) -> Result<()> {
    if ctx.scratch_dir.exists() {
        std::fs::remove_dir_all(&ctx.scratch_dir)
            .map_err(|e| IssuePressError::io(&ctx.scratch_dir, e))?;
    }
    let html = ctx.html_dir();
    std::fs::create_dir_all(&html).map_err(|e| IssuePressError::io(&html, e))
}

/// Add the EPUB as a new entry, then attach the MOBI to it.
async fn register_in_catalog(
    catalog: &CatalogClient,
    title: &str,
    primary: &OutputArtifact,
    secondary: &OutputArtifact,
) -> Result<Option<String>> {
    catalog.add(None, &primary.path).await?;

    let id = catalog.find_by_title(title).await?;
    if id.is_none() {
        // Known inconsistency: the secondary becomes a separate entry.
        warn!(title, "new catalog entry not found by title, adding MOBI as a new entry");
    }

    catalog.add(id.as_deref(), &secondary.path).await?;
    Ok(id)
}
