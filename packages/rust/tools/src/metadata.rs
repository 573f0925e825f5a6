//! Ebook metadata editing through Calibre's `ebook-meta`.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use issuepress_shared::{EbookMetadata, OutputArtifact, Result};

use crate::runner::{CommandRunner, ToolCommand, ToolProgram};

pub struct MetadataWriter {
    ebook_meta: ToolProgram,
    runner: Arc<dyn CommandRunner>,
}

impl MetadataWriter {
    pub fn new(ebook_meta: ToolProgram, runner: Arc<dyn CommandRunner>) -> Self {
        Self { ebook_meta, runner }
    }

    fn command(&self, file: &Path, cover: &Path, metadata: &EbookMetadata) -> ToolCommand {
        self.ebook_meta
            .command()
            .path_arg(file)
            .arg(format!("--title={}", metadata.title))
            .path_flag("--cover", cover)
            .arg(format!("--authors={}", metadata.author))
            .arg(format!("--author-sort={}", metadata.author_sort))
            .arg(format!("--tags={}", metadata.joined_tags()))
    }

    /// Write title, cover, author and tags into `artifact` in place.
    #[instrument(skip(self, artifact, metadata), fields(format = %artifact.format, path = %artifact.path.display()))]
    pub async fn write(
        &self,
        artifact: &mut OutputArtifact,
        cover: &Path,
        metadata: &EbookMetadata,
    ) -> Result<()> {
        let command = self.command(&artifact.path, cover, metadata);
        self.runner.run(&command).await?.checked(&command.tool)?;

        artifact.metadata = Some(metadata.clone());
        info!(title = %metadata.title, "metadata written");
        Ok(())
    }
}
