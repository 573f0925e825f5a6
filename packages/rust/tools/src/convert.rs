//! Two-step ebook conversion through Calibre's `ebook-convert`.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use issuepress_shared::{EbookFormat, IssuePressError, OutputArtifact, Result};

use crate::runner::{CommandRunner, ToolCommand, ToolProgram, non_empty_file};

/// Both converted files of one run.
#[derive(Debug, Clone)]
pub struct ConvertedFormats {
    pub mobi: OutputArtifact,
    pub epub: OutputArtifact,
}

/// Converts the zipped HTML bundle to MOBI, then the MOBI to EPUB.
pub struct FormatConverter {
    ebook_convert: ToolProgram,
    runner: Arc<dyn CommandRunner>,
}

impl FormatConverter {
    pub fn new(ebook_convert: ToolProgram, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ebook_convert,
            runner,
        }
    }

    fn to_mobi_command(&self, bundle: &Path, cover: &Path, mobi: &Path) -> ToolCommand {
        self.ebook_convert
            .command()
            .path_arg(bundle)
            .path_arg(mobi)
            .arg("--no-inline-toc")
            .path_flag("--cover", cover)
    }

    fn to_epub_command(&self, mobi: &Path, cover: &Path, epub: &Path) -> ToolCommand {
        self.ebook_convert
            .command()
            .path_arg(mobi)
            .path_arg(epub)
            .arg("--preserve-cover-aspect-ratio")
            .arg("--dont-split-on-page-breaks")
            .path_flag("--cover", cover)
    }

    async fn convert_one(&self, command: ToolCommand, out: &Path, format: EbookFormat) -> Result<()> {
        self.runner.run(&command).await?.checked(&command.tool)?;
        let size = non_empty_file(out).ok_or_else(|| {
            IssuePressError::ConversionFailed(format!(
                "{format} output missing or empty: {}",
                out.display()
            ))
        })?;
        info!(%format, bytes = size, path = %out.display(), "converted");
        Ok(())
    }

    /// Produce `mobi_path` from the bundle, then `epub_path` from the MOBI.
    ///
    /// The second step never runs if the first one fails.
    #[instrument(skip_all, fields(bundle = %bundle.display(), epub = %epub_path.display()))]
    pub async fn convert(
        &self,
        bundle: &Path,
        cover: &Path,
        mobi_path: &Path,
        epub_path: &Path,
    ) -> Result<ConvertedFormats> {
        if !bundle.is_file() {
            return Err(IssuePressError::ConversionFailed(format!(
                "bundle not found: {}",
                bundle.display()
            )));
        }

        let to_mobi = self.to_mobi_command(bundle, cover, mobi_path);
        self.convert_one(to_mobi, mobi_path, EbookFormat::Mobi).await?;

        let to_epub = self.to_epub_command(mobi_path, cover, epub_path);
        self.convert_one(to_epub, epub_path, EbookFormat::Epub).await?;

        Ok(ConvertedFormats {
            mobi: OutputArtifact::new(EbookFormat::Mobi, mobi_path),
            epub: OutputArtifact::new(EbookFormat::Epub, epub_path),
        })
    }
}
