//! Cover image generation with ImageMagick.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use issuepress_shared::{CoverConfig, IssuePressError, Result, expand_path};

use crate::locator::ImageMagick;
use crate::runner::{CommandRunner, ToolCommand, non_empty_file};

/// Resolved cover parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSpec {
    pub template: PathBuf,
    pub width: u32,
    pub height: u32,
    pub point_size: u32,
    pub frame: u32,
}

impl CoverSpec {
    /// Resolve `[cover]`. The template must already exist.
    pub fn from_config(config: &CoverConfig) -> Result<Self> {
        let template = expand_path(&config.template)?;
        if !template.is_file() {
            return Err(IssuePressError::config(format!(
                "cover.template {} is not a file; set it to a background image",
                template.display()
            )));
        }

        Ok(Self {
            template,
            width: config.width,
            height: config.height,
            point_size: config.point_size,
            frame: config.frame,
        })
    }

    /// `WxH!`: resize to exactly this size, ignoring the aspect ratio.
    pub fn exact_geometry(&self) -> String {
        format!("{}x{}!", self.width, self.height)
    }
}

/// Composites a title label onto the template and resizes the result.
pub struct CoverComposer {
    imagemagick: ImageMagick,
    spec: CoverSpec,
    runner: Arc<dyn CommandRunner>,
}

impl CoverComposer {
    pub fn new(imagemagick: ImageMagick, spec: CoverSpec, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            imagemagick,
            spec,
            runner,
        }
    }

    pub fn spec(&self) -> &CoverSpec {
        &self.spec
    }

    fn montage_command(&self, title: &str, out: &Path) -> ToolCommand {
        self.imagemagick
            .montage
            .command()
            .arg("-label")
            .arg(title)
            .path_arg(&self.spec.template)
            .arg("-geometry")
            .arg("+0+0")
            .arg("-pointsize")
            .arg(self.spec.point_size.to_string())
            .arg("-frame")
            .arg(self.spec.frame.to_string())
            .path_arg(out)
    }

    fn resize_command(&self, out: &Path) -> ToolCommand {
        self.imagemagick
            .mogrify
            .command()
            .arg("-resize")
            .arg(self.spec.exact_geometry())
            .path_arg(out)
    }

    /// Produce the cover at `out`. Overwrites any existing file.
    #[instrument(skip_all, fields(title = %title, out = %out.display()))]
    pub async fn compose(&self, title: &str, out: &Path) -> Result<PathBuf> {
        if !self.spec.template.is_file() {
            return Err(IssuePressError::CoverFailed(format!(
                "cover template not found: {}",
                self.spec.template.display()
            )));
        }

        let montage = self.montage_command(title, out);
        self.runner.run(&montage).await?.checked(&montage.tool)?;

        let resize = self.resize_command(out);
        self.runner.run(&resize).await?.checked(&resize.tool)?;

        let size = non_empty_file(out).ok_or_else(|| {
            IssuePressError::CoverFailed(format!("no image written to {}", out.display()))
        })?;

        info!(
            bytes = size,
            geometry = %self.spec.exact_geometry(),
            "cover composed"
        );

        Ok(out.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use crate::testing::{ScriptedRunner, fake_toolchain, temp_dir};

    fn spec(template: PathBuf) -> CoverSpec {
        CoverSpec {
            template,
            width: 590,
            height: 754,
            point_size: 21,
            frame: 3,
        }
    }

    #[test]
    fn spec_from_default_config() {
        let dir = temp_dir("cover-spec");
        let template = dir.join("cover-template.jpg");
        std::fs::write(&template, b"jpeg").unwrap();
        let config = CoverConfig {
            template: template.to_string_lossy().to_string(),
            ..CoverConfig::default()
        };

        let spec = CoverSpec::from_config(&config).unwrap();
        assert_eq!(spec.template, template);
        assert_eq!(spec.exact_geometry(), "590x754!");
        assert_eq!(spec.point_size, 21);
        assert_eq!(spec.frame, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn spec_rejects_missing_template() {
        let dir = temp_dir("cover-spec-missing");
        let config = CoverConfig {
            template: dir.join("absent.jpg").to_string_lossy().to_string(),
            ..CoverConfig::default()
        };

        let err = CoverSpec::from_config(&config).unwrap_err();
        assert!(matches!(err, IssuePressError::Config { ref message } if message.contains("absent.jpg")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn compose_runs_montage_then_exact_resize() {
        let dir = temp_dir("cover");
        let template = dir.join("template.jpg");
        std::fs::write(&template, b"jpeg").unwrap();
        let out = dir.join("cover.jpg");

        let runner = Arc::new(ScriptedRunner::simulating_tools("<article>x</article>"));
        let tools = fake_toolchain();
        let composer = CoverComposer::new(tools.imagemagick, spec(template.clone()), runner.clone());

        let path = composer
            .compose("Crypto-Gram - October 2026 issue", &out)
            .await
            .unwrap();
        assert_eq!(path, out);
        assert!(out.exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool, "montage");
        assert_eq!(
            calls[0].args,
            vec![
                "montage".to_string(),
                "-label".into(),
                "Crypto-Gram - October 2026 issue".into(),
                template.to_string_lossy().to_string(),
                "-geometry".into(),
                "+0+0".into(),
                "-pointsize".into(),
                "21".into(),
                "-frame".into(),
                "3".into(),
                out.to_string_lossy().to_string(),
            ]
        );
        assert_eq!(calls[1].tool, "mogrify");
        assert!(calls[1].has_arg("590x754!"));
        assert_eq!(calls[1].args.last(), Some(&out.to_string_lossy().to_string()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn resize_is_always_non_proportional() {
        for (w, h) in [(590, 754), (600, 800), (1200, 300)] {
            let composer = CoverComposer::new(
                fake_toolchain().imagemagick,
                CoverSpec {
                    width: w,
                    height: h,
                    ..spec(PathBuf::from("t.jpg"))
                },
                Arc::new(ScriptedRunner::succeeding()),
            );
            let cmd = composer.resize_command(Path::new("cover.jpg"));
            assert!(cmd.has_arg(&format!("{w}x{h}!")));
        }
    }

    #[tokio::test]
    async fn compose_fails_on_missing_template() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let composer = CoverComposer::new(
            fake_toolchain().imagemagick,
            spec(PathBuf::from("/nonexistent/template.jpg")),
            runner.clone(),
        );
        let err = composer
            .compose("t", Path::new("/tmp/cover.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, IssuePressError::CoverFailed(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn compose_stops_when_montage_fails() {
        let dir = temp_dir("cover-fail");
        let template = dir.join("template.jpg");
        std::fs::write(&template, b"jpeg").unwrap();

        let runner = Arc::new(ScriptedRunner::new(|_| ToolOutput::failed(1, "no font")));
        let composer =
            CoverComposer::new(fake_toolchain().imagemagick, spec(template), runner.clone());
        let err = composer
            .compose("t", &dir.join("cover.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, IssuePressError::ToolFailed { ref tool, .. } if tool == "montage"));
        assert_eq!(runner.calls().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
