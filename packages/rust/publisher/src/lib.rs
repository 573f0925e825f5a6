//! Static site update: a dated post plus downloadable copies of the ebooks.
//!
//! The site is a sibling repository checkout. When it is not present the
//! publisher does nothing and reports [`PublishOutcome::Skipped`].

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use issuepress_shared::{
    EbookFormat, IssuePressError, OutputArtifact, PublishOutcome, Result, RunContext, SiteConfig,
    expand_path,
};

/// Resolved `[site]` settings.
#[derive(Debug, Clone)]
pub struct SitePublisher {
    repo_dir: PathBuf,
    template: PathBuf,
    post_dir: String,
    static_dir: String,
    post_slug: String,
    asset_prefix: String,
}

impl SitePublisher {
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        Ok(Self {
            repo_dir: expand_path(&config.repo_dir)?,
            template: expand_path(&config.template)?,
            post_dir: config.post_dir.clone(),
            static_dir: config.static_dir.clone(),
            post_slug: config.post_slug.clone(),
            asset_prefix: config.asset_prefix.clone(),
        })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// `<repo>/<post_dir>/<YYYY>-<MM>-<DD>-<slug>-<month>-<YYYY>-in-epub-and-mobi-format.md`
    pub fn post_path(&self, ctx: &RunContext) -> PathBuf {
        let file_name = format!(
            "{}-{}-{}-{}-{}-{}-in-epub-and-mobi-format.md",
            ctx.yyyy(),
            ctx.mm(),
            ctx.dd(),
            self.post_slug,
            ctx.month_name().to_lowercase(),
            ctx.yyyy()
        );
        self.repo_dir.join(&self.post_dir).join(file_name)
    }

    /// The "latest" and the dated copy of one format.
    pub fn asset_paths(&self, ctx: &RunContext, format: EbookFormat) -> [PathBuf; 2] {
        let dir = self.repo_dir.join(&self.static_dir);
        let ext = format.extension();
        [
            dir.join(format!("{}-last.{ext}", self.asset_prefix)),
            dir.join(format!(
                "{}-{}-{}.{ext}",
                self.asset_prefix,
                ctx.yyyy(),
                ctx.mm()
            )),
        ]
    }

    /// Fail early when the repository exists but the post template does not.
    pub fn check_template(&self) -> Result<()> {
        if self.repo_dir.is_dir() && !self.template.is_file() {
            return Err(IssuePressError::config(format!(
                "site.template {} is not a file (run `issuepress config init` to install the default)",
                self.template.display()
            )));
        }
        Ok(())
    }

    /// Render the post and copy every artifact into the site repository.
    #[instrument(skip_all, fields(repo = %self.repo_dir.display(), title = %ctx.title))]
    pub fn publish(&self, ctx: &RunContext, artifacts: &[&OutputArtifact]) -> Result<PublishOutcome> {
        if !self.repo_dir.is_dir() {
            warn!(
                repo = %self.repo_dir.display(),
                "site repository not found, website not updated"
            );
            return Ok(PublishOutcome::Skipped {
                reason: format!("{} does not exist", self.repo_dir.display()),
            });
        }

        let template = std::fs::read_to_string(&self.template)
            .map_err(|e| IssuePressError::io(&self.template, e))?;
        let post = render_template(&template, ctx);

        let post_path = self.post_path(ctx);
        write_file(&post_path, post.as_bytes())?;
        info!(post = %post_path.display(), "site post written");

        let mut assets = Vec::new();
        for artifact in artifacts {
            for target in self.asset_paths(ctx, artifact.format) {
                copy_file(&artifact.path, &target)?;
                assets.push(target);
            }
        }
        info!(count = assets.len(), "ebooks copied to site, remember to publish it");

        Ok(PublishOutcome::Published { post_path, assets })
    }
}

/// Substitute the date tokens in a post template.
pub fn render_template(template: &str, ctx: &RunContext) -> String {
    let month = ctx.month_name();
    template
        .replace("_YYYY_", &ctx.yyyy())
        .replace("_MM_", &ctx.mm())
        .replace("_DD_", &ctx.dd())
        .replace("_MONTH_", &month)
        .replace("_month_", &month.to_lowercase())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| IssuePressError::io(parent, e))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, contents).map_err(|e| IssuePressError::io(path, e))
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    ensure_parent(to)?;
    let bytes = std::fs::copy(from, to).map_err(|e| IssuePressError::io(from, e))?;
    debug!(from = %from.display(), to = %to.display(), bytes, "copied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TEMPLATE: &str = "---\ntitle: \"Crypto-Gram _MONTH_ _YYYY_\"\ndate: _YYYY_-_MM_-_DD_\n---\n[EPUB](/cryptogram/cryptogram-_YYYY_-_MM_.epub) for _month_\n";

    fn temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ip-{prefix}-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn context(month: u32) -> RunContext {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        RunContext::new(today, month, "Crypto-Gram", "/tmp/ip-scratch").unwrap()
    }

    fn publisher(root: &Path) -> SitePublisher {
        let template = root.join("template.md");
        std::fs::write(&template, TEMPLATE).unwrap();
        SitePublisher::from_config(&SiteConfig {
            repo_dir: root.join("site").to_string_lossy().to_string(),
            template: template.to_string_lossy().to_string(),
            ..SiteConfig::default()
        })
        .unwrap()
    }

    fn artifacts(root: &Path) -> (OutputArtifact, OutputArtifact) {
        let epub = root.join("issue.epub");
        let mobi = root.join("issue.mobi");
        std::fs::write(&epub, b"epub-bytes").unwrap();
        std::fs::write(&mobi, b"mobi-bytes").unwrap();
        (
            OutputArtifact::new(EbookFormat::Epub, epub),
            OutputArtifact::new(EbookFormat::Mobi, mobi),
        )
    }

    #[test]
    fn renders_every_token() {
        let out = render_template(TEMPLATE, &context(3));
        assert_eq!(
            out,
            "---\ntitle: \"Crypto-Gram March 2026\"\ndate: 2026-03-19\n---\n[EPUB](/cryptogram/cryptogram-2026-03.epub) for march\n"
        );
    }

    #[test]
    fn post_and_asset_names() {
        let site = SitePublisher::from_config(&SiteConfig {
            repo_dir: "/srv/site".into(),
            ..SiteConfig::default()
        })
        .unwrap();
        let ctx = context(10);

        assert_eq!(
            site.post_path(&ctx),
            PathBuf::from(
                "/srv/site/content/crypto-gram-for-e-readers/2026-10-19-crypto-gram-october-2026-in-epub-and-mobi-format.md"
            )
        );
        assert_eq!(
            site.asset_paths(&ctx, EbookFormat::Mobi),
            [
                PathBuf::from("/srv/site/static/cryptogram/cryptogram-last.mobi"),
                PathBuf::from("/srv/site/static/cryptogram/cryptogram-2026-10.mobi"),
            ]
        );
    }

    #[test]
    fn template_is_only_required_with_a_repository() {
        let root = temp_dir("publish-template");
        let site = SitePublisher::from_config(&SiteConfig {
            repo_dir: root.join("site").to_string_lossy().to_string(),
            template: root.join("absent.md").to_string_lossy().to_string(),
            ..SiteConfig::default()
        })
        .unwrap();

        assert!(site.check_template().is_ok());

        std::fs::create_dir_all(root.join("site")).unwrap();
        let err = site.check_template().unwrap_err();
        assert!(matches!(err, IssuePressError::Config { ref message } if message.contains("absent.md")));

        assert!(publisher(&root).check_template().is_ok());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_repository_is_skipped_without_writes() {
        let root = temp_dir("publish-skip");
        let site = publisher(&root);
        let (epub, mobi) = artifacts(&root);

        let outcome = site.publish(&context(10), &[&epub, &mobi]).unwrap();

        assert!(matches!(outcome, PublishOutcome::Skipped { .. }));
        assert!(!root.join("site").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn publishes_post_and_four_assets() {
        let root = temp_dir("publish");
        std::fs::create_dir_all(root.join("site")).unwrap();
        let site = publisher(&root);
        let (epub, mobi) = artifacts(&root);
        let ctx = context(10);

        let outcome = site.publish(&ctx, &[&epub, &mobi]).unwrap();

        let PublishOutcome::Published { post_path, assets } = outcome else {
            panic!("expected Published");
        };
        assert_eq!(post_path, site.post_path(&ctx));
        let post = std::fs::read_to_string(&post_path).unwrap();
        assert!(post.contains("Crypto-Gram October 2026"));
        assert!(!post.contains("_YYYY_") && !post.contains("_month_"));

        assert_eq!(assets.len(), 4);
        let static_dir = root.join("site/static/cryptogram");
        assert_eq!(
            std::fs::read(static_dir.join("cryptogram-last.epub")).unwrap(),
            b"epub-bytes"
        );
        assert_eq!(
            std::fs::read(static_dir.join("cryptogram-2026-10.mobi")).unwrap(),
            b"mobi-bytes"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn republishing_overwrites() {
        let root = temp_dir("publish-again");
        std::fs::create_dir_all(root.join("site")).unwrap();
        let site = publisher(&root);
        let (epub, mobi) = artifacts(&root);
        let ctx = context(10);

        site.publish(&ctx, &[&epub, &mobi]).unwrap();
        std::fs::write(&epub.path, b"newer").unwrap();
        site.publish(&ctx, &[&epub, &mobi]).unwrap();

        let latest = root.join("site/static/cryptogram/cryptogram-last.epub");
        assert_eq!(std::fs::read(latest).unwrap(), b"newer");

        let _ = std::fs::remove_dir_all(&root);
    }
}
