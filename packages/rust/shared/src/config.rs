//! Application configuration for IssuePress.
//!
//! User config lives at `~/.issuepress/issuepress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{IssuePressError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "issuepress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".issuepress";

/// Default post template, installed into `<config dir>/assets/` by `config init`.
const SITE_POST_TEMPLATE: &str = include_str!("../../../../assets/site-post-template.md");

/// File name of the installed post template.
const SITE_POST_TEMPLATE_NAME: &str = "site-post-template.md";

// ---------------------------------------------------------------------------
// Config structs (matching issuepress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The newsletter being republished.
    #[serde(default)]
    pub newsletter: NewsletterConfig,

    /// Cover image generation.
    #[serde(default)]
    pub cover: CoverConfig,

    /// Scratch directory and tool lookup.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Static site repository publishing.
    #[serde(default)]
    pub site: SiteConfig,
}

/// `[newsletter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterConfig {
    /// Display name, used in titles and the page heading.
    #[serde(default = "default_name")]
    pub name: String,

    /// Page listing the issues, newest first.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Substring identifying issue links on the index page.
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,

    /// How many times each issue is linked from the index page.
    #[serde(default = "default_links_per_issue")]
    pub links_per_issue: usize,

    /// Author written into the ebook metadata.
    #[serde(default = "default_author")]
    pub author: String,

    /// Author sort key ("Last, First").
    #[serde(default = "default_author_sort")]
    pub author_sort: String,

    /// Ebook tags.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    /// CSS selector of the article container kept by the declutter pass.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            index_url: default_index_url(),
            archive_prefix: default_archive_prefix(),
            links_per_issue: default_links_per_issue(),
            author: default_author(),
            author_sort: default_author_sort(),
            tags: default_tags(),
            content_selector: default_content_selector(),
        }
    }
}

fn default_name() -> String {
    "Crypto-Gram".into()
}
fn default_index_url() -> String {
    "https://www.schneier.com/crypto-gram/".into()
}
fn default_archive_prefix() -> String {
    "https://www.schneier.com/crypto-gram/archives/".into()
}
fn default_links_per_issue() -> usize {
    2
}
fn default_author() -> String {
    "Bruce Schneier".into()
}
fn default_author_sort() -> String {
    "Schneier, Bruce".into()
}
fn default_tags() -> Vec<String> {
    vec!["Crypto-Gram".into()]
}
fn default_content_selector() -> String {
    "article".into()
}

/// `[cover]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    /// Background image the title label is composited onto. No image is
    /// installed by `config init`; place one at this path or point it elsewhere.
    #[serde(default = "default_cover_template")]
    pub template: String,

    /// Final cover width in pixels.
    #[serde(default = "default_cover_width")]
    pub width: u32,

    /// Final cover height in pixels.
    #[serde(default = "default_cover_height")]
    pub height: u32,

    /// Label font size.
    #[serde(default = "default_point_size")]
    pub point_size: u32,

    /// Frame width around the composed image.
    #[serde(default = "default_frame")]
    pub frame: u32,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            template: default_cover_template(),
            width: default_cover_width(),
            height: default_cover_height(),
            point_size: default_point_size(),
            frame: default_frame(),
        }
    }
}

fn default_cover_template() -> String {
    "~/.issuepress/assets/cover-template.jpg".into()
}
fn default_cover_width() -> u32 {
    590
}
fn default_cover_height() -> u32 {
    754
}
fn default_point_size() -> u32 {
    21
}
fn default_frame() -> u32 {
    3
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Per-run working directory. Deleted and recreated at every run.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Overrides `PATH` when looking up external tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_search_path: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            tool_search_path: None,
        }
    }
}

fn default_scratch_dir() -> String {
    "~/.issuepress/scratch".into()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site repository checkout. Publishing is skipped when it does not exist.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: String,

    /// Post template with `_YYYY_`, `_MM_`, `_DD_`, `_MONTH_`, `_month_` tokens.
    #[serde(default = "default_site_template")]
    pub template: String,

    /// Post directory, relative to the repository.
    #[serde(default = "default_post_dir")]
    pub post_dir: String,

    /// Downloadable files directory, relative to the repository.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Slug used in post file names.
    #[serde(default = "default_post_slug")]
    pub post_slug: String,

    /// File name prefix of the copied ebooks.
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            template: default_site_template(),
            post_dir: default_post_dir(),
            static_dir: default_static_dir(),
            post_slug: default_post_slug(),
            asset_prefix: default_asset_prefix(),
        }
    }
}

fn default_repo_dir() -> String {
    "../../bernardi.cloud".into()
}
fn default_site_template() -> String {
    "~/.issuepress/assets/site-post-template.md".into()
}
fn default_post_dir() -> String {
    "content/crypto-gram-for-e-readers".into()
}
fn default_static_dir() -> String {
    "static/cryptogram".into()
}
fn default_post_slug() -> String {
    "crypto-gram".into()
}
fn default_asset_prefix() -> String {
    "cryptogram".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.issuepress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| IssuePressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.issuepress/issuepress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IssuePressError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        IssuePressError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Write a default config file into `dir`, plus the default post template
/// under `dir/assets/` unless one is already there.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    let assets = dir.join("assets");
    std::fs::create_dir_all(&assets).map_err(|e| IssuePressError::io(&assets, e))?;

    let template = assets.join(SITE_POST_TEMPLATE_NAME);
    if !template.exists() {
        std::fs::write(&template, SITE_POST_TEMPLATE)
            .map_err(|e| IssuePressError::io(&template, e))?;
        tracing::info!(?template, "installed default post template");
    }

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IssuePressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IssuePressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let nl = &config.newsletter;
    if nl.name.trim().is_empty() {
        return Err(IssuePressError::config("newsletter.name must not be empty"));
    }
    Url::parse(&nl.index_url).map_err(|e| {
        IssuePressError::config(format!("newsletter.index_url '{}': {e}", nl.index_url))
    })?;
    if nl.archive_prefix.is_empty() {
        return Err(IssuePressError::config(
            "newsletter.archive_prefix must not be empty",
        ));
    }
    if nl.links_per_issue == 0 {
        return Err(IssuePressError::config(
            "newsletter.links_per_issue must be at least 1",
        ));
    }
    if config.cover.width == 0 || config.cover.height == 0 {
        return Err(IssuePressError::config(format!(
            "cover size {}x{} is not a valid image size",
            config.cover.width, config.cover.height
        )));
    }
    if config.paths.scratch_dir.trim().is_empty() {
        return Err(IssuePressError::config("paths.scratch_dir must not be empty"));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    if raw == "~" || raw.starts_with("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| IssuePressError::config("could not determine home directory"))?;
        let rest = raw.trim_start_matches('~').trim_start_matches('/');
        if rest.is_empty() {
            return Ok(home);
        }
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("index_url"));
        assert!(toml_str.contains("Crypto-Gram"));
        // Unset optional override is omitted entirely
        assert!(!toml_str.contains("tool_search_path"));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let toml_str = r#"
[newsletter]
name = "Weekly Notes"
index_url = "https://notes.example.com/"
archive_prefix = "https://notes.example.com/issues/"
links_per_issue = 1

[cover]
width = 600
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.newsletter.name, "Weekly Notes");
        assert_eq!(config.newsletter.links_per_issue, 1);
        assert_eq!(config.newsletter.content_selector, "article");
        assert_eq!(config.cover.width, 600);
        assert_eq!(config.cover.height, 754);
        assert_eq!(config.site.asset_prefix, "cryptogram");
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn validation_rejects_zero_links_per_issue() {
        let mut config = AppConfig::default();
        config.newsletter.links_per_issue = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("links_per_issue"));
    }

    #[test]
    fn validation_rejects_bad_index_url() {
        let mut config = AppConfig::default();
        config.newsletter.index_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn asset_defaults_live_in_config_dir() {
        let config = AppConfig::default();
        let home = dirs::home_dir().expect("home dir");
        let assets = home.join(CONFIG_DIR_NAME).join("assets");
        assert_eq!(
            expand_path(&config.cover.template).unwrap(),
            assets.join("cover-template.jpg")
        );
        assert_eq!(
            expand_path(&config.site.template).unwrap(),
            assets.join(SITE_POST_TEMPLATE_NAME)
        );
    }

    #[test]
    fn init_installs_post_template_once() {
        let dir = std::env::temp_dir().join(format!(
            "ip-config-init-test-{}",
            uuid::Uuid::now_v7()
        ));

        let path = init_config_in(&dir).expect("init");
        assert_eq!(path, dir.join(CONFIG_FILE_NAME));
        let installed = dir.join("assets").join(SITE_POST_TEMPLATE_NAME);
        assert_eq!(
            std::fs::read_to_string(&installed).unwrap(),
            SITE_POST_TEMPLATE
        );
        assert!(SITE_POST_TEMPLATE.contains("_YYYY_"));

        std::fs::write(&installed, "custom _MONTH_").unwrap();
        init_config_in(&dir).expect("re-init");
        assert_eq!(std::fs::read_to_string(&installed).unwrap(), "custom _MONTH_");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn expand_path_handles_tilde() {
        let home = dirs::home_dir().expect("home dir");
        assert_eq!(expand_path("~/.issuepress/scratch").unwrap(), home.join(".issuepress/scratch"));
        assert_eq!(expand_path("~").unwrap(), home);
        assert_eq!(
            expand_path("../../site").unwrap(),
            PathBuf::from("../../site")
        );
    }
}
