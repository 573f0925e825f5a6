//! Reduce a mirrored page to its article.
//!
//! Everything outside the first content container (navigation, sidebars,
//! comment forms) is dropped and the page is rebuilt around that container
//! with a fresh title and heading.

use std::path::Path;

use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

use issuepress_shared::{IssuePressError, Result};

pub struct ContentDeclutterer {
    selector: Selector,
    selector_src: String,
    heading: String,
}

impl ContentDeclutterer {
    /// `selector` picks the content container, `heading` becomes the page's
    /// `<h1>`.
    pub fn new(selector: &str, heading: impl Into<String>) -> Result<Self> {
        let parsed = Selector::parse(selector).map_err(|e| {
            IssuePressError::config(format!("invalid content selector {selector:?}: {e}"))
        })?;
        Ok(Self {
            selector: parsed,
            selector_src: selector.to_string(),
            heading: heading.into(),
        })
    }

    /// Rebuilt page markup, or `None` when the container is absent.
    pub fn declutter_html(&self, html: &str, title: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let article = doc.select(&self.selector).next()?.html();

        Some(format!(
            "<html>\n<head>\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>",
            escape_html(title),
            escape_html(&self.heading),
            article
        ))
    }

    /// Rewrite `path` in place. The file is left untouched on failure.
    #[instrument(skip_all, fields(path = %path.display(), title = %title))]
    pub fn declutter_file(&self, path: &Path, title: &str) -> Result<()> {
        let html = std::fs::read_to_string(path).map_err(|e| IssuePressError::io(path, e))?;

        let Some(page) = self.declutter_html(&html, title) else {
            warn!(selector = %self.selector_src, "content container not found");
            return Err(IssuePressError::DeclutterFailed {
                path: path.to_path_buf(),
                selector: self.selector_src.clone(),
            });
        };

        std::fs::write(path, &page).map_err(|e| IssuePressError::io(path, e))?;
        info!(before = html.len(), after = page.len(), "page decluttered");
        Ok(())
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
