//! Issue page acquisition: mirroring the page and reducing it to its article.
//!
//! - [`fetcher`]: runs the page mirroring tool into the scratch directory
//! - [`declutter`]: rewrites the mirrored page around its content container

pub mod declutter;
pub mod fetcher;

pub use declutter::{ContentDeclutterer, escape_html};
pub use fetcher::{ContentFetcher, MirroredPage, find_index_page};
