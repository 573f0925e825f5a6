//! Clients for the external command-line tools used by IssuePress.
//!
//! Every client holds a resolved [`ToolProgram`] and an
//! `Arc<dyn CommandRunner>`; nothing here spawns a process directly except
//! [`ProcessRunner`].

pub mod catalog;
pub mod convert;
pub mod cover;
pub mod locator;
pub mod metadata;
pub mod runner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{CatalogClient, exact_title_query, parse_first_id};
pub use convert::{ConvertedFormats, FormatConverter};
pub use cover::{CoverComposer, CoverSpec};
pub use locator::{Calibre, ImageMagick, ToolLocator, Toolchain};
pub use metadata::MetadataWriter;
pub use runner::{CommandRunner, ProcessRunner, ToolCommand, ToolOutput, ToolProgram, non_empty_file};
