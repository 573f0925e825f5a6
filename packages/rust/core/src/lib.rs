//! Pipeline orchestration for IssuePress.
//!
//! Ties issue discovery, page acquisition, the external ebook tools and site
//! publishing together into one run (see [`pipeline::run_pipeline`]).

pub mod bundle;
pub mod manifest;
pub mod pipeline;

pub use pipeline::{
    PipelineConfig, PipelineResult, ProgressReporter, SilentProgress, run_pipeline,
    run_pipeline_with,
};
