//! Test doubles for the external tool seam.
//!
//! Used by this crate's tests and by the pipeline tests downstream.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use issuepress_shared::Result;

use crate::locator::{Calibre, ImageMagick, Toolchain};
use crate::runner::{CommandRunner, ToolCommand, ToolOutput, ToolProgram};

type Handler = Box<dyn Fn(&ToolCommand) -> ToolOutput + Send + Sync>;

/// A [`CommandRunner`] that records every invocation and answers from a
/// handler instead of spawning processes.
pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&ToolCommand) -> ToolOutput + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with empty output and writes nothing.
    pub fn succeeding() -> Self {
        Self::new(|_| ToolOutput::ok(""))
    }

    /// Behave like the real tools on the happy path: `web2disk` mirrors
    /// `page` into its `-d` directory, `montage` and `ebook-convert` write
    /// their output file, `calibredb` reports entry id 7.
    pub fn simulating_tools(page: impl Into<String>) -> Self {
        let page = page.into();
        Self::new(move |cmd| simulate_tool(cmd, &page))
    }

    /// All recorded invocations, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded invocations of one logical tool.
    pub fn calls_to(&self, tool: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool == tool)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());
        Ok((self.handler)(command))
    }
}

fn write_output(path: &Path, contents: &[u8]) -> ToolOutput {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return ToolOutput::failed(1, e.to_string());
        }
    }
    match std::fs::write(path, contents) {
        Ok(()) => ToolOutput::ok(""),
        Err(e) => ToolOutput::failed(1, e.to_string()),
    }
}

/// The happy-path answer [`ScriptedRunner::simulating_tools`] gives to `cmd`,
/// for handlers that only override some tools.
pub fn simulate_tool(cmd: &ToolCommand, page: &str) -> ToolOutput {
    let args = &cmd.args;
    match cmd.tool.as_str() {
        "web2disk" => {
            let dir = args
                .iter()
                .position(|a| a == "-d")
                .and_then(|i| args.get(i + 1));
            match dir {
                Some(dir) => {
                    let dir = Path::new(dir);
                    let _ = write_output(&dir.join("style.css"), b"body {}");
                    write_output(&dir.join("index.xhtml"), page.as_bytes())
                }
                None => ToolOutput::failed(2, "missing -d"),
            }
        }
        "montage" => match args.last() {
            Some(out) => write_output(Path::new(out), b"\xff\xd8cover"),
            None => ToolOutput::failed(1, "no output"),
        },
        "ebook-convert" => match args.get(1) {
            Some(out) => write_output(Path::new(out), format!("converted:{}", args[0]).as_bytes()),
            None => ToolOutput::failed(1, "no output"),
        },
        "calibredb" => match args.first().map(String::as_str) {
            Some("list") => ToolOutput::ok("id title\n7 Crypto-Gram\n"),
            Some("add") => ToolOutput::ok("Added book ids: 7\n"),
            _ => ToolOutput::ok(""),
        },
        _ => ToolOutput::ok(""),
    }
}

/// A toolchain whose programs live under `/fake/bin`. Only meaningful with a
/// [`ScriptedRunner`].
pub fn fake_toolchain() -> Toolchain {
    let bin = PathBuf::from("/fake/bin");
    Toolchain {
        calibre: Calibre {
            calibredb: ToolProgram::new("calibredb", bin.join("calibredb")),
            ebook_convert: ToolProgram::new("ebook-convert", bin.join("ebook-convert")),
            ebook_meta: ToolProgram::new("ebook-meta", bin.join("ebook-meta")),
            web2disk: ToolProgram::new("web2disk", bin.join("web2disk")),
        },
        imagemagick: ImageMagick {
            montage: ToolProgram::new("montage", bin.join("magick")).with_leading_arg("montage"),
            mogrify: ToolProgram::new("mogrify", bin.join("magick")).with_leading_arg("mogrify"),
        },
    }
}

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ip-{prefix}-test-{}", Uuid::now_v7()));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let runner = ScriptedRunner::succeeding();
        let tools = fake_toolchain();
        runner.run(&tools.calibre.ebook_meta.command().arg("a")).await.unwrap();
        runner.run(&tools.calibre.calibredb.command().arg("b")).await.unwrap();

        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls_to("calibredb")[0].args, vec!["b"]);
    }

    #[tokio::test]
    async fn simulated_web2disk_writes_page() {
        let dir = temp_dir("scripted");
        let runner = ScriptedRunner::simulating_tools("<html></html>");
        let cmd = fake_toolchain()
            .calibre
            .web2disk
            .command()
            .arg("-d")
            .path_arg(&dir)
            .arg("https://example.com/");
        assert!(runner.run(&cmd).await.unwrap().success);
        assert_eq!(
            std::fs::read_to_string(dir.join("index.xhtml")).unwrap(),
            "<html></html>"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
