//! Process execution seam shared by every external tool client.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use issuepress_shared::{IssuePressError, Result};

/// A resolved executable plus the arguments that select its sub-command.
///
/// `magick montage ...` and a standalone `montage ...` are both a `montage`
/// program; the former just carries a leading `montage` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolProgram {
    /// Logical tool name used in logs and errors.
    pub name: String,
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// Arguments always passed before the call-specific ones.
    pub leading_args: Vec<String>,
}

impl ToolProgram {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            leading_args: Vec::new(),
        }
    }

    /// Same program, invoked through a multi-call binary (`magick <sub>`).
    pub fn with_leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Start building an invocation of this program.
    pub fn command(&self) -> ToolCommand {
        ToolCommand {
            tool: self.name.clone(),
            program: self.path.clone(),
            args: self.leading_args.clone(),
        }
    }
}

/// One fully-specified external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().to_string())
    }

    /// `--name=<path>` style argument.
    pub fn path_flag(self, flag: &str, path: &Path) -> Self {
        let value = format!("{flag}={}", path.to_string_lossy());
        self.arg(value)
    }

    /// Whether `arg` appears verbatim among the arguments.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed exit with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn an unsuccessful exit into [`IssuePressError::ToolFailed`].
    pub fn checked(self, tool: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(IssuePressError::ToolFailed {
            tool: tool.to_string(),
            code: self.code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Runs external commands. Every tool client goes through this trait so that
/// tests can substitute a scripted implementation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as real child processes and waits for them to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        debug!(tool = %command.tool, command = %command, "running external tool");

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    IssuePressError::ToolNotFound {
                        missing: vec![format!("{} not found", command.program.display())],
                    }
                } else {
                    IssuePressError::io(&command.program, e)
                }
            })?;

        let result = ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success {
            warn!(tool = %command.tool, code = ?result.code, "external tool exited unsuccessfully");
        }

        Ok(result)
    }
}

/// Size of a regular file, `None` if it is missing or empty.
pub fn non_empty_file(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}
