use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HcpError {
    #[error("invalid subject id: {0}")]
    InvalidSubject(String),

    #[error("invalid task run: {0} (expected format: TASK:DIRECTION)")]
    InvalidTaskRun(String),

    #[error("no valid task runs specified")]
    #[diagnostic(help("use format TASK:DIRECTION, e.g. MOTOR:LR"))]
    NoTaskRuns,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no contrasts configured for task {0}")]
    MissingContrasts(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("datalad command failed: {0}")]
    Backend(String),

    #[error("git refused the dataset at {path} (dubious ownership)")]
    #[diagnostic(help(
        "run `git config --global --add safe.directory {path}` and re-run this command"
    ))]
    DubiousOwnership { path: String },
}
