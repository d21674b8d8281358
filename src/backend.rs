use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::HcpError;

/// Content retrieval for a versioned dataset working copy.
///
/// Files in the working copy may be symlinks into an annex until they are
/// unlocked; `get` materializes a subtree and `unlock` turns an annexed
/// symlink into a regular file.
pub trait DatasetBackend {
    fn root(&self) -> &Utf8Path;
    fn get(&self, relative: &Utf8Path) -> Result<(), HcpError>;
    fn unlock(&self, path: &Utf8Path) -> Result<(), HcpError>;
}

#[derive(Debug, Clone)]
pub struct DataladCli {
    program: PathBuf,
    root: Utf8PathBuf,
}

impl DataladCli {
    pub fn new(root: Utf8PathBuf) -> Result<Self, HcpError> {
        let program =
            find_in_path("datalad").ok_or_else(|| HcpError::MissingTool("datalad".to_string()))?;
        Ok(Self::with_program(program, root))
    }

    /// Uses `program` as the datalad executable instead of searching `PATH`.
    pub fn with_program(program: impl Into<PathBuf>, root: Utf8PathBuf) -> Self {
        Self {
            program: program.into(),
            root,
        }
    }

    /// Reuses the working copy at `path` when it exists, otherwise clones `url` into it.
    pub fn open_or_clone(url: &str, path: Utf8PathBuf) -> Result<Self, HcpError> {
        tracing::info!("Setting up dataset at {path}");
        Self::new(path)?.clone_if_missing(url)
    }

    pub fn clone_if_missing(self, url: &str) -> Result<Self, HcpError> {
        if self.root.as_std_path().exists() {
            tracing::info!("Dataset already exists, using existing dataset...");
            return Ok(self);
        }

        tracing::info!("Cloning dataset...");
        let args = vec![
            "clone".to_string(),
            url.to_string(),
            self.root.to_string(),
        ];
        match self.run_cmd(&args, None) {
            Ok(()) => Ok(self),
            Err(HcpError::Backend(message)) if is_dubious_ownership(&message) => {
                let absolute = std::path::absolute(self.root.as_std_path())
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|_| self.root.to_string());
                tracing::error!("Git ownership issue during clone!");
                tracing::error!("To fix this, run:");
                tracing::error!("git config --global --add safe.directory {absolute}");
                tracing::error!("Then re-run this script.");
                Err(HcpError::DubiousOwnership { path: absolute })
            }
            Err(err) => Err(err),
        }
    }

    fn run_cmd(&self, args: &[String], cwd: Option<&Path>) -> Result<(), HcpError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .map_err(|err| HcpError::Backend(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        Err(HcpError::Backend(failure_message(&self.program, &output)))
    }
}

impl DatasetBackend for DataladCli {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn get(&self, relative: &Utf8Path) -> Result<(), HcpError> {
        let args = vec!["get".to_string(), relative.to_string()];
        self.run_cmd(&args, Some(self.root.as_std_path()))
    }

    fn unlock(&self, path: &Utf8Path) -> Result<(), HcpError> {
        let target = path.strip_prefix(&self.root).unwrap_or(path);
        let args = vec!["unlock".to_string(), target.to_string()];
        self.run_cmd(&args, Some(self.root.as_std_path()))
    }
}

pub fn is_dubious_ownership(message: &str) -> bool {
    message.contains("dubious ownership")
}

fn failure_message(program: &Path, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("command failed: {}", program.display())
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dubious_ownership() {
        let message = "fatal: detected dubious ownership in repository at '/data/hcp'";
        assert!(is_dubious_ownership(message));
        assert!(!is_dubious_ownership("fatal: repository not found"));
    }
}
