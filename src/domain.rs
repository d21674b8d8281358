use std::fmt;
use std::str::FromStr;

use crate::error::HcpError;

pub const DEFAULT_DATASET_URL: &str =
    "https://github.com/datalad-datasets/human-connectome-project-openaccess";

/// Top-level directory of the subjects inside the dataset working copy.
pub const DATASET_ROOT_DIR: &str = "HCP1200";
pub const SESSION_3T: &str = "3T";
pub const STRUCTURAL_DIR: &str = "T1w_MPR1";
pub const STRUCTURAL_LABEL: &str = "STRUCTURAL";

/// Sibling subtrees under `unprocessed/` that the pruning step sweeps.
pub const PRUNED_MODALITIES: [&str; 3] = ["3T", "7T", "MEG"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = HcpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(HcpError::InvalidSubject(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// One functional run, selected by task name and phase-encoding direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRun {
    pub task: String,
    pub direction: String,
}

impl TaskRun {
    pub fn new(task: impl Into<String>, direction: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            direction: direction.into(),
        }
    }

    /// Directory name of the run inside a session, e.g. `tfMRI_MOTOR_LR`.
    pub fn dir_name(&self) -> String {
        format!("tfMRI_{}_{}", self.task, self.direction)
    }
}

impl fmt::Display for TaskRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task, self.direction)
    }
}

impl FromStr for TaskRun {
    type Err = HcpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (task, direction) = trimmed
            .split_once(':')
            .ok_or_else(|| HcpError::InvalidTaskRun(value.to_string()))?;
        let (task, direction) = (task.trim(), direction.trim());
        if !is_name_part(task) || !is_name_part(direction) {
            return Err(HcpError::InvalidTaskRun(value.to_string()));
        }
        Ok(Self::new(task, direction))
    }
}

/// Both halves end up in directory names, so only `[A-Za-z0-9_]` is accepted.
fn is_name_part(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Parses `"MOTOR:LR,GAMBLING:LR"` into task runs, skipping malformed entries.
pub fn parse_task_runs(value: &str) -> Vec<TaskRun> {
    let mut runs = Vec::new();
    for entry in value.split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<TaskRun>() {
            Ok(run) => runs.push(run),
            Err(_) => tracing::warn!(
                "Skipping invalid task run format: {entry} (expected format: TASK:DIRECTION)"
            ),
        }
    }
    runs
}

pub fn parse_subjects(value: &str) -> Result<Vec<SubjectId>, HcpError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}
