use camino::Utf8PathBuf;

use crate::domain::{
    DATASET_ROOT_DIR, SESSION_3T, STRUCTURAL_DIR, STRUCTURAL_LABEL, SubjectId, TaskRun,
};

const EVS_SUBPATH: [&str; 3] = ["LINKED_DATA", "EPRIME", "EVs"];

/// Paths inside the dataset working copy.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: Utf8PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn subjects_root(&self) -> Utf8PathBuf {
        self.root.join(DATASET_ROOT_DIR)
    }

    pub fn subject_dir(&self, subject: &SubjectId) -> Utf8PathBuf {
        self.subjects_root().join(subject.as_str())
    }

    pub fn modality_dir(&self, subject: &SubjectId, modality: &str) -> Utf8PathBuf {
        self.subject_dir(subject).join("unprocessed").join(modality)
    }

    pub fn session_dir(&self, subject: &SubjectId) -> Utf8PathBuf {
        self.modality_dir(subject, SESSION_3T)
    }

    /// Run directory relative to the working copy root, as passed to `get`.
    pub fn relative_scan_dir(subject: &SubjectId, dir_name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(DATASET_ROOT_DIR)
            .join(subject.as_str())
            .join("unprocessed")
            .join(SESSION_3T)
            .join(dir_name)
    }

    pub fn scan_dir(&self, subject: &SubjectId, dir_name: &str) -> Utf8PathBuf {
        self.root.join(Self::relative_scan_dir(subject, dir_name))
    }

    pub fn run_dir(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        self.scan_dir(subject, &run.dir_name())
    }

    pub fn run_scan(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        let dir_name = run.dir_name();
        self.scan_dir(subject, &dir_name)
            .join(scan_file_name(subject, &dir_name))
    }

    pub fn run_evs_dir(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        join_all(self.run_dir(subject, run), &EVS_SUBPATH)
    }

    pub fn structural_dir(&self, subject: &SubjectId) -> Utf8PathBuf {
        self.scan_dir(subject, STRUCTURAL_DIR)
    }

    pub fn structural_scan(&self, subject: &SubjectId) -> Utf8PathBuf {
        self.structural_dir(subject)
            .join(scan_file_name(subject, STRUCTURAL_DIR))
    }
}

/// Task-keyed output tree that mirrors the source subtree below the subject.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: Utf8PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, label: &str, subject: &SubjectId) -> Utf8PathBuf {
        self.root
            .join(label)
            .join(subject.as_str())
            .join("unprocessed")
            .join(SESSION_3T)
    }

    pub fn run_dir(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        self.session_dir(&run.task, subject).join(run.dir_name())
    }

    pub fn run_scan(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        let dir_name = run.dir_name();
        self.run_dir(subject, run)
            .join(scan_file_name(subject, &dir_name))
    }

    pub fn run_evs_dir(&self, subject: &SubjectId, run: &TaskRun) -> Utf8PathBuf {
        join_all(self.run_dir(subject, run), &EVS_SUBPATH)
    }

    pub fn structural_scan(&self, subject: &SubjectId) -> Utf8PathBuf {
        self.session_dir(STRUCTURAL_LABEL, subject)
            .join(STRUCTURAL_DIR)
            .join(scan_file_name(subject, STRUCTURAL_DIR))
    }
}

pub fn scan_file_name(subject: &SubjectId, dir_name: &str) -> String {
    format!("{subject}_3T_{dir_name}.nii.gz")
}

fn join_all(base: Utf8PathBuf, parts: &[&str]) -> Utf8PathBuf {
    parts.iter().fold(base, |path, part| path.join(part))
}
