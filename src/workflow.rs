use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::backend::DatasetBackend;
use crate::domain::{PRUNED_MODALITIES, STRUCTURAL_DIR, SubjectId, TaskRun};
use crate::error::HcpError;
use crate::fs_util;
use crate::layout::{DatasetLayout, OutputLayout};
use crate::logging::OperationLogger;

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Also fetch the anatomical scan and keep it through pruning.
    pub include_structural: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub subjects: Vec<SubjectReport>,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.subjects.iter().map(|report| report.failures.len()).sum()
    }
}

/// What happened to one subject. Failures are recorded here and logged,
/// never raised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectReport {
    pub subject: String,
    pub fetched: Vec<String>,
    pub pruned: Vec<String>,
    pub copied: Vec<String>,
    pub removed: Vec<String>,
    pub kept: Vec<String>,
    pub failures: Vec<String>,
}

impl SubjectReport {
    fn new(subject: &SubjectId) -> Self {
        Self {
            subject: subject.to_string(),
            ..Self::default()
        }
    }

    fn fail(&mut self, message: String) {
        tracing::error!("{message}");
        self.failures.push(message);
    }
}

/// A file the organize step wants out of the working copy.
struct Transfer {
    source: Utf8PathBuf,
    dest: Utf8PathBuf,
}

pub struct Workflow<B: DatasetBackend> {
    backend: B,
    dataset: DatasetLayout,
    output: OutputLayout,
    oplog: OperationLogger,
    options: WorkflowOptions,
}

impl<B: DatasetBackend> Workflow<B> {
    pub fn new(
        backend: B,
        output_root: Utf8PathBuf,
        oplog: OperationLogger,
        options: WorkflowOptions,
    ) -> Self {
        let dataset = DatasetLayout::new(backend.root().to_path_buf());
        Self {
            backend,
            dataset,
            output: OutputLayout::new(output_root),
            oplog,
            options,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Directory names under each modality that survive pruning.
    pub fn keep_set(&self, runs: &[TaskRun]) -> BTreeSet<String> {
        let mut keep: BTreeSet<String> = runs.iter().map(TaskRun::dir_name).collect();
        if self.options.include_structural {
            keep.insert(STRUCTURAL_DIR.to_string());
        }
        keep
    }

    pub fn run(&self, subjects: &[SubjectId], runs: &[TaskRun]) -> RunSummary {
        let mut summary = RunSummary::default();
        for subject in subjects {
            summary.subjects.push(self.process_subject(subject, runs));
        }
        tracing::info!("All downloads and organization completed");
        summary
    }

    pub fn process_subject(&self, subject: &SubjectId, runs: &[TaskRun]) -> SubjectReport {
        tracing::info!("Processing subject {subject}");
        let mut report = SubjectReport::new(subject);
        self.fetch(subject, runs, &mut report);
        self.prune(subject, &self.keep_set(runs), &mut report);
        self.organize(subject, runs, &mut report);
        self.cleanup(subject, runs, &mut report);
        report
    }

    /// Materializes each requested run directory (and optionally the structural one).
    pub fn fetch(&self, subject: &SubjectId, runs: &[TaskRun], report: &mut SubjectReport) {
        let mut dir_names: Vec<String> = runs.iter().map(TaskRun::dir_name).collect();
        if self.options.include_structural {
            dir_names.push(STRUCTURAL_DIR.to_string());
        }

        for dir_name in dir_names {
            tracing::info!("Downloading {dir_name} for subject {subject}");
            let _op = self.oplog.start(subject.as_str(), &dir_name, "get");
            let relative = DatasetLayout::relative_scan_dir(subject, &dir_name);
            tracing::info!("Getting: {relative}");
            match self.backend.get(&relative) {
                Ok(()) => {
                    tracing::info!("Successfully downloaded {relative}");
                    report.fetched.push(relative.to_string());
                }
                Err(err) => report.fail(format!("Failed to download {relative}: {err}")),
            }
        }
    }

    /// Removes sibling subtrees that retrieval pulled in but nobody asked for.
    pub fn prune(&self, subject: &SubjectId, keep: &BTreeSet<String>, report: &mut SubjectReport) {
        tracing::info!("Removing unwanted data for subject {subject}");
        for modality in PRUNED_MODALITIES {
            let modality_dir = self.dataset.modality_dir(subject, modality);
            if !modality_dir.as_std_path().exists() {
                tracing::warn!("Subject rm directory not found: {modality_dir}");
                continue;
            }

            let dirs = match fs_util::list_dirs(&modality_dir) {
                Ok(dirs) => dirs,
                Err(err) => {
                    report.fail(format!("Failed to list {modality_dir}: {err}"));
                    continue;
                }
            };

            for dir in dirs {
                let Some(name) = dir.file_name() else {
                    continue;
                };
                if keep.contains(name) {
                    tracing::info!("Keeping directory: {name} for {subject}");
                    continue;
                }
                tracing::info!("Removing directory: {dir}");
                match fs::remove_dir_all(dir.as_std_path()) {
                    Ok(()) => {
                        tracing::info!("Successfully removed {name} for {subject}");
                        report.pruned.push(dir.to_string());
                    }
                    Err(err) => {
                        report.fail(format!("Failed to remove {name} for {subject}: {err}"))
                    }
                }
            }
        }
    }

    /// Copies scans and EV files into the task-keyed output tree.
    pub fn organize(&self, subject: &SubjectId, runs: &[TaskRun], report: &mut SubjectReport) {
        tracing::info!("Organizing files for subject {subject}");
        let _op = self.oplog.start(subject.as_str(), "organization", "organize");

        for run in runs {
            let scan = Transfer {
                source: self.dataset.run_scan(subject, run),
                dest: self.output.run_scan(subject, run),
            };
            if scan.source.as_std_path().exists() {
                self.copy(&scan, report);
            } else {
                tracing::warn!("Source file does not exist: {}", scan.source);
            }

            let source_evs = self.dataset.run_evs_dir(subject, run);
            if !source_evs.as_std_path().exists() {
                tracing::warn!("EVs directory does not exist: {source_evs}");
                continue;
            }
            let dest_evs = self.output.run_evs_dir(subject, run);
            match self.ev_transfers(&source_evs, &dest_evs) {
                Ok(transfers) => {
                    for transfer in transfers {
                        let name = transfer.source.file_name().unwrap_or_default();
                        tracing::info!("Copying EV file {name}");
                        self.copy(&transfer, report);
                    }
                }
                Err(err) => report.fail(format!("Failed to list {source_evs}: {err}")),
            }
        }

        let structural = Transfer {
            source: self.dataset.structural_scan(subject),
            dest: self.output.structural_scan(subject),
        };
        if structural.source.as_std_path().exists() {
            self.copy(&structural, report);
        } else {
            tracing::warn!("Source file does not exist: {}", structural.source);
        }
    }

    /// Removes copied subtrees from the working copy, then empty parents.
    ///
    /// A subtree is only removed when every file organize would have taken
    /// from it has a same-sized copy in the output tree.
    pub fn cleanup(&self, subject: &SubjectId, runs: &[TaskRun], report: &mut SubjectReport) {
        tracing::info!("Cleaning up dataset files for subject {subject}");

        for run in runs {
            let dir = self.dataset.run_dir(subject, run);
            if !dir.as_std_path().exists() {
                continue;
            }
            let confirmed = self.run_copies_confirmed(subject, run);
            self.remove_confirmed(&dir, confirmed, report);
        }

        let structural_dir = self.dataset.structural_dir(subject);
        if structural_dir.as_std_path().exists() {
            let confirmed = copy_confirmed(&Transfer {
                source: self.dataset.structural_scan(subject),
                dest: self.output.structural_scan(subject),
            });
            self.remove_confirmed(&structural_dir, confirmed, report);
        }

        self.remove_empty_parents(subject, report);
    }

    pub fn run_copies_confirmed(&self, subject: &SubjectId, run: &TaskRun) -> bool {
        let scan = Transfer {
            source: self.dataset.run_scan(subject, run),
            dest: self.output.run_scan(subject, run),
        };
        if !copy_confirmed(&scan) {
            return false;
        }

        let source_evs = self.dataset.run_evs_dir(subject, run);
        if !source_evs.as_std_path().exists() {
            return true;
        }
        match self.ev_transfers(&source_evs, &self.output.run_evs_dir(subject, run)) {
            Ok(transfers) => transfers.iter().all(copy_confirmed),
            Err(_) => false,
        }
    }

    fn ev_transfers(
        &self,
        source_dir: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Transfer>, HcpError> {
        Ok(fs_util::list_files(source_dir)?
            .into_iter()
            .filter_map(|source| {
                let name = source.file_name()?.to_string();
                Some(Transfer {
                    dest: dest_dir.join(name),
                    source,
                })
            })
            .collect())
    }

    fn copy(&self, transfer: &Transfer, report: &mut SubjectReport) {
        let source = self.unlock_for_copy(&transfer.source);
        tracing::info!("Copying {} -> {}", transfer.source, transfer.dest);
        match fs_util::copy_file_preserving(source.as_std_path(), &transfer.dest) {
            Ok(()) => {
                tracing::info!("Successfully copied to {}", transfer.dest);
                report.copied.push(transfer.dest.to_string());
            }
            Err(err) => report.fail(format!(
                "Failed to copy {} to {}: {err}",
                transfer.source, transfer.dest
            )),
        }
    }

    /// Unlocks an annexed symlink so the copy gets real content; falls back
    /// to the resolved path when the backend refuses.
    pub fn unlock_for_copy(&self, path: &Utf8Path) -> Utf8PathBuf {
        if !fs_util::is_symlink(path) {
            return path.to_path_buf();
        }
        tracing::info!("File is annexed (symlink), unlocking: {path}");
        match self.backend.unlock(path) {
            Ok(()) => {
                tracing::info!("Successfully unlocked {path}");
                path.to_path_buf()
            }
            Err(err) => {
                tracing::warn!("Could not unlock {path}, will use resolved path: {err}");
                path.canonicalize_utf8().unwrap_or_else(|_| path.to_path_buf())
            }
        }
    }

    fn remove_confirmed(&self, dir: &Utf8Path, confirmed: bool, report: &mut SubjectReport) {
        if !confirmed {
            tracing::warn!("Keeping {dir}: copies in the output tree are incomplete");
            report.kept.push(dir.to_string());
            return;
        }
        tracing::info!("Removing {dir}");
        match fs::remove_dir_all(dir.as_std_path()) {
            Ok(()) => {
                tracing::info!("Successfully removed {dir}");
                report.removed.push(dir.to_string());
            }
            Err(err) => report.fail(format!("Failed to remove {dir}: {err}")),
        }
    }

    fn remove_empty_parents(&self, subject: &SubjectId, report: &mut SubjectReport) {
        let stop = self.dataset.subjects_root();
        let mut current = self.dataset.session_dir(subject);
        while current.starts_with(&stop) && current != stop {
            if !current.as_std_path().exists() {
                break;
            }
            match fs_util::dir_is_empty(&current) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    report.fail(format!("Failed to inspect {current}: {err}"));
                    break;
                }
            }
            tracing::info!("Removing empty directory {current}");
            if let Err(err) = fs::remove_dir(current.as_std_path()) {
                report.fail(format!("Failed to remove {current}: {err}"));
                break;
            }
            tracing::info!("Successfully removed {current}");
            report.removed.push(current.to_string());
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
    }
}

/// A missing source needs no copy; a present one needs a same-sized copy.
fn copy_confirmed(transfer: &Transfer) -> bool {
    if !transfer.source.as_std_path().exists() {
        return true;
    }
    fs_util::same_size(&transfer.source, &transfer.dest)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct RecordingBackend {
        root: Utf8PathBuf,
        gets: RefCell<Vec<String>>,
    }

    impl DatasetBackend for RecordingBackend {
        fn root(&self) -> &Utf8Path {
            &self.root
        }

        fn get(&self, relative: &Utf8Path) -> Result<(), HcpError> {
            self.gets.borrow_mut().push(relative.to_string());
            if relative.as_str().contains("GAMBLING") {
                return Err(HcpError::Backend("no such path".to_string()));
            }
            Ok(())
        }

        fn unlock(&self, _path: &Utf8Path) -> Result<(), HcpError> {
            Ok(())
        }
    }

    #[test]
    fn fetch_continues_after_failure() {
        let backend = RecordingBackend {
            root: Utf8PathBuf::from("/nonexistent/hcp"),
            gets: RefCell::new(Vec::new()),
        };
        let workflow = Workflow::new(
            backend,
            Utf8PathBuf::from("/nonexistent/out"),
            OperationLogger::disabled(),
            WorkflowOptions {
                include_structural: true,
            },
        );
        let subject: SubjectId = "116726".parse().unwrap();
        let runs = vec![TaskRun::new("GAMBLING", "LR"), TaskRun::new("MOTOR", "LR")];
        let mut report = SubjectReport::new(&subject);

        workflow.fetch(&subject, &runs, &mut report);

        assert_eq!(
            *workflow.backend().gets.borrow(),
            vec![
                "HCP1200/116726/unprocessed/3T/tfMRI_GAMBLING_LR".to_string(),
                "HCP1200/116726/unprocessed/3T/tfMRI_MOTOR_LR".to_string(),
                "HCP1200/116726/unprocessed/3T/T1w_MPR1".to_string(),
            ]
        );
        assert_eq!(report.fetched.len(), 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn keep_set_follows_structural_option() {
        let backend = RecordingBackend {
            root: Utf8PathBuf::from("/nonexistent/hcp"),
            gets: RefCell::new(Vec::new()),
        };
        let workflow = Workflow::new(
            backend,
            Utf8PathBuf::from("/nonexistent/out"),
            OperationLogger::disabled(),
            WorkflowOptions::default(),
        );
        let keep = workflow.keep_set(&[TaskRun::new("MOTOR", "LR")]);
        assert_eq!(keep.into_iter().collect::<Vec<_>>(), vec!["tfMRI_MOTOR_LR"]);
    }
}
