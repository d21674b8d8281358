#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use hcp_prep::backend::{DataladCli, DatasetBackend};
use hcp_prep::error::HcpError;

/// Writes an executable shell script standing in for `datalad`.
fn fake_datalad(dir: &Utf8Path, body: &str) -> Utf8PathBuf {
    let path = dir.join("datalad");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn clone_with_dubious_ownership_maps_to_remediation_error() {
    let (_temp, root) = temp_root();
    let program = fake_datalad(
        &root,
        "echo \"fatal: detected dubious ownership in repository at '$3'\" >&2\nexit 128",
    );
    let dataset = root.join("hcp");

    let err = DataladCli::with_program(program, dataset.clone())
        .clone_if_missing("https://example.org/hcp")
        .unwrap_err();

    assert_matches!(err, HcpError::DubiousOwnership { path } if path == dataset.as_str());
}

#[test]
fn other_clone_failures_stay_backend_errors() {
    let (_temp, root) = temp_root();
    let program = fake_datalad(&root, "echo 'fatal: repository not found' >&2\nexit 1");

    let err = DataladCli::with_program(program, root.join("hcp"))
        .clone_if_missing("https://example.org/missing")
        .unwrap_err();

    assert_matches!(err, HcpError::Backend(message) if message == "fatal: repository not found");
}

#[test]
fn existing_working_copy_is_reused_without_cloning() {
    let (_temp, root) = temp_root();
    let marker = root.join("invoked");
    let program = fake_datalad(&root, &format!("touch '{marker}'\nexit 1"));
    let dataset = root.join("hcp");
    fs::create_dir(&dataset).unwrap();

    let backend = DataladCli::with_program(program, dataset.clone())
        .clone_if_missing("https://example.org/hcp")
        .unwrap();

    assert_eq!(backend.root(), dataset.as_path());
    assert!(!marker.exists());
}

#[test]
fn get_runs_relative_to_working_copy() {
    let (_temp, root) = temp_root();
    let dataset = root.join("hcp");
    fs::create_dir(&dataset).unwrap();
    let program = fake_datalad(&root, "pwd >> calls.txt\necho \"$@\" >> calls.txt");
    let backend = DataladCli::with_program(program, dataset.clone());

    backend
        .get(Utf8Path::new("HCP1200/116726/unprocessed/3T/tfMRI_MOTOR_LR"))
        .unwrap();
    backend
        .unlock(&dataset.join("HCP1200/116726/scan.nii.gz"))
        .unwrap();

    let calls = fs::read_to_string(dataset.join("calls.txt")).unwrap();
    let lines = calls.lines().collect::<Vec<_>>();
    assert_eq!(lines[1], "get HCP1200/116726/unprocessed/3T/tfMRI_MOTOR_LR");
    assert_eq!(lines[3], "unlock HCP1200/116726/scan.nii.gz");
}
