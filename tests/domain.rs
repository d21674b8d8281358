use assert_matches::assert_matches;

use hcp_prep::domain::{SubjectId, TaskRun, parse_subjects, parse_task_runs};
use hcp_prep::error::HcpError;

#[test]
fn parse_task_runs_splits_pairs() {
    let runs = parse_task_runs("MOTOR:LR,GAMBLING:LR");
    assert_eq!(
        runs,
        vec![TaskRun::new("MOTOR", "LR"), TaskRun::new("GAMBLING", "LR")]
    );
}

#[test]
fn parse_task_runs_trims_whitespace() {
    let runs = parse_task_runs(" MOTOR : RL ,  WM:LR ");
    assert_eq!(runs, vec![TaskRun::new("MOTOR", "RL"), TaskRun::new("WM", "LR")]);
}

#[test]
fn parse_task_runs_skips_malformed_entries() {
    let runs = parse_task_runs("MOTOR:LR,bogus,GAMBLING:LR:LR,:RL,WM:,,LANGUAGE:RL");
    assert_eq!(
        runs,
        vec![TaskRun::new("MOTOR", "LR"), TaskRun::new("LANGUAGE", "RL")]
    );
}

#[test]
fn parse_task_runs_all_invalid_is_empty() {
    assert!(parse_task_runs("MOTOR,GAMBLING").is_empty());
    assert!(parse_task_runs("").is_empty());
}

#[test]
fn parse_subjects_list() {
    let subjects = parse_subjects("116726, 118528,,131823").unwrap();
    let ids = subjects.iter().map(SubjectId::as_str).collect::<Vec<_>>();
    assert_eq!(ids, vec!["116726", "118528", "131823"]);
}

#[test]
fn parse_subjects_rejects_paths() {
    let err = parse_subjects("116726,../etc").unwrap_err();
    assert_matches!(err, HcpError::InvalidSubject(_));
}

#[test]
fn task_run_round_trips_display() {
    let run: TaskRun = "GAMBLING:RL".parse().unwrap();
    assert_eq!(run.dir_name(), "tfMRI_GAMBLING_RL");
    assert_eq!(run.to_string().parse::<TaskRun>().unwrap(), run);
}

#[test]
fn parse_task_runs_skips_path_like_entries() {
    let runs = parse_task_runs("MOTOR:LR/../../..,../../x:LR,MOTOR:LR,GAMBLING:/tmp");
    assert_eq!(runs, vec![TaskRun::new("MOTOR", "LR")]);
    assert_eq!(runs[0].dir_name(), "tfMRI_MOTOR_LR");
}
