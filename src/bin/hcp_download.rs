use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;

use hcp_prep::backend::DataladCli;
use hcp_prep::domain::{DEFAULT_DATASET_URL, parse_subjects, parse_task_runs};
use hcp_prep::error::HcpError;
use hcp_prep::logging::{self, OperationLogger};
use hcp_prep::output::{JsonOutput, OutputMode, TextOutput};
use hcp_prep::workflow::{Workflow, WorkflowOptions};

#[derive(Parser)]
#[command(name = "hcp-download")]
#[command(about = "Download and organize HCP task fMRI runs using DataLad")]
#[command(
    after_help = "Examples:\n  hcp-download --subjects 116726 --tasks MOTOR:LR\n  hcp-download --subjects 116726,118528 --tasks MOTOR:LR,MOTOR:RL,GAMBLING:LR\n  hcp-download --subjects 116726 --tasks MOTOR:LR --dataset-path /custom/hcp --output-path /custom/original"
)]
#[command(version, author)]
struct Cli {
    /// Comma-separated subject ids, e.g. "116726,118528,131823"
    #[arg(long)]
    subjects: String,

    /// Comma-separated TASK:DIRECTION pairs, e.g. "MOTOR:LR,MOTOR:RL,GAMBLING:LR"
    #[arg(long)]
    tasks: String,

    /// Where the dataset working copy lives or will be cloned
    #[arg(long, default_value = "data/hcp")]
    dataset_path: Utf8PathBuf,

    /// Root of the organized, task-keyed output tree
    #[arg(long, default_value = "data/original")]
    output_path: Utf8PathBuf,

    #[arg(long, default_value = DEFAULT_DATASET_URL)]
    dataset_url: String,

    #[arg(long, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Also fetch and keep the T1w_MPR1 structural scan
    #[arg(long)]
    include_structural: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HcpError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HcpError) -> u8 {
    match error {
        HcpError::NoTaskRuns | HcpError::InvalidSubject(_) => 1,
        HcpError::ConfigRead(_) | HcpError::ConfigParse(_) => 2,
        HcpError::MissingTool(_) | HcpError::Backend(_) | HcpError::DubiousOwnership { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let (router, run_log) = logging::init(&cli.log_dir, "hcp_download")?;
    tracing::debug!("run log file: {run_log}");

    let subjects = parse_subjects(&cli.subjects)?;
    let runs = parse_task_runs(&cli.tasks);
    if runs.is_empty() {
        tracing::error!(
            "No valid task runs specified. Use format: TASK:DIRECTION (e.g., MOTOR:LR)"
        );
        return Err(HcpError::NoTaskRuns.into());
    }

    let subject_list = subjects
        .iter()
        .map(|subject| subject.as_str())
        .collect::<Vec<_>>();
    let run_list = runs.iter().map(|run| run.to_string()).collect::<Vec<_>>();
    tracing::info!(
        "Processing {} subjects: {}",
        subjects.len(),
        subject_list.join(", ")
    );
    tracing::info!("Task runs: {}", run_list.join(", "));
    tracing::info!("Dataset path: {}", cli.dataset_path);
    tracing::info!("Output path: {}", cli.output_path);

    tracing::info!("Setting up HCP dataset");
    let backend = DataladCli::open_or_clone(&cli.dataset_url, cli.dataset_path.clone())?;

    let workflow = Workflow::new(
        backend,
        cli.output_path.clone(),
        OperationLogger::new(cli.log_dir.clone(), router),
        WorkflowOptions {
            include_structural: cli.include_structural,
        },
    );
    let summary = workflow.run(&subjects, &runs);
    if summary.failure_count() > 0 {
        tracing::warn!(
            "{} operations failed; see the log for details",
            summary.failure_count()
        );
    }

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    match mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary),
    }
    Ok(())
}
