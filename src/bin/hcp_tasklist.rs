use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hcp_prep::config::ConfigLoader;
use hcp_prep::error::HcpError;
use hcp_prep::tasklist::Tasklist;

#[derive(Parser)]
#[command(name = "hcp-tasklist")]
#[command(about = "Generate task lists of shell commands for batch schedulers")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "One hcp-download job per subject and task string")]
    Download(GenerateArgs),
    #[command(about = "One FSL pipeline job per subject/task/fwhm/motion/hrf combination")]
    Fsl(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON config overriding the built-in lists (default: hcp-tasklist.json if present)
    #[arg(long)]
    config: Option<String>,

    /// Output file (default: the fixed task list name in the current directory)
    #[arg(long)]
    output: Option<Utf8PathBuf>,
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
        HcpError::ConfigRead(_) | HcpError::ConfigParse(_) | HcpError::MissingContrasts(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Download(args) => {
            let resolved = ConfigLoader::resolve(args.config.as_deref())?;
            generate(&resolved.download, args.output)
        }
        Commands::Fsl(args) => {
            let resolved = ConfigLoader::resolve(args.config.as_deref())?;
            generate(&resolved.fsl, args.output)
        }
    }
}

fn generate(tasklist: &impl Tasklist, output: Option<Utf8PathBuf>) -> miette::Result<()> {
    let path = output.unwrap_or_else(|| Utf8PathBuf::from(tasklist.default_file_name()));
    let count = tasklist.write_to(&path)?;
    tracing::info!("wrote {count} commands to {path}");
    Ok(())
}
