use crate::commands::{run_resume, run_score, ResumeArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use talent_dispatch::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Talent Dispatch",
    about = "Batch candidate scoring and resume parsing across failover model credentials",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score every candidate in a CSV export and print the results
    Score(ScoreArgs),
    /// Parse a single resume into structured fields
    Resume(ResumeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args).await,
        Command::Resume(args) => run_resume(args).await,
    }
}
