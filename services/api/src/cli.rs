use crate::commands::{run_calculation, run_integrity, CalculateArgs, IntegrityArgs};
use crate::error::AppError;
use crate::infra::SeedArgs;
use crate::server;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "KPI Rewards",
    about = "Track KPI records and calculate employee rewards and penalties",
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
    /// Calculate rewards for one employee and period and print the result as JSON
    Calculate(CalculateArgs),
    /// Scan KPI records for dangling references and invalid targets
    Integrity(IntegrityArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Calculate(args) => run_calculation(args),
        Command::Integrity(args) => run_integrity(args),
    }
}
