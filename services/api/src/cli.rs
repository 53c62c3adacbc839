use crate::commands::{run_extract, run_screen, ExtractArgs, ScreenArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use prescreen::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Document Pre-Screening Service",
    about = "Run the document pre-screening service or screen files from the command line",
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
    /// Extract text and entities from a single document
    Extract(ExtractArgs),
    /// Run the full pre-screening pipeline over local files
    Screen(ScreenArgs),
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
        Command::Extract(args) => run_extract(args),
        Command::Screen(args) => run_screen(args),
    }
}
