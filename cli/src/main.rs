//! Buildship CLI - Entry Point
//!
//! Packages a project and deploys it to the Buildship build service.

use buildship::app::options::DeployArgs;
use buildship::app::run::deploy;
use buildship::utils::version_info;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "buildship", version, about = "Deploy apps to Buildship")]
struct Cli {
    /// Mirror diagnostic logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Package the current project and deploy it
    Deploy(DeployArgs),
    /// Print version and build information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Version => {
            println!("{}", version_info());
            0
        }
        Command::Deploy(args) => deploy(args, cli.verbose).await,
    };

    // a confirmation prompt may still be blocking on stdin
    std::process::exit(code);
}
