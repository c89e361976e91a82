use crate::demo::{run_demo, DemoArgs};
use crate::server;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use inspections::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Municipal Inspection Service",
    about = "Run and operate the municipal inspection case service from the command line",
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
    /// Run a single archival pass and exit
    Sweep(SweepArgs),
    /// Walk an in-memory case through its whole lifecycle
    Demo(DemoArgs),
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

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Reference instant (RFC 3339). Defaults to the current time.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep(args) => server::run_sweep(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sweep_accepts_reference_instant() {
        let cli = Cli::try_parse_from(["inspections-api", "sweep", "--now", "2025-06-10T00:00:00Z"])
            .expect("arguments parse");
        match cli.command {
            Some(Command::Sweep(args)) => {
                assert_eq!(
                    args.now.map(|now| now.to_rfc3339()),
                    Some("2025-06-10T00:00:00+00:00".to_string())
                );
            }
            other => panic!("expected sweep command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["inspections-api"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
