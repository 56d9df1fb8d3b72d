use std::{fmt::Display, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use msrpc::{ClientConfig, ndr::NdrSyntax};
use tracing_subscriber::EnvFilter;

mod serve;
mod services;
mod shares;
mod shutdown;

use serve::ServeCmd;
use shares::SharesCmd;
use shutdown::ShutdownCmd;

/// Transfer syntax proposed at bind time.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum TransferSyntax {
    #[default]
    Ndr20,
    Ndr64,
}

impl Display for TransferSyntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferSyntax::Ndr20 => write!(f, "ndr20"),
            TransferSyntax::Ndr64 => write!(f, "ndr64"),
        }
    }
}

impl From<TransferSyntax> for NdrSyntax {
    fn from(value: TransferSyntax) -> Self {
        match value {
            TransferSyntax::Ndr20 => NdrSyntax::Ndr20,
            TransferSyntax::Ndr64 => NdrSyntax::Ndr64,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Log filter, e.g. `info` or `msrpc=trace`.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Transfer syntax to bind with, for client commands.
    #[arg(long, global = true, default_value_t = TransferSyntax::Ndr20)]
    pub syntax: TransferSyntax,

    /// Timeout of client operations, in seconds. Zero waits forever.
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn make_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: (self.timeout != 0).then(|| std::time::Duration::from_secs(self.timeout)),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serves the demo interfaces.
    Serve(ServeCmd),
    /// Lists the shares of a server.
    Shares(SharesCmd),
    /// Asks a server to shut down, or to abort a pending shutdown.
    Shutdown(ShutdownCmd),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    let result = match &cli.command {
        Commands::Serve(cmd) => serve::serve(cmd).await,
        Commands::Shares(cmd) => shares::shares(cmd, &cli).await,
        Commands::Shutdown(cmd) => shutdown::shutdown(cmd, &cli).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_default_off() {
        let cli = Cli::try_parse_from(["msrpc", "serve"]).unwrap();
        let Commands::Serve(serve) = cli.command else {
            panic!("expected serve");
        };
        assert!(!serve.sequential);

        let cli = Cli::try_parse_from(["msrpc", "serve", "--sequential"]).unwrap();
        let Commands::Serve(serve) = cli.command else {
            panic!("expected serve");
        };
        assert!(serve.sequential);

        let cli = Cli::try_parse_from(["msrpc", "shutdown", "127.0.0.1:135", "-r"]).unwrap();
        let Commands::Shutdown(shutdown) = cli.command else {
            panic!("expected shutdown");
        };
        assert!(shutdown.restart);
        assert!(!shutdown.abort);

        assert!(
            Cli::try_parse_from(["msrpc", "shutdown", "127.0.0.1:135", "--abort", "-r"]).is_err()
        );
    }
}
