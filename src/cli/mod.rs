//! Command-line interface.

pub mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bonkagent", version, about = "API gateway for the BONK browser agent")]
pub struct Cli {
    /// Extra env file loaded before configuration is read.
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the API server (default).
    Serve,
    /// Probe configuration and upstream providers.
    Doctor {
        /// Exit non-zero when any check fails.
        #[arg(long)]
        strict: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::parse_from(["bonkagent"]);
        assert!(cli.command.is_none());
        assert!(cli.env_file.is_none());
    }

    #[test]
    fn parses_doctor_with_strict() {
        let cli = Cli::parse_from(["bonkagent", "doctor", "--strict"]);
        match cli.command {
            Some(Command::Doctor { strict }) => assert!(strict),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn env_file_is_global() {
        let cli = Cli::parse_from(["bonkagent", "doctor", "--env-file", "/tmp/custom.env"]);
        assert_eq!(
            cli.env_file.as_deref(),
            Some(std::path::Path::new("/tmp/custom.env"))
        );
    }
}
