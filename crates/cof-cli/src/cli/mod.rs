//! CLI for the COF course archiver.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use cof_core::config;

use commands::{run_agent, run_completions, run_courses, run_status, run_verify};

/// Top-level CLI for the COF archiver.
#[derive(Debug, Parser)]
#[command(name = "cof")]
#[command(about = "COF: scheduled, idempotent archiver for course media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run batches inside the configured time windows (Ctrl-C stops).
    Run {
        /// Run exactly one batch now and exit, ignoring the windows.
        #[arg(long)]
        once: bool,
        /// Only log what would be downloaded; no file writes, no ledger changes.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a summary of the download ledger.
    Status,

    /// Re-hash every recorded download and report missing or altered files.
    Verify,

    /// List the courses the account is enrolled in.
    Courses,

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Completions need neither config nor credentials.
        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        cfg.validate()?;

        match cli.command {
            CliCommand::Run { once, dry_run } => run_agent(&cfg, once, dry_run).await?,
            CliCommand::Status => run_status(&cfg)?,
            CliCommand::Verify => run_verify(&cfg)?,
            CliCommand::Courses => run_courses(&cfg).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
