// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `gt`: the Gas Town command line.

mod commands;
mod context;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gt", about = "Gas Town: fleets of coding agents over one repo")]
struct Cli {
    /// Town root (default: discovered by walking up from the cwd)
    #[arg(long, global = true)]
    town: Option<std::path::PathBuf>,

    /// Rig to operate on (default: the only rig in the town)
    #[arg(long, global = true)]
    rig: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage polecat workers
    #[command(subcommand)]
    Polecat(commands::polecat::PolecatCommand),
    /// Send and read mail
    #[command(subcommand)]
    Mail(commands::mail::MailCommand),
    /// Run the merge engine
    #[command(subcommand)]
    Refinery(commands::refinery::RefineryCommand),
    /// Run the safety coordinator
    #[command(subcommand)]
    Witness(commands::witness::WitnessCommand),
    /// Validate and instantiate molecules
    #[command(subcommand)]
    Molecule(commands::molecule::MoleculeCommand),
    /// Re-check convoys tracking an issue
    Convoy(commands::convoy::ConvoyArgs),
    /// Name pool status
    Pool(commands::pool::PoolArgs),
    /// Event feed curation
    #[command(subcommand)]
    Feed(commands::feed::FeedCommand),
    /// Sweep for orphaned agent processes
    Reaper(commands::reaper::ReaperArgs),
    /// Identity lock maintenance
    #[command(subcommand)]
    Locks(commands::locks::LocksCommand),
    /// Pass through to the tracker CLI, preserving its exit code
    #[command(external_subcommand)]
    Bd(Vec<String>),
}

/// Stderr logging by default; long-running loops set GT_LOG_DIR so
/// their output also lands in a rolling file under the town's .logs/.
/// The guard must outlive main or the non-blocking writer drops lines.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("GT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(dir) = std::env::var("GT_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "gt.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        return Some(guard);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Bd(args) => {
            // The passthrough owns its exit code: the tracker's status
            // must survive unchanged
            return commands::bd::run(cli.town, args).await;
        }
        other => {
            let ctx = match context::Context::discover(cli.town, cli.rig) {
                Ok(ctx) => ctx,
                Err(err) => {
                    eprintln!("gt: {err:#}");
                    return ExitCode::FAILURE;
                }
            };
            match other {
                Command::Polecat(cmd) => commands::polecat::run(&ctx, cmd).await,
                Command::Mail(cmd) => commands::mail::run(&ctx, cmd).await,
                Command::Refinery(cmd) => commands::refinery::run(&ctx, cmd).await,
                Command::Witness(cmd) => commands::witness::run(&ctx, cmd).await,
                Command::Molecule(cmd) => commands::molecule::run(&ctx, cmd).await,
                Command::Convoy(args) => commands::convoy::run(&ctx, args).await,
                Command::Pool(args) => commands::pool::run(&ctx, args).await,
                Command::Feed(cmd) => commands::feed::run(&ctx, cmd).await,
                Command::Reaper(args) => commands::reaper::run(&ctx, args).await,
                Command::Locks(cmd) => commands::locks::run(&ctx, cmd).await,
                Command::Bd(_) => unreachable!("handled above"),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gt: {err:#}");
            ExitCode::FAILURE
        }
    }
}
