// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker CLI passthrough.
//!
//! `gt bd <args>` execs the tracker binary from the town root and
//! mirrors its exit code exactly: scripts built on the tracker's
//! status codes keep working through the shell.

use gt_engine::town::TownPaths;
use std::path::PathBuf;
use std::process::ExitCode;

pub async fn run(town: Option<PathBuf>, mut args: Vec<String>) -> ExitCode {
    // external_subcommand hands us our own name as argv[0]
    if args.first().map(String::as_str) == Some("bd") {
        args.remove(0);
    } else {
        eprintln!("gt: unknown command {:?}", args.first().cloned().unwrap_or_default());
        return ExitCode::FAILURE;
    }

    let cwd = match town {
        Some(town) => town,
        None => {
            let mut dir = match std::env::current_dir() {
                Ok(dir) => dir,
                Err(err) => {
                    eprintln!("gt: cwd unavailable: {err}");
                    return ExitCode::FAILURE;
                }
            };
            while !TownPaths::is_town_root(&dir) && dir.pop() {}
            dir
        }
    };

    let status = tokio::process::Command::new("bd")
        .args(&args)
        .current_dir(&cwd)
        .status()
        .await;

    match status {
        Ok(status) => match status.code() {
            Some(code) => ExitCode::from(code.clamp(0, 255) as u8),
            // Terminated by signal: conventional 128+n is unavailable
            // here, report generic failure
            None => ExitCode::FAILURE,
        },
        Err(err) => {
            eprintln!("gt: failed to run tracker: {err}");
            ExitCode::FAILURE
        }
    }
}
