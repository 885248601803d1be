// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity lock maintenance.

use crate::context::Context;
use clap::Subcommand;
use gt_adapters::session::SessionAdapter;
use gt_engine::lock::{clean_stale_locks, find_all_locks, IdentityLock};
use std::collections::HashSet;

#[derive(Subcommand)]
pub enum LocksCommand {
    /// List every identity lock under the town
    List,
    /// Remove locks whose pid is dead AND whose session is gone
    CleanStale,
    /// Remove one worker's lock regardless of ownership
    ForceRelease { name: String },
}

async fn live_sessions(ctx: &Context) -> anyhow::Result<HashSet<String>> {
    Ok(ctx
        .sessions
        .list_sessions()
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect())
}

pub async fn run(ctx: &Context, command: LocksCommand) -> anyhow::Result<()> {
    match command {
        LocksCommand::List => {
            let live = live_sessions(ctx).await?;
            for path in find_all_locks(ctx.town.root())? {
                let lock = IdentityLock::for_worker(
                    path.parent()
                        .and_then(|p| p.parent())
                        .unwrap_or(ctx.town.root()),
                );
                match lock.read()? {
                    Some(info) => {
                        let stale = IdentityLock::is_stale(&info, &live);
                        println!(
                            "{}\tpid={}\tsession={}\t{}",
                            path.display(),
                            info.pid,
                            info.session_id,
                            if stale { "STALE" } else { "live" }
                        );
                    }
                    None => println!("{}\t(empty)", path.display()),
                }
            }
            Ok(())
        }
        LocksCommand::CleanStale => {
            let live = live_sessions(ctx).await?;
            let removed = clean_stale_locks(ctx.town.root(), &live)?;
            for path in &removed {
                println!("removed {}", path.display());
            }
            println!("{} stale lock(s) removed", removed.len());
            Ok(())
        }
        LocksCommand::ForceRelease { name } => {
            let worker_dir = ctx.town.polecat_dir(&ctx.rig, &name);
            IdentityLock::for_worker(&worker_dir).force_release()?;
            println!("released {name}");
            Ok(())
        }
    }
}
