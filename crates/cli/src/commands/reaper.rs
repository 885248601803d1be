// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan agent cleanup command.

use crate::context::Context;
use clap::Args;
use gt_adapters::session::SessionAdapter;
use gt_core::clock::Clock;
use gt_engine::reaper::{descendants_of, ReapAction, Reaper, ReaperConfig};

#[derive(Args)]
pub struct ReaperArgs {
    /// Command names (comm) eligible for reaping
    #[arg(long = "command", required = true)]
    pub commands: Vec<String>,
    /// Seconds between soft termination and hard kill
    #[arg(long, default_value_t = 30)]
    pub grace_secs: u64,
}

pub async fn run(ctx: &Context, args: ReaperArgs) -> anyhow::Result<()> {
    // Everything reachable from a live session is protected, including
    // descendants
    let mut roots = Vec::new();
    for session in ctx.sessions.list_sessions().await? {
        if let Ok(pids) = ctx.sessions.pane_pids(&session.name).await {
            roots.extend(pids);
        }
    }
    let protected = descendants_of(&roots);

    let mut config = ReaperConfig::new(ctx.town.root().join(".runtime").join("signals.json"));
    config.grace = std::time::Duration::from_secs(args.grace_secs);
    config.command_names = args.commands;

    let reaper = Reaper::new(config);
    let actions = reaper.sweep(&protected, ctx.clock.now_utc())?;
    if actions.is_empty() {
        println!("nothing to reap");
    }
    for (pid, action) in actions {
        let verb = match action {
            ReapAction::SentTerm => "soft-terminated",
            ReapAction::SentKill => "hard-killed",
            ReapAction::Unkillable => "unkillable (dropped)",
            ReapAction::Waiting => "waiting out grace",
        };
        println!("{pid}: {verb}");
    }
    Ok(())
}
