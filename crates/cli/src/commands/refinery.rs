// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge engine commands.

use crate::context::Context;
use clap::Subcommand;
use gt_engine::refinery::{PassOutcome, Refinery};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Subcommand)]
pub enum RefineryCommand {
    /// Poll and merge until interrupted
    Run,
    /// Process at most one ready merge request, then exit
    Once,
}

fn build(ctx: &Context) -> anyhow::Result<Refinery<gt_core::clock::SystemClock>> {
    Ok(Refinery::new(
        ctx.town.clone(),
        ctx.rig.clone(),
        ctx.config.refinery.clone(),
        ctx.git.clone(),
        ctx.tracker.clone(),
        ctx.router()?,
        ctx.clock.clone(),
    )
    .with_events(ctx.events()))
}

pub async fn run(ctx: &Context, command: RefineryCommand) -> anyhow::Result<()> {
    let refinery = build(ctx)?;
    match command {
        RefineryCommand::Run => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received; stopping refinery");
                ctrl_c.cancel();
            });
            refinery.run(cancel).await;
            Ok(())
        }
        RefineryCommand::Once => {
            let cancel = CancellationToken::new();
            match refinery.process_next(&cancel).await? {
                PassOutcome::Idle => println!("no ready merge requests"),
                PassOutcome::Processed(id) => println!("processed {id}"),
                PassOutcome::Deferred(id) => println!("deferred {id} (merge slot held)"),
                PassOutcome::Cancelled => {}
            }
            Ok(())
        }
    }
}
