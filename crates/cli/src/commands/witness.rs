// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safety coordinator commands.

use crate::context::Context;
use clap::Subcommand;
use gt_engine::witness::Witness;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Subcommand)]
pub enum WitnessCommand {
    /// Watch the witness mailbox until interrupted
    Run,
    /// Drain the mailbox once, then exit
    Once,
}

fn build(ctx: &Context) -> anyhow::Result<Witness<gt_core::clock::SystemClock>> {
    Ok(Witness::new(
        ctx.rig.clone(),
        ctx.config.witness.clone(),
        ctx.git.clone(),
        ctx.tracker.clone(),
        ctx.sessions.clone(),
        ctx.store.clone(),
        ctx.router()?,
        ctx.manager(),
        ctx.clock.clone(),
    )
    .with_events(ctx.events()))
}

pub async fn run(ctx: &Context, command: WitnessCommand) -> anyhow::Result<()> {
    let witness = build(ctx)?;
    match command {
        WitnessCommand::Run => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received; stopping witness");
                ctrl_c.cancel();
            });
            witness.run(cancel).await;
            Ok(())
        }
        WitnessCommand::Once => {
            let handled = witness.process_mailbox().await?;
            println!("handled {handled} message(s)");
            Ok(())
        }
    }
}
