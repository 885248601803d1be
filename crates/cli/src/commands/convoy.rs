// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Convoy observer command.

use crate::context::Context;
use clap::Args;
use gt_core::issue::BeadId;
use gt_engine::convoy::check_convoys_for_issue;

#[derive(Args)]
pub struct ConvoyArgs {
    /// Issue whose tracking convoys should be re-checked
    pub issue: String,
    /// Observer name recorded in close reasons
    #[arg(long, default_value = "cli")]
    pub observer: String,
}

pub async fn run(ctx: &Context, args: ConvoyArgs) -> anyhow::Result<()> {
    let closed = check_convoys_for_issue(
        ctx.tracker.clone(),
        &BeadId::new(args.issue),
        &args.observer,
    )
    .await?;
    if closed.is_empty() {
        println!("no convoys closed");
    }
    for convoy in closed {
        println!("closed {convoy}");
    }
    Ok(())
}
