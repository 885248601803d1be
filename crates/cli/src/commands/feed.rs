// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event feed commands.

use crate::context::Context;
use clap::Subcommand;
use gt_engine::events::{Curator, CuratorConfig, EventLog};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Subcommand)]
pub enum FeedCommand {
    /// Fold the raw event log into the curated feed until interrupted
    Curate {
        /// Dispatch burst size that collapses into one aggregate record
        #[arg(long, default_value_t = 3)]
        aggregate_threshold: usize,
    },
    /// Print the curated feed
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run(ctx: &Context, command: FeedCommand) -> anyhow::Result<()> {
    match command {
        FeedCommand::Curate {
            aggregate_threshold,
        } => {
            let curator = Curator::new(
                ctx.town.events_log(),
                ctx.town.feed_log(),
                CuratorConfig {
                    dispatch_aggregate_threshold: aggregate_threshold,
                    ..Default::default()
                },
            );
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received; stopping curator");
                ctrl_c.cancel();
            });
            curator.run(ctx.clock.clone(), cancel).await;
            Ok(())
        }
        FeedCommand::Show { limit } => {
            let records = EventLog::new(ctx.town.feed_log()).read_all()?;
            for record in records.iter().rev().take(limit) {
                println!("{}  {}  {}", record.ts, record.actor, record.event_type);
            }
            Ok(())
        }
    }
}
