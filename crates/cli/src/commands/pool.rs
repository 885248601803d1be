// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name pool status.

use crate::context::Context;
use clap::Args;
use gt_core::names::NameState;

#[derive(Args)]
pub struct PoolArgs {
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: PoolArgs) -> anyhow::Result<()> {
    let manager = ctx.manager();
    manager.reconcile().await?;

    let pool = manager.pool().lock();
    let theme = pool.theme().to_string();
    let names: Vec<(String, NameState)> = gt_core::names::THEMES
        .iter()
        .find(|t| t.name == theme)
        .map(|t| {
            t.names
                .iter()
                .map(|n| (n.to_string(), pool.state_of(n)))
                .collect()
        })
        .unwrap_or_default();

    if args.json {
        let rows: Vec<serde_json::Value> = names
            .iter()
            .map(|(name, state)| {
                serde_json::json!({
                    "name": name,
                    "state": format!("{state:?}").to_ascii_lowercase(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "theme": theme,
                "names": rows,
            }))?
        );
    } else {
        println!("theme: {theme}");
        for (name, state) in names {
            let marker = match state {
                NameState::Available => " ",
                NameState::InUse => "*",
                NameState::OrphanKilled => "!",
            };
            println!("{marker} {name}");
        }
    }
    Ok(())
}
