// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker management commands.

use crate::context::Context;
use clap::Subcommand;
use gt_core::issue::BeadId;
use gt_core::polecat::PolecatName;
use gt_engine::polecats::AddOptions;

#[derive(Subcommand)]
pub enum PolecatCommand {
    /// Provision a new worker (name allocated from the rig's pool)
    Add {
        /// Reserve a specific pool name instead of the next free one
        #[arg(long)]
        name: Option<String>,
        /// Work item to assign
        #[arg(long)]
        issue: Option<String>,
        /// Branch template override
        #[arg(long)]
        branch_template: Option<String>,
    },
    /// Remove a worker (refuses dirty workers without --force)
    Remove {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// List workers
    List {
        #[arg(long)]
        json: bool,
    },
    /// Reconcile the name pool with directories and sessions
    Reconcile,
}

pub async fn run(ctx: &Context, command: PolecatCommand) -> anyhow::Result<()> {
    let manager = ctx.manager();
    match command {
        PolecatCommand::Add {
            name,
            issue,
            branch_template,
        } => {
            let opts = AddOptions {
                work_item: issue.map(BeadId::new),
                branch_template,
                start_point: None,
            };
            // Pool state comes from the observed world, not memory
            manager.reconcile().await?;
            let polecat = match name {
                Some(name) => manager.add_named(&PolecatName::new(name), opts).await?,
                None => manager.add(opts).await?,
            };
            println!("{} {}", polecat.name, polecat.branch);
            Ok(())
        }
        PolecatCommand::Remove { name, force } => {
            manager.reconcile().await?;
            manager.remove(&name, force).await?;
            println!("removed {name}");
            Ok(())
        }
        PolecatCommand::List { json } => {
            let workers = manager.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&workers)?);
            } else {
                for w in workers {
                    let issue = w
                        .work_item
                        .as_ref()
                        .map(|b| b.as_str().to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{}\t{}\t{}\t{}", w.name, w.state, issue, w.branch);
                }
            }
            Ok(())
        }
        PolecatCommand::Reconcile => {
            let outcome = manager.reconcile().await?;
            for name in &outcome.kill_sessions {
                println!("killed orphan session for {name}");
            }
            let active = manager.pool().lock().active_names();
            println!(
                "active: {}",
                active
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Ok(())
        }
    }
}
