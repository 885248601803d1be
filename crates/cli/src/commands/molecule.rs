// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Molecule commands.

use crate::context::Context;
use anyhow::Context as _;
use clap::Subcommand;
use gt_core::issue::BeadId;
use gt_engine::molecule::{instantiate_children, instantiate_markdown, parse_markdown};
use std::collections::HashMap;

#[derive(Subcommand)]
pub enum MoleculeCommand {
    /// Validate a markdown molecule file
    Validate { file: std::path::PathBuf },
    /// Instantiate child items under a parent
    Instantiate {
        /// Markdown molecule file, or a molecule item id with
        /// --from-tracker
        source: String,
        /// Parent item for the new children
        #[arg(long)]
        parent: String,
        /// Treat `source` as a molecule item id (child-issue form)
        #[arg(long)]
        from_tracker: bool,
        /// Template variables, `name=value`
        #[arg(long = "var")]
        vars: Vec<String>,
    },
}

fn parse_vars(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("--var expects name=value, got {pair:?}"))
        })
        .collect()
}

pub async fn run(ctx: &Context, command: MoleculeCommand) -> anyhow::Result<()> {
    match command {
        MoleculeCommand::Validate { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let molecule = parse_markdown(&content);
            molecule.validate()?;
            println!("ok: {} step(s)", molecule.steps.len());
            Ok(())
        }
        MoleculeCommand::Instantiate {
            source,
            parent,
            from_tracker,
            vars,
        } => {
            let parent = BeadId::new(parent);
            let created = if from_tracker {
                instantiate_children(ctx.tracker.clone(), &BeadId::new(source), &parent).await?
            } else {
                let content = std::fs::read_to_string(&source)
                    .with_context(|| format!("reading {source}"))?;
                let molecule = parse_markdown(&content);
                instantiate_markdown(
                    ctx.tracker.clone(),
                    &molecule,
                    &parent,
                    &parse_vars(&vars)?,
                )
                .await?
            };
            for id in created {
                println!("{id}");
            }
            Ok(())
        }
    }
}
