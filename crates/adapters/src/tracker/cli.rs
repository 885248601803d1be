// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bd` CLI implementation of the tracker adapter.
//!
//! All calls pass through a process-wide semaphore: the tracker embeds
//! its database and concurrent invocations contend on its lock.

use super::{
    CreateRequest, DepDirection, ListFilter, TrackerAdapter, TrackerError, UpdateRequest,
};
use crate::subprocess::{run_with_timeout, stderr_trimmed, TRACKER_TIMEOUT};
use async_trait::async_trait;
use gt_core::issue::{BeadId, IssueType, WorkItem};
use std::path::PathBuf;
use std::process::Output;
use std::sync::OnceLock;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

/// Concurrent tracker invocations allowed per process.
const TRACKER_PERMITS: usize = 4;

fn tracker_semaphore() -> &'static Semaphore {
    static SEMAPHORE: OnceLock<Semaphore> = OnceLock::new();
    SEMAPHORE.get_or_init(|| Semaphore::new(TRACKER_PERMITS))
}

/// Tracker adapter shelling out to the `bd` binary.
pub struct BeadsCli {
    binary: String,
    /// Working directory for invocations (the town root).
    cwd: PathBuf,
}

impl BeadsCli {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            binary: "bd".to_string(),
            cwd: cwd.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, op: &'static str, args: &[String]) -> Result<Output, TrackerError> {
        // Semaphore never closes, so acquire cannot fail while we hold
        // a reference to it.
        let _permit = tracker_semaphore().acquire().await;
        debug!(op, ?args, "tracker call");
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(&self.cwd);
        let output = run_with_timeout(cmd, TRACKER_TIMEOUT, "tracker").await?;
        if !output.status.success() {
            return Err(TrackerError::Cli {
                op,
                code: output.status.code(),
                stderr: stderr_trimmed(&output),
            });
        }
        Ok(output)
    }

    async fn run_json<T: serde::de::DeserializeOwned>(
        &self,
        op: &'static str,
        args: &[String],
    ) -> Result<T, TrackerError> {
        let output = self.run(op, args).await?;
        serde_json::from_slice(&output.stdout).map_err(|source| TrackerError::Parse { op, source })
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: impl std::fmt::Display) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

#[async_trait]
impl TrackerAdapter for BeadsCli {
    async fn create(&self, req: CreateRequest) -> Result<BeadId, TrackerError> {
        let mut args = vec!["create".to_string(), req.title.clone(), "--json".to_string()];
        if let Some(ty) = req.issue_type {
            push_flag(&mut args, "--type", ty);
        }
        if let Some(priority) = req.priority {
            push_flag(&mut args, "--priority", priority);
        }
        if let Some(description) = &req.description {
            push_flag(&mut args, "--description", description);
        }
        if let Some(parent) = &req.parent {
            push_flag(&mut args, "--parent", parent);
        }
        for label in &req.labels {
            push_flag(&mut args, "--label", label);
        }
        if let Some(id) = &req.id {
            push_flag(&mut args, "--id", id);
        }
        if req.force {
            args.push("--force".to_string());
        }

        #[derive(serde::Deserialize)]
        struct Created {
            id: BeadId,
        }
        let created: Created = self.run_json("create", &args).await?;
        Ok(created.id)
    }

    async fn update(&self, id: &BeadId, update: UpdateRequest) -> Result<(), TrackerError> {
        let mut args = vec!["update".to_string(), id.to_string()];
        if let Some(title) = &update.title {
            push_flag(&mut args, "--title", title);
        }
        if let Some(description) = &update.description {
            push_flag(&mut args, "--description", description);
        }
        if let Some(status) = update.status {
            push_flag(&mut args, "--status", status);
        }
        match &update.assignee {
            Some(Some(assignee)) => push_flag(&mut args, "--assignee", assignee),
            Some(None) => push_flag(&mut args, "--assignee", ""),
            None => {}
        }
        if let Some(priority) = update.priority {
            push_flag(&mut args, "--priority", priority);
        }
        if let Some(labels) = &update.labels {
            push_flag(&mut args, "--labels", labels.join(","));
        }
        self.run("update", &args).await?;
        Ok(())
    }

    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), TrackerError> {
        let mut args = vec!["close".to_string(), id.to_string()];
        if let Some(reason) = reason {
            push_flag(&mut args, "--reason", reason);
        }
        self.run("close", &args).await?;
        Ok(())
    }

    async fn show(&self, id: &BeadId) -> Result<WorkItem, TrackerError> {
        let args = vec!["show".to_string(), id.to_string(), "--json".to_string()];
        self.run_json("show", &args).await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<WorkItem>, TrackerError> {
        let mut args = vec!["list".to_string(), "--json".to_string()];
        if let Some(ty) = filter.issue_type {
            push_flag(&mut args, "--type", ty);
        }
        if let Some(status) = filter.status {
            push_flag(&mut args, "--status", status);
        }
        if let Some(label) = &filter.label {
            push_flag(&mut args, "--label", label);
        }
        if let Some(parent) = &filter.parent {
            push_flag(&mut args, "--parent", parent);
        }
        if let Some(priority) = filter.priority {
            push_flag(&mut args, "--priority", priority);
        }
        self.run_json("list", &args).await
    }

    async fn ready(&self) -> Result<Vec<WorkItem>, TrackerError> {
        let args = vec!["ready".to_string(), "--json".to_string()];
        self.run_json("ready", &args).await
    }

    async fn ready_with_type(&self, issue_type: IssueType) -> Result<Vec<WorkItem>, TrackerError> {
        let mut args = vec!["ready".to_string(), "--json".to_string()];
        push_flag(&mut args, "--type", issue_type);
        self.run_json("ready", &args).await
    }

    async fn dep_add(
        &self,
        from: &BeadId,
        to: &BeadId,
        dep_type: Option<&str>,
    ) -> Result<(), TrackerError> {
        let mut args = vec!["dep".to_string(), "add".to_string(), from.to_string(), to.to_string()];
        if let Some(dep_type) = dep_type {
            push_flag(&mut args, "--type", dep_type);
        }
        self.run("dep add", &args).await?;
        Ok(())
    }

    async fn dep_list(
        &self,
        id: &BeadId,
        direction: DepDirection,
        dep_type: Option<&str>,
    ) -> Result<Vec<WorkItem>, TrackerError> {
        let mut args = vec![
            "dep".to_string(),
            "list".to_string(),
            id.to_string(),
            "--json".to_string(),
        ];
        let dir = match direction {
            DepDirection::Down => "down",
            DepDirection::Up => "up",
        };
        push_flag(&mut args, "--direction", dir);
        if let Some(dep_type) = dep_type {
            push_flag(&mut args, "--type", dep_type);
        }
        self.run_json("dep list", &args).await
    }

    async fn dep_remove(&self, from: &BeadId, to: &BeadId) -> Result<(), TrackerError> {
        let args = vec![
            "dep".to_string(),
            "remove".to_string(),
            from.to_string(),
            to.to_string(),
        ];
        self.run("dep remove", &args).await?;
        Ok(())
    }

    async fn config_get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let args = vec!["config".to_string(), "get".to_string(), key.to_string()];
        match self.run("config get", &args).await {
            Ok(output) => {
                let value = crate::subprocess::stdout_trimmed(&output);
                Ok((!value.is_empty()).then_some(value))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn config_set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let args = vec![
            "config".to_string(),
            "set".to_string(),
            key.to_string(),
            value.to_string(),
        ];
        self.run("config set", &args).await?;
        Ok(())
    }
}
