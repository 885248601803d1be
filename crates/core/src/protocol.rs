// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire codec for the Witness↔Refinery and Worker→Witness protocol.
//!
//! Each protocol message travels as ordinary mail with a prefix-based
//! subject (`MERGED <name>`) and a body of `Key: value` lines followed by
//! optional free text. Subjects outside the known set are not protocol
//! traffic and must pass through untouched.

use crate::issue::BeadId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protocol message kinds, keyed by the subject's leading token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    MergeReady,
    Merged,
    MergeFailed,
    ReworkRequest,
    PolecatDone,
    PolecatStarted,
    LifecycleShutdown,
    Help,
}

crate::simple_display! {
    MessageKind {
        MergeReady => "MERGE_READY",
        Merged => "MERGED",
        MergeFailed => "MERGE_FAILED",
        ReworkRequest => "REWORK_REQUEST",
        PolecatDone => "POLECAT_DONE",
        PolecatStarted => "POLECAT_STARTED",
        LifecycleShutdown => "LIFECYCLE:Shutdown",
        Help => "HELP",
    }
}

/// Inspect the subject's leading token. Returns None for non-protocol
/// subjects.
pub fn parse_message_type(subject: &str) -> Option<MessageKind> {
    let token = subject.split_whitespace().next()?;
    match token {
        "MERGE_READY" => Some(MessageKind::MergeReady),
        "MERGED" => Some(MessageKind::Merged),
        "MERGE_FAILED" => Some(MessageKind::MergeFailed),
        "REWORK_REQUEST" => Some(MessageKind::ReworkRequest),
        "POLECAT_DONE" | "polecat_done" => Some(MessageKind::PolecatDone),
        "POLECAT_STARTED" => Some(MessageKind::PolecatStarted),
        "LIFECYCLE:Shutdown" => Some(MessageKind::LifecycleShutdown),
        "HELP" => Some(MessageKind::Help),
        _ => None,
    }
}

/// Everything after the first space: the polecat (or `rig/name`) the
/// subject refers to.
pub fn extract_polecat(subject: &str) -> Option<&str> {
    subject.split_once(' ').map(|(_, rest)| rest.trim())
}

/// Merge failure classification carried in MERGE_FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Conflict,
    Tests,
    Build,
}

impl FailureType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conflict" => Some(FailureType::Conflict),
            "tests" => Some(FailureType::Tests),
            "build" => Some(FailureType::Build),
            _ => None,
        }
    }
}

crate::simple_display! {
    FailureType {
        Conflict => "conflict",
        Tests => "tests",
        Build => "build",
    }
}

/// Completion flavor carried in POLECAT_DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoneStatus {
    Completed,
    Escalated,
    Deferred,
    PhaseComplete,
}

impl DoneStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Some(DoneStatus::Completed),
            "ESCALATED" => Some(DoneStatus::Escalated),
            "DEFERRED" => Some(DoneStatus::Deferred),
            "PHASE_COMPLETE" => Some(DoneStatus::PhaseComplete),
            _ => None,
        }
    }
}

crate::simple_display! {
    DoneStatus {
        Completed => "COMPLETED",
        Escalated => "ESCALATED",
        Deferred => "DEFERRED",
        PhaseComplete => "PHASE_COMPLETE",
    }
}

/// A parsed protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolMessage {
    MergeReady {
        polecat: String,
        rig: String,
        branch: String,
        issue: Option<BeadId>,
        target: String,
        merge_request: Option<BeadId>,
    },
    Merged {
        polecat: String,
        rig: String,
        branch: String,
        target: String,
        merged_at: String,
        merge_commit: Option<String>,
    },
    MergeFailed {
        polecat: String,
        rig: String,
        branch: String,
        failed_at: String,
        failure_type: FailureType,
        error: Option<String>,
        conflict_files: Vec<String>,
    },
    ReworkRequest {
        polecat: String,
        rig: String,
        branch: String,
        requested_at: String,
        reason: String,
    },
    PolecatDone {
        polecat: String,
        rig: String,
        status: DoneStatus,
        merge_request: Option<BeadId>,
    },
    PolecatStarted {
        polecat: String,
        rig: String,
    },
    LifecycleShutdown {
        polecat: String,
        rig: String,
    },
    Help {
        polecat: String,
        rig: String,
        topic: String,
        detail: String,
    },
}

/// Split a wire body into its leading field block and trailing free text.
///
/// The field block is the run of `Key: value` lines at the top; the first
/// blank or non-field line starts the free text.
fn split_body(body: &str) -> (HashMap<String, String>, String) {
    let mut fields = HashMap::new();
    let mut lines = body.lines();
    let mut free = Vec::new();
    for line in lines.by_ref() {
        let parsed = line.split_once(':').and_then(|(k, v)| {
            let key = k.trim();
            let ok = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            ok.then(|| (key.to_string(), v.trim().to_string()))
        });
        match parsed {
            Some((k, v)) => {
                fields.insert(k.to_ascii_lowercase(), v);
            }
            None => {
                if !line.trim().is_empty() {
                    free.push(line);
                }
                break;
            }
        }
    }
    free.extend(lines);
    (fields, free.join("\n").trim().to_string())
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

impl ProtocolMessage {
    /// The subject line for this message (`KIND <polecat>`).
    pub fn subject(&self) -> String {
        format!("{} {}", self.kind(), self.polecat())
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ProtocolMessage::MergeReady { .. } => MessageKind::MergeReady,
            ProtocolMessage::Merged { .. } => MessageKind::Merged,
            ProtocolMessage::MergeFailed { .. } => MessageKind::MergeFailed,
            ProtocolMessage::ReworkRequest { .. } => MessageKind::ReworkRequest,
            ProtocolMessage::PolecatDone { .. } => MessageKind::PolecatDone,
            ProtocolMessage::PolecatStarted { .. } => MessageKind::PolecatStarted,
            ProtocolMessage::LifecycleShutdown { .. } => MessageKind::LifecycleShutdown,
            ProtocolMessage::Help { .. } => MessageKind::Help,
        }
    }

    pub fn polecat(&self) -> &str {
        match self {
            ProtocolMessage::MergeReady { polecat, .. }
            | ProtocolMessage::Merged { polecat, .. }
            | ProtocolMessage::MergeFailed { polecat, .. }
            | ProtocolMessage::ReworkRequest { polecat, .. }
            | ProtocolMessage::PolecatDone { polecat, .. }
            | ProtocolMessage::PolecatStarted { polecat, .. }
            | ProtocolMessage::LifecycleShutdown { polecat, .. }
            | ProtocolMessage::Help { polecat, .. } => polecat,
        }
    }

    pub fn rig(&self) -> &str {
        match self {
            ProtocolMessage::MergeReady { rig, .. }
            | ProtocolMessage::Merged { rig, .. }
            | ProtocolMessage::MergeFailed { rig, .. }
            | ProtocolMessage::ReworkRequest { rig, .. }
            | ProtocolMessage::PolecatDone { rig, .. }
            | ProtocolMessage::PolecatStarted { rig, .. }
            | ProtocolMessage::LifecycleShutdown { rig, .. }
            | ProtocolMessage::Help { rig, .. } => rig,
        }
    }

    /// Render the wire body (field block, then free text if any).
    pub fn body(&self) -> String {
        let mut out = String::new();
        match self {
            ProtocolMessage::MergeReady {
                polecat,
                rig,
                branch,
                issue,
                target,
                merge_request,
            } => {
                push_field(&mut out, "Branch", branch);
                if let Some(issue) = issue {
                    push_field(&mut out, "Issue", issue.as_str());
                }
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Target", target);
                if let Some(mr) = merge_request {
                    push_field(&mut out, "Merge-Request", mr.as_str());
                }
            }
            ProtocolMessage::Merged {
                polecat,
                rig,
                branch,
                target,
                merged_at,
                merge_commit,
            } => {
                push_field(&mut out, "Branch", branch);
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Target", target);
                push_field(&mut out, "Merged-At", merged_at);
                if let Some(commit) = merge_commit {
                    push_field(&mut out, "Merge-Commit", commit);
                }
            }
            ProtocolMessage::MergeFailed {
                polecat,
                rig,
                branch,
                failed_at,
                failure_type,
                error,
                conflict_files,
            } => {
                push_field(&mut out, "Branch", branch);
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Failed-At", failed_at);
                push_field(&mut out, "Failure-Type", &failure_type.to_string());
                if let Some(error) = error {
                    push_field(&mut out, "Error", error);
                }
                if !conflict_files.is_empty() {
                    push_field(&mut out, "Conflict-Files", &conflict_files.join(", "));
                }
            }
            ProtocolMessage::ReworkRequest {
                polecat,
                rig,
                branch,
                requested_at,
                reason,
            } => {
                push_field(&mut out, "Branch", branch);
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Requested-At", requested_at);
                if !reason.is_empty() {
                    out.push('\n');
                    out.push_str(reason);
                }
            }
            ProtocolMessage::PolecatDone {
                polecat,
                rig,
                status,
                merge_request,
            } => {
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Status", &status.to_string());
                if let Some(mr) = merge_request {
                    push_field(&mut out, "Merge-Request", mr.as_str());
                }
            }
            ProtocolMessage::PolecatStarted { polecat, rig }
            | ProtocolMessage::LifecycleShutdown { polecat, rig } => {
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
            }
            ProtocolMessage::Help {
                polecat,
                rig,
                topic,
                detail,
            } => {
                push_field(&mut out, "Polecat", polecat);
                push_field(&mut out, "Rig", rig);
                push_field(&mut out, "Topic", topic);
                if !detail.is_empty() {
                    out.push('\n');
                    out.push_str(detail);
                }
            }
        }
        out
    }

    /// Parse a mail subject+body pair. Returns None when the subject is
    /// not protocol traffic (the message must then pass through
    /// untouched).
    pub fn parse(subject: &str, body: &str) -> Option<Self> {
        let kind = parse_message_type(subject)?;
        let (fields, free) = split_body(body);
        let get = |key: &str| fields.get(key).cloned();
        let subject_polecat = extract_polecat(subject).unwrap_or_default().to_string();
        let polecat = get("polecat").unwrap_or(subject_polecat);
        let rig = get("rig").unwrap_or_default();

        let msg = match kind {
            MessageKind::MergeReady => ProtocolMessage::MergeReady {
                polecat,
                rig,
                branch: get("branch").unwrap_or_default(),
                issue: get("issue").map(BeadId::new),
                target: get("target").unwrap_or_default(),
                merge_request: get("merge-request").map(BeadId::new),
            },
            MessageKind::Merged => ProtocolMessage::Merged {
                polecat,
                rig,
                branch: get("branch").unwrap_or_default(),
                target: get("target").unwrap_or_default(),
                merged_at: get("merged-at").unwrap_or_default(),
                merge_commit: get("merge-commit"),
            },
            MessageKind::MergeFailed => ProtocolMessage::MergeFailed {
                polecat,
                rig,
                branch: get("branch").unwrap_or_default(),
                failed_at: get("failed-at").unwrap_or_default(),
                failure_type: get("failure-type")
                    .as_deref()
                    .and_then(FailureType::parse)
                    .unwrap_or(FailureType::Build),
                error: get("error"),
                conflict_files: get("conflict-files")
                    .map(|v| {
                        v.split(',')
                            .map(|f| f.trim().to_string())
                            .filter(|f| !f.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            MessageKind::ReworkRequest => ProtocolMessage::ReworkRequest {
                polecat,
                rig,
                branch: get("branch").unwrap_or_default(),
                requested_at: get("requested-at").unwrap_or_default(),
                reason: free,
            },
            MessageKind::PolecatDone => ProtocolMessage::PolecatDone {
                polecat,
                rig,
                status: get("status")
                    .as_deref()
                    .and_then(DoneStatus::parse)
                    .unwrap_or(DoneStatus::Completed),
                merge_request: get("merge-request").map(BeadId::new),
            },
            MessageKind::PolecatStarted => ProtocolMessage::PolecatStarted { polecat, rig },
            MessageKind::LifecycleShutdown => ProtocolMessage::LifecycleShutdown { polecat, rig },
            MessageKind::Help => ProtocolMessage::Help {
                polecat,
                rig,
                topic: get("topic").unwrap_or_default(),
                detail: free,
            },
        };
        Some(msg)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
