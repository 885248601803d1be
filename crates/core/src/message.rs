// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mail message: the persisted unit of the mail bus.
//!
//! One JSON object per line in a mailbox file (or one ephemeral tracker
//! item in the tracker-backed flavor). Message ids are content hashes so
//! re-delivery is idempotent.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

crate::string_id! {
    /// Stable content-derived message identifier.
    pub struct MessageId;
}

impl MessageId {
    /// Derive the id from the content fields. Two identical sends at the
    /// same timestamp collapse to one message.
    pub fn derive(from: &str, to: &str, subject: &str, body: &str, timestamp: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [from, to, subject, body, timestamp] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            hex.push_str(&format!("{byte:02x}"));
        }
        MessageId(hex)
    }
}

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

crate::simple_display! {
    MailPriority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

/// Coarse message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailType {
    Task,
    #[default]
    Notification,
    System,
}

crate::simple_display! {
    MailType {
        Task => "task",
        Notification => "notification",
        System => "system",
    }
}

/// Subject prefixes that auto-flag a message as a wisp (system signal
/// that collapses in the UI rather than reading as conversation).
const WISP_SUBJECT_PREFIXES: &[&str] = &[
    "MERGE_READY",
    "MERGED",
    "MERGE_FAILED",
    "REWORK_REQUEST",
    "POLECAT_DONE",
    "POLECAT_STARTED",
    "polecat_done",
    "LIFECYCLE:",
    "NUDGE",
    "START_WORK",
];

/// True when a subject belongs to the fixed wisp namespace.
pub fn is_wisp_subject(subject: &str) -> bool {
    WISP_SUBJECT_PREFIXES
        .iter()
        .any(|prefix| subject.starts_with(prefix))
}

/// A mail message as persisted (one JSON object per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub priority: MailPriority,
    #[serde(rename = "type", default)]
    pub mail_type: MailType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// RFC3339 UTC.
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub wisp: bool,
}

impl Message {
    /// Build a message, deriving the id and auto-flagging wisps by
    /// subject.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let (from, to, subject, body, timestamp) = (
            from.into(),
            to.into(),
            subject.into(),
            body.into(),
            timestamp.into(),
        );
        let id = MessageId::derive(&from, &to, &subject, &body, &timestamp);
        let wisp = is_wisp_subject(&subject);
        Self {
            id,
            from,
            to,
            subject,
            body,
            priority: MailPriority::Normal,
            mail_type: MailType::Notification,
            thread_id: None,
            timestamp,
            read: false,
            wisp,
        }
    }

    pub fn with_priority(mut self, priority: MailPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_type(mut self, mail_type: MailType) -> Self {
        self.mail_type = mail_type;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Fresh thread id for a message that starts a conversation.
    pub fn new_thread_id() -> String {
        nanoid::nanoid!(12)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
