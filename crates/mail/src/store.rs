// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox stores.
//!
//! [`JsonlMailbox`] is the legacy flavor: one append-only line-delimited
//! JSON file per identity. [`TrackerMailbox`] stores each message as an
//! ephemeral tracker item so remote rigs see mail through the tracker.
//! Both expose the same operations; ordering within a mailbox is strictly
//! append order, and `list` returns newest-first.

use async_trait::async_trait;
use gt_adapters::tracker::{CreateRequest, ListFilter, TrackerAdapter, TrackerError};
use gt_core::issue::{BeadId, IssueStatus, IssueType};
use gt_core::message::{Message, MessageId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("message not found: {0}")]
    NotFound(MessageId),
    #[error("mailbox io: {0}")]
    Io(#[from] std::io::Error),
    #[error("mailbox record corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("unknown channel {0:?}")]
    UnknownChannel(String),
    #[error("unknown recipient {0:?}: no agent identity in tracker")]
    UnknownRecipient(String),
    #[error("queue {0:?} has no recipient under its claim bound")]
    QueueSaturated(String),
    #[error(transparent)]
    Address(#[from] gt_core::address::AddressError),
}

/// Unread accounting for one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailCounts {
    pub total: usize,
    pub unread: usize,
}

#[async_trait]
pub trait MailboxStore: Send + Sync {
    async fn append(&self, mailbox: &str, message: &Message) -> Result<(), MailError>;
    async fn get(&self, mailbox: &str, id: &MessageId) -> Result<Message, MailError>;
    /// Newest-first.
    async fn list(&self, mailbox: &str) -> Result<Vec<Message>, MailError>;
    /// Newest-first, unread only (peeked messages excluded).
    async fn list_unread(&self, mailbox: &str) -> Result<Vec<Message>, MailError>;
    /// Oldest-first within one thread.
    async fn list_thread(&self, mailbox: &str, thread_id: &str) -> Result<Vec<Message>, MailError>;
    async fn mark_read(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError>;
    /// Decrease the unread count without flipping the persistent read
    /// bit ("peek").
    async fn mark_read_only(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError>;
    async fn delete(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError>;
    async fn count(&self, mailbox: &str) -> Result<MailCounts, MailError>;
}

/// Peek overlay shared by both stores: ids whose unread-ness is hidden
/// for this process without touching the persistent read bit.
#[derive(Default)]
struct PeekSet {
    peeked: Mutex<HashMap<String, HashSet<MessageId>>>,
}

impl PeekSet {
    fn peek(&self, mailbox: &str, id: &MessageId) {
        self.peeked
            .lock()
            .entry(mailbox.to_string())
            .or_default()
            .insert(id.clone());
    }

    fn is_peeked(&self, mailbox: &str, id: &MessageId) -> bool {
        self.peeked
            .lock()
            .get(mailbox)
            .is_some_and(|set| set.contains(id))
    }

    fn forget(&self, mailbox: &str, id: &MessageId) {
        if let Some(set) = self.peeked.lock().get_mut(mailbox) {
            set.remove(id);
        }
    }
}

// ---------------------------------------------------------------------------
// JSONL flavor
// ---------------------------------------------------------------------------

/// Line-delimited JSON mailboxes under a root directory.
///
/// Mailbox `gt/polecats/toast` lives at
/// `<root>/gt/polecats/toast.jsonl`. Appends are O(1); read-bit updates
/// rewrite the file atomically (write-then-rename).
pub struct JsonlMailbox {
    root: PathBuf,
    peeks: PeekSet,
}

impl JsonlMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            peeks: PeekSet::default(),
        }
    }

    fn path_for(&self, mailbox: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in mailbox.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.set_extension("jsonl");
        path
    }

    fn read_all(&self, mailbox: &str) -> Result<Vec<Message>, MailError> {
        let path = self.path_for(mailbox);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut messages = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            messages.push(serde_json::from_str(line)?);
        }
        Ok(messages)
    }

    /// Rewrite the whole mailbox atomically.
    fn write_all(&self, mailbox: &str, messages: &[Message]) -> Result<(), MailError> {
        let path = self.path_for(mailbox);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            for message in messages {
                serde_json::to_writer(&mut file, message)?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn mutate_message<F>(&self, mailbox: &str, id: &MessageId, f: F) -> Result<(), MailError>
    where
        F: FnOnce(&mut Message),
    {
        let mut messages = self.read_all(mailbox)?;
        let message = messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| MailError::NotFound(id.clone()))?;
        f(message);
        self.write_all(mailbox, &messages)
    }
}

#[async_trait]
impl MailboxStore for JsonlMailbox {
    async fn append(&self, mailbox: &str, message: &Message) -> Result<(), MailError> {
        let path = self.path_for(mailbox);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    async fn get(&self, mailbox: &str, id: &MessageId) -> Result<Message, MailError> {
        self.read_all(mailbox)?
            .into_iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| MailError::NotFound(id.clone()))
    }

    async fn list(&self, mailbox: &str) -> Result<Vec<Message>, MailError> {
        let mut messages = self.read_all(mailbox)?;
        messages.reverse();
        Ok(messages)
    }

    async fn list_unread(&self, mailbox: &str) -> Result<Vec<Message>, MailError> {
        Ok(self
            .list(mailbox)
            .await?
            .into_iter()
            .filter(|m| !m.read && !self.peeks.is_peeked(mailbox, &m.id))
            .collect())
    }

    async fn list_thread(&self, mailbox: &str, thread_id: &str) -> Result<Vec<Message>, MailError> {
        Ok(self
            .read_all(mailbox)?
            .into_iter()
            .filter(|m| m.thread_id.as_deref() == Some(thread_id))
            .collect())
    }

    async fn mark_read(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        self.mutate_message(mailbox, id, |m| m.read = true)?;
        self.peeks.forget(mailbox, id);
        Ok(())
    }

    async fn mark_read_only(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        // Existence check keeps peek semantics aligned with mark_read
        let _ = self.get(mailbox, id).await?;
        self.peeks.peek(mailbox, id);
        Ok(())
    }

    async fn delete(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        let mut messages = self.read_all(mailbox)?;
        let before = messages.len();
        messages.retain(|m| &m.id != id);
        if messages.len() == before {
            return Err(MailError::NotFound(id.clone()));
        }
        self.write_all(mailbox, &messages)?;
        self.peeks.forget(mailbox, id);
        Ok(())
    }

    async fn count(&self, mailbox: &str) -> Result<MailCounts, MailError> {
        let messages = self.read_all(mailbox)?;
        let unread = messages
            .iter()
            .filter(|m| !m.read && !self.peeks.is_peeked(mailbox, &m.id))
            .count();
        Ok(MailCounts {
            total: messages.len(),
            unread,
        })
    }
}

// ---------------------------------------------------------------------------
// Tracker-backed flavor
// ---------------------------------------------------------------------------

/// Mailboxes as ephemeral tracker items.
///
/// Each message is an item labeled `mail` + `mailbox:<identity>` whose
/// description is the message JSON. Deleting a message closes the item.
pub struct TrackerMailbox {
    tracker: Arc<dyn TrackerAdapter>,
    peeks: PeekSet,
}

impl TrackerMailbox {
    pub fn new(tracker: Arc<dyn TrackerAdapter>) -> Self {
        Self {
            tracker,
            peeks: PeekSet::default(),
        }
    }

    fn mailbox_label(mailbox: &str) -> String {
        format!("mailbox:{mailbox}")
    }

    async fn fetch_all(&self, mailbox: &str) -> Result<Vec<(BeadId, Message)>, MailError> {
        let items = self
            .tracker
            .list(ListFilter {
                label: Some(Self::mailbox_label(mailbox)),
                status: Some(IssueStatus::Open),
                ..Default::default()
            })
            .await?;
        let mut messages = Vec::new();
        for item in items {
            let message: Message = serde_json::from_str(&item.description)?;
            messages.push((item.id, message));
        }
        // Tracker list order is id order; mailbox order is arrival order.
        messages.sort_by(|(_, a), (_, b)| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    async fn find(&self, mailbox: &str, id: &MessageId) -> Result<(BeadId, Message), MailError> {
        self.fetch_all(mailbox)
            .await?
            .into_iter()
            .find(|(_, m)| &m.id == id)
            .ok_or_else(|| MailError::NotFound(id.clone()))
    }
}

#[async_trait]
impl MailboxStore for TrackerMailbox {
    async fn append(&self, mailbox: &str, message: &Message) -> Result<(), MailError> {
        self.tracker
            .create(CreateRequest {
                title: message.subject.clone(),
                issue_type: Some(IssueType::Task),
                description: Some(serde_json::to_string(message)?),
                labels: vec!["mail".to_string(), Self::mailbox_label(mailbox)],
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn get(&self, mailbox: &str, id: &MessageId) -> Result<Message, MailError> {
        Ok(self.find(mailbox, id).await?.1)
    }

    async fn list(&self, mailbox: &str) -> Result<Vec<Message>, MailError> {
        let mut messages: Vec<Message> = self
            .fetch_all(mailbox)
            .await?
            .into_iter()
            .map(|(_, m)| m)
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn list_unread(&self, mailbox: &str) -> Result<Vec<Message>, MailError> {
        Ok(self
            .list(mailbox)
            .await?
            .into_iter()
            .filter(|m| !m.read && !self.peeks.is_peeked(mailbox, &m.id))
            .collect())
    }

    async fn list_thread(&self, mailbox: &str, thread_id: &str) -> Result<Vec<Message>, MailError> {
        Ok(self
            .fetch_all(mailbox)
            .await?
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| m.thread_id.as_deref() == Some(thread_id))
            .collect())
    }

    async fn mark_read(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        let (bead, mut message) = self.find(mailbox, id).await?;
        message.read = true;
        self.tracker
            .update(
                &bead,
                gt_adapters::tracker::UpdateRequest {
                    description: Some(serde_json::to_string(&message)?),
                    ..Default::default()
                },
            )
            .await?;
        self.peeks.forget(mailbox, id);
        Ok(())
    }

    async fn mark_read_only(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        let _ = self.find(mailbox, id).await?;
        self.peeks.peek(mailbox, id);
        Ok(())
    }

    async fn delete(&self, mailbox: &str, id: &MessageId) -> Result<(), MailError> {
        let (bead, _) = self.find(mailbox, id).await?;
        self.tracker.close(&bead, Some("mail deleted")).await?;
        self.peeks.forget(mailbox, id);
        Ok(())
    }

    async fn count(&self, mailbox: &str) -> Result<MailCounts, MailError> {
        let messages = self.fetch_all(mailbox).await?;
        let unread = messages
            .iter()
            .filter(|(_, m)| !m.read && !self.peeks.is_peeked(mailbox, &m.id))
            .count();
        Ok(MailCounts {
            total: messages.len(),
            unread,
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
