// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Address resolution and message routing.
//!
//! The router expands channels and `@`-groups to concrete identities,
//! validates every non-special identity against the tracker's
//! agent-identity items, silently drops self-mail, and appends to the
//! resolved mailboxes. `@`-groups are resolved at send time and never
//! stored.

use crate::channels::MessagingConfig;
use crate::store::{MailError, MailboxStore};
use gt_adapters::tracker::{ListFilter, TrackerAdapter};
use gt_core::address::{Address, Role, Target};
use gt_core::issue::{IssueStatus, IssueType};
use gt_core::message::{MailPriority, MailType, Message};
use std::sync::Arc;
use tracing::debug;

/// Special identity that is always a valid recipient.
const OVERSEER: &str = "overseer";

/// A recipient expression as typed by a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Overseer,
    Address(Address),
    List(String),
    Queue(String),
    Announce(String),
    Group(Group),
}

/// `@`-group kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    Overseer,
    /// Every agent in the town.
    Town,
    /// Every agent holding the role (e.g. `@witnesses`).
    Role(Role),
    /// Every agent in a rig.
    Rig(String),
    /// A rig's crew members.
    Crew(String),
    /// A rig's polecats.
    Polecats(String),
}

impl Recipient {
    pub fn parse(input: &str) -> Result<Self, MailError> {
        let input = input.trim();
        if input == OVERSEER {
            return Ok(Recipient::Overseer);
        }
        if let Some(name) = input.strip_prefix("list:") {
            return Ok(Recipient::List(name.to_string()));
        }
        if let Some(name) = input.strip_prefix("queue:") {
            return Ok(Recipient::Queue(name.to_string()));
        }
        if let Some(name) = input.strip_prefix("announce:") {
            return Ok(Recipient::Announce(name.to_string()));
        }
        if let Some(group) = input.strip_prefix('@') {
            let group = match group {
                "overseer" => Group::Overseer,
                "town" => Group::Town,
                "witnesses" => Group::Role(Role::Witness),
                "refineries" => Group::Role(Role::Refinery),
                "deacons" => Group::Role(Role::Deacon),
                _ => match group.split_once('/') {
                    Some(("rig", rig)) => Group::Rig(rig.to_string()),
                    Some(("crew", rig)) => Group::Crew(rig.to_string()),
                    Some(("polecats", rig)) => Group::Polecats(rig.to_string()),
                    _ => return Err(MailError::UnknownChannel(input.to_string())),
                },
            };
            return Ok(Recipient::Group(group));
        }
        Ok(Recipient::Address(Address::parse(input)?))
    }
}

/// Options for a send.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub priority: MailPriority,
    pub mail_type: MailType,
    pub thread_id: Option<String>,
    /// RFC3339 UTC; the caller owns the clock.
    pub timestamp: String,
}

impl SendOptions {
    pub fn at(timestamp: impl Into<String>) -> Self {
        Self {
            priority: MailPriority::Normal,
            mail_type: MailType::Notification,
            thread_id: None,
            timestamp: timestamp.into(),
        }
    }
}

/// Result of one send.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Mailboxes the message was appended to.
    pub delivered: Vec<String>,
    /// Recipients dropped because they resolved to the sender.
    pub dropped_self: usize,
}

pub struct Router {
    store: Arc<dyn MailboxStore>,
    tracker: Arc<dyn TrackerAdapter>,
    config: MessagingConfig,
}

impl Router {
    pub fn new(
        store: Arc<dyn MailboxStore>,
        tracker: Arc<dyn TrackerAdapter>,
        config: MessagingConfig,
    ) -> Self {
        Self {
            store,
            tracker,
            config,
        }
    }

    /// Canonical addresses of every registered agent identity.
    async fn agent_addresses(&self) -> Result<Vec<Address>, MailError> {
        let items = self
            .tracker
            .list(ListFilter {
                issue_type: Some(IssueType::AgentIdentity),
                status: Some(IssueStatus::Open),
                ..Default::default()
            })
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| item.field("address"))
            .filter_map(|addr| Address::parse(addr).ok())
            .collect())
    }

    /// Resolve one recipient expression to concrete mailbox identities.
    ///
    /// Channels and groups expand first; every resulting non-special
    /// identity must match a registered agent identity.
    pub async fn resolve(&self, recipient: &Recipient) -> Result<Vec<String>, MailError> {
        match recipient {
            Recipient::Overseer => Ok(vec![OVERSEER.to_string()]),
            Recipient::Group(group) => self.expand_group(group).await,
            Recipient::List(name) => {
                let list = self
                    .config
                    .lists
                    .get(name)
                    .ok_or_else(|| MailError::UnknownChannel(format!("list:{name}")))?;
                let mut out = Vec::new();
                for entry in &list.recipients {
                    let nested = Recipient::parse(entry)?;
                    out.extend(Box::pin(self.resolve(&nested)).await?);
                }
                Ok(out)
            }
            Recipient::Queue(name) => {
                let queue = self
                    .config
                    .queues
                    .get(name)
                    .ok_or_else(|| MailError::UnknownChannel(format!("queue:{name}")))?;
                // Ordered preference: the first recipient under its claim
                // bound wins this send.
                for entry in &queue.recipients {
                    let nested = Recipient::parse(entry)?;
                    let resolved = Box::pin(self.resolve(&nested)).await?;
                    for identity in resolved {
                        let unread = self.store.count(&identity).await?.unread;
                        if unread < queue.max_claims {
                            return Ok(vec![identity]);
                        }
                    }
                }
                Err(MailError::QueueSaturated(name.clone()))
            }
            Recipient::Announce(name) => {
                let channel = self
                    .config
                    .announces
                    .get(name)
                    .ok_or_else(|| MailError::UnknownChannel(format!("announce:{name}")))?;
                let mut out = vec![format!("announce/{name}")];
                for entry in &channel.subscribers {
                    let nested = Recipient::parse(entry)?;
                    out.extend(Box::pin(self.resolve(&nested)).await?);
                }
                Ok(out)
            }
            Recipient::Address(address) => self.resolve_address(address).await,
        }
    }

    async fn resolve_address(&self, address: &Address) -> Result<Vec<String>, MailError> {
        let agents = self.agent_addresses().await?;
        match address {
            // Town-level coordinators are ordinary identities: they must
            // be registered like everyone else.
            Address::Mayor | Address::Deacon => {
                if agents.iter().any(|a| a == address) {
                    Ok(vec![address.to_string()])
                } else {
                    Err(MailError::UnknownRecipient(address.to_string()))
                }
            }
            Address::Rig {
                rig,
                target,
                machine,
            } => {
                let in_rig = |a: &&Address| a.rig() == Some(rig.as_str());
                match target {
                    Target::Broadcast => {
                        let members: Vec<String> =
                            agents.iter().filter(in_rig).map(|a| a.to_string()).collect();
                        if members.is_empty() {
                            return Err(MailError::UnknownRecipient(address.to_string()));
                        }
                        Ok(members)
                    }
                    // Unqualified worker: try crew, then polecats
                    Target::Worker(name) => {
                        for candidate in [
                            Target::Crew(name.clone()),
                            Target::Polecat(name.clone()),
                        ] {
                            let candidate = Address::Rig {
                                machine: machine.clone(),
                                rig: rig.clone(),
                                target: candidate,
                            };
                            if agents.iter().any(|a| addresses_match(a, &candidate)) {
                                return Ok(vec![candidate.to_string()]);
                            }
                        }
                        Err(MailError::UnknownRecipient(address.to_string()))
                    }
                    _ => {
                        if agents.iter().any(|a| addresses_match(a, address)) {
                            Ok(vec![address.to_string()])
                        } else {
                            Err(MailError::UnknownRecipient(address.to_string()))
                        }
                    }
                }
            }
        }
    }

    async fn expand_group(&self, group: &Group) -> Result<Vec<String>, MailError> {
        if let Group::Overseer = group {
            return Ok(vec![OVERSEER.to_string()]);
        }
        let agents = self.agent_addresses().await?;
        let selected: Vec<String> = agents
            .iter()
            .filter(|address| match (group, address) {
                (Group::Town, _) => true,
                (Group::Role(role), Address::Rig { target, .. }) => {
                    matches!(target, Target::Role(r) if r == role)
                }
                (Group::Rig(rig), a) => a.rig() == Some(rig.as_str()),
                (Group::Crew(rig), Address::Rig { rig: r, target, .. }) => {
                    r == rig && matches!(target, Target::Crew(_))
                }
                (Group::Polecats(rig), Address::Rig { rig: r, target, .. }) => {
                    r == rig && matches!(target, Target::Polecat(_))
                }
                _ => false,
            })
            .map(|a| a.to_string())
            .collect();
        Ok(selected)
    }

    /// Route a message. Wisp flagging is by subject; self-mail (a
    /// recipient that resolves to the sender) is dropped silently.
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        opts: SendOptions,
    ) -> Result<SendOutcome, MailError> {
        let recipient = Recipient::parse(to)?;
        let identities = self.resolve(&recipient).await?;

        let mut outcome = SendOutcome::default();
        for identity in identities {
            if identity == from {
                debug!(identity = %identity, "dropping self-mail");
                outcome.dropped_self += 1;
                continue;
            }
            let mut message = Message::new(from, &identity, subject, body, &opts.timestamp)
                .with_priority(opts.priority)
                .with_type(opts.mail_type);
            if let Some(thread) = &opts.thread_id {
                message = message.with_thread(thread.clone());
            }
            self.store.append(&identity, &message).await?;
            outcome.delivered.push(identity);
        }

        // Trim announce channel retention after append
        if let Recipient::Announce(name) = &recipient {
            self.trim_announce(name).await?;
        }
        Ok(outcome)
    }

    async fn trim_announce(&self, name: &str) -> Result<(), MailError> {
        let Some(channel) = self.config.announces.get(name) else {
            return Ok(());
        };
        let mailbox = format!("announce/{name}");
        let messages = self.store.list(&mailbox).await?;
        // Newest-first: everything past the retain window goes
        for stale in messages.iter().skip(channel.retain) {
            self.store.delete(&mailbox, &stale.id).await?;
        }
        Ok(())
    }
}

/// Address equality for routing: the machine qualifier is ignored when
/// either side omits it.
fn addresses_match(a: &Address, b: &Address) -> bool {
    match (a, b) {
        (
            Address::Rig {
                machine: ma,
                rig: ra,
                target: ta,
            },
            Address::Rig {
                machine: mb,
                rig: rb,
                target: tb,
            },
        ) => {
            ra == rb
                && ta == tb
                && match (ma, mb) {
                    (Some(x), Some(y)) => x == y,
                    _ => true,
                }
        }
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
