// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-mail: the address-routed mail bus.
//!
//! Mailboxes are append-only per identity; the router is the only legal
//! path between components. Two store flavors exist (line-delimited JSON
//! files and tracker-backed ephemeral items) behind one interface.

pub mod channels;
pub mod router;
pub mod store;

pub use channels::{AnnounceChannel, ListChannel, MessagingConfig, QueueChannel};
pub use router::{Recipient, Router, SendOutcome};
pub use store::{JsonlMailbox, MailCounts, MailError, MailboxStore, TrackerMailbox};
