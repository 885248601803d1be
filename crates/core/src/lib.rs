// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-core: Domain types for the Gas Town (gt) orchestration substrate

pub mod macros;

pub mod address;
pub mod clock;
pub mod event;
pub mod fields;
pub mod issue;
pub mod merge_request;
pub mod message;
pub mod names;
pub mod polecat;
pub mod protocol;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use address::{Address, AddressError, Role, Target};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{EventRecord, Visibility};
pub use fields::{get_field, set_field};
pub use issue::{BeadId, IssueStatus, IssueType, Priority, WorkItem};
pub use merge_request::MergeRequestFields;
pub use message::{is_wisp_subject, MailPriority, MailType, Message, MessageId};
pub use names::{theme_for_rig, NamePool, NameState, PoolError, ReconcileOutcome};
pub use polecat::{CleanupStatus, Polecat, PolecatName, PolecatState, RigName, SessionId};
pub use protocol::{
    extract_polecat, parse_message_type, DoneStatus, FailureType, MessageKind, ProtocolMessage,
};
