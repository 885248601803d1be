// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-adapters: external collaborators behind named interfaces.
//!
//! Everything Gas Town talks to (the issue tracker CLI, git porcelain,
//! and the terminal multiplexer) lives here behind async traits, with
//! in-memory fakes gated behind the `test-support` feature.

pub mod git;
pub mod session;
pub mod subprocess;
pub mod tracker;

pub use git::{GitAdapter, GitCli, GitError};
pub use session::{SessionAdapter, SessionError, SessionInfo, TmuxSessions};
pub use tracker::{
    BeadsCli, CreateRequest, DepDirection, ListFilter, TrackerAdapter, TrackerError, UpdateRequest,
};

#[cfg(any(test, feature = "test-support"))]
pub use git::FakeGit;
#[cfg(any(test, feature = "test-support"))]
pub use session::FakeSessions;
#[cfg(any(test, feature = "test-support"))]
pub use tracker::FakeTracker;
