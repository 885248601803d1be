// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan/zombie agent cleanup.
//!
//! External agent processes that outlive their sessions are escalated
//! through a recorded state machine: first sighting gets a soft
//! termination signal, a sighting after the grace period gets a hard
//! kill, and a sighting after that is recorded as unkillable and
//! dropped. Every pid reachable from any live multiplexer session
//! (including descendants) is protected, as is anything younger than
//! the minimum age or with a non-matching command name.

use crate::lock::pid_alive;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("signal state io: {0}")]
    Io(#[from] std::io::Error),
    #[error("signal state corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentSignal {
    Term,
    Kill,
}

/// One tracked process in the signal state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub pid: u32,
    pub signal: SentSignal,
    /// RFC3339 UTC of the last signal sent.
    pub at: String,
}

/// What the sweep decided for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapAction {
    /// First sighting: soft termination sent.
    SentTerm,
    /// Grace expired: hard kill sent.
    SentKill,
    /// Survived a hard kill: recorded and dropped.
    Unkillable,
    /// Still within the grace period; wait.
    Waiting,
}

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub state_path: PathBuf,
    /// Grace between soft signal and hard kill.
    pub grace: Duration,
    /// Processes younger than this are never candidates.
    pub min_age: Duration,
    /// Command names (comm) eligible for reaping.
    pub command_names: Vec<String>,
}

impl ReaperConfig {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            grace: Duration::from_secs(30),
            min_age: Duration::from_secs(60),
            command_names: Vec::new(),
        }
    }
}

/// A process observed by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pid: u32,
    pub command: String,
    pub age: Duration,
}

/// Pure escalation step: given the existing record for a sighted pid,
/// decide the next action.
pub fn escalation_step(
    record: Option<&SignalRecord>,
    now: DateTime<Utc>,
    grace: Duration,
) -> ReapAction {
    match record {
        None => ReapAction::SentTerm,
        Some(record) => {
            match record.signal {
                SentSignal::Kill => ReapAction::Unkillable,
                SentSignal::Term => {
                    let sent_at = DateTime::parse_from_rfc3339(&record.at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or(now);
                    if (now - sent_at).to_std().unwrap_or_default() >= grace {
                        ReapAction::SentKill
                    } else {
                        ReapAction::Waiting
                    }
                }
            }
        }
    }
}

/// Pure sweep plan over candidates. Protected pids, young processes,
/// and non-matching commands are filtered before escalation.
pub fn plan_sweep(
    candidates: &[Candidate],
    protected: &HashSet<u32>,
    state: &HashMap<u32, SignalRecord>,
    config: &ReaperConfig,
    now: DateTime<Utc>,
) -> Vec<(u32, ReapAction)> {
    candidates
        .iter()
        .filter(|c| !protected.contains(&c.pid))
        .filter(|c| c.age >= config.min_age)
        .filter(|c| {
            config
                .command_names
                .iter()
                .any(|name| c.command == *name)
        })
        .map(|c| (c.pid, escalation_step(state.get(&c.pid), now, config.grace)))
        .collect()
}

/// The on-disk signal state, guarded by advisory file locks: writes
/// are exclusive, reads are shared. Only live pids are retained on
/// save.
pub struct SignalStateFile {
    path: PathBuf,
}

impl SignalStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashMap<u32, SignalRecord>, ReaperError> {
        let mut file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content);
        file.unlock()?;
        result?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let records: Vec<SignalRecord> = serde_json::from_str(&content)?;
        Ok(records.into_iter().map(|r| (r.pid, r)).collect())
    }

    pub fn save(&self, state: &HashMap<u32, SignalRecord>) -> Result<(), ReaperError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        // Only live pids are worth remembering
        let mut records: Vec<&SignalRecord> =
            state.values().filter(|r| pid_alive(r.pid)).collect();
        records.sort_by_key(|r| r.pid);
        let content = serde_json::to_string_pretty(&records)?;

        let result = file
            .set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| file.write_all(content.as_bytes()));
        file.unlock()?;
        result?;
        Ok(())
    }
}

pub struct Reaper {
    config: ReaperConfig,
    state_file: SignalStateFile,
}

impl Reaper {
    pub fn new(config: ReaperConfig) -> Self {
        let state_file = SignalStateFile::new(&config.state_path);
        Self { config, state_file }
    }

    /// One sweep: discover candidates, apply the plan, deliver signals,
    /// persist updated state.
    pub fn sweep(
        &self,
        protected: &HashSet<u32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(u32, ReapAction)>, ReaperError> {
        let candidates = discover(&self.config);
        let mut state = self.state_file.load()?;
        let actions = plan_sweep(&candidates, protected, &state, &self.config, now);

        for (pid, action) in &actions {
            match action {
                ReapAction::SentTerm => {
                    info!(pid, "sending SIGTERM to orphan agent");
                    send(*pid, Signal::SIGTERM);
                    state.insert(
                        *pid,
                        SignalRecord {
                            pid: *pid,
                            signal: SentSignal::Term,
                            at: now.to_rfc3339(),
                        },
                    );
                }
                ReapAction::SentKill => {
                    warn!(pid, "grace expired; sending SIGKILL");
                    send(*pid, Signal::SIGKILL);
                    state.insert(
                        *pid,
                        SignalRecord {
                            pid: *pid,
                            signal: SentSignal::Kill,
                            at: now.to_rfc3339(),
                        },
                    );
                }
                ReapAction::Unkillable => {
                    warn!(pid, "survived SIGKILL; recording as unkillable and dropping");
                    state.remove(pid);
                }
                ReapAction::Waiting => {}
            }
        }

        self.state_file.save(&state)?;
        Ok(actions)
    }
}

fn send(pid: u32, signal: Signal) {
    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(err) = kill(Pid::from_raw(pid), signal) {
        warn!(pid, %signal, error = %err, "signal delivery failed");
    }
}

/// The transitive closure of pids reachable from the given roots,
/// built from the /proc ppid table. Roots are included.
pub fn descendants_of(roots: &[u32]) -> HashSet<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, stat) in read_proc_stats() {
        children.entry(stat.ppid).or_default().push(pid);
    }

    let mut reachable: HashSet<u32> = roots.iter().copied().collect();
    let mut stack: Vec<u32> = roots.to_vec();
    while let Some(pid) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            for kid in kids {
                if reachable.insert(*kid) {
                    stack.push(*kid);
                }
            }
        }
    }
    reachable
}

struct ProcStat {
    ppid: u32,
    /// Seconds since process start.
    age: Duration,
    comm: String,
}

/// Candidates: /proc processes with a matching command name, older
/// than the minimum age.
fn discover(config: &ReaperConfig) -> Vec<Candidate> {
    read_proc_stats()
        .into_iter()
        .filter(|(_, stat)| config.command_names.iter().any(|n| stat.comm == *n))
        .map(|(pid, stat)| Candidate {
            pid,
            command: stat.comm,
            age: stat.age,
        })
        .collect()
}

/// Linux /proc scan. Unreadable entries are skipped silently (the
/// process may have exited mid-scan).
fn read_proc_stats() -> Vec<(u32, ProcStat)> {
    let uptime = read_uptime().unwrap_or_default();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        // comm is parenthesized and may contain spaces; fields resume
        // after the closing paren
        let Some(close) = stat.rfind(')') else { continue };
        let Some(open) = stat.find('(') else { continue };
        let comm = stat[open + 1..close].to_string();
        let fields: Vec<&str> = stat[close + 1..].split_whitespace().collect();
        // After comm: state(0) ppid(1) ... starttime(19) in clock ticks
        let Some(ppid) = fields.get(1).and_then(|f| f.parse::<u32>().ok()) else {
            continue;
        };
        let starttime_ticks: u64 = fields
            .get(19)
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();
        let started_secs = starttime_ticks / 100; // CLK_TCK is 100 on Linux
        let age = Duration::from_secs(uptime.as_secs().saturating_sub(started_secs));
        out.push((pid, ProcStat { ppid, age, comm }));
    }
    out
}

fn read_uptime() -> Option<Duration> {
    let content = std::fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
