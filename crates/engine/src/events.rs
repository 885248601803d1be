// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log and feed curator.
//!
//! Components append raw records to `.events.jsonl`; the curator folds
//! them into the user-facing `.feed.jsonl`: audit-only records are
//! dropped, repeated completions are deduplicated within a short
//! window, and dispatch bursts collapse into a single "dispatching to
//! N" record. Dispatch and mail events are never deduplicated, only
//! aggregated.

use chrono::{DateTime, Utc};
use gt_core::clock::Clock;
use gt_core::event::{EventRecord, Visibility};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{BufRead, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Append-only raw event log.
#[derive(Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn append(&self, record: &EventRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Every parsable record (corrupt lines skipped).
    pub fn read_all(&self) -> std::io::Result<Vec<EventRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// Dedup window for completion records.
    pub completion_window: Duration,
    /// Aggregation window for dispatch records.
    pub dispatch_window: Duration,
    /// At or above this many dispatches in one window, emit a single
    /// aggregate record instead.
    pub dispatch_aggregate_threshold: usize,
    /// Poll cadence of the curator loop.
    pub tick: Duration,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            completion_window: Duration::from_secs(10),
            dispatch_window: Duration::from_secs(30),
            dispatch_aggregate_threshold: 3,
            tick: Duration::from_millis(100),
        }
    }
}

struct CuratorState {
    /// Byte offset consumed from the raw log.
    offset: u64,
    /// (type, actor) -> last written timestamp, for completion dedup.
    recent: HashMap<(String, String), DateTime<Utc>>,
    /// Buffered dispatch records awaiting window expiry.
    pending_dispatch: Vec<EventRecord>,
    window_started: Option<DateTime<Utc>>,
}

/// Folds the raw log into the feed log.
pub struct Curator {
    raw: PathBuf,
    feed: PathBuf,
    config: CuratorConfig,
    state: Mutex<CuratorState>,
}

fn parse_ts(record: &EventRecord) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&record.ts)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn is_completion(record: &EventRecord) -> bool {
    record.event_type.ends_with(".completed")
        || record.event_type.ends_with(".merged")
        || record.event_type.ends_with(".done")
}

fn is_dispatch(record: &EventRecord) -> bool {
    record.event_type.starts_with("dispatch")
}

impl Curator {
    pub fn new(raw: impl Into<PathBuf>, feed: impl Into<PathBuf>, config: CuratorConfig) -> Self {
        Self {
            raw: raw.into(),
            feed: feed.into(),
            config,
            state: Mutex::new(CuratorState {
                offset: 0,
                recent: HashMap::new(),
                pending_dispatch: Vec::new(),
                window_started: None,
            }),
        }
    }

    /// The curator loop: tick, fold, repeat until cancelled.
    pub async fn run<C: Clock>(&self, clock: C, cancel: CancellationToken) {
        info!(raw = %self.raw.display(), "curator started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    // Final flush so shutdown loses nothing
                    let _ = self.flush(clock.now_utc());
                    info!("curator stopped");
                    return;
                }
                () = tokio::time::sleep(self.config.tick) => {
                    if let Err(err) = self.process_available(clock.now_utc()) {
                        warn!(error = %err, "curator pass failed");
                    }
                }
            }
        }
    }

    /// Consume newly appended raw records and fold them into the feed.
    pub fn process_available(&self, now: DateTime<Utc>) -> std::io::Result<usize> {
        let records = self.read_new()?;
        let count = records.len();
        for record in records {
            self.fold(record)?;
        }
        self.flush_expired(now)?;
        Ok(count)
    }

    fn read_new(&self) -> std::io::Result<Vec<EventRecord>> {
        let mut file = match std::fs::File::open(&self.raw) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let offset = self.state.lock().offset;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        let mut consumed = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            // Only consume complete lines; a partial tail is re-read
            // next tick
            if !line.ends_with('\n') {
                break;
            }
            consumed += n as u64;
            if let Ok(record) = serde_json::from_str::<EventRecord>(line.trim()) {
                records.push(record);
            }
        }
        self.state.lock().offset = offset + consumed;
        Ok(records)
    }

    fn fold(&self, record: EventRecord) -> std::io::Result<()> {
        if !record.visibility.feed_visible() {
            return Ok(());
        }
        let Some(ts) = parse_ts(&record) else {
            return Ok(());
        };

        if is_dispatch(&record) {
            let mut state = self.state.lock();
            if state.window_started.is_none() {
                state.window_started = Some(ts);
            }
            state.pending_dispatch.push(record);
            return Ok(());
        }

        if is_completion(&record) {
            let key = (record.event_type.clone(), record.actor.clone());
            let mut state = self.state.lock();
            if let Some(last) = state.recent.get(&key) {
                if (ts - *last).to_std().unwrap_or_default() < self.config.completion_window {
                    // Duplicate within the window: drop
                    return Ok(());
                }
            }
            state.recent.insert(key, ts);
        }

        self.write_feed(&record)
    }

    /// Flush the dispatch window if it has expired by `now`.
    fn flush_expired(&self, now: DateTime<Utc>) -> std::io::Result<()> {
        let started = match self.state.lock().window_started {
            Some(started) => started,
            None => return Ok(()),
        };
        let elapsed = (now - started).to_std().unwrap_or_default();
        if elapsed < self.config.dispatch_window {
            return Ok(());
        }
        self.flush(now)
    }

    /// Emit buffered dispatches: one aggregate record at or above the
    /// threshold, individual records below it.
    pub fn flush(&self, now: DateTime<Utc>) -> std::io::Result<()> {
        let pending = {
            let mut state = self.state.lock();
            state.window_started = None;
            std::mem::take(&mut state.pending_dispatch)
        };
        if pending.is_empty() {
            return Ok(());
        }

        if pending.len() >= self.config.dispatch_aggregate_threshold {
            let actors: Vec<&str> = pending.iter().map(|r| r.actor.as_str()).collect();
            let aggregate = EventRecord::new(
                now.to_rfc3339(),
                "dispatch.aggregate",
                pending[0].actor.clone(),
                serde_json::json!({
                    "count": pending.len(),
                    "summary": format!("dispatching to {}", pending.len()),
                    "actors": actors,
                }),
                Visibility::Feed,
            );
            self.write_feed(&aggregate)
        } else {
            for record in &pending {
                self.write_feed(record)?;
            }
            Ok(())
        }
    }

    fn write_feed(&self, record: &EventRecord) -> std::io::Result<()> {
        EventLog::new(&self.feed).append(record)
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
