// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_both_timelines() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let u0 = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - t0, Duration::from_secs(90));
    assert_eq!((clock.now_utc() - u0).num_seconds(), 90);
}

#[test]
fn fake_clock_set_utc_overrides_wall_time() {
    let clock = FakeClock::new();
    let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    clock.set_utc(when);
    assert_eq!(clock.now_utc(), when);
    assert_eq!(clock.rfc3339(), "2026-03-01T12:00:00+00:00");
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
