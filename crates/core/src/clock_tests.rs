// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn system_clock_unix_ts_is_recent() {
    // Sanity floor: 2023-11-14.
    assert!(SystemClock.unix_ts() > 1_700_000_000);
}

#[test]
fn fake_clock_advance_moves_both_axes() {
    let clock = FakeClock::new();
    let start = clock.now();
    let ts = clock.unix_ts();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now().duration_since(start), Duration::from_secs(90));
    assert_eq!(clock.unix_ts(), ts + 90);
}

#[test]
fn fake_clock_set_unix_ts() {
    let clock = FakeClock::new();
    clock.set_unix_ts(42);
    assert_eq!(clock.unix_ts(), 42);
}

#[test]
fn fake_clock_clones_share_time() {
    let a = FakeClock::new();
    let b = a.clone();
    a.advance(Duration::from_secs(10));
    assert_eq!(a.unix_ts(), b.unix_ts());
}
