// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! A transfer takes both balance locks; if acquisition order ever depended
//! on argument order, two opposite-direction transfers between the same
//! accounts would deadlock. These tests drive exactly those interleavings
//! through the real store and fail if the lock graph ever cycles.

use coinshop_rs::{Engine, LedgerStore, UserId};
use parking_lot::deadlock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Helpers ===

fn engine_with_users(names: &[&str]) -> (Engine, Vec<UserId>) {
    let store = Arc::new(LedgerStore::new());
    store.catalog().insert("cup", dec!(1)).unwrap();
    let ids = names
        .iter()
        .map(|name| store.create_user(name, "hash").unwrap().id())
        .collect();
    (Engine::new(store), ids)
}

// === Tests ===

/// Opposite-direction transfers between the same two accounts: the scenario
/// ordered locking exists for.
#[test]
fn no_deadlock_bidirectional_transfers() {
    let detector = start_deadlock_detector();
    let (engine, ids) = engine_with_users(&["alice", "bob"]);

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 250;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for i in 0..NUM_THREADS {
        let engine = engine.clone();
        let (sender, receiver) = if i % 2 == 0 {
            (ids[0], "bob")
        } else {
            (ids[1], "alice")
        };

        handles.push(thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                let _ = engine.send_coin(sender, receiver, dec!(1));
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(engine.store().total_supply(), dec!(2000));
    stop_deadlock_detector(detector);
}

/// Transfers around a ring of accounts, so every pair of adjacent balance
/// locks is contended in both roles.
#[test]
fn no_deadlock_transfer_ring() {
    let detector = start_deadlock_detector();
    let names = ["alice", "bob", "carol", "dave", "erin"];
    let (engine, ids) = engine_with_users(&names);

    const OPS_PER_THREAD: usize = 200;

    let mut handles = Vec::with_capacity(names.len() * 2);
    for (i, &sender) in ids.iter().enumerate() {
        // Clockwise and counter-clockwise at once.
        for offset in [1, names.len() - 1] {
            let engine = engine.clone();
            let receiver = names[(i + offset) % names.len()].to_owned();
            handles.push(thread::spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    let _ = engine.send_coin(sender, &receiver, dec!(3));
                }
            }));
        }
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(engine.store().total_supply(), dec!(5000));
    stop_deadlock_detector(detector);
}

/// Mixed reads and writes under contention: transfers, purchases, and
/// history reads interleaving on the same accounts.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let (engine, ids) = engine_with_users(&["alice", "bob", "carol"]);

    const NUM_THREADS: usize = 12;
    const OPS_PER_THREAD: usize = 150;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for i in 0..NUM_THREADS {
        let engine = engine.clone();
        let actor = ids[i % ids.len()];
        let receiver = ["alice", "bob", "carol"][(i + 1) % ids.len()].to_owned();

        handles.push(thread::spawn(move || {
            for j in 0..OPS_PER_THREAD {
                match j % 3 {
                    0 => {
                        let _ = engine.send_coin(actor, &receiver, dec!(2));
                    }
                    1 => {
                        let _ = engine.buy_item(actor, "cup");
                    }
                    _ => {
                        let info = engine.info(actor).unwrap();
                        assert!(info.coins >= dec!(0));
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);
}
