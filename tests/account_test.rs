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

//! Account public API integration tests.

use coinshop_rs::{Account, ConstraintViolation, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

fn account(balance: Decimal) -> Account {
    Account::new(UserId(1), "alice", "opaque-hash", balance)
}

// === Basic Account Tests ===

#[test]
fn account_exposes_identity_and_balance() {
    let account = account(dec!(1000));
    assert_eq!(account.id(), UserId(1));
    assert_eq!(account.username(), "alice");
    assert_eq!(account.credential(), "opaque-hash");
    assert_eq!(account.balance(), dec!(1000));
}

#[test]
fn debit_and_credit_round_trip() {
    let account = account(dec!(100.00));
    account.debit(dec!(30.00)).unwrap();
    account.credit(dec!(5.50)).unwrap();
    assert_eq!(account.balance(), dec!(75.50));
}

#[test]
fn debit_cannot_go_negative() {
    let account = account(dec!(100.00));
    let result = account.debit(dec!(100.01));
    assert_eq!(result, Err(ConstraintViolation::NegativeBalance));
    assert_eq!(account.balance(), dec!(100.00));
}

#[test]
fn debit_to_zero_is_fine() {
    let account = account(dec!(100.00));
    account.debit(dec!(100.00)).unwrap();
    assert_eq!(account.balance(), Decimal::ZERO);
}

// === Concurrency Tests ===

/// Concurrent debits against one account are serialized by its balance
/// lock: only as many can succeed as the starting balance covers.
#[test]
fn concurrent_debits_never_overdraw() {
    let account = Arc::new(account(dec!(100.00)));

    const NUM_THREADS: usize = 10;
    const DEBIT: Decimal = dec!(30.00);

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let account = Arc::clone(&account);
        handles.push(thread::spawn(move || account.debit(DEBIT).is_ok()));
    }

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();

    // 100 / 30 -> exactly three debits fit.
    assert_eq!(successes, 3);
    assert_eq!(account.balance(), dec!(10.00));
}

#[test]
fn concurrent_credits_all_land() {
    let account = Arc::new(account(Decimal::ZERO));

    const NUM_THREADS: usize = 8;
    const CREDITS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let account = Arc::clone(&account);
        handles.push(thread::spawn(move || {
            for _ in 0..CREDITS_PER_THREAD {
                account.credit(dec!(1.25)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let expected = dec!(1.25) * Decimal::from((NUM_THREADS * CREDITS_PER_THREAD) as u64);
    assert_eq!(account.balance(), expected);
}

#[test]
fn mixed_debits_and_credits_stay_consistent() {
    let account = Arc::new(account(dec!(1000)));

    const NUM_THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for i in 0..NUM_THREADS {
        let account = Arc::clone(&account);
        handles.push(thread::spawn(move || {
            let mut delta = Decimal::ZERO;
            for j in 0..OPS_PER_THREAD {
                if (i + j) % 2 == 0 {
                    account.credit(dec!(2)).unwrap();
                    delta += dec!(2);
                } else if account.debit(dec!(3)).is_ok() {
                    delta -= dec!(3);
                }
            }
            delta
        }));
    }

    let net: Decimal = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .sum();

    assert_eq!(account.balance(), dec!(1000) + net);
    assert!(account.balance() >= Decimal::ZERO);
}
