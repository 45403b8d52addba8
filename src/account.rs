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

//! Account rows and balance mutation.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use coinshop_rs::{Account, UserId};
//!
//! let account = Account::new(UserId(1), "alice", "opaque-hash", dec!(1000));
//! assert_eq!(account.balance(), dec!(1000));
//! ```

use crate::base::UserId;
use crate::error::ConstraintViolation;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Checks that debiting `amount` keeps the balance non-negative.
///
/// This is the authoritative funds check: it runs while the balance lock is
/// held, so a passing result cannot be invalidated by a concurrent debit.
pub(crate) fn ensure_can_debit(
    balance: &Decimal,
    amount: Decimal,
) -> Result<(), ConstraintViolation> {
    if amount < Decimal::ZERO {
        return Err(ConstraintViolation::NegativePrice);
    }
    if *balance < amount {
        return Err(ConstraintViolation::NegativeBalance);
    }
    Ok(())
}

/// Applies a debit that [`ensure_can_debit`] already approved.
pub(crate) fn apply_debit(balance: &mut Decimal, amount: Decimal) {
    *balance -= amount;
    debug_assert!(
        *balance >= Decimal::ZERO,
        "Invariant violated: balance went negative: {}",
        balance
    );
}

/// Applies a credit. Credits never fail once the amount is validated.
pub(crate) fn apply_credit(balance: &mut Decimal, amount: Decimal) {
    debug_assert!(
        amount >= Decimal::ZERO,
        "Invariant violated: negative credit: {}",
        amount
    );
    *balance += amount;
}

/// A user row in the ledger.
///
/// Identity, username, and credential are immutable after creation; the
/// balance is the only mutable cell and is guarded by its own lock. All
/// balance mutation goes through [`Account::debit`] / [`Account::credit`] or
/// the store's commit protocols, which re-validate the non-negative-balance
/// invariant under that lock.
#[derive(Debug)]
pub struct Account {
    id: UserId,
    username: String,
    credential: String,
    balance: Mutex<Decimal>,
}

impl Account {
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        credential: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            credential: credential.into(),
            balance: Mutex::new(balance),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The stored credential, opaque to the ledger core.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Current balance. A snapshot: it may be stale by the time the caller
    /// acts on it, which is why commits re-validate under the lock.
    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }

    /// Debits `amount` from the balance, failing if it would go negative.
    pub fn debit(&self, amount: Decimal) -> Result<(), ConstraintViolation> {
        let mut balance = self.balance.lock();
        ensure_can_debit(&balance, amount)?;
        apply_debit(&mut balance, amount);
        Ok(())
    }

    /// Credits `amount` to the balance.
    pub fn credit(&self, amount: Decimal) -> Result<(), ConstraintViolation> {
        if amount < Decimal::ZERO {
            return Err(ConstraintViolation::NonPositiveAmount);
        }
        let mut balance = self.balance.lock();
        apply_credit(&mut balance, amount);
        Ok(())
    }

    pub(crate) fn lock_balance(&self) -> MutexGuard<'_, Decimal> {
        self.balance.lock()
    }
}

/// Locks two accounts' balance cells, acquiring in ascending id order.
///
/// Guards come back in argument order regardless of which lock was taken
/// first. Every multi-account mutation must go through this so lock
/// acquisition never cycles. Callers must pass two distinct accounts.
pub(crate) fn lock_ordered<'a>(
    a: &'a Account,
    b: &'a Account,
) -> (MutexGuard<'a, Decimal>, MutexGuard<'a, Decimal>) {
    debug_assert_ne!(a.id, b.id, "lock_ordered requires distinct accounts");
    if a.id < b.id {
        let guard_a = a.balance.lock();
        let guard_b = b.balance.lock();
        (guard_a, guard_b)
    } else {
        let guard_b = b.balance.lock();
        let guard_a = a.balance.lock();
        (guard_a, guard_b)
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balance = *self.balance.lock();
        let mut state = serializer.serialize_struct("Account", 2)?;
        state.serialize_field("username", &self.username)?;
        state.serialize_field("balance", &balance)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account::new(UserId(1), "alice", "hash", balance)
    }

    #[test]
    fn debit_reduces_balance() {
        let account = account(dec!(100.00));
        account.debit(dec!(30.00)).unwrap();
        assert_eq!(account.balance(), dec!(70.00));
    }

    #[test]
    fn debit_to_exactly_zero_is_allowed() {
        let account = account(dec!(100.00));
        account.debit(dec!(100.00)).unwrap();
        assert_eq!(account.balance(), Decimal::ZERO);
    }

    #[test]
    fn debit_beyond_balance_is_rejected() {
        let account = account(dec!(50.00));
        let result = account.debit(dec!(100.00));
        assert_eq!(result, Err(ConstraintViolation::NegativeBalance));
        assert_eq!(account.balance(), dec!(50.00));
    }

    #[test]
    fn negative_debit_is_rejected() {
        let account = account(dec!(50.00));
        let result = account.debit(dec!(-10.00));
        assert_eq!(result, Err(ConstraintViolation::NegativePrice));
        assert_eq!(account.balance(), dec!(50.00));
    }

    #[test]
    fn zero_debit_is_a_no_op() {
        // Free catalog items debit zero coins.
        let account = account(dec!(50.00));
        account.debit(Decimal::ZERO).unwrap();
        assert_eq!(account.balance(), dec!(50.00));
    }

    #[test]
    fn credit_increases_balance() {
        let account = account(dec!(10.00));
        account.credit(dec!(15.50)).unwrap();
        assert_eq!(account.balance(), dec!(25.50));
    }

    #[test]
    fn negative_credit_is_rejected() {
        let account = account(dec!(10.00));
        let result = account.credit(dec!(-5.00));
        assert_eq!(result, Err(ConstraintViolation::NonPositiveAmount));
        assert_eq!(account.balance(), dec!(10.00));
    }

    #[test]
    fn lock_ordered_returns_guards_in_argument_order() {
        let low = Account::new(UserId(1), "low", "hash", dec!(1.00));
        let high = Account::new(UserId(2), "high", "hash", dec!(2.00));

        let (guard_high, guard_low) = lock_ordered(&high, &low);
        assert_eq!(*guard_high, dec!(2.00));
        assert_eq!(*guard_low, dec!(1.00));
        drop((guard_high, guard_low));

        let (guard_low, guard_high) = lock_ordered(&low, &high);
        assert_eq!(*guard_low, dec!(1.00));
        assert_eq!(*guard_high, dec!(2.00));
    }

    #[test]
    fn serializes_username_and_balance() {
        let account = account(dec!(760));
        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["username"], "alice");
        assert_eq!(parsed["balance"].as_str().unwrap(), "760");
    }
}
