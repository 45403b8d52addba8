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

//! The ledger store.
//!
//! Holds the user table, the item catalog, and the append-only purchase and
//! transfer logs. Every multi-row mutation runs as one commit inside a
//! critical section under the affected balance lock(s):
//!
//! - a purchase appends its row and debits the buyer under the buyer's lock;
//! - a transfer appends its row, debits the sender, and credits the receiver
//!   under both locks, acquired in ascending user-id order.
//!
//! Invariants (`balance >= 0`, `amount > 0`) are re-validated inside the
//! critical section before anything is written, so a commit either applies
//! every one of its effects or none, and engine-level pre-checks are free to
//! race on stale reads. Row ids are allocated while the log lock is held,
//! which makes ascending id order identical to append order.

use crate::account::{self, Account};
use crate::base::{ItemId, PurchaseId, TransferId, UserId};
use crate::catalog::{Catalog, Item};
use crate::error::ConstraintViolation;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Balance granted to every newly registered user.
pub const STARTING_BALANCE: Decimal = dec!(1000);

/// An append-only purchase row.
///
/// `price` is captured at purchase time; later catalog changes never rewrite
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub price: Decimal,
}

/// An append-only coin transfer row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Decimal,
}

/// The authoritative ledger state: users, catalog, purchase and transfer
/// logs.
///
/// Handles are passed explicitly (usually as `Arc<LedgerStore>`) into every
/// engine; there is no process-wide store.
#[derive(Debug, Default)]
pub struct LedgerStore {
    users: DashMap<UserId, Arc<Account>>,
    usernames: DashMap<String, UserId>,
    catalog: Catalog,
    purchases: RwLock<Vec<Purchase>>,
    transfers: RwLock<Vec<Transfer>>,
    next_user_id: AtomicU64,
    next_purchase_id: AtomicU64,
    next_transfer_id: AtomicU64,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Creates a user row with the default starting balance.
    ///
    /// The username claim is atomic (map entry API), so two racing
    /// registrations for one name produce exactly one row; the loser gets
    /// [`ConstraintViolation::DuplicateUsername`].
    pub fn create_user(
        &self,
        username: &str,
        credential: &str,
    ) -> Result<Arc<Account>, ConstraintViolation> {
        match self.usernames.entry(username.to_owned()) {
            Entry::Occupied(_) => Err(ConstraintViolation::DuplicateUsername),
            Entry::Vacant(entry) => {
                let id = UserId(self.next_user_id.fetch_add(1, Ordering::Relaxed) + 1);
                let account = Arc::new(Account::new(id, username, credential, STARTING_BALANCE));
                // User row first, then the name index: a resolvable name
                // always points at an existing row.
                self.users.insert(id, Arc::clone(&account));
                entry.insert(id);
                Ok(account)
            }
        }
    }

    pub fn user(&self, id: UserId) -> Option<Arc<Account>> {
        self.users.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn user_by_username(&self, username: &str) -> Option<Arc<Account>> {
        let id = *self.usernames.get(username)?;
        self.user(id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Snapshot of all accounts, ordered by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut all: Vec<_> = self
            .users
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by_key(|account| account.id());
        all
    }

    /// Commits a purchase: append the row, debit the buyer by the item's
    /// current price. One atomic unit under the buyer's balance lock: if
    /// the funds re-check fails, nothing is written.
    pub fn commit_purchase(
        &self,
        user: &Account,
        item: &Item,
    ) -> Result<PurchaseId, ConstraintViolation> {
        let price = item.price();
        let mut balance = user.lock_balance();
        account::ensure_can_debit(&balance, price)?;

        let id = {
            let mut log = self.purchases.write();
            let id = PurchaseId(self.next_purchase_id.fetch_add(1, Ordering::Relaxed) + 1);
            log.push(Purchase {
                id,
                user_id: user.id(),
                item_id: item.id(),
                price,
            });
            id
        };
        account::apply_debit(&mut balance, price);
        Ok(id)
    }

    /// Commits a transfer: append the row, debit the sender, credit the
    /// receiver. One atomic unit under both balance locks.
    ///
    /// The positive-amount and sufficient-funds checks here are the
    /// authoritative guards; callers' pre-checks only reject early.
    pub fn commit_transfer(
        &self,
        sender: &Account,
        receiver: &Account,
        amount: Decimal,
    ) -> Result<TransferId, ConstraintViolation> {
        if amount <= Decimal::ZERO {
            return Err(ConstraintViolation::NonPositiveAmount);
        }
        if sender.id() == receiver.id() {
            return Err(ConstraintViolation::SelfTransfer);
        }

        let (mut sender_balance, mut receiver_balance) = account::lock_ordered(sender, receiver);
        account::ensure_can_debit(&sender_balance, amount)?;

        let id = {
            let mut log = self.transfers.write();
            let id = TransferId(self.next_transfer_id.fetch_add(1, Ordering::Relaxed) + 1);
            log.push(Transfer {
                id,
                sender_id: sender.id(),
                receiver_id: receiver.id(),
                amount,
            });
            id
        };
        account::apply_debit(&mut sender_balance, amount);
        account::apply_credit(&mut receiver_balance, amount);
        Ok(id)
    }

    /// All purchase rows for one user, in append order.
    pub fn purchases_of(&self, user_id: UserId) -> Vec<Purchase> {
        self.purchases
            .read()
            .iter()
            .filter(|purchase| purchase.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Transfer rows where the user is the sender, in append order.
    pub fn transfers_sent_by(&self, user_id: UserId) -> Vec<Transfer> {
        self.transfers
            .read()
            .iter()
            .filter(|transfer| transfer.sender_id == user_id)
            .cloned()
            .collect()
    }

    /// Transfer rows where the user is the receiver, in append order.
    pub fn transfers_received_by(&self, user_id: UserId) -> Vec<Transfer> {
        self.transfers
            .read()
            .iter()
            .filter(|transfer| transfer.receiver_id == user_id)
            .cloned()
            .collect()
    }

    pub fn purchase_count(&self) -> usize {
        self.purchases.read().len()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.read().len()
    }

    /// Sum of every user's balance. Transfers leave this unchanged;
    /// purchases reduce it by exactly the captured price.
    pub fn total_supply(&self) -> Decimal {
        self.users
            .iter()
            .map(|entry| entry.value().balance())
            .sum()
    }
}
