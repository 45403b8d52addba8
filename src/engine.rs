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

//! Purchase and transfer orchestration.
//!
//! The [`Engine`] is handed its [`LedgerStore`] explicitly (there is no
//! process-wide store) and exposes the three authenticated operations:
//! buying a catalog item, sending coins, and reading account info.
//!
//! Each write operation runs a cheap pre-check against a balance snapshot
//! and rejects early; the store re-validates every invariant inside the
//! commit critical section, so a pre-check that raced a concurrent spend is
//! caught there and mapped back into the caller-facing taxonomy here. This
//! module is the only place store-level [`ConstraintViolation`]s are
//! translated.

use crate::account::Account;
use crate::base::UserId;
use crate::error::{ConstraintViolation, LedgerError};
use crate::history::{self, UserInfo};
use crate::store::LedgerStore;
use log::warn;
use rust_decimal::Decimal;
use std::sync::Arc;

/// The shop's operation surface: buy, send, info.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<LedgerStore>,
}

impl Engine {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Maps an already-authenticated identity onto its user row.
    fn resolve(&self, user_id: UserId) -> Result<Arc<Account>, LedgerError> {
        self.store.user(user_id).ok_or(LedgerError::Unauthorized)
    }

    /// Buys one unit of `item_name` for the authenticated user.
    ///
    /// Flow: resolve the user row, resolve the item by exact name, pre-check
    /// funds against the loaded balance, then commit (purchase row + debit)
    /// as one atomic unit. Retries are not deduplicated; every successful
    /// call appends a new purchase row.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - no user row for `user_id`.
    /// - [`LedgerError::ItemNotFound`] - unknown item name.
    /// - [`LedgerError::InsufficientFunds`] - balance below the item price.
    /// - [`LedgerError::PurchaseFailed`] - the commit failed; the cause is
    ///   logged, not surfaced.
    pub fn buy_item(&self, user_id: UserId, item_name: &str) -> Result<(), LedgerError> {
        let user = self.resolve(user_id)?;
        let item = self
            .store
            .catalog()
            .by_name(item_name)
            .ok_or(LedgerError::ItemNotFound)?;

        if user.balance() < item.price() {
            return Err(LedgerError::InsufficientFunds);
        }

        self.store.commit_purchase(&user, &item).map_err(|violation| {
            warn!(
                "purchase failed: user={user_id} item={} price={} cause={violation}",
                item.name(),
                item.price()
            );
            LedgerError::PurchaseFailed
        })?;
        Ok(())
    }

    /// Sends `amount` coins from the authenticated user to `to_username`.
    ///
    /// The amount arrives unvalidated: zero and negative values pass the
    /// structural binding stage by design and are rejected by the store's
    /// positive-amount check at commit, which maps to
    /// [`LedgerError::InvalidAmount`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - no user row for `user_id`.
    /// - [`LedgerError::IncorrectReceiver`] - unknown receiver, or
    ///   self-transfer.
    /// - [`LedgerError::InsufficientFunds`] - balance below `amount`.
    /// - [`LedgerError::InvalidAmount`] - the store rejected the amount or
    ///   the funds re-check at commit time.
    /// - [`LedgerError::TransferFailed`] - any other commit failure.
    pub fn send_coin(
        &self,
        user_id: UserId,
        to_username: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let sender = self.resolve(user_id)?;
        let receiver = self
            .store
            .user_by_username(to_username)
            .ok_or(LedgerError::IncorrectReceiver)?;
        if receiver.id() == sender.id() {
            return Err(LedgerError::IncorrectReceiver);
        }

        if sender.balance() < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        match self.store.commit_transfer(&sender, &receiver, amount) {
            Ok(_) => Ok(()),
            Err(
                violation @ (ConstraintViolation::NonPositiveAmount
                | ConstraintViolation::NegativeBalance),
            ) => {
                warn!(
                    "transfer rejected at commit: sender={user_id} receiver={} amount={amount} cause={violation}",
                    receiver.id()
                );
                Err(LedgerError::InvalidAmount)
            }
            Err(ConstraintViolation::SelfTransfer) => Err(LedgerError::IncorrectReceiver),
            Err(violation) => {
                warn!(
                    "transfer failed: sender={user_id} receiver={} amount={amount} cause={violation}",
                    receiver.id()
                );
                Err(LedgerError::TransferFailed)
            }
        }
    }

    /// Current balance, grouped inventory, and transfer history for the
    /// authenticated user. Pure read.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - no user row for `user_id`.
    /// - [`LedgerError::LookupFailed`] - an underlying lookup failed.
    pub fn info(&self, user_id: UserId) -> Result<UserInfo, LedgerError> {
        let user = self.resolve(user_id)?;
        history::collect(&self.store, &user)
    }
}
