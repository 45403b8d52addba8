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

//! Read-side aggregation of a user's inventory and transfer history.
//!
//! A pure read path: three independent lookups against the store, assembled
//! into one [`UserInfo`]. Inventory grouping order is unspecified; consumers
//! that need determinism sort before comparing. Sent/received lists come
//! back in transfer creation order.

use crate::account::Account;
use crate::base::{ItemId, UserId};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use log::error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One grouped inventory line: item name and how many times the user bought
/// it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    pub item: String,
    pub quantity: u64,
}

/// An incoming transfer, attributed to the sender's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedEntry {
    #[serde(rename = "fromUser")]
    pub from_user: String,
    pub amount: Decimal,
}

/// An outgoing transfer, attributed to the receiver's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEntry {
    #[serde(rename = "toUser")]
    pub to_user: String,
    pub amount: Decimal,
}

/// Chronological transfer history, split by direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinHistory {
    pub received: Vec<ReceivedEntry>,
    pub sent: Vec<SentEntry>,
}

/// Everything the info endpoint returns for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub coins: Decimal,
    pub inventory: Vec<InventoryEntry>,
    #[serde(rename = "coinHistory")]
    pub coin_history: CoinHistory,
}

/// Assembles balance, inventory, and transfer history for `user`.
///
/// An unresolvable item or counterparty is an integrity failure and aborts
/// the whole read; partial answers are never returned.
pub fn collect(store: &LedgerStore, user: &Account) -> Result<UserInfo, LedgerError> {
    let coins = user.balance();
    let inventory = collect_inventory(store, user)?;

    let received = store
        .transfers_received_by(user.id())
        .into_iter()
        .map(|transfer| {
            let from_user = resolve_username(store, transfer.sender_id)?;
            Ok(ReceivedEntry {
                from_user,
                amount: transfer.amount,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    let sent = store
        .transfers_sent_by(user.id())
        .into_iter()
        .map(|transfer| {
            let to_user = resolve_username(store, transfer.receiver_id)?;
            Ok(SentEntry {
                to_user,
                amount: transfer.amount,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    Ok(UserInfo {
        coins,
        inventory,
        coin_history: CoinHistory { received, sent },
    })
}

/// Groups the user's purchase rows into (item name, count) lines.
fn collect_inventory(
    store: &LedgerStore,
    user: &Account,
) -> Result<Vec<InventoryEntry>, LedgerError> {
    let mut counts: HashMap<ItemId, u64> = HashMap::new();
    for purchase in store.purchases_of(user.id()) {
        *counts.entry(purchase.item_id).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(item_id, quantity)| {
            let item = store.catalog().by_id(item_id).ok_or_else(|| {
                error!("info: purchase references unknown item {item_id} for user {}", user.id());
                LedgerError::LookupFailed
            })?;
            Ok(InventoryEntry {
                item: item.name().to_owned(),
                quantity,
            })
        })
        .collect()
}

fn resolve_username(store: &LedgerStore, user_id: UserId) -> Result<String, LedgerError> {
    store
        .user(user_id)
        .map(|account| account.username().to_owned())
        .ok_or_else(|| {
            error!("info: transfer references unknown user {user_id}");
            LedgerError::LookupFailed
        })
}
