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

//! # Coinshop
//!
//! This library provides a virtual-currency ledger and shop engine: users
//! hold coin balances, buy catalog items, and transfer coins to one another,
//! with balances, purchases, and transfers kept mutually consistent under
//! concurrent access.
//!
//! ## Core Components
//!
//! - [`LedgerStore`]: authoritative state: user table, item catalog, and
//!   the append-only purchase/transfer logs with their commit protocols
//! - [`Engine`]: the operation surface: buy an item, send coins, read
//!   account info
//! - [`Catalog`]: name-unique item table, loaded once from a CSV seed
//! - [`Authenticator`]: registration-on-first-login and bearer tokens,
//!   producing the [`UserId`] the engine operates on
//! - [`LedgerError`]: the caller-facing error taxonomy
//!
//! ## Example
//!
//! ```
//! use coinshop_rs::{Engine, LedgerStore};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let store = Arc::new(LedgerStore::new());
//! store.catalog().insert("t-shirt", dec!(80)).unwrap();
//!
//! let alice = store.create_user("alice", "opaque-hash").unwrap();
//! let bob = store.create_user("bob", "opaque-hash").unwrap();
//!
//! let engine = Engine::new(Arc::clone(&store));
//! engine.buy_item(alice.id(), "t-shirt").unwrap();
//! engine.send_coin(alice.id(), "bob", dec!(300)).unwrap();
//!
//! assert_eq!(alice.balance(), dec!(620));
//! assert_eq!(bob.balance(), dec!(1300));
//! ```
//!
//! ## Thread Safety
//!
//! Balance mutation is serialized per account by each account's balance
//! lock; transfers take both locks in ascending user-id order, so coins are
//! conserved and no observer ever sees a half-applied transfer. Engine
//! pre-checks run on snapshots and may race; the store re-validates every
//! invariant inside the commit critical section.

pub mod account;
pub mod auth;
mod base;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod history;
mod store;

pub use account::Account;
pub use auth::Authenticator;
pub use base::{ItemId, PurchaseId, TransferId, UserId};
pub use catalog::{Catalog, CatalogError, Item};
pub use engine::Engine;
pub use error::{ConstraintViolation, LedgerError};
pub use history::{CoinHistory, InventoryEntry, ReceivedEntry, SentEntry, UserInfo};
pub use store::{LedgerStore, Purchase, STARTING_BALANCE, Transfer};
