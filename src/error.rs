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

//! Error types for ledger operations.
//!
//! Two layers: [`ConstraintViolation`] is what the store itself rejects
//! inside a commit critical section; [`LedgerError`] is the taxonomy the
//! engines surface to callers. The translation between the two happens in
//! the engines, at one boundary; nothing above the store ever inspects a
//! lower-level failure shape.

use thiserror::Error;

/// Store-level constraint rejections.
///
/// These are the in-process analog of column CHECK and UNIQUE constraints:
/// the store re-validates them under the affected balance locks, so they are
/// authoritative even when an engine pre-check raced on a stale read.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// A debit would drop a balance below zero.
    #[error("balance must stay non-negative")]
    NegativeBalance,

    /// A transfer amount was zero or negative.
    #[error("transfer amount must be positive")]
    NonPositiveAmount,

    /// An item or purchase price was negative.
    #[error("price must be non-negative")]
    NegativePrice,

    /// The username is already claimed.
    #[error("username already taken")]
    DuplicateUsername,

    /// A transfer named the same user as sender and receiver.
    #[error("sender and receiver must differ")]
    SelfTransfer,
}

/// Ledger operation errors, as surfaced to callers.
///
/// Display strings are the public messages; internal causes are logged at
/// the point of failure and never leak into these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Request payload is missing required fields or malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No catalog item with the requested name.
    #[error("could not find item")]
    ItemNotFound,

    /// Receiver username unknown, or the sender targeted themselves.
    #[error("incorrect receiver's username")]
    IncorrectReceiver,

    /// Balance is lower than the requested price or amount.
    #[error("insufficient funds to complete the transaction")]
    InsufficientFunds,

    /// The store rejected the transfer amount at commit time.
    #[error("incorrect amount of coins to complete the transaction")]
    InvalidAmount,

    /// Identity could not be resolved to a user row.
    #[error("authorization failed")]
    Unauthorized,

    /// Known username, wrong credential.
    #[error("incorrect password")]
    IncorrectPassword,

    /// The purchase commit failed.
    #[error("could not complete purchase")]
    PurchaseFailed,

    /// The transfer commit failed for a non-constraint reason.
    #[error("could not send coins")]
    TransferFailed,

    /// A read-side lookup failed mid-aggregation.
    #[error("could not load account history")]
    LookupFailed,

    /// A new user row could not be created.
    #[error("could not create user")]
    RegistrationFailed,
}
