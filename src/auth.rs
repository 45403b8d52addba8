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

//! Authentication.
//!
//! The ledger core only ever sees a resolved [`UserId`]; this module is the
//! collaborator that produces one. It registers users on their first login,
//! verifies credentials on later logins, and hands out opaque bearer tokens
//! with an expiry. Credentials are stored as salted SHA-256 digests and stay
//! opaque to everything else.

use crate::account::Account;
use crate::base::UserId;
use crate::error::{ConstraintViolation, LedgerError};
use crate::store::LedgerStore;
use dashmap::DashMap;
use log::warn;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a bearer token stays valid.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

const TOKEN_LEN: usize = 32;
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: Instant,
}

/// Issues and validates bearer tokens against a ledger store.
#[derive(Debug)]
pub struct Authenticator {
    store: Arc<LedgerStore>,
    sessions: DashMap<String, Session>,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self::with_ttl(store, DEFAULT_TOKEN_TTL)
    }

    pub fn with_ttl(store: Arc<LedgerStore>, token_ttl: Duration) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            token_ttl,
        }
    }

    /// Logs a user in, registering them on first contact.
    ///
    /// Unknown usernames are registered with the default starting balance;
    /// known usernames must present the matching password. Either way a
    /// fresh bearer token comes back. Two first logins racing on one name
    /// resolve to a single row: the loser of the claim re-verifies against
    /// the winner's credential.
    pub fn login(&self, username: &str, password: &str) -> Result<String, LedgerError> {
        if username.is_empty() || password.is_empty() {
            return Err(LedgerError::Validation(
                "username and password are required".to_owned(),
            ));
        }

        let account = match self.store.user_by_username(username) {
            Some(account) => self.verify(account, password)?,
            None => match self.store.create_user(username, &hash_password(password)) {
                Ok(account) => account,
                Err(ConstraintViolation::DuplicateUsername) => {
                    let account = self
                        .store
                        .user_by_username(username)
                        .ok_or(LedgerError::RegistrationFailed)?;
                    self.verify(account, password)?
                }
                Err(violation) => {
                    warn!("registration failed for {username}: {violation}");
                    return Err(LedgerError::RegistrationFailed);
                }
            },
        };

        Ok(self.issue_token(account.id()))
    }

    fn verify(
        &self,
        account: Arc<Account>,
        password: &str,
    ) -> Result<Arc<Account>, LedgerError> {
        if verify_password(account.credential(), password) {
            Ok(account)
        } else {
            Err(LedgerError::IncorrectPassword)
        }
    }

    /// Mints a token bound to `user_id`, valid for the configured TTL.
    pub fn issue_token(&self, user_id: UserId) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Instant::now() + self.token_ttl,
            },
        );
        token
    }

    /// Resolves a bearer token to its user id.
    ///
    /// Unknown and expired tokens are rejected; expired ones are dropped
    /// from the session table on the way out.
    pub fn authenticate(&self, token: &str) -> Result<UserId, LedgerError> {
        let session = match self.sessions.get(token) {
            Some(session) => *session,
            None => return Err(LedgerError::Unauthorized),
        };
        if session.expires_at <= Instant::now() {
            self.sessions.remove(token);
            return Err(LedgerError::Unauthorized);
        }
        Ok(session.user_id)
    }

    /// Invalidates a token immediately.
    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }
}

/// Hashes a password as `salt$hex(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    let digest = digest_with_salt(&salt, password);
    format!("{salt}${digest}")
}

/// Checks a password against a stored `salt$digest` credential.
pub fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => digest_with_salt(salt, password) == digest,
        None => false,
    }
}

fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
