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

//! The item catalog.
//!
//! Items are loaded once at startup from a `name,price` CSV seed and are
//! immutable afterwards. Reseeding with names that already exist is a no-op,
//! so the seed file can be applied repeatedly.

use crate::base::ItemId;
use crate::error::ConstraintViolation;
use csv::{ReaderBuilder, Trim};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A catalog item: unique name, non-negative price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    name: String,
    price: Decimal,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}

/// Errors raised while loading a catalog seed.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The seed could not be parsed.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// A seed row violated an item constraint.
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
}

/// Name-unique item table, static after load.
#[derive(Debug, Default)]
pub struct Catalog {
    by_name: DashMap<String, Arc<Item>>,
    by_id: DashMap<ItemId, Arc<Item>>,
    next_id: AtomicU64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item, enforcing the non-negative-price constraint.
    ///
    /// A duplicate name is tolerated as a no-op and returns the existing
    /// item; the new price is ignored, since items are immutable after load.
    pub fn insert(&self, name: &str, price: Decimal) -> Result<Arc<Item>, ConstraintViolation> {
        if price < Decimal::ZERO {
            return Err(ConstraintViolation::NegativePrice);
        }
        match self.by_name.entry(name.to_owned()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let id = ItemId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                let item = Arc::new(Item {
                    id,
                    name: name.to_owned(),
                    price,
                });
                self.by_id.insert(id, Arc::clone(&item));
                entry.insert(Arc::clone(&item));
                Ok(item)
            }
        }
    }

    /// Looks an item up by its exact name.
    pub fn by_name(&self, name: &str) -> Option<Arc<Item>> {
        self.by_name.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn by_id(&self, id: ItemId) -> Option<Arc<Item>> {
        self.by_id.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Loads items from a `name,price` CSV seed.
    ///
    /// Streaming parse with whitespace trimming; the header row is required.
    /// Returns the number of newly inserted items (reseeded duplicates don't
    /// count). A malformed row or a negative price aborts the load.
    ///
    /// # Example
    ///
    /// ```csv
    /// name,price
    /// t-shirt,80
    /// cup,20
    /// ```
    pub fn load_csv<R: Read>(&self, reader: R) -> Result<usize, CatalogError> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let before = self.by_name.len();
        for result in rdr.deserialize::<SeedRecord>() {
            let record = result?;
            self.insert(&record.name, record.price)?;
        }
        Ok(self.by_name.len() - before)
    }
}

/// Raw CSV seed record: `name, price`.
#[derive(Debug, Deserialize)]
struct SeedRecord {
    name: String,
    price: Decimal,
}
