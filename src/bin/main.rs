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

use clap::Parser;
use coinshop_rs::{Engine, LedgerStore};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Coinshop - Replay shop operations against a fresh ledger
///
/// Seeds the item catalog from a CSV file, replays an operations CSV
/// (registrations, purchases, coin transfers) through the engine, and
/// outputs final account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "coinshop-rs")]
#[command(about = "A ledger and shop engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to the catalog seed CSV
    ///
    /// Expected format: name,price
    #[arg(value_name = "ITEMS")]
    items: PathBuf,

    /// Path to the operations CSV
    ///
    /// Expected format: op,user,target,amount
    /// Example: cargo run -- data/items.csv operations.csv > balances.csv
    #[arg(value_name = "OPS")]
    operations: PathBuf,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let store = Arc::new(LedgerStore::new());

    // Seed the catalog
    match open(&args.items) {
        Ok(file) => {
            if let Err(e) = store.catalog().load_csv(BufReader::new(file)) {
                eprintln!("Error loading catalog '{}': {}", args.items.display(), e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.items.display(), e);
            process::exit(1);
        }
    }

    // Replay operations
    let engine = Engine::new(Arc::clone(&store));
    let file = match open(&args.operations) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.operations.display(), e);
            process::exit(1);
        }
    };
    if let Err(e) = replay_operations(&engine, BufReader::new(file)) {
        eprintln!("Error replaying operations: {}", e);
        process::exit(1);
    }

    // Write results to stdout
    if let Err(e) = write_accounts(&store, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &PathBuf) -> std::io::Result<File> {
    File::open(path)
}

/// Raw CSV record matching the operations format.
///
/// Fields: `op, user, target, amount`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    user: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    amount: Option<Decimal>,
}

/// A replayable shop operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    Register { username: String },
    Buy { username: String, item: String },
    Send { from: String, to: String, amount: Decimal },
}

impl CsvRecord {
    /// Converts a CSV record into an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "register" => Some(Operation::Register { username: self.user }),
            "buy" => {
                let item = self.target?;
                Some(Operation::Buy {
                    username: self.user,
                    item,
                })
            }
            "send" => {
                let to = self.target?;
                let amount = self.amount?;
                Some(Operation::Send {
                    from: self.user,
                    to,
                    amount,
                })
            }
            _ => None,
        }
    }
}

/// Replays operations from a CSV reader through the engine.
///
/// Streaming parse, so arbitrarily large operation logs never load fully
/// into memory. Malformed rows and rejected operations are skipped (logged
/// in debug builds), mirroring batch-replay semantics: one bad operation
/// must not abort the rest of the file.
///
/// # CSV Format
///
/// Expected columns: `op, user, target, amount`
/// - `op`: register, buy, or send
/// - `user`: acting username (registered on `register`)
/// - `target`: item name for `buy`, receiver username for `send`
/// - `amount`: coin amount (only for `send`)
///
/// # Example
///
/// ```csv
/// op,user,target,amount
/// register,alice,,
/// register,bob,,
/// buy,alice,t-shirt,
/// send,alice,bob,300
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Individual operation rejections don't stop processing.
pub fn replay_operations<R: Read>(engine: &Engine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                if let Err(e) = apply(engine, &op) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation {:?}: {}", op, e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(())
}

fn apply(engine: &Engine, op: &Operation) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        Operation::Register { username } => {
            // Offline replay carries no passwords; the credential stays
            // opaque and unusable for interactive login.
            engine.store().create_user(username, "")?;
        }
        Operation::Buy { username, item } => {
            let user = engine
                .store()
                .user_by_username(username)
                .ok_or("unknown user")?;
            engine.buy_item(user.id(), item)?;
        }
        Operation::Send { from, to, amount } => {
            let sender = engine
                .store()
                .user_by_username(from)
                .ok_or("unknown user")?;
            engine.send_coin(sender.id(), to, *amount)?;
        }
    }
    Ok(())
}

/// Writes final account states to a CSV writer.
///
/// # CSV Format
///
/// Columns: `username, balance`, ordered by account id (registration
/// order).
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(store: &LedgerStore, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in store.accounts() {
        wtr.serialize(&*account)?;
    }

    wtr.flush()?;
    Ok(())
}
