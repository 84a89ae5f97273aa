/*
 * Tagdir
 * Copyright (C) 2021 The Tagdir Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use log::info;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Transaction};
use rusqlite::TransactionBehavior;

mod m0;

const TAG: &str = "migrations";

type Migration = fn(&Transaction) -> SqliteResult<()>;

/// Every schema step this build knows, oldest first.  `tagdir_meta` records
/// how many of them a database has been through; m0 bootstraps the schema,
/// the meta table included.
const MIGRATIONS: &[Migration] = &[m0::migrate];

/// How many steps have already run against this database.  A database with
/// no meta table hasn't seen any.
fn applied_steps(conn: &Connection) -> SqliteResult<i64> {
    let meta_table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'tagdir_meta'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if meta_table.is_none() {
        return Ok(0);
    }
    conn.query_row("SELECT migration_version FROM tagdir_meta", [], |row| {
        row.get(0)
    })
}

/// Brings the database up to this build's schema.  Each pending step runs in
/// its own exclusive transaction together with the version bump, so a crash
/// mid-upgrade never leaves a half-applied step marked as done.
pub fn migrate(conn: &mut Connection, app_version: &str) -> SqliteResult<()> {
    let applied = applied_steps(conn)?;

    for (step, migration) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        info!(target: TAG, "Applying schema migration {}", step);
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
        migration(&tx)?;
        tx.execute(
            "UPDATE tagdir_meta SET migration_version = ?1",
            params![(step + 1) as i64],
        )?;
        tx.commit()?;
    }

    conn.execute(
        "UPDATE tagdir_meta SET tagdir_version = ?1",
        params![app_version],
    )?;
    Ok(())
}
