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

use log::warn;
use rusqlite::{Connection, Transaction};

const TXN_TAG: &str = "txn";

/// Runs `action` inside one transaction: commit on a clean return, roll back
/// on any error.  Every externally-visible mutation of the store, whether
/// from a filesystem operation or from the watcher, goes through here.
pub fn scope<T, E, F>(conn: &mut Connection, action: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnOnce(&Transaction) -> Result<T, E>,
{
    let tx = conn.transaction()?;
    match action(&tx) {
        Ok(val) => {
            tx.commit()?;
            Ok(val)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(target: TXN_TAG, "Rollback failed: {:?}", rollback_err);
            }
            Err(e)
        }
    }
}
