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

use crate::fs::attr::new_root_attr;
use rusqlite::Result as SqliteResult;
use rusqlite::{params, Transaction};

pub fn migrate(tx: &Transaction) -> SqliteResult<()> {
    // version bookkeeping the migration runner reads; the runner bumps
    // migration_version itself once this step commits
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tagdir_meta (
            migration_version INTEGER NOT NULL DEFAULT 0,
            tagdir_version TEXT NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "INSERT INTO tagdir_meta (migration_version, tagdir_version) VALUES (0, '0.0.0')",
        [],
    )?;

    // one attr row per tag/entity, plus the reserved root row (id 1)
    tx.execute(
        "CREATE TABLE IF NOT EXISTS attrs (
            id INTEGER PRIMARY KEY NOT NULL,
            st_mode INTEGER NOT NULL,
            st_uid INTEGER NOT NULL,
            st_gid INTEGER NOT NULL,
            st_atime INTEGER NOT NULL,
            st_mtime INTEGER NOT NULL,
            st_ctime INTEGER NOT NULL
        )",
        [],
    )?;

    // tags manifest as top-level directories
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            attr_id INTEGER NOT NULL,
            FOREIGN KEY (attr_id) REFERENCES attrs (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // entities are registered real directories, keyed both by name and by
    // the real path they point to
    tx.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            real_path TEXT NOT NULL UNIQUE,
            attr_id INTEGER NOT NULL,
            FOREIGN KEY (attr_id) REFERENCES attrs (id) ON DELETE CASCADE
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS tagging (
            entity_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (entity_id, tag_id),
            FOREIGN KEY (entity_id) REFERENCES entities (id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // the root attr exists from the first mount onward
    let root = new_root_attr();
    tx.execute(
        "INSERT INTO attrs (id, st_mode, st_uid, st_gid, st_atime, st_mtime, st_ctime)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            root.st_mode,
            root.st_uid,
            root.st_gid,
            root.st_atime,
            root.st_mtime,
            root.st_ctime
        ],
    )?;

    Ok(())
}
