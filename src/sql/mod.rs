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

use log::{debug, error, trace, warn};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use rusqlite::{OptionalExtension, Result};
use std::path::{Path, PathBuf};

pub mod migrations;
pub mod txn;
pub mod types;

use types::{Attr, Entity, Tag};

pub const SQL_TAG: &str = "sql";
pub const MAX_CONN_RETRIES: i32 = 50;

const TAG_COLS: &str = "t.id, t.name, \
                        a.id, a.st_mode, a.st_uid, a.st_gid, a.st_atime, a.st_mtime, a.st_ctime";
const ENTITY_COLS: &str = "e.id, e.name, e.real_path, \
                           a.id, a.st_mode, a.st_uid, a.st_gid, a.st_atime, a.st_mtime, a.st_ctime";

/// Returns a correct connection with a very permissive contention handler
pub fn get_conn<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    trace!(target: SQL_TAG, "Opening {:?}", db_path.as_ref());
    let conn = Connection::open(&db_path)?;

    // so we get cascading deletes in our relationship tables
    conn.execute("PRAGMA foreign_keys = 1", [])?;
    conn.busy_handler(Some(|num| -> bool {
        if num >= MAX_CONN_RETRIES {
            error!(target: SQL_TAG, "Timed out waiting for connection lock");
            false
        } else {
            warn!(
                target: SQL_TAG,
                "Sqlite database contention!  Tried {} times to acquire lock.  Trying again soon...",
                num + 1
            );
            std::thread::sleep(std::time::Duration::from_millis(100));
            true
        }
    }))?;
    Ok(conn)
}

fn attr_at(row: &Row, offset: usize) -> Result<Attr> {
    Ok(Attr {
        id: row.get(offset)?,
        st_mode: row.get(offset + 1)?,
        st_uid: row.get(offset + 2)?,
        st_gid: row.get(offset + 3)?,
        st_atime: row.get(offset + 4)?,
        st_mtime: row.get(offset + 5)?,
        st_ctime: row.get(offset + 6)?,
    })
}

fn to_tag(row: &Row) -> Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        attr: attr_at(row, 2)?,
    })
}

fn to_entity(row: &Row) -> Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        name: row.get(1)?,
        real_path: PathBuf::from(row.get::<usize, String>(2)?),
        attr: attr_at(row, 3)?,
    })
}

fn to_attr(row: &Row) -> Result<Attr> {
    attr_at(row, 0)
}

pub fn insert_attr(tx: &Transaction, attr: &Attr) -> Result<i64> {
    tx.execute(
        "INSERT INTO attrs (st_mode, st_uid, st_gid, st_atime, st_mtime, st_ctime)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attr.st_mode,
            attr.st_uid,
            attr.st_gid,
            attr.st_atime,
            attr.st_mtime,
            attr.st_ctime
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// The attr of the filesystem root, reserved at row id 1.
pub fn root_attr(conn: &Connection) -> Result<Option<Attr>> {
    conn.query_row(
        "SELECT id, st_mode, st_uid, st_gid, st_atime, st_mtime, st_ctime
         FROM attrs WHERE id = 1",
        [],
        to_attr,
    )
    .optional()
}

pub fn ensure_root_attr(tx: &Transaction) -> Result<Attr> {
    if let Some(attr) = root_attr(tx)? {
        return Ok(attr);
    }
    debug!(target: SQL_TAG, "Root attr missing, creating");
    let mut root = crate::fs::attr::new_root_attr();
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
    root.id = 1;
    Ok(root)
}

pub fn tag_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    trace!(target: SQL_TAG, "Getting tag {}", name);
    let query = format!(
        "SELECT {cols} FROM tags t JOIN attrs a ON a.id = t.attr_id WHERE t.name = ?1",
        cols = TAG_COLS
    );
    conn.query_row(&query, params![name], to_tag).optional()
}

pub fn all_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let query = format!(
        "SELECT {cols} FROM tags t JOIN attrs a ON a.id = t.attr_id ORDER BY t.id",
        cols = TAG_COLS
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], to_tag)?;
    rows.collect()
}

pub fn insert_tag(tx: &Transaction, name: &str, attr: &Attr) -> Result<i64> {
    debug!(target: SQL_TAG, "Creating tag {}", name);
    let attr_id = insert_attr(tx, attr)?;
    tx.execute(
        "INSERT INTO tags (name, attr_id) VALUES (?1, ?2)",
        params![name, attr_id],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Removes a tag.  Entities left without any tag by the removal are dropped
/// in the same transaction; their names are returned for the caller's logs.
pub fn delete_tag(tx: &Transaction, tag: &Tag) -> Result<Vec<String>> {
    debug!(target: SQL_TAG, "Removing tag {}", tag.name);
    tx.execute("DELETE FROM tags WHERE id = ?1", params![tag.id])?;
    tx.execute("DELETE FROM attrs WHERE id = ?1", params![tag.attr.id])?;
    drop_tagless_entities(tx)
}

/// An entity whose tag-set has been emptied must not survive the
/// transaction that emptied it.
pub fn drop_tagless_entities(tx: &Transaction) -> Result<Vec<String>> {
    let mut stmt = tx.prepare(
        "SELECT e.id, e.name, e.attr_id FROM entities e
         WHERE NOT EXISTS (SELECT 1 FROM tagging g WHERE g.entity_id = e.id)",
    )?;
    let tagless: Vec<(i64, String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_>>()?;

    let mut dropped = Vec::with_capacity(tagless.len());
    for (id, name, attr_id) in tagless {
        debug!(target: SQL_TAG, "Dropping now-tagless entity {}", name);
        tx.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM attrs WHERE id = ?1", params![attr_id])?;
        dropped.push(name);
    }
    Ok(dropped)
}

pub fn entity_by_name(conn: &Connection, name: &str) -> Result<Option<Entity>> {
    trace!(target: SQL_TAG, "Getting entity {}", name);
    let query = format!(
        "SELECT {cols} FROM entities e JOIN attrs a ON a.id = e.attr_id WHERE e.name = ?1",
        cols = ENTITY_COLS
    );
    conn.query_row(&query, params![name], to_entity).optional()
}

/// Used by the watcher, which only trusts an event when both the basename
/// and the full real path line up with a registered entity.
pub fn entity_by_name_and_path(
    conn: &Connection,
    name: &str,
    real_path: &Path,
) -> Result<Option<Entity>> {
    let query = format!(
        "SELECT {cols} FROM entities e JOIN attrs a ON a.id = e.attr_id
         WHERE e.name = ?1 AND e.real_path = ?2",
        cols = ENTITY_COLS
    );
    let path_str = real_path.to_string_lossy();
    conn.query_row(&query, params![name, &*path_str], to_entity)
        .optional()
}

/// The entity called `name`, but only if it carries every tag in `tag_names`.
pub fn entity_with_tags(
    conn: &Connection,
    name: &str,
    tag_names: &[String],
) -> Result<Option<Entity>> {
    if tag_names.is_empty() {
        return entity_by_name(conn, name);
    }
    let marks = (0..tag_names.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<String>>()
        .join(",");
    let query = format!(
        "SELECT {cols} FROM entities e JOIN attrs a ON a.id = e.attr_id
         WHERE e.name = ?1
           AND (SELECT COUNT(*) FROM tagging g
                JOIN tags t ON t.id = g.tag_id
                WHERE g.entity_id = e.id AND t.name IN ({marks})) = {count}",
        cols = ENTITY_COLS,
        marks = marks,
        count = tag_names.len()
    );
    let bind = std::iter::once(name).chain(tag_names.iter().map(String::as_str));
    conn.query_row(&query, params_from_iter(bind), to_entity)
        .optional()
}

/// The intersection query: entities whose tag-set is a superset of
/// `tag_names`, in one round trip.  An empty tag-set selects nothing; the
/// root listing is the dispatcher's business, not this query's.
pub fn entities_having_all(conn: &Connection, tag_names: &[String]) -> Result<Vec<Entity>> {
    if tag_names.is_empty() {
        return Ok(vec![]);
    }
    let marks = (0..tag_names.len())
        .map(|i| format!("?{}", i + 1))
        .collect::<Vec<String>>()
        .join(",");
    let query = format!(
        "SELECT {cols}
         FROM entities e
         JOIN attrs a ON a.id = e.attr_id
         JOIN tagging g ON g.entity_id = e.id
         JOIN tags t ON t.id = g.tag_id
         WHERE t.name IN ({marks})
         GROUP BY e.id
         HAVING COUNT(e.id) = {count}
         ORDER BY e.id",
        cols = ENTITY_COLS,
        marks = marks,
        count = tag_names.len()
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(tag_names.iter()), to_entity)?;
    rows.collect()
}

pub fn entity_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM entities ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Tag names of one entity, in the order the taggings were created.
pub fn entity_tag_names(conn: &Connection, entity_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t
         JOIN tagging g ON g.tag_id = t.id
         WHERE g.entity_id = ?1
         ORDER BY g.rowid",
    )?;
    let rows = stmt.query_map(params![entity_id], |row| row.get(0))?;
    rows.collect()
}

pub fn all_entity_paths(conn: &Connection) -> Result<Vec<PathBuf>> {
    let mut stmt = conn.prepare("SELECT real_path FROM entities")?;
    let rows = stmt.query_map([], |row| row.get::<usize, String>(0))?;
    rows.map(|r| r.map(PathBuf::from)).collect()
}

pub fn insert_entity(tx: &Transaction, name: &str, real_path: &Path, attr: &Attr) -> Result<i64> {
    debug!(
        target: SQL_TAG,
        "Registering entity {} at {:?}", name, real_path
    );
    let attr_id = insert_attr(tx, attr)?;
    let path_str = real_path.to_string_lossy();
    tx.execute(
        "INSERT INTO entities (name, real_path, attr_id) VALUES (?1, ?2, ?3)",
        params![name, &*path_str, attr_id],
    )?;
    Ok(tx.last_insert_rowid())
}

pub fn update_entity_path(
    tx: &Transaction,
    entity_id: i64,
    new_name: &str,
    new_real_path: &Path,
) -> Result<()> {
    debug!(
        target: SQL_TAG,
        "Moving entity {} to {} at {:?}", entity_id, new_name, new_real_path
    );
    let path_str = new_real_path.to_string_lossy();
    tx.execute(
        "UPDATE entities SET name = ?2, real_path = ?3 WHERE id = ?1",
        params![entity_id, new_name, &*path_str],
    )?;
    Ok(())
}

pub fn delete_entity(tx: &Transaction, entity: &Entity) -> Result<()> {
    debug!(target: SQL_TAG, "Removing entity {}", entity.name);
    tx.execute("DELETE FROM entities WHERE id = ?1", params![entity.id])?;
    tx.execute(
        "DELETE FROM attrs WHERE id = ?1",
        params![entity.attr.id],
    )?;
    Ok(())
}

/// Idempotent: tagging an entity with a tag it already carries is a no-op.
pub fn add_tagging(tx: &Transaction, entity_id: i64, tag_id: i64) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO tagging (entity_id, tag_id) VALUES (?1, ?2)",
        params![entity_id, tag_id],
    )?;
    Ok(())
}

pub fn remove_tagging(tx: &Transaction, entity_id: i64, tag_id: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM tagging WHERE entity_id = ?1 AND tag_id = ?2",
        params![entity_id, tag_id],
    )?;
    Ok(())
}

pub fn tagging_count(conn: &Connection, entity_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM tagging WHERE entity_id = ?1",
        params![entity_id],
        |row| row.get(0),
    )
}
