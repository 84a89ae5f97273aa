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

//! The operation dispatcher.  Every incoming filesystem operation is parsed,
//! classified by path shape, and then either answered from the virtual
//! namespace, rejected with an errno, or forwarded to the loopback at the
//! entity's real path.

use crate::common::constants;
use crate::common::err::TagdirError;
use crate::sql;
use crate::sql::txn;
use crate::sql::types::{Entity, Tag};
use crate::watch::EntityPathWatcher;
use log::{debug, info};
use nix::errno::Errno::{EINVAL, EIO, ENOENT};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod attr;
pub mod err;
pub mod loopback;
pub mod path;

use attr::FileStat;
use err::{FsError, FsResult};
use loopback::Loopback;

const OP_TAG: &str = "tagdir_op";

/// The shapes a virtual path can take.  Every operation's semantics are
/// keyed off this classification.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathShape {
    Root,
    EntInfo,
    TagsOnly(Vec<String>),
    Entity(Vec<String>, String),
    Passthrough(Vec<String>, String, PathBuf),
    Malformed,
}

fn classify(path: &Path) -> PathShape {
    if path == Path::new("/") {
        return PathShape::Root;
    }
    if path == Path::new(constants::ENTINFO_PATH) {
        return PathShape::EntInfo;
    }
    match path::parse(path) {
        Ok(parsed) => {
            if parsed.tags.is_empty() {
                return PathShape::Malformed;
            }
            match (parsed.entity, parsed.rest) {
                (None, None) => PathShape::TagsOnly(parsed.tags),
                (Some(ent), None) => PathShape::Entity(parsed.tags, ent),
                (Some(ent), Some(rest)) => PathShape::Passthrough(parsed.tags, ent, rest),
                // the parser never yields a remainder without an entity
                (None, Some(_)) => PathShape::Malformed,
            }
        }
        Err(_) => PathShape::Malformed,
    }
}

/// The closed set of operations the dispatcher understands.  Anything a FUSE
/// binding receives that is not listed here goes through [`FsOp::Other`],
/// which resolves the entity and hands the real path back for forwarding.
#[derive(Debug)]
pub enum FsOp<'a> {
    Access { path: &'a Path, mode: i32 },
    Getattr { path: &'a Path },
    Readdir { path: &'a Path },
    Readlink { path: &'a Path },
    Mkdir { path: &'a Path, mode: u32 },
    Rmdir { path: &'a Path },
    Symlink { target: &'a Path, source: &'a Path },
    Unlink { path: &'a Path },
    Getxattr { path: &'a Path, name: &'a str },
    Listxattr { path: &'a Path },
    Create { path: &'a Path, mode: u32, flags: i32 },
    Open { path: &'a Path, flags: i32 },
    Read { fh: u64, offset: i64, size: u32 },
    Write { fh: u64, data: &'a [u8], offset: i64 },
    Truncate { path: &'a Path, size: i64 },
    Flush { fh: u64 },
    Release { fh: u64 },
    Other { path: &'a Path },
}

#[derive(Debug, PartialEq, Eq)]
pub enum FsReply {
    Done,
    Stat(FileStat),
    Entries(Vec<String>),
    Target(PathBuf),
    Bytes(Vec<u8>),
    Names(Vec<String>),
    Handle(u64),
    Data(Vec<u8>),
    Written(u32),
    RealPath(PathBuf),
}

pub struct TagdirFilesystem<L: Loopback> {
    conn: Mutex<Connection>,
    loopback: L,
    watcher: Arc<EntityPathWatcher>,
}

impl<L: Loopback> TagdirFilesystem<L> {
    pub fn new(
        mut conn: Connection,
        loopback: L,
        watcher: Arc<EntityPathWatcher>,
    ) -> FsResult<Self> {
        // the root attr must exist whenever the filesystem is up
        txn::scope(&mut conn, |tx| {
            sql::ensure_root_attr(tx)?;
            Ok::<(), FsError>(())
        })?;
        Ok(TagdirFilesystem {
            conn: Mutex::new(conn),
            loopback,
            watcher,
        })
    }

    pub fn watcher(&self) -> &Arc<EntityPathWatcher> {
        &self.watcher
    }

    /// The explicit op-kind to handler mapping.  The outcome of a dispatch
    /// depends only on the parsed path, the store state and the arguments.
    pub fn dispatch(&self, op: FsOp) -> FsResult<FsReply> {
        match op {
            FsOp::Access { path, mode } => self.access(path, mode).map(|_| FsReply::Done),
            FsOp::Getattr { path } => self.getattr(path).map(FsReply::Stat),
            FsOp::Readdir { path } => self.readdir(path).map(FsReply::Entries),
            FsOp::Readlink { path } => self.readlink(path).map(FsReply::Target),
            FsOp::Mkdir { path, mode } => self.mkdir(path, mode).map(|_| FsReply::Done),
            FsOp::Rmdir { path } => self.rmdir(path).map(|_| FsReply::Done),
            FsOp::Symlink { target, source } => {
                self.symlink(target, source).map(|_| FsReply::Done)
            }
            FsOp::Unlink { path } => self.unlink(path).map(|_| FsReply::Done),
            FsOp::Getxattr { path, name } => self.getxattr(path, name).map(FsReply::Bytes),
            FsOp::Listxattr { path } => self.listxattr(path).map(FsReply::Names),
            FsOp::Create { path, mode, flags } => {
                self.create(path, mode, flags).map(FsReply::Handle)
            }
            FsOp::Open { path, flags } => self.open(path, flags).map(FsReply::Handle),
            FsOp::Read { fh, offset, size } => self.read(fh, offset, size).map(FsReply::Data),
            FsOp::Write { fh, data, offset } => {
                self.write(fh, data, offset).map(FsReply::Written)
            }
            FsOp::Truncate { path, size } => self.truncate(path, size).map(|_| FsReply::Done),
            FsOp::Flush { fh } => self.flush(fh).map(|_| FsReply::Done),
            FsOp::Release { fh } => self.release(fh).map(|_| FsReply::Done),
            FsOp::Other { path } => self.forward_path(path).map(FsReply::RealPath),
        }
    }

    fn resolve_tags(tx: &Transaction, tag_names: &[String]) -> FsResult<Vec<Tag>> {
        let mut tags = Vec::with_capacity(tag_names.len());
        for name in tag_names {
            match sql::tag_by_name(tx, name)? {
                Some(tag) => tags.push(tag),
                None => return Err(TagdirError::TagNotFound(name.clone()).into()),
            }
        }
        Ok(tags)
    }

    /// The entity called `ent`, required to carry every tag in `tag_names`.
    fn resolve_entity(tx: &Transaction, ent: &str, tag_names: &[String]) -> FsResult<Entity> {
        sql::entity_with_tags(tx, ent, tag_names)?
            .ok_or_else(|| TagdirError::EntityNotFound(ent.to_owned()).into())
    }

    /// Resolves a pass-through shape to the real path the loopback operates
    /// on: the entity's real path joined with the remainder.
    fn resolve_real(
        tx: &Transaction,
        tag_names: &[String],
        ent: &str,
        rest: Option<&Path>,
    ) -> FsResult<PathBuf> {
        Self::resolve_tags(tx, tag_names)?;
        let entity = Self::resolve_entity(tx, ent, tag_names)?;
        Ok(attr::real_path(&entity.real_path, rest))
    }

    pub fn access(&self, fpath: &Path, mode: i32) -> FsResult<()> {
        info!(target: OP_TAG, "access {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::Root | PathShape::EntInfo => Ok(()),
            PathShape::TagsOnly(tags) => {
                Self::resolve_tags(tx, &tags)?;
                Ok(())
            }
            PathShape::Entity(tags, ent) => {
                Self::resolve_tags(tx, &tags)?;
                Self::resolve_entity(tx, &ent, &tags)?;
                Ok(())
            }
            PathShape::Passthrough(tags, ent, rest) => {
                let real = Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))?;
                self.loopback.access(&real, mode)
            }
            PathShape::Malformed => Err(ENOENT.into()),
        })
    }

    pub fn getattr(&self, fpath: &Path) -> FsResult<FileStat> {
        info!(target: OP_TAG, "getattr {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::Root => {
                let root = sql::root_attr(tx)?.ok_or_else(|| FsError::from(EIO))?;
                Ok(FileStat::from(&root))
            }
            PathShape::EntInfo => Ok(attr::entinfo_stat()),
            PathShape::TagsOnly(tags) => {
                let resolved = Self::resolve_tags(tx, &tags)?;
                // the deepest tag directory is the one being stat'ed
                let last = resolved.last().expect("Tag-only shape with no tags");
                Ok(FileStat::from(&last.attr))
            }
            PathShape::Entity(tags, ent) => {
                Self::resolve_tags(tx, &tags)?;
                let entity = Self::resolve_entity(tx, &ent, &tags)?;
                Ok(FileStat::from(&entity.attr))
            }
            PathShape::Passthrough(tags, ent, rest) => {
                let real = Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))?;
                self.loopback.getattr(&real)
            }
            PathShape::Malformed => Err(ENOENT.into()),
        })
    }

    pub fn readdir(&self, fpath: &Path) -> FsResult<Vec<String>> {
        info!(target: OP_TAG, "readdir {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::Root => {
                let tags = sql::all_tags(tx)?;
                Ok(tags
                    .into_iter()
                    .map(|tag| format!("{}{}", constants::TAG_PREFIX, tag.name))
                    .collect())
            }
            PathShape::TagsOnly(tags) => {
                Self::resolve_tags(tx, &tags)?;
                let entities = sql::entities_having_all(tx, &tags)?;
                Ok(entities.into_iter().map(|e| e.name).collect())
            }
            PathShape::Passthrough(tags, ent, rest) => {
                let real = Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))?;
                self.loopback.readdir(&real)
            }
            PathShape::EntInfo | PathShape::Entity(_, _) | PathShape::Malformed => {
                Err(EINVAL.into())
            }
        })
    }

    pub fn readlink(&self, fpath: &Path) -> FsResult<PathBuf> {
        info!(target: OP_TAG, "readlink {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::Entity(tags, ent) => {
                Self::resolve_tags(tx, &tags)?;
                let entity = Self::resolve_entity(tx, &ent, &tags)?;
                Ok(entity.real_path)
            }
            PathShape::Passthrough(tags, ent, rest) => {
                let real = Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))?;
                self.loopback.readlink(&real)
            }
            PathShape::Root | PathShape::EntInfo | PathShape::TagsOnly(_) => Err(EINVAL.into()),
            PathShape::Malformed => Err(ENOENT.into()),
        })
    }

    /// `mkdir /@a/@b` ensures every named tag exists.  Creating a tag that
    /// already exists is a no-op, so the call is idempotent.
    pub fn mkdir(&self, fpath: &Path, mode: u32) -> FsResult<()> {
        info!(target: OP_TAG, "mkdir {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::TagsOnly(tags) => {
                for name in &tags {
                    if !crate::common::valid_tag_name(name) {
                        return Err(TagdirError::BadTagName(name.clone()).into());
                    }
                    if sql::tag_by_name(tx, name)?.is_none() {
                        sql::insert_tag(tx, name, &attr::new_tag_attr())?;
                    }
                }
                Ok(())
            }
            PathShape::Passthrough(tags, ent, rest) => {
                let real = Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))?;
                self.loopback.mkdir(&real, mode)
            }
            PathShape::Root
            | PathShape::EntInfo
            | PathShape::Entity(_, _)
            | PathShape::Malformed => Err(EINVAL.into()),
        })
    }

    /// `rmdir /@a/@b` removes every named tag, dropping entities that end up
    /// with an empty tag-set.
    pub fn rmdir(&self, fpath: &Path) -> FsResult<()> {
        info!(target: OP_TAG, "rmdir {:?}", fpath);
        let shape = classify(fpath);
        let dropped_entities = {
            let mut conn = self.conn.lock();
            txn::scope::<_, FsError, _>(&mut conn, |tx| match &shape {
                PathShape::TagsOnly(tags) => {
                    let resolved = Self::resolve_tags(tx, tags)?;
                    let mut dropped = Vec::new();
                    for tag in &resolved {
                        dropped.extend(sql::delete_tag(tx, tag)?);
                    }
                    Ok(dropped)
                }
                PathShape::Passthrough(tags, ent, rest) => {
                    let real = Self::resolve_real(tx, tags, ent, Some(rest.as_path()))?;
                    self.loopback.rmdir(&real)?;
                    Ok(vec![])
                }
                PathShape::Root
                | PathShape::EntInfo
                | PathShape::Entity(_, _)
                | PathShape::Malformed => Err(EINVAL.into()),
            })?
        };

        if !dropped_entities.is_empty() {
            debug!(
                target: OP_TAG,
                "Entities {:?} lost their last tag, pruning watches", dropped_entities
            );
            self.watcher.unschedule_redundant_handlers();
        }
        Ok(())
    }

    /// Tagging.  `symlink(/@t1/../@tn/E, S)` registers the directory S as
    /// entity E (if it isn't yet) and adds every named tag to its tag-set.
    pub fn symlink(&self, target: &Path, source: &Path) -> FsResult<()> {
        info!(target: OP_TAG, "symlink {:?} -> {:?}", target, source);
        let shape = classify(target);
        let registered = {
            let mut conn = self.conn.lock();
            txn::scope::<_, FsError, _>(&mut conn, |tx| match &shape {
                PathShape::Entity(tags, ent) => {
                    let resolved = Self::resolve_tags(tx, tags)?;

                    let source = std::fs::canonicalize(source)?;
                    if !std::fs::metadata(&source)?.is_dir() {
                        return Err(TagdirError::NotADirectory(source).into());
                    }
                    if crate::common::get_filename(&source)? != ent.as_str() {
                        // the entity is named by its basename; a mismatched
                        // link name has no meaning here
                        return Err(TagdirError::InvalidPath(source).into());
                    }

                    let (entity_id, registered) = match sql::entity_by_name(tx, ent)? {
                        Some(existing) => {
                            if existing.real_path != source {
                                return Err(
                                    TagdirError::PathCollision(ent.clone(), source).into()
                                );
                            }
                            (existing.id, None)
                        }
                        None => {
                            let id =
                                sql::insert_entity(tx, ent, &source, &attr::new_entity_attr())?;
                            (id, Some(source))
                        }
                    };

                    for tag in &resolved {
                        sql::add_tagging(tx, entity_id, tag.id)?;
                    }
                    Ok(registered)
                }
                PathShape::Passthrough(tags, ent, rest) => {
                    let real = Self::resolve_real(tx, tags, ent, Some(rest.as_path()))?;
                    self.loopback.symlink(&real, source)?;
                    Ok(None)
                }
                PathShape::Root
                | PathShape::EntInfo
                | PathShape::TagsOnly(_)
                | PathShape::Malformed => Err(EINVAL.into()),
            })?
        };

        if let Some(real_path) = registered {
            self.watcher.schedule_if_new_path(&real_path);
        }
        Ok(())
    }

    /// Untagging.  `unlink(/@t1/../@tn/E)` strips every named tag from E's tag-set;
    /// an entity whose tag-set empties is deleted in the same transaction.
    pub fn unlink(&self, fpath: &Path) -> FsResult<()> {
        info!(target: OP_TAG, "unlink {:?}", fpath);
        let shape = classify(fpath);
        let emptied = {
            let mut conn = self.conn.lock();
            txn::scope::<_, FsError, _>(&mut conn, |tx| match &shape {
                PathShape::Entity(tags, ent) => {
                    let resolved = Self::resolve_tags(tx, tags)?;
                    let entity = Self::resolve_entity(tx, ent, tags)?;

                    for tag in &resolved {
                        sql::remove_tagging(tx, entity.id, tag.id)?;
                    }

                    if sql::tagging_count(tx, entity.id)? == 0 {
                        sql::delete_entity(tx, &entity)?;
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                }
                PathShape::Passthrough(tags, ent, rest) => {
                    let real = Self::resolve_real(tx, tags, ent, Some(rest.as_path()))?;
                    self.loopback.unlink(&real)?;
                    Ok(false)
                }
                PathShape::TagsOnly(_) => Err(ENOENT.into()),
                PathShape::Root | PathShape::EntInfo => Err(EINVAL.into()),
                PathShape::Malformed => Err(ENOENT.into()),
            })?
        };

        if emptied {
            self.watcher.unschedule_redundant_handlers();
        }
        Ok(())
    }

    /// The entity inventory, exposed as xattrs on the entinfo pseudo-file.
    /// The value format is `real_path,tag_1,..,tag_n`.
    pub fn getxattr(&self, fpath: &Path, name: &str) -> FsResult<Vec<u8>> {
        info!(target: OP_TAG, "getxattr {:?} {}", fpath, name);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::EntInfo => {
                let entity = sql::entity_by_name(tx, name)?
                    .ok_or_else(|| TagdirError::MissingXattrKey(name.to_owned()))?;
                let tags = sql::entity_tag_names(tx, entity.id)?;
                let mut value = entity.real_path.to_string_lossy().into_owned();
                for tag in tags {
                    value.push(',');
                    value.push_str(&tag);
                }
                Ok(value.into_bytes())
            }
            _ => Err(TagdirError::NoXattrSupport(fpath.to_owned()).into()),
        })
    }

    pub fn listxattr(&self, fpath: &Path) -> FsResult<Vec<String>> {
        info!(target: OP_TAG, "listxattr {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::EntInfo => Ok(sql::entity_names(tx)?),
            _ => Err(TagdirError::NoXattrSupport(fpath.to_owned()).into()),
        })
    }

    /// Resolution hook for every operation with no virtual semantics: the
    /// entity must exist and carry the path's tags, and the caller forwards
    /// the operation to the resolved real path.
    pub fn forward_path(&self, fpath: &Path) -> FsResult<PathBuf> {
        info!(target: OP_TAG, "forward {:?}", fpath);
        let mut conn = self.conn.lock();
        txn::scope(&mut conn, |tx| match classify(fpath) {
            PathShape::Entity(tags, ent) => Self::resolve_real(tx, &tags, &ent, None),
            PathShape::Passthrough(tags, ent, rest) => {
                Self::resolve_real(tx, &tags, &ent, Some(rest.as_path()))
            }
            _ => Err(ENOENT.into()),
        })
    }

    /// File creation below an entity.  The new file only exists on the real
    /// filesystem; the store is consulted just to resolve the entity.
    pub fn create(&self, fpath: &Path, mode: u32, flags: i32) -> FsResult<u64> {
        info!(target: OP_TAG, "create {:?} mode {:o}", fpath, mode);
        let real = self.forward_path(fpath)?;
        self.loopback.create(&real, mode, flags)
    }

    pub fn open(&self, fpath: &Path, flags: i32) -> FsResult<u64> {
        info!(target: OP_TAG, "open {:?} flags {:#x}", fpath, flags);
        let real = self.forward_path(fpath)?;
        self.loopback.open(&real, flags)
    }

    // read/write/flush/release act on a handle the loopback already gave
    // out, so there is nothing left to resolve against the store

    pub fn read(&self, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>> {
        debug!(target: OP_TAG, "read fd {} offset {} size {}", fh, offset, size);
        self.loopback.read(fh, offset, size)
    }

    pub fn write(&self, fh: u64, data: &[u8], offset: i64) -> FsResult<u32> {
        debug!(target: OP_TAG, "write fd {} offset {}", fh, offset);
        self.loopback.write(fh, data, offset)
    }

    pub fn truncate(&self, fpath: &Path, size: i64) -> FsResult<()> {
        info!(target: OP_TAG, "truncate {:?} to {}", fpath, size);
        let real = self.forward_path(fpath)?;
        self.loopback.truncate(&real, size)
    }

    pub fn flush(&self, fh: u64) -> FsResult<()> {
        debug!(target: OP_TAG, "flush fd {}", fh);
        self.loopback.flush(fh)
    }

    pub fn release(&self, fh: u64) -> FsResult<()> {
        debug!(target: OP_TAG, "release fd {}", fh);
        self.loopback.release(fh)
    }
}

// dropping the filesystem doesn't stop the watcher; the mount owner decides
// when to shut it down
impl<L: Loopback> Drop for TagdirFilesystem<L> {
    fn drop(&mut self) {
        debug!(target: OP_TAG, "Dropping fs");
    }
}
