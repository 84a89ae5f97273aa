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

//! Factories for the attr records the virtual namespace synthesizes.  Tag
//! directories and entity symlinks persist their attrs in the store so that
//! ownership and timestamps survive a remount; the root attr is a singleton
//! row, and the entinfo pseudo-file is synthesized on the fly.

use crate::sql::types::Attr;
use std::path::Path;

/// The stat-shaped record an operation reports back to the kernel, either
/// synthesized from a stored [`Attr`] or taken from the underlying filesystem
/// on a pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_size: i64,
    pub st_atime: i64,
    pub st_mtime: i64,
    pub st_ctime: i64,
}

impl From<&Attr> for FileStat {
    fn from(attr: &Attr) -> Self {
        FileStat {
            st_mode: attr.st_mode,
            st_nlink: 1,
            st_uid: attr.st_uid,
            st_gid: attr.st_gid,
            st_size: 0,
            st_atime: attr.st_atime,
            st_mtime: attr.st_mtime,
            st_ctime: attr.st_ctime,
        }
    }
}

fn synthesize(mode: u32) -> Attr {
    // whole seconds only; nanoseconds are always reported as zero
    let now = chrono::Utc::now().timestamp();
    Attr {
        id: 0,
        st_mode: mode,
        st_uid: nix::unistd::getuid().as_raw(),
        st_gid: nix::unistd::getgid().as_raw(),
        st_atime: now,
        st_mtime: now,
        st_ctime: now,
    }
}

pub fn new_tag_attr() -> Attr {
    synthesize(0o644 | libc::S_IFDIR as u32)
}

pub fn new_entity_attr() -> Attr {
    synthesize(0o644 | libc::S_IFLNK as u32)
}

pub fn new_root_attr() -> Attr {
    synthesize(0o644 | libc::S_IFDIR as u32)
}

/// The entinfo pseudo-file never exists in the store; it reads as an empty,
/// read-only regular file.
pub fn entinfo_stat() -> FileStat {
    FileStat::from(&synthesize(0o444 | libc::S_IFREG as u32))
}

pub fn is_dir(stat: &FileStat) -> bool {
    stat.st_mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
}

pub fn is_symlink(stat: &FileStat) -> bool {
    stat.st_mode & libc::S_IFMT as u32 == libc::S_IFLNK as u32
}

/// Joins an entity's real path with a pass-through remainder.
pub fn real_path(base: &Path, rest: Option<&Path>) -> std::path::PathBuf {
    match rest {
        Some(rest) => base.join(rest),
        None => base.to_owned(),
    }
}
