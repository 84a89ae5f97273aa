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

use std::path::PathBuf;

/// One row of the `attrs` table.  Every tag and entity owns exactly one, and
/// row id 1 is reserved for the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub id: i64,
    pub st_mode: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_atime: i64,
    pub st_mtime: i64,
    pub st_ctime: i64,
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub attr: Attr,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub real_path: PathBuf,
    pub attr: Attr,
}
