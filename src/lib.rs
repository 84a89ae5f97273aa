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

//! Tagdir exposes a flat universe of tags as top-level directories, and tagged
//! real directories ("entities") as symlinks inside every tag intersection
//! that contains all of their tags.  Everything below an entity symlink is
//! forwarded to the underlying filesystem.

#![warn(clippy::all)]
#![allow(
    clippy::implicit_return,
    clippy::missing_docs_in_private_items,
    clippy::similar_names,
    clippy::single_match_else
)]

pub mod cli;
pub mod common;
pub mod fs;
pub mod fuse;
pub mod sql;
pub mod watch;
