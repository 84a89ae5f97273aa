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

pub const VERSION: (&str, &str, &str) = (
    env!("CARGO_PKG_VERSION_MAJOR"),
    env!("CARGO_PKG_VERSION_MINOR"),
    env!("CARGO_PKG_VERSION_PATCH"),
);

pub const APP_NAME: &str = "tagdir";

/// Prefix of the fsname a mounted tagdir registers with.  Mountpoint
/// discovery scans `/proc/mounts` for devices named `Tagdir_<NAME>`.
pub const FSNAME_PREFIX: &str = "Tagdir_";

/// The pseudo-file exposing the entity inventory through xattrs.
pub const ENTINFO_PATH: &str = "/.entinfo";
pub const ENTINFO_NAME: &str = ".entinfo";

/// The component prefix that marks a tag directory in the virtual namespace.
pub const TAG_PREFIX: char = '@';

/// Tag names are restricted to this shape, both in the CLI and in mkdir.
pub const TAG_NAME_PATTERN: &str = "^[a-z]+$";
