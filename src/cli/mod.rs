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

use crate::common::constants;
use crate::common::err::TagdirResult;
use std::path::{Path, PathBuf};

pub mod commands;
pub mod handlers;

pub const CLI_TAG: &str = "cli";

/// Finds the mountpoint of a mounted tagdir by scanning the mount table for
/// devices named `Tagdir_<NAME>`.  Without a name, a lone mounted tagdir is
/// used; anything else is ambiguous and yields `None`.
pub fn find_mountpoint(name: Option<&str>) -> TagdirResult<Option<PathBuf>> {
    mountpoint_from_table(&std::fs::read_to_string("/proc/mounts")?, name)
}

fn mountpoint_from_table(table: &str, name: Option<&str>) -> TagdirResult<Option<PathBuf>> {
    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for line in table.lines() {
        let mut fields = line.split_whitespace();
        let device = match fields.next() {
            Some(device) => device,
            None => continue,
        };
        let mountpoint = match fields.next() {
            Some(mountpoint) => mountpoint,
            None => continue,
        };
        if let Some(mount_name) = device.strip_prefix(constants::FSNAME_PREFIX) {
            found.push((
                mount_name.to_owned(),
                PathBuf::from(unescape_mount_path(mountpoint)),
            ));
        }
    }

    match name {
        Some(name) => Ok(found
            .into_iter()
            .find(|(mount_name, _)| mount_name == name)
            .map(|(_, mountpoint)| mountpoint)),
        None => {
            if found.len() == 1 {
                Ok(Some(found.remove(0).1))
            } else {
                Ok(None)
            }
        }
    }
}

// /proc/mounts octal-escapes whitespace and backslashes in mountpoints
fn unescape_mount_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let digits: String = chars.by_ref().take(3).collect();
        match u8::from_str_radix(&digits, 8) {
            Ok(byte) => out.push(byte as char),
            Err(_) => {
                out.push('\\');
                out.push_str(&digits);
            }
        }
    }
    out
}

pub fn tag_dir(mountpoint: &Path, tag: &str) -> PathBuf {
    mountpoint.join(format!("{}{}", constants::TAG_PREFIX, tag))
}

pub fn entinfo_path(mountpoint: &Path) -> PathBuf {
    mountpoint.join(constants::ENTINFO_NAME)
}
