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

use clap::ArgMatches;
use std::error::Error;
use std::path::{Path, PathBuf};

pub mod listag;
pub mod mktag;
pub mod mount;
pub mod rmtag;
pub mod tag;
pub mod untag;

pub type HandlerResult = Result<(), Box<dyn Error>>;

/// Every command except `mount` talks to an already-mounted tagdir.
fn require_mountpoint(args: &ArgMatches) -> Result<PathBuf, Box<dyn Error>> {
    match crate::cli::find_mountpoint(args.value_of("name"))? {
        Some(mountpoint) => Ok(mountpoint),
        None => Err("Mountpoint not found".into()),
    }
}

/// Reads one entity's record off the entinfo pseudo-file and checks that it
/// is actually the directory the user named.  The value is
/// `real_path,tag_1,..,tag_n`.
fn tagged_entry(
    mountpoint: &Path,
    path: &Path,
) -> Result<(String, Vec<String>), Box<dyn Error>> {
    let source = std::fs::canonicalize(path)?;
    let name = crate::common::get_filename(&source)?.to_owned();

    let value = xattr::get(crate::cli::entinfo_path(mountpoint), &name)?
        .ok_or_else(|| format!("No tagged entry {}", name))?;
    let value = String::from_utf8(value)?;
    let mut fields = value.split(',');
    let real_path = fields.next().unwrap_or("");

    if Path::new(real_path) != source.as_path() {
        return Err(format!("Tagged entry {} is not {}", name, path.display()).into());
    }

    Ok((name, fields.map(str::to_owned).collect()))
}
