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

use super::HandlerResult;
use crate::cli;
use clap::ArgMatches;
use std::path::Path;
use std::path::PathBuf;

pub fn handle(args: &ArgMatches) -> HandlerResult {
    let mountpoint = super::require_mountpoint(args)?;
    let path = args.value_of("path").expect("Path is required");
    let (name, _tags) = super::tagged_entry(&mountpoint, Path::new(path))?;

    // one unlink through the intersection of all named tags strips them all
    let mut link: PathBuf = mountpoint;
    for tag in args.values_of("tags").expect("Tags are required") {
        link = cli::tag_dir(&link, tag);
    }
    link = link.join(name);

    if let Err(e) = std::fs::remove_file(&link) {
        return Err(format!("Couldn't untag {}: {}", path, e).into());
    }
    Ok(())
}
