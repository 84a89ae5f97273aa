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
use crate::common::constants;
use clap::ArgMatches;
use std::path::Path;

pub fn handle(args: &ArgMatches) -> HandlerResult {
    let mountpoint = super::require_mountpoint(args)?;

    let mut tags = match args.value_of("path") {
        // tags of one tagged directory
        Some(path) => super::tagged_entry(&mountpoint, Path::new(path))?.1,
        // every tag, read off the mount's root listing
        None => {
            let mut tags = Vec::new();
            for entry in std::fs::read_dir(&mountpoint)? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if let Some(tag) = name.strip_prefix(constants::TAG_PREFIX) {
                    tags.push(tag.to_owned());
                }
            }
            tags
        }
    };

    tags.sort();
    for tag in tags {
        println!("{}", tag);
    }
    Ok(())
}
