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
use crate::common;
use clap::ArgMatches;
use std::io::ErrorKind;

pub fn handle(args: &ArgMatches) -> HandlerResult {
    let mountpoint = super::require_mountpoint(args)?;
    let source = std::fs::canonicalize(args.value_of("path").expect("Path is required"))?;
    let name = common::get_filename(&source)?;

    for tag in args.values_of("tags").expect("Tags are required") {
        let link = cli::tag_dir(&mountpoint, tag).join(name);
        match std::os::unix::fs::symlink(&source, &link) {
            Ok(()) => {}
            // tagging with a tag the entity already carries is a no-op
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(format!("Couldn't tag with {}: {}", tag, e).into()),
        }
    }
    Ok(())
}
