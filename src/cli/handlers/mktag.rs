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
use std::io::ErrorKind;

pub fn handle(args: &ArgMatches) -> HandlerResult {
    let mountpoint = super::require_mountpoint(args)?;
    for tag in args.values_of("tags").expect("Tags are required") {
        match std::fs::create_dir(cli::tag_dir(&mountpoint, tag)) {
            Ok(()) => {}
            // a tag that already exists is not an error
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(format!("Couldn't create tag {}: {}", tag, e).into()),
        }
    }
    Ok(())
}
