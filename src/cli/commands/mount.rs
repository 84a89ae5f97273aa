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
use clap::{Arg, SubCommand};

pub(super) fn add_subcommands<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    app.subcommand(
        SubCommand::with_name("mount")
            .about("Mounts a tagdir filesystem in the foreground")
            .arg(
                Arg::with_name("name")
                    .required(true)
                    .validator(super::validate_name)
                    .help("The mount registers as Tagdir_<name> so other commands can find it"),
            )
            .arg(
                Arg::with_name("db")
                    .required(true)
                    .help("Path of the sqlite database backing the mount"),
            )
            .arg(
                Arg::with_name("mountpoint")
                    .required(true)
                    .help("An existing empty directory to mount on"),
            ),
    )
}
