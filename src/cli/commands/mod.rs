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

use clap::Arg;

mod listag;
mod mktag;
mod mount;
mod rmtag;
mod tag;
mod untag;

pub fn add_subcommands<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    let mut attached = app;
    attached = mount::add_subcommands(attached);
    attached = mktag::add_subcommands(attached);
    attached = rmtag::add_subcommands(attached);
    attached = tag::add_subcommands(attached);
    attached = untag::add_subcommands(attached);
    attached = listag::add_subcommands(attached);
    attached
}

pub(super) fn validate_name(val: String) -> Result<(), String> {
    if crate::common::valid_tag_name(&val) {
        Ok(())
    } else {
        Err(format!("{} must match [a-z]+", val))
    }
}

/// `--name` selects which mounted tagdir a command talks to.  It can be left
/// off when exactly one is mounted.
pub(super) fn name_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("name")
        .long("name")
        .takes_value(true)
        .validator(validate_name)
        .help("The name the tagdir was mounted with")
}

pub(super) fn tags_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("tags")
        .required(true)
        .min_values(1)
        .takes_value(true)
        .validator(validate_name)
        .help("Tag names, [a-z]+")
}
