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

//! This is the entrypoint for the commandline interface to the tagdir ops

use clap::{App, Arg};
use std::error::Error;
use tagdir::cli::{commands, handlers};
use tagdir::common;

fn run() -> Result<(), Box<dyn Error>> {
    let version_str = common::version_str();
    let app = App::new("Tagdir")
        .version(&*version_str)
        .about("Tag-based virtual filesystem")
        .settings(&[clap::AppSettings::ArgRequiredElseHelp])
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        );

    let attached_app = commands::add_subcommands(app);
    let matches = attached_app.get_matches();

    let maybe_log = match matches.occurrences_of("verbosity") {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(log_level) = maybe_log {
        common::log::setup_logger(log_level, vec![std::io::stdout().into()])?;
    }

    match matches.subcommand() {
        ("mount", Some(args)) => handlers::mount::handle(args),
        ("mktag", Some(args)) => handlers::mktag::handle(args),
        ("rmtag", Some(args)) => handlers::rmtag::handle(args),
        ("tag", Some(args)) => handlers::tag::handle(args),
        ("untag", Some(args)) => handlers::untag::handle(args),
        ("listag", Some(args)) => handlers::listag::handle(args),
        _ => Err("Command not found".into()),
    }
}

fn main() {
    if let Err(e) = run() {
        // failures surface as one human-readable line and a non-zero exit
        println!("{}", e);
        std::process::exit(255);
    }
}
