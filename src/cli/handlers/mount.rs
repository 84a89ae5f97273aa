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
use crate::cli::CLI_TAG;
use crate::common;
use crate::fs::loopback::PassthroughFs;
use crate::fs::TagdirFilesystem;
use crate::watch::EntityPathWatcher;
use crate::{cli, fuse, sql};
use clap::ArgMatches;
use log::info;
use std::path::Path;
use std::sync::Arc;

pub fn handle(args: &ArgMatches) -> HandlerResult {
    let name = args.value_of("name").expect("Name is required");
    let db = args.value_of("db").expect("Db is required");
    let mountpoint = args.value_of("mountpoint").expect("Mountpoint is required");

    if cli::find_mountpoint(Some(name))?.is_some() {
        return Err(format!("{} is already mounted", name).into());
    }

    let mut conn = sql::get_conn(db)?;
    sql::migrations::migrate(&mut conn, &common::version_str())?;

    // the watcher comes up before the kernel binding so that out-of-band
    // renames from previous runs are caught as early as possible
    let watcher = EntityPathWatcher::instance(db)?;
    let fs = TagdirFilesystem::new(conn, PassthroughFs::new(), Arc::clone(&watcher))?;

    info!(target: CLI_TAG, "Serving {} from {}", name, db);
    fuse::mount(fs, Path::new(mountpoint), name)?;

    watcher.stop();
    Ok(())
}
