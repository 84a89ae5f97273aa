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

#![allow(dead_code)]

use nix::errno::Errno;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tagdir::common;
use tagdir::fs::err::FsResult;
use tagdir::fs::loopback::PassthroughFs;
use tagdir::fs::TagdirFilesystem;
use tagdir::sql;
use tagdir::watch::EntityPathWatcher;
use tempfile::TempDir;

pub type TestResult = Result<(), Box<dyn Error>>;

/// One fully wired filesystem over a throwaway database, plus a scratch
/// directory for the real directories that get tagged.
pub struct TestHelper {
    pub fs: TagdirFilesystem<PassthroughFs>,
    pub watcher: Arc<EntityPathWatcher>,
    pub real_dir: TempDir,
    db_dir: TempDir,
    pub db_path: PathBuf,
}

impl TestHelper {
    pub fn new() -> TestHelper {
        let db_dir = TempDir::new().expect("Couldn't create db dir");
        let db_path = db_dir.path().join("tagdir.sqlite3");

        let mut conn = sql::get_conn(&db_path).expect("Couldn't open db");
        sql::migrations::migrate(&mut conn, &common::version_str()).expect("Couldn't migrate");

        // a private watcher per test; the singleton accessor is for mounts
        let watcher = EntityPathWatcher::new(&db_path).expect("Couldn't build watcher");
        let fs = TagdirFilesystem::new(conn, PassthroughFs::new(), Arc::clone(&watcher))
            .expect("Couldn't build fs");

        let real_dir = TempDir::new().expect("Couldn't create scratch dir");

        TestHelper {
            fs,
            watcher,
            real_dir,
            db_dir,
            db_path,
        }
    }

    /// `/@t1/../@tn`
    pub fn tag_path(tags: &[&str]) -> PathBuf {
        let mut path = PathBuf::from("/");
        for tag in tags {
            path.push(format!("@{}", tag));
        }
        path
    }

    /// `/@t1/../@tn/name`
    pub fn link_path(tags: &[&str], name: &str) -> PathBuf {
        TestHelper::tag_path(tags).join(name)
    }

    pub fn mktags(&self, tags: &[&str]) {
        for tag in tags {
            self.fs
                .mkdir(&TestHelper::tag_path(&[tag]), 0o755)
                .expect("Couldn't create tag");
        }
    }

    /// Creates a real directory in the scratch area, returning its
    /// canonicalized path.
    pub fn make_real_dir(&self, name: &str) -> PathBuf {
        let path = self.real_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Couldn't create real dir");
        std::fs::canonicalize(path).expect("Couldn't canonicalize")
    }

    /// Registers `real` under every tag in `tags`, the way the CLI does it:
    /// one symlink through the tag intersection.
    pub fn tag_entity(&self, tags: &[&str], real: &Path) -> FsResult<()> {
        let name = real.file_name().unwrap().to_str().unwrap().to_owned();
        self.fs.symlink(&TestHelper::link_path(tags, &name), real)
    }

    /// Creates a real dir named `name` and tags it, creating the tags first.
    pub fn make_tagged_entity(&self, tags: &[&str], name: &str) -> PathBuf {
        self.mktags(tags);
        let real = self.make_real_dir(name);
        self.tag_entity(tags, &real).expect("Couldn't tag entity");
        real
    }

    pub fn readdir_names(&self, path: &Path) -> Vec<String> {
        let mut names = self.fs.readdir(path).expect("Couldn't readdir");
        names.sort();
        names
    }
}

pub fn assert_errno<T: std::fmt::Debug>(res: FsResult<T>, errno: Errno) {
    match res {
        Ok(val) => panic!("Expected {}, got Ok({:?})", errno, val),
        Err(e) => assert_eq!(e.errno, errno, "Expected {}, got {}", errno, e),
    }
}

/// Polls `cond` until it holds or `timeout` passes.  Watcher effects arrive
/// on a background thread, so tests wait instead of asserting immediately.
pub fn wait_until<F: FnMut() -> bool>(mut cond: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    cond()
}

pub const WATCH_TIMEOUT: Duration = Duration::from_secs(5);
