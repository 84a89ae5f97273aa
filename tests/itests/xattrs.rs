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

use crate::common::{assert_errno, TestHelper, TestResult};
use nix::errno::Errno;
use nix::errno::Errno::ENODATA;
const ENOTSUP: Errno = Errno::ENOTSUP;
use std::path::Path;
use tagdir::fs::attr;

const ENTINFO: &str = "/.entinfo";

#[test]
fn test_inventory_lists_entities() -> TestResult {
    let th = TestHelper::new();
    th.make_tagged_entity(&["t1", "t2"], "e1");

    assert_eq!(th.fs.listxattr(Path::new(ENTINFO))?, vec!["e1"]);
    Ok(())
}

#[test]
fn test_inventory_value_format() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t1", "t2"], "e1");

    let value = th.fs.getxattr(Path::new(ENTINFO), "e1")?;
    let expected = format!("{},t1,t2", real.display());
    assert_eq!(value, expected.into_bytes());
    Ok(())
}

#[test]
fn test_inventory_tracks_untagging() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t1", "t2"], "e1");

    th.fs.unlink(&TestHelper::link_path(&["t1"], "e1"))?;

    let value = th.fs.getxattr(Path::new(ENTINFO), "e1")?;
    let expected = format!("{},t2", real.display());
    assert_eq!(value, expected.into_bytes());
    Ok(())
}

#[test]
fn test_missing_key_is_enodata() {
    let th = TestHelper::new();
    assert_errno(th.fs.getxattr(Path::new(ENTINFO), "nope"), ENODATA);
}

#[test]
fn test_xattrs_only_apply_to_entinfo() {
    let th = TestHelper::new();
    th.make_tagged_entity(&["t"], "e");

    assert_errno(th.fs.listxattr(Path::new("/")), ENOTSUP);
    assert_errno(th.fs.listxattr(&TestHelper::tag_path(&["t"])), ENOTSUP);
    assert_errno(
        th.fs.getxattr(&TestHelper::link_path(&["t"], "e"), "e"),
        ENOTSUP,
    );
}

#[test]
fn test_entinfo_stats_as_regular_file() -> TestResult {
    let th = TestHelper::new();
    let stat = th.fs.getattr(Path::new(ENTINFO))?;
    assert!(!attr::is_dir(&stat));
    assert!(!attr::is_symlink(&stat));
    assert_eq!(stat.st_mode & 0o777, 0o444);
    Ok(())
}
