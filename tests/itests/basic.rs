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
use nix::errno::Errno::{EINVAL, ENOENT, ENOTDIR};
use std::path::Path;
use tagdir::fs::attr;
use tagdir::fs::{FsOp, FsReply};

#[test]
fn test_mktag_and_list_root() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["python", "test"]);

    assert_eq!(th.readdir_names(Path::new("/")), vec!["@python", "@test"]);

    let stat = th.fs.getattr(&TestHelper::tag_path(&["python"]))?;
    assert!(attr::is_dir(&stat));
    Ok(())
}

#[test]
fn test_mkdir_ensures_all_missing_tags() -> TestResult {
    let th = TestHelper::new();
    // one call, two tags, one of them pre-existing
    th.mktags(&["a"]);
    th.fs.mkdir(&TestHelper::tag_path(&["a", "b"]), 0o755)?;

    assert_eq!(th.readdir_names(Path::new("/")), vec!["@a", "@b"]);
    Ok(())
}

#[test]
fn test_mkdir_idempotent() -> TestResult {
    let th = TestHelper::new();
    th.fs.mkdir(&TestHelper::tag_path(&["a"]), 0o755)?;
    th.fs.mkdir(&TestHelper::tag_path(&["a"]), 0o755)?;

    assert_eq!(th.readdir_names(Path::new("/")), vec!["@a"]);
    Ok(())
}

#[test]
fn test_mkdir_rejects_bad_tag_names() {
    let th = TestHelper::new();
    assert_errno(th.fs.mkdir(&TestHelper::tag_path(&["Python"]), 0o755), EINVAL);
    assert_errno(th.fs.mkdir(Path::new("/"), 0o755), EINVAL);
    assert_errno(th.fs.mkdir(Path::new("/notags"), 0o755), EINVAL);
}

#[test]
fn test_tag_and_read() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["python", "test"]);
    let real = th.make_real_dir("tagdir");
    th.tag_entity(&["python", "test"], &real)?;

    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["python"])), vec!["tagdir"]);
    assert_eq!(
        th.fs
            .readlink(&TestHelper::link_path(&["python", "test"], "tagdir"))?,
        real
    );

    let stat = th
        .fs
        .getattr(&TestHelper::link_path(&["python"], "tagdir"))?;
    assert!(attr::is_symlink(&stat));
    Ok(())
}

#[test]
fn test_tagging_idempotent() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    th.tag_entity(&["t"], &real)?;

    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["t"])), vec!["e"]);
    Ok(())
}

#[test]
fn test_tagging_missing_tag() {
    let th = TestHelper::new();
    let real = th.make_real_dir("e");
    assert_errno(th.tag_entity(&["ghost"], &real), ENOENT);
}

#[test]
fn test_tagging_missing_source() {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let gone = th.real_dir.path().join("gone");
    assert_errno(th.fs.symlink(&TestHelper::link_path(&["t"], "gone"), &gone), ENOENT);
}

#[test]
fn test_tagging_non_directory_source() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let file = th.real_dir.path().join("plain");
    std::fs::write(&file, b"not a dir")?;

    assert_errno(
        th.fs.symlink(&TestHelper::link_path(&["t"], "plain"), &file),
        ENOTDIR,
    );
    Ok(())
}

#[test]
fn test_tagging_basename_mismatch() {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let real = th.make_real_dir("e");
    // the link must be named by the source's basename
    assert_errno(
        th.fs.symlink(&TestHelper::link_path(&["t"], "other"), &real),
        EINVAL,
    );
}

#[test]
fn test_tagging_name_collision() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let first = th.make_real_dir("nested/e");
    let second = th.make_real_dir("elsewhere/e");

    th.tag_entity(&["t"], &first)?;
    // same entity name, different real path
    assert_errno(th.tag_entity(&["t"], &second), EINVAL);
    Ok(())
}

#[test]
fn test_tagging_tag_only_path_is_invalid() {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let real = th.make_real_dir("e");
    assert_errno(th.fs.symlink(&TestHelper::tag_path(&["t"]), &real), EINVAL);
}

#[test]
fn test_access() -> TestResult {
    let th = TestHelper::new();
    let _real = th.make_tagged_entity(&["t"], "e");

    th.fs.access(Path::new("/"), 0)?;
    th.fs.access(&TestHelper::tag_path(&["t"]), 0)?;
    th.fs.access(&TestHelper::link_path(&["t"], "e"), 0)?;

    assert_errno(th.fs.access(&TestHelper::tag_path(&["nope"]), 0), ENOENT);
    assert_errno(th.fs.access(&TestHelper::link_path(&["t"], "ghost"), 0), ENOENT);
    Ok(())
}

#[test]
fn test_getattr_missing() {
    let th = TestHelper::new();
    assert_errno(th.fs.getattr(&TestHelper::tag_path(&["nope"])), ENOENT);
    assert_errno(th.fs.getattr(Path::new("/bare")), ENOENT);
}

#[test]
fn test_readdir_of_symlink_is_invalid() {
    let th = TestHelper::new();
    th.make_tagged_entity(&["t"], "e");
    assert_errno(th.fs.readdir(&TestHelper::link_path(&["t"], "e")), EINVAL);
}

#[test]
fn test_readlink_of_tag_dir_is_invalid() {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    assert_errno(th.fs.readlink(&TestHelper::tag_path(&["t"])), EINVAL);
    assert_errno(th.fs.readlink(Path::new("/")), EINVAL);
}

#[test]
fn test_unlink_of_tag_dir_is_enoent() {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    assert_errno(th.fs.unlink(&TestHelper::tag_path(&["t"])), ENOENT);
}

// the same dispatch with the same store state resolves the same way
#[test]
fn test_dispatch_depends_only_on_path_and_state() -> TestResult {
    let th = TestHelper::new();
    th.make_tagged_entity(&["t"], "e");

    let link = TestHelper::link_path(&["t"], "e");
    let first = th.fs.dispatch(FsOp::Readlink { path: &link })?;
    let second = th.fs.dispatch(FsOp::Readlink { path: &link })?;
    assert_eq!(first, second);

    let listing = th.fs.dispatch(FsOp::Readdir {
        path: &TestHelper::tag_path(&["t"]),
    })?;
    assert_eq!(listing, FsReply::Entries(vec!["e".to_owned()]));
    Ok(())
}
