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
use nix::errno::Errno::ENOENT;
use std::path::Path;

#[test]
fn test_intersection_listing() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let a = th.make_real_dir("a");
    let b = th.make_real_dir("b");
    th.tag_entity(&["x", "y"], &a)?;
    th.tag_entity(&["x"], &b)?;

    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["x"])), vec!["a", "b"]);
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["x", "y"])), vec!["a"]);
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["y"])), vec!["a"]);
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["y", "x"])), vec!["a"]);
    Ok(())
}

#[test]
fn test_readdir_missing_tag_in_intersection() {
    let th = TestHelper::new();
    th.mktags(&["x"]);
    assert_errno(th.fs.readdir(&TestHelper::tag_path(&["x", "nope"])), ENOENT);
}

#[test]
fn test_untag_cascade_deletes_entity() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let e = th.make_real_dir("e");
    th.tag_entity(&["x", "y"], &e)?;

    // stripping every tag at once empties the tag-set, so e goes away
    th.fs.unlink(&TestHelper::link_path(&["x", "y"], "e"))?;

    assert!(th.readdir_names(&TestHelper::tag_path(&["x"])).is_empty());
    assert!(th.readdir_names(&TestHelper::tag_path(&["y"])).is_empty());
    assert_errno(
        th.fs.readlink(&TestHelper::link_path(&["x", "y"], "e")),
        ENOENT,
    );
    assert!(th.fs.listxattr(Path::new("/.entinfo"))?.is_empty());
    Ok(())
}

#[test]
fn test_untag_partial_keeps_entity() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let e = th.make_real_dir("e");
    th.tag_entity(&["x", "y"], &e)?;

    th.fs.unlink(&TestHelper::link_path(&["x"], "e"))?;

    assert!(th.readdir_names(&TestHelper::tag_path(&["x"])).is_empty());
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["y"])), vec!["e"]);
    assert_eq!(th.fs.readlink(&TestHelper::link_path(&["y"], "e"))?, e);
    Ok(())
}

#[test]
fn test_untag_requires_all_tags_carried() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let e = th.make_real_dir("e");
    th.tag_entity(&["x"], &e)?;

    // e doesn't carry y, so the intersection path doesn't contain it
    assert_errno(th.fs.unlink(&TestHelper::link_path(&["x", "y"], "e")), ENOENT);
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["x"])), vec!["e"]);
    Ok(())
}

#[test]
fn test_unlink_unknown_entity() {
    let th = TestHelper::new();
    th.mktags(&["x"]);
    assert_errno(th.fs.unlink(&TestHelper::link_path(&["x"], "ghost")), ENOENT);
}

#[test]
fn test_rmdir_shared_tag() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let a = th.make_real_dir("a");
    let b = th.make_real_dir("b");
    th.tag_entity(&["x", "y"], &a)?;
    th.tag_entity(&["x"], &b)?;

    // b loses its last tag and is dropped; a survives, keeping y
    th.fs.rmdir(&TestHelper::tag_path(&["x"]))?;

    assert_eq!(th.readdir_names(Path::new("/")), vec!["@y"]);
    assert_eq!(th.readdir_names(&TestHelper::tag_path(&["y"])), vec!["a"]);
    assert_eq!(th.fs.listxattr(Path::new("/.entinfo"))?, vec!["a"]);
    Ok(())
}

#[test]
fn test_rmdir_multiple_tags() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y", "z"]);
    th.fs.rmdir(&TestHelper::tag_path(&["x", "y"]))?;

    assert_eq!(th.readdir_names(Path::new("/")), vec!["@z"]);
    Ok(())
}

#[test]
fn test_rmdir_missing_tag() {
    let th = TestHelper::new();
    assert_errno(th.fs.rmdir(&TestHelper::tag_path(&["nope"])), ENOENT);
}

#[test]
fn test_tag_and_untag_roundtrip_leaves_no_state() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["x", "y"]);
    let fresh = th.make_real_dir("fresh");

    th.tag_entity(&["x", "y"], &fresh)?;
    th.fs.unlink(&TestHelper::link_path(&["x", "y"], "fresh"))?;

    assert!(th.fs.listxattr(Path::new("/.entinfo"))?.is_empty());
    assert!(th.readdir_names(&TestHelper::tag_path(&["x"])).is_empty());
    // the tags themselves are untouched
    assert_eq!(th.readdir_names(Path::new("/")), vec!["@x", "@y"]);
    Ok(())
}
