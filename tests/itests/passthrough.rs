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
use std::os::unix::fs::MetadataExt;

#[test]
fn test_getattr_forwards_below_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::write(real.join("inside.txt"), b"payload")?;

    let stat = th
        .fs
        .getattr(&TestHelper::link_path(&["t"], "e").join("inside.txt"))?;

    let md = std::fs::metadata(real.join("inside.txt"))?;
    assert_eq!(stat.st_size, md.size() as i64);
    assert_eq!(stat.st_mode, md.mode());
    Ok(())
}

#[test]
fn test_readdir_forwards_below_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::create_dir(real.join("sub"))?;
    std::fs::write(real.join("sub/one"), b"1")?;
    std::fs::write(real.join("sub/two"), b"2")?;

    let listing = th.readdir_names(&TestHelper::link_path(&["t"], "e").join("sub"));
    assert_eq!(listing, vec!["one", "two"]);
    Ok(())
}

#[test]
fn test_readlink_forwards_below_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::os::unix::fs::symlink("/somewhere/else", real.join("ptr"))?;

    let target = th
        .fs
        .readlink(&TestHelper::link_path(&["t"], "e").join("ptr"))?;
    assert_eq!(target, std::path::PathBuf::from("/somewhere/else"));
    Ok(())
}

#[test]
fn test_mkdir_and_rmdir_forward_below_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");

    th.fs
        .mkdir(&TestHelper::link_path(&["t"], "e").join("fresh"), 0o755)?;
    assert!(real.join("fresh").is_dir());

    th.fs
        .rmdir(&TestHelper::link_path(&["t"], "e").join("fresh"))?;
    assert!(!real.join("fresh").exists());
    Ok(())
}

#[test]
fn test_unlink_forwards_below_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::write(real.join("victim"), b"bye")?;

    th.fs
        .unlink(&TestHelper::link_path(&["t"], "e").join("victim"))?;
    assert!(!real.join("victim").exists());
    Ok(())
}

#[test]
fn test_forward_path_resolution() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");

    assert_eq!(th.fs.forward_path(&TestHelper::link_path(&["t"], "e"))?, real);
    assert_eq!(
        th.fs
            .forward_path(&TestHelper::link_path(&["t"], "e").join("a/b"))?,
        real.join("a/b")
    );
    Ok(())
}

#[test]
fn test_forwarding_requires_entity_to_carry_tags() -> TestResult {
    let th = TestHelper::new();
    let _real = th.make_tagged_entity(&["t"], "e");
    th.mktags(&["other"]);

    // e exists, but not inside @other
    assert_errno(
        th.fs
            .getattr(&TestHelper::link_path(&["other"], "e").join("x")),
        ENOENT,
    );
    assert_errno(
        th.fs.forward_path(&TestHelper::link_path(&["other"], "e")),
        ENOENT,
    );
    Ok(())
}

#[test]
fn test_loopback_errno_propagates() {
    let th = TestHelper::new();
    let _real = th.make_tagged_entity(&["t"], "e");

    // the entity resolves, the underlying file doesn't
    assert_errno(
        th.fs
            .getattr(&TestHelper::link_path(&["t"], "e").join("missing")),
        ENOENT,
    );
}

#[test]
fn test_read_bytes_through_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::write(real.join("data.txt"), b"hello tagdir")?;

    let vpath = TestHelper::link_path(&["t"], "e").join("data.txt");
    let fh = th.fs.open(&vpath, libc::O_RDONLY)?;
    assert_eq!(th.fs.read(fh, 0, 64)?, b"hello tagdir".to_vec());
    // offset reads see the same bytes the real file holds
    assert_eq!(th.fs.read(fh, 6, 64)?, b"tagdir".to_vec());
    th.fs.release(fh)?;
    Ok(())
}

#[test]
fn test_write_bytes_through_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    let vpath = TestHelper::link_path(&["t"], "e").join("out.txt");

    let fh = th.fs.create(&vpath, 0o644, libc::O_WRONLY)?;
    assert_eq!(th.fs.write(fh, b"payload", 0)?, 7);
    th.fs.flush(fh)?;
    th.fs.release(fh)?;

    assert_eq!(std::fs::read(real.join("out.txt"))?, b"payload".to_vec());
    Ok(())
}

#[test]
fn test_rewrite_through_entity_roundtrips() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::write(real.join("notes"), b"first draft")?;

    let vpath = TestHelper::link_path(&["t"], "e").join("notes");
    let fh = th.fs.open(&vpath, libc::O_RDWR)?;
    th.fs.write(fh, b"FIRST", 0)?;
    assert_eq!(th.fs.read(fh, 0, 64)?, b"FIRST draft".to_vec());
    th.fs.release(fh)?;

    assert_eq!(std::fs::read(real.join("notes"))?, b"FIRST draft".to_vec());
    Ok(())
}

#[test]
fn test_truncate_through_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");
    std::fs::write(real.join("log"), b"keep:drop")?;

    th.fs
        .truncate(&TestHelper::link_path(&["t"], "e").join("log"), 4)?;

    assert_eq!(std::fs::read(real.join("log"))?, b"keep".to_vec());
    Ok(())
}

#[test]
fn test_open_requires_entity_resolution() {
    let th = TestHelper::new();
    let _real = th.make_tagged_entity(&["t"], "e");
    th.mktags(&["other"]);

    assert_errno(
        th.fs.open(
            &TestHelper::link_path(&["other"], "e").join("data"),
            libc::O_RDONLY,
        ),
        ENOENT,
    );
    assert_errno(
        th.fs.open(
            &TestHelper::link_path(&["t"], "ghost").join("data"),
            libc::O_RDONLY,
        ),
        ENOENT,
    );
}
