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

use crate::common::{wait_until, TestHelper, TestResult, WATCH_TIMEOUT};

#[test]
fn test_rename_follows_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "e");

    let renamed = real.parent().unwrap().join("e2");
    std::fs::rename(&real, &renamed)?;

    assert!(
        wait_until(
            || th.readdir_names(&TestHelper::tag_path(&["t"])) == vec!["e2"],
            WATCH_TIMEOUT,
        ),
        "Watcher never picked up the rename"
    );
    assert_eq!(
        th.fs.readlink(&TestHelper::link_path(&["t"], "e2"))?,
        renamed
    );
    Ok(())
}

#[test]
fn test_delete_drops_entity() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "gone");

    std::fs::remove_dir(&real)?;

    assert!(
        wait_until(
            || th.readdir_names(&TestHelper::tag_path(&["t"])).is_empty(),
            WATCH_TIMEOUT,
        ),
        "Watcher never picked up the removal"
    );
    Ok(())
}

#[test]
fn test_delete_prunes_watches() -> TestResult {
    let th = TestHelper::new();
    // a parent directory all of its own, so the prune is observable
    let real = th.make_real_dir("solo/entity");
    th.mktags(&["t"]);
    th.tag_entity(&["t"], &real)?;

    let parent = real.parent().unwrap().to_owned();
    assert!(th.watcher.watched_dirs().contains(&parent));

    std::fs::remove_dir(&real)?;

    assert!(
        wait_until(
            || !th.watcher.watched_dirs().contains(&parent),
            WATCH_TIMEOUT,
        ),
        "Watch on {:?} never pruned",
        parent
    );
    Ok(())
}

#[test]
fn test_watches_dedup_by_parent() -> TestResult {
    let th = TestHelper::new();
    th.mktags(&["t"]);
    let a = th.make_real_dir("shared/a");
    let b = th.make_real_dir("shared/b");
    th.tag_entity(&["t"], &a)?;
    th.tag_entity(&["t"], &b)?;

    let parent = a.parent().unwrap();
    let watched: Vec<_> = th
        .watcher
        .watched_dirs()
        .into_iter()
        .filter(|dir| dir == parent)
        .collect();
    assert_eq!(watched.len(), 1);
    Ok(())
}

#[test]
fn test_unschedule_is_idempotent() -> TestResult {
    let th = TestHelper::new();
    let _real = th.make_tagged_entity(&["t"], "e");

    let before = th.watcher.watched_dirs().len();
    th.watcher.unschedule_redundant_handlers();
    th.watcher.unschedule_redundant_handlers();
    assert_eq!(th.watcher.watched_dirs().len(), before);
    Ok(())
}

#[test]
fn test_rename_watch_follows_to_new_parent() -> TestResult {
    let th = TestHelper::new();
    let real = th.make_tagged_entity(&["t"], "mover");

    let renamed = real.parent().unwrap().join("moved");
    std::fs::rename(&real, &renamed)?;

    assert!(
        wait_until(
            || th.readdir_names(&TestHelper::tag_path(&["t"])) == vec!["moved"],
            WATCH_TIMEOUT,
        ),
        "Watcher never picked up the rename"
    );

    // and the renamed directory is still live: removing it must still be seen
    std::fs::remove_dir(&renamed)?;
    assert!(
        wait_until(
            || th.readdir_names(&TestHelper::tag_path(&["t"])).is_empty(),
            WATCH_TIMEOUT,
        ),
        "Watcher lost track of the entity after its rename"
    );
    Ok(())
}
