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

//! Keeps the entity table coherent when registered directories are renamed
//! or removed behind the filesystem's back.  One non-recursive watch is held
//! per distinct parent directory of a registered entity; rename events update
//! the entity row, delete events remove it.  Watcher failures are logged and
//! swallowed, never propagated into the mount.

use crate::common;
use crate::common::err::{TagdirError, TagdirResult};
use crate::sql;
use crate::sql::txn;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

pub const WATCH_TAG: &str = "watch";

lazy_static! {
    static ref INSTANCE: Mutex<Option<Arc<EntityPathWatcher>>> = Mutex::new(None);
}

struct WatchState {
    // None once the watcher has been stopped
    backend: Option<RecommendedWatcher>,
    watched: HashSet<PathBuf>,
}

pub struct EntityPathWatcher {
    db_path: PathBuf,
    state: Mutex<WatchState>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EntityPathWatcher {
    /// The per-mount singleton.  The first call constructs the watcher;
    /// every later call hands back the same instance.
    pub fn instance<P: AsRef<Path>>(db_path: P) -> TagdirResult<Arc<EntityPathWatcher>> {
        let mut guard = INSTANCE.lock();
        if let Some(watcher) = &*guard {
            return Ok(Arc::clone(watcher));
        }
        let watcher = EntityPathWatcher::new(db_path)?;
        *guard = Some(Arc::clone(&watcher));
        Ok(watcher)
    }

    /// Builds a watcher, spawns its event thread, and seeds one watch per
    /// distinct parent directory of the already-registered entities.
    pub fn new<P: AsRef<Path>>(db_path: P) -> TagdirResult<Arc<EntityPathWatcher>> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let backend = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        let watcher = Arc::new(EntityPathWatcher {
            db_path: db_path.as_ref().to_owned(),
            state: Mutex::new(WatchState {
                backend: Some(backend),
                watched: HashSet::new(),
            }),
            thread: Mutex::new(None),
        });

        let weak = Arc::downgrade(&watcher);
        let handle = std::thread::Builder::new()
            .name("tagdir-watch".to_owned())
            .spawn(move || EntityPathWatcher::event_loop(&weak, &rx))?;
        *watcher.thread.lock() = Some(handle);

        let conn = sql::get_conn(&watcher.db_path)?;
        for path in sql::all_entity_paths(&conn)? {
            watcher.schedule_if_new_path(&path);
        }

        Ok(watcher)
    }

    fn event_loop(watcher: &Weak<EntityPathWatcher>, rx: &mpsc::Receiver<notify::Result<Event>>) {
        // the channel closes when the backend is dropped on stop()
        while let Ok(res) = rx.recv() {
            match res {
                Ok(event) => match watcher.upgrade() {
                    Some(watcher) => watcher.handle_event(event),
                    None => break,
                },
                Err(e) => warn!(target: WATCH_TAG, "Watch backend error: {:?}", e),
            }
        }
        debug!(target: WATCH_TAG, "Event thread exiting");
    }

    fn handle_event(&self, event: Event) {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let src = event.paths[0].clone();
                let dst = event.paths[1].clone();
                if let Err(e) = self.entity_moved(&src, &dst) {
                    warn!(
                        target: WATCH_TAG,
                        "Couldn't process rename {:?} -> {:?}: {}", src, dst, e
                    );
                }
            }
            EventKind::Remove(_) => {
                if let Some(src) = event.paths.first() {
                    if let Err(e) = self.entity_deleted(src) {
                        warn!(
                            target: WATCH_TAG,
                            "Couldn't process removal of {:?}: {}", src, e
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// A watched directory was renamed.  If it backs a registered entity, the
    /// entity follows it: new name, new real path, and a watch on the new
    /// parent.
    fn entity_moved(&self, src: &Path, dst: &Path) -> TagdirResult<()> {
        let src_name = common::get_filename(src)?.to_owned();
        let dst_name = common::get_filename(dst)?.to_owned();

        let mut conn = sql::get_conn(&self.db_path)?;
        let updated = txn::scope(&mut conn, |tx| {
            match sql::entity_by_name_and_path(tx, &src_name, src)? {
                Some(entity) => {
                    sql::update_entity_path(tx, entity.id, &dst_name, dst)?;
                    Ok::<bool, TagdirError>(true)
                }
                None => Ok(false),
            }
        })?;

        if updated {
            info!(
                target: WATCH_TAG,
                "Destination of {} changed from {:?} to {:?}", dst_name, src, dst
            );
            self.schedule_if_new_path(dst);
        }
        Ok(())
    }

    /// A watched directory was removed; an entity without a backing
    /// directory has nothing left to point at.
    fn entity_deleted(&self, src: &Path) -> TagdirResult<()> {
        let src_name = common::get_filename(src)?.to_owned();

        let mut conn = sql::get_conn(&self.db_path)?;
        let deleted = txn::scope(&mut conn, |tx| {
            match sql::entity_by_name_and_path(tx, &src_name, src)? {
                Some(entity) => {
                    sql::delete_entity(tx, &entity)?;
                    Ok::<bool, TagdirError>(true)
                }
                None => Ok(false),
            }
        })?;

        if deleted {
            info!(
                target: WATCH_TAG,
                "{} removed because its destination {:?} was removed", src_name, src
            );
            self.unschedule_redundant_handlers();
        }
        Ok(())
    }

    /// Adds a watch on `path`'s parent directory, unless one exists already.
    pub fn schedule_if_new_path(&self, path: &Path) {
        let parent = match path.parent() {
            Some(parent) => parent.to_owned(),
            None => return,
        };

        let mut state = self.state.lock();
        if state.watched.contains(&parent) {
            return;
        }
        let backend = match state.backend.as_mut() {
            Some(backend) => backend,
            None => return,
        };
        match backend.watch(&parent, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!(target: WATCH_TAG, "Added handler for {:?}", parent);
                state.watched.insert(parent);
            }
            Err(e) => warn!(target: WATCH_TAG, "Couldn't watch {:?}: {:?}", parent, e),
        }
    }

    /// Drops watches whose directory no longer parents any registered
    /// entity.  Safe to call repeatedly; the store is read without holding
    /// the watch lock, so a racing registration just converges on a later
    /// call.
    pub fn unschedule_redundant_handlers(&self) {
        let live_parents: HashSet<PathBuf> = match sql::get_conn(&self.db_path)
            .and_then(|conn| sql::all_entity_paths(&conn))
        {
            Ok(paths) => paths
                .iter()
                .filter_map(|p| p.parent().map(Path::to_path_buf))
                .collect(),
            Err(e) => {
                warn!(
                    target: WATCH_TAG,
                    "Couldn't read entity paths, keeping watches: {:?}", e
                );
                return;
            }
        };

        let mut state = self.state.lock();
        let stale: Vec<PathBuf> = state
            .watched
            .iter()
            .filter(|dir| !live_parents.contains(*dir))
            .cloned()
            .collect();

        for dir in stale {
            debug!(target: WATCH_TAG, "Dropping handler for {:?}", dir);
            if let Some(backend) = state.backend.as_mut() {
                if let Err(e) = backend.unwatch(&dir) {
                    warn!(target: WATCH_TAG, "Couldn't unwatch {:?}: {:?}", dir, e);
                }
            }
            state.watched.remove(&dir);
        }
    }

    /// The directories currently under watch.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().watched.iter().cloned().collect()
    }

    /// Shuts the watcher down and joins the event thread.
    pub fn stop(&self) {
        debug!(target: WATCH_TAG, "Stopping watcher");
        {
            let mut state = self.state.lock();
            state.backend = None;
            state.watched.clear();
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}
