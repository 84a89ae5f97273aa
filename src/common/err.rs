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

use std::error::Error;
use std::path::PathBuf;

pub type TagdirResult<T> = Result<T, TagdirError>;

pub enum TagdirError {
    BadTagName(String),
    TagNotFound(String),
    EntityNotFound(String),
    InvalidPath(PathBuf),
    /// An entity with this name is already registered under a different real
    /// path.
    PathCollision(String, PathBuf),
    NotADirectory(PathBuf),
    /// Xattrs only exist on the entinfo pseudo-file.
    NoXattrSupport(PathBuf),
    MissingXattrKey(String),
    DatabaseError(rusqlite::Error),
    WatchError(notify::Error),
    IOError(std::io::Error),
}

impl From<rusqlite::Error> for TagdirError {
    fn from(e: rusqlite::Error) -> Self {
        TagdirError::DatabaseError(e)
    }
}

impl From<notify::Error> for TagdirError {
    fn from(e: notify::Error) -> Self {
        TagdirError::WatchError(e)
    }
}

impl From<std::io::Error> for TagdirError {
    fn from(e: std::io::Error) -> Self {
        TagdirError::IOError(e)
    }
}

impl Error for TagdirError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TagdirError::DatabaseError(e) => Some(e),
            TagdirError::WatchError(e) => Some(e),
            TagdirError::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagdirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            TagdirError::BadTagName(tag) => write!(f, "Invalid tag name: {}", tag),
            TagdirError::TagNotFound(tag) => write!(f, "No such tag: {}", tag),
            TagdirError::EntityNotFound(ent) => write!(f, "No such entity: {}", ent),
            TagdirError::InvalidPath(path) => write!(f, "Invalid path {}", path.display()),
            TagdirError::PathCollision(ent, path) => write!(
                f,
                "Entity {} is already registered at {}",
                ent,
                path.display()
            ),
            TagdirError::NotADirectory(path) => {
                write!(f, "{} is not a directory", path.display())
            }
            TagdirError::NoXattrSupport(path) => {
                write!(f, "{} doesn't carry xattrs", path.display())
            }
            TagdirError::MissingXattrKey(key) => write!(f, "No xattr entry for {}", key),
            TagdirError::DatabaseError(dbe) => write!(f, "Database error: {:?}", dbe),
            TagdirError::WatchError(we) => write!(f, "Watch error: {:?}", we),
            TagdirError::IOError(e) => write!(f, "IO error: {:?}", e),
        }
    }
}

impl std::fmt::Debug for TagdirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(self, f)
    }
}
