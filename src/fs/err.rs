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

use crate::common::err::TagdirError;
use core::fmt;
use nix::errno::Errno;
use std::error::Error;
use std::fmt::Formatter;

pub type FsResult<T> = Result<T, FsError>;

/// The error type every filesystem operation resolves to.  It carries the
/// errno reported to the kernel, plus the originating error for the logs.
pub struct FsError {
    pub errno: Errno,
    pub original: Option<Box<dyn Error + Send + Sync>>,
}

impl FsError {
    /// The numeric errno handed to the FUSE reply.
    pub fn raw(&self) -> i32 {
        self.errno as i32
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.errno, self.original)
    }
}

impl fmt::Debug for FsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Error for FsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.original {
            Some(e) => Some(e.as_ref()),
            None => None,
        }
    }
}

impl From<Errno> for FsError {
    fn from(errno: Errno) -> Self {
        Self {
            errno,
            original: None,
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        Self {
            errno: Errno::from_raw(e.raw_os_error().unwrap_or(Errno::EIO as i32)),
            original: Some(Box::new(e)),
        }
    }
}

impl From<rusqlite::Error> for FsError {
    fn from(e: rusqlite::Error) -> Self {
        Self {
            errno: Errno::EIO,
            original: Some(Box::new(e)),
        }
    }
}

impl From<TagdirError> for FsError {
    fn from(e: TagdirError) -> Self {
        let errno = match &e {
            TagdirError::BadTagName(_) => Errno::EINVAL,
            TagdirError::TagNotFound(_) => Errno::ENOENT,
            TagdirError::EntityNotFound(_) => Errno::ENOENT,
            TagdirError::InvalidPath(_) => Errno::EINVAL,
            TagdirError::PathCollision(_, _) => Errno::EINVAL,
            TagdirError::NotADirectory(_) => Errno::ENOTDIR,
            TagdirError::NoXattrSupport(_) => Errno::ENOTSUP,
            TagdirError::MissingXattrKey(_) => Errno::ENODATA,
            TagdirError::DatabaseError(_) => Errno::EIO,
            TagdirError::WatchError(_) => Errno::EIO,
            TagdirError::IOError(ioe) => {
                Errno::from_raw(ioe.raw_os_error().unwrap_or(Errno::EIO as i32))
            }
        };
        Self {
            errno,
            original: Some(Box::new(e)),
        }
    }
}
