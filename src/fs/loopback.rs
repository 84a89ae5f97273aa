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

use crate::fs::attr::FileStat;
use crate::fs::err::FsResult;
use log::debug;
use nix::sys::stat::Mode;
use nix::unistd::AccessFlags;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};

const LOOPBACK_TAG: &str = "loopback";

/// The pass-through seam.  Once the dispatcher has resolved a virtual path to
/// a real one, the operation is handed to a `Loopback`, and whatever it
/// returns (value or errno) is propagated unchanged.  File I/O happens in two
/// steps: `open`/`create` hand back a handle, and `read`/`write`/`flush`/
/// `release` operate on that handle alone.
pub trait Loopback {
    fn access(&self, path: &Path, mode: i32) -> FsResult<()>;
    fn getattr(&self, path: &Path) -> FsResult<FileStat>;
    fn readdir(&self, path: &Path) -> FsResult<Vec<String>>;
    fn readlink(&self, path: &Path) -> FsResult<PathBuf>;
    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()>;
    fn rmdir(&self, path: &Path) -> FsResult<()>;
    /// Creates `link` pointing at `original`.
    fn symlink(&self, link: &Path, original: &Path) -> FsResult<()>;
    fn unlink(&self, path: &Path) -> FsResult<()>;
    fn create(&self, path: &Path, mode: u32, flags: i32) -> FsResult<u64>;
    fn open(&self, path: &Path, flags: i32) -> FsResult<u64>;
    fn read(&self, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>>;
    fn write(&self, fh: u64, data: &[u8], offset: i64) -> FsResult<u32>;
    fn truncate(&self, path: &Path, size: i64) -> FsResult<()>;
    fn flush(&self, fh: u64) -> FsResult<()>;
    fn release(&self, fh: u64) -> FsResult<()>;
}

// O_RDONLY is zero, so read access can't be bit-tested for; start from it
// and let the write flags override
fn open_opts_from_flags(opts: &mut OpenOptions, flags: i32) -> &mut OpenOptions {
    let mut fopts = opts.read(true).write(false);
    if flags & libc::O_RDWR > 0 {
        fopts = fopts.read(true).write(true);
    } else if flags & libc::O_WRONLY > 0 {
        fopts = fopts.read(false).write(true);
    }
    if flags & libc::O_APPEND > 0 {
        fopts = fopts.append(true);
    }
    fopts
}

/// The real loopback: every operation is the plain syscall against the
/// resolved path or the raw fd.
#[derive(Debug, Default)]
pub struct PassthroughFs;

impl PassthroughFs {
    pub fn new() -> Self {
        PassthroughFs
    }
}

impl Loopback for PassthroughFs {
    fn access(&self, path: &Path, mode: i32) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "access {:?} mode {:o}", path, mode);
        nix::unistd::access(path, AccessFlags::from_bits_truncate(mode))?;
        Ok(())
    }

    fn getattr(&self, path: &Path) -> FsResult<FileStat> {
        debug!(target: LOOPBACK_TAG, "lstat {:?}", path);
        let st = nix::sys::stat::lstat(path)?;
        Ok(FileStat {
            st_mode: st.st_mode as u32,
            st_nlink: st.st_nlink as u32,
            st_uid: st.st_uid,
            st_gid: st.st_gid,
            st_size: st.st_size,
            st_atime: st.st_atime,
            st_mtime: st.st_mtime,
            st_ctime: st.st_ctime,
        })
    }

    fn readdir(&self, path: &Path) -> FsResult<Vec<String>> {
        debug!(target: LOOPBACK_TAG, "readdir {:?}", path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(entries)
    }

    fn readlink(&self, path: &Path) -> FsResult<PathBuf> {
        debug!(target: LOOPBACK_TAG, "readlink {:?}", path);
        Ok(std::fs::read_link(path)?)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "mkdir {:?} mode {:o}", path, mode);
        nix::unistd::mkdir(path, Mode::from_bits_truncate(mode as libc::mode_t))?;
        Ok(())
    }

    fn rmdir(&self, path: &Path) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "rmdir {:?}", path);
        std::fs::remove_dir(path)?;
        Ok(())
    }

    fn symlink(&self, link: &Path, original: &Path) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "symlink {:?} -> {:?}", link, original);
        std::os::unix::fs::symlink(original, link)?;
        Ok(())
    }

    fn unlink(&self, path: &Path) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "unlink {:?}", path);
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn create(&self, path: &Path, mode: u32, flags: i32) -> FsResult<u64> {
        debug!(
            target: LOOPBACK_TAG,
            "create {:?} mode {:o} flags {:#x}", path, mode, flags
        );
        let mut opts = OpenOptions::new();
        let handle = open_opts_from_flags(&mut opts, flags)
            .create(true)
            .mode(mode)
            .open(path)?;
        Ok(handle.into_raw_fd() as u64)
    }

    fn open(&self, path: &Path, flags: i32) -> FsResult<u64> {
        debug!(target: LOOPBACK_TAG, "open {:?} flags {:#x}", path, flags);
        let mut opts = OpenOptions::new();
        let handle = open_opts_from_flags(&mut opts, flags).open(path)?;
        Ok(handle.into_raw_fd() as u64)
    }

    fn read(&self, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>> {
        debug!(
            target: LOOPBACK_TAG,
            "read fd {} for {} bytes, offset {}", fh, size, offset
        );
        let mut buf = vec![0_u8; size as usize];
        let read = unsafe {
            libc::pread(
                fh as i32,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                offset,
            )
        };
        if read == -1 {
            Err(std::io::Error::last_os_error().into())
        } else {
            buf.truncate(read as usize);
            Ok(buf)
        }
    }

    fn write(&self, fh: u64, data: &[u8], offset: i64) -> FsResult<u32> {
        debug!(
            target: LOOPBACK_TAG,
            "write fd {} for {} bytes, offset {}", fh, data.len(), offset
        );
        let written = unsafe {
            libc::pwrite(
                fh as i32,
                data.as_ptr() as *const libc::c_void,
                data.len(),
                offset,
            )
        };
        if written == -1 {
            Err(std::io::Error::last_os_error().into())
        } else {
            Ok(written as u32)
        }
    }

    fn truncate(&self, path: &Path, size: i64) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "truncate {:?} to {}", path, size);
        nix::unistd::truncate(path, size)?;
        Ok(())
    }

    fn flush(&self, fh: u64) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "fsync fd {}", fh);
        let err = unsafe { libc::fsync(fh as i32) };
        if err == -1 {
            Err(std::io::Error::last_os_error().into())
        } else {
            Ok(())
        }
    }

    // the kernel tells us every handle to the fd is gone; the fd is ours, so
    // this is where it gets closed
    fn release(&self, fh: u64) -> FsResult<()> {
        debug!(target: LOOPBACK_TAG, "close fd {}", fh);
        let err = unsafe { libc::close(fh as i32) };
        if err == -1 {
            Err(std::io::Error::last_os_error().into())
        } else {
            Ok(())
        }
    }
}
