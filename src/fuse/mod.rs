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

//! The kernel binding.  The kernel speaks inodes; the dispatcher speaks
//! virtual paths.  This adapter keeps the inode <-> path table and translates
//! each callback into one dispatcher call, handing every failure's errno back
//! to the kernel unchanged.

use crate::common::constants;
use crate::fs::attr::FileStat;
use crate::fs::loopback::Loopback;
use crate::fs::{FsOp, FsReply, TagdirFilesystem};
use fuser::{
    FileAttr, FileType, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};
use log::{debug, info};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const FUSE_TAG: &str = "fuse";
const BLOCK_SIZE: u32 = 512;

// attrs come out of the store, so the kernel may cache them only briefly;
// another process can retag at any time
const ATTR_TTL: Duration = Duration::from_secs(1);

struct InodeTable {
    by_ino: HashMap<u64, PathBuf>,
    by_path: HashMap<PathBuf, u64>,
    next: u64,
}

impl InodeTable {
    fn new() -> Self {
        let mut table = InodeTable {
            by_ino: HashMap::new(),
            by_path: HashMap::new(),
            next: fuser::FUSE_ROOT_ID + 1,
        };
        table
            .by_ino
            .insert(fuser::FUSE_ROOT_ID, PathBuf::from("/"));
        table.by_path.insert(PathBuf::from("/"), fuser::FUSE_ROOT_ID);
        table
    }

    fn path_of(&self, ino: u64) -> Option<PathBuf> {
        self.by_ino.get(&ino).cloned()
    }

    fn ino_of(&self, path: &Path) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    fn assign(&mut self, path: &Path) -> u64 {
        if let Some(ino) = self.by_path.get(path) {
            return *ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_ino.insert(ino, path.to_owned());
        self.by_path.insert(path.to_owned(), ino);
        ino
    }

    fn forget_path(&mut self, path: &Path) {
        if let Some(ino) = self.by_path.remove(path) {
            self.by_ino.remove(&ino);
        }
    }
}

fn timestamp(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH
    }
}

fn file_kind(stat: &FileStat) -> FileType {
    match stat.st_mode & libc::S_IFMT as u32 {
        mode if mode == libc::S_IFDIR as u32 => FileType::Directory,
        mode if mode == libc::S_IFLNK as u32 => FileType::Symlink,
        _ => FileType::RegularFile,
    }
}

fn to_file_attr(ino: u64, stat: &FileStat) -> FileAttr {
    let size = stat.st_size.max(0) as u64;
    FileAttr {
        ino,
        size,
        blocks: (size / u64::from(BLOCK_SIZE)) + 1,
        atime: timestamp(stat.st_atime),
        mtime: timestamp(stat.st_mtime),
        ctime: timestamp(stat.st_ctime),
        crtime: timestamp(stat.st_ctime),
        kind: file_kind(stat),
        perm: (stat.st_mode & 0o7777) as u16,
        nlink: stat.st_nlink.max(1),
        uid: stat.st_uid,
        gid: stat.st_gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

pub struct FuseAdapter<L: Loopback> {
    fs: TagdirFilesystem<L>,
    inodes: InodeTable,
}

impl<L: Loopback> FuseAdapter<L> {
    pub fn new(fs: TagdirFilesystem<L>) -> Self {
        FuseAdapter {
            fs,
            inodes: InodeTable::new(),
        }
    }

    fn call(&self, op: FsOp) -> Result<FsReply, i32> {
        self.fs.dispatch(op).map_err(|e| {
            debug!(target: FUSE_TAG, "Op failed: {}", e);
            e.raw()
        })
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        self.inodes.path_of(parent).map(|p| p.join(name))
    }

    /// Stats `vpath` and replies with a directory entry for it.
    fn reply_entry(&mut self, vpath: &Path, reply: ReplyEntry) {
        match self.call(FsOp::Getattr { path: vpath }) {
            Ok(FsReply::Stat(stat)) => {
                let ino = self.inodes.assign(vpath);
                reply.entry(&ATTR_TTL, &to_file_attr(ino, &stat), 0);
            }
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }
}

impl<L: Loopback> fuser::Filesystem for FuseAdapter<L> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.child_path(parent, name) {
            Some(vpath) => self.reply_entry(&vpath, reply),
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Getattr { path: &vpath }) {
            Ok(FsReply::Stat(stat)) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &stat)),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Readlink { path: &vpath }) {
            Ok(FsReply::Target(target)) => reply.data(target.as_os_str().as_bytes()),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let vpath = match self.child_path(parent, name) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Mkdir {
            path: &vpath,
            mode,
        }) {
            Ok(_) => self.reply_entry(&vpath, reply),
            Err(errno) => reply.error(errno),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let vpath = match self.child_path(parent, name) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Unlink { path: &vpath }) {
            Ok(_) => {
                self.inodes.forget_path(&vpath);
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let vpath = match self.child_path(parent, name) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Rmdir { path: &vpath }) {
            Ok(_) => {
                self.inodes.forget_path(&vpath);
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let vpath = match self.child_path(parent, link_name) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Symlink {
            target: &vpath,
            source: target,
        }) {
            Ok(_) => self.reply_entry(&vpath, reply),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        let names = match self.call(FsOp::Readdir { path: &vpath }) {
            Ok(FsReply::Entries(names)) => names,
            Ok(_) => return reply.error(libc::EIO),
            Err(errno) => return reply.error(errno),
        };

        let parent_ino = vpath
            .parent()
            .and_then(|p| self.inodes.ino_of(p))
            .unwrap_or(fuser::FUSE_ROOT_ID);

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_owned()),
            (parent_ino, FileType::Directory, "..".to_owned()),
        ];
        for name in names {
            let child = vpath.join(&name);
            // a racing untag can remove the child between the listing and
            // this stat; just skip it
            if let Ok(FsReply::Stat(stat)) = self.call(FsOp::Getattr { path: &child }) {
                let child_ino = self.inodes.assign(&child);
                entries.push((child_ino, file_kind(&stat), name));
            }
        }

        for (i, (entry_ino, kind, name)) in
            entries.into_iter().enumerate().skip(offset as usize)
        {
            let full = reply.add(entry_ino, (i + 1) as i64, kind, &name);
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Open {
            path: &vpath,
            flags,
        }) {
            Ok(FsReply::Handle(fh)) => reply.opened(fh, 0),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let vpath = match self.child_path(parent, name) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        let fh = match self.call(FsOp::Create {
            path: &vpath,
            mode,
            flags,
        }) {
            Ok(FsReply::Handle(fh)) => fh,
            Ok(_) => return reply.error(libc::EIO),
            Err(errno) => return reply.error(errno),
        };
        match self.call(FsOp::Getattr { path: &vpath }) {
            Ok(FsReply::Stat(stat)) => {
                let ino = self.inodes.assign(&vpath);
                reply.created(&ATTR_TTL, &to_file_attr(ino, &stat), 0, fh, 0);
            }
            Ok(_) => {
                let _ = self.call(FsOp::Release { fh });
                reply.error(libc::EIO);
            }
            Err(errno) => {
                let _ = self.call(FsOp::Release { fh });
                reply.error(errno);
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.call(FsOp::Read { fh, offset, size }) {
            Ok(FsReply::Data(bytes)) => reply.data(&bytes),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.call(FsOp::Write { fh, data, offset }) {
            Ok(FsReply::Written(written)) => reply.written(written),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    // truncation arrives as a setattr with a size; everything else in the
    // request is attr business the store owns, so it is left untouched
    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        if let Some(size) = size {
            if let Err(errno) = self.call(FsOp::Truncate {
                path: &vpath,
                size: size as i64,
            }) {
                return reply.error(errno);
            }
        }
        match self.call(FsOp::Getattr { path: &vpath }) {
            Ok(FsReply::Stat(stat)) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &stat)),
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.call(FsOp::Flush { fh }) {
            Ok(_) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.call(FsOp::Release { fh }) {
            Ok(_) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Access {
            path: &vpath,
            mode: mask,
        }) {
            Ok(_) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        let name = match name.to_str() {
            Some(name) => name,
            None => return reply.error(libc::EINVAL),
        };
        match self.call(FsOp::Getxattr { path: &vpath, name }) {
            Ok(FsReply::Bytes(value)) => {
                if size == 0 {
                    reply.size(value.len() as u32);
                } else if (size as usize) >= value.len() {
                    reply.data(&value);
                } else {
                    reply.error(libc::ERANGE);
                }
            }
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let vpath = match self.inodes.path_of(ino) {
            Some(vpath) => vpath,
            None => return reply.error(libc::ENOENT),
        };
        match self.call(FsOp::Listxattr { path: &vpath }) {
            Ok(FsReply::Names(names)) => {
                let mut buf = Vec::new();
                for name in names {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                }
                if size == 0 {
                    reply.size(buf.len() as u32);
                } else if (size as usize) >= buf.len() {
                    reply.data(&buf);
                } else {
                    reply.error(libc::ERANGE);
                }
            }
            Ok(_) => reply.error(libc::EIO),
            Err(errno) => reply.error(errno),
        }
    }
}

/// Mounts the filesystem and blocks until it is unmounted.
pub fn mount<L: Loopback + Send + 'static>(
    fs: TagdirFilesystem<L>,
    mountpoint: &Path,
    name: &str,
) -> std::io::Result<()> {
    let options = vec![
        MountOption::FSName(format!("{}{}", constants::FSNAME_PREFIX, name)),
        MountOption::AllowOther,
        MountOption::NoDev,
        MountOption::NoSuid,
    ];
    info!(
        target: FUSE_TAG,
        "Mounting {}{} at {:?}", constants::FSNAME_PREFIX, name, mountpoint
    );
    let adapter = FuseAdapter::new(fs);
    let mut session = fuser::Session::new(adapter, mountpoint, &options)?;
    session.run()
}
