// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The FUSE adapter: translates kernel filesystem requests into tree
//! operations.
//!
//! The `Filesystem` trait methods are thin shims over errno-returning core
//! functions so the protocol mapping can be exercised without a kernel
//! mount. All file sizes are reported as zero — contents are rendered on
//! demand — so opens reply with `FOPEN_DIRECT_IO` and clients read until
//! the stream runs dry.

use crate::aggregator::AggStream;
use crate::arena::ROOT_INO;
use crate::tree::{AttrData, DirEntry, OpenKind, Tree};

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use log::debug;

/// Entries stay valid for a long time; attributes are cheap to refresh.
const TTL_ENTRY: Duration = Duration::from_secs(3600);
const TTL_ATTR: Duration = Duration::from_secs(1);

/// Scalar renderings are small; one fixed buffer per open handle.
const READ_BUFFER_SIZE: usize = 100;

const BLOCK_SIZE: u32 = 4096;

pub(crate) struct VitalsFs {
    tree: Arc<Tree>,
    handles: HashMap<u64, Handle>,
    next_fh: u64,
}

enum Handle {
    Value { buf: Vec<u8> },
    Aggregator { stream: AggStream },
}

impl VitalsFs {
    pub fn new(tree: Arc<Tree>) -> Self {
        Self {
            tree,
            handles: HashMap::new(),
            next_fh: 1,
        }
    }

    fn attr(&self, data: &AttrData) -> FileAttr {
        let (kind, perm, nlink) = if data.is_dir {
            (
                FileType::Directory,
                0o755,
                if data.ino == ROOT_INO { 2 } else { 1 },
            )
        } else {
            (
                FileType::RegularFile,
                if data.writable { 0o666 } else { 0o444 },
                1,
            )
        };

        FileAttr {
            ino: data.ino,
            size: 0,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind,
            perm,
            nlink,
            uid: self.tree.uid,
            gid: self.tree.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn do_lookup(&mut self, parent: u64, name: &OsStr) -> Result<(FileAttr, u64), c_int> {
        let name = name.to_str().ok_or(libc::ENOENT)?;
        let (data, generation) = self.tree.fs_lookup(parent, name).map_err(|e| e.errno())?;
        Ok((self.attr(&data), generation))
    }

    fn do_getattr(&self, ino: u64) -> Result<FileAttr, c_int> {
        let data = self.tree.fs_getattr(ino).map_err(|e| e.errno())?;
        Ok(self.attr(&data))
    }

    fn do_setattr(&self, ino: u64, size: Option<u64>, other_set: bool) -> Result<FileAttr, c_int> {
        if !self.tree.fs_writable(ino).map_err(|e| e.errno())? {
            return Err(libc::EPERM);
        }
        // only truncate-before-write is supported
        if size.is_none() || other_set {
            return Err(libc::EINVAL);
        }
        self.do_getattr(ino)
    }

    fn do_open(&mut self, ino: u64, flags: i32) -> Result<u64, c_int> {
        let read_only = flags & libc::O_ACCMODE == libc::O_RDONLY;
        let kind = self.tree.fs_open(ino, read_only).map_err(|e| e.errno())?;

        let handle = match kind {
            OpenKind::Value => Handle::Value {
                buf: Vec::with_capacity(READ_BUFFER_SIZE),
            },
            OpenKind::Aggregator { parent } => Handle::Aggregator {
                stream: AggStream::new(parent),
            },
        };

        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(fh, handle);
        Ok(fh)
    }

    fn do_read(&mut self, ino: u64, fh: u64, offset: i64, size: u32) -> Result<&[u8], c_int> {
        let handle = self.handles.get_mut(&fh).ok_or(libc::EBADF)?;
        match handle {
            Handle::Value { buf } => {
                if offset == 0 {
                    *buf = self
                        .tree
                        .fs_render(ino, READ_BUFFER_SIZE)
                        .map_err(|e| e.errno())?;
                }
                let offset = offset.max(0) as usize;
                if offset >= buf.len() {
                    return Ok(&[]);
                }
                let end = buf.len().min(offset + size as usize);
                Ok(&buf[offset..end])
            }
            Handle::Aggregator { stream } => {
                Ok(stream.read(&self.tree, offset, size as usize))
            }
        }
    }

    fn do_write(&self, ino: u64, data: &[u8]) -> Result<u32, c_int> {
        self.tree.fs_write(ino, data).map_err(|e| e.errno())?;
        Ok(data.len() as u32)
    }

    fn do_release(&mut self, ino: u64, fh: u64) {
        if let Some(Handle::Aggregator { mut stream }) = self.handles.remove(&fh) {
            stream.release(&self.tree);
        }
        self.tree.fs_release(ino);
    }

    fn do_readdir(&self, ino: u64) -> Result<Vec<DirEntry>, c_int> {
        self.tree.fs_readdir(ino).map_err(|e| e.errno())
    }
}

impl Filesystem for VitalsFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.do_lookup(parent, name) {
            Ok((attr, generation)) => reply.entry(&TTL_ENTRY, &attr, generation),
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.tree.fs_forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&TTL_ATTR, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        ctime: Option<SystemTime>,
        _fh: Option<u64>,
        crtime: Option<SystemTime>,
        chgtime: Option<SystemTime>,
        bkuptime: Option<SystemTime>,
        flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let other_set = mode.is_some()
            || uid.is_some()
            || gid.is_some()
            || atime.is_some()
            || mtime.is_some()
            || ctime.is_some()
            || crtime.is_some()
            || chgtime.is_some()
            || bkuptime.is_some()
            || flags.is_some();

        match self.do_setattr(ino, size, other_set) {
            Ok(attr) => reply.attr(&TTL_ATTR, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.tree.fs_opendir(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
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
        let entries = match self.do_readdir(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        for (i, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
            let kind = if entry.is_dir {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            if reply.add(entry.ino, (i + 1) as i64, kind, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.tree.fs_releasedir(ino);
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.do_open(ino, flags) {
            Ok(fh) => reply.opened(fh, FOPEN_DIRECT_IO),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.do_read(ino, fh, offset, size) {
            Ok(data) => reply.data(data),
            Err(errno) => reply.error(errno),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.do_write(ino, data) {
            Ok(written) => reply.written(written),
            Err(errno) => reply.error(errno),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.do_release(ino, fh);
        reply.ok();
    }

    fn destroy(&mut self) {
        debug!("statistics filesystem session ended");
    }
}
