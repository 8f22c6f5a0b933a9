// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The statistics tree: registration, removal, lookup, and the reference
//! counting that keeps items alive while the kernel still knows about them.
//!
//! Application threads mutate the tree through the methods here while the
//! filesystem thread walks it to answer kernel requests; one coarse mutex
//! per tree serialises both sides. Accumulator hot paths never take this
//! mutex.
//!
//! An item is *registered* while it is reachable from the root. Removal
//! detaches: the registered flag is cleared, children are recursively
//! detached, and the tree's reference is dropped — but storage is released
//! only when the last reference (open handles, pinned aggregator cursors,
//! unforgotten kernel lookups) goes away.

use crate::arena::{Arena, ROOT_INO};
use crate::formatter::{parse_decimal, ReadFormatter, Simple, StartEnd, WriteFormatter};
use crate::item::{DirKind, Item, ItemId, Node, ValueFile};
use crate::{Error, Result};

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vitals_stats::{HistogramU32, ResetBlock, SeriesSnapshot, SeriesU64};

static NEXT_TOKEN: AtomicU32 = AtomicU32::new(0);

/// Registration descriptor pairing a name with a shared series accumulator.
pub struct SeriesU64Handle {
    pub name: String,
    pub series: Arc<SeriesU64>,
}

impl SeriesU64Handle {
    pub fn new(name: impl Into<String>, series: &Arc<SeriesU64>) -> Self {
        Self {
            name: name.into(),
            series: Arc::clone(series),
        }
    }
}

/// A hierarchical registry of statistics items.
///
/// The tree is usable on its own; mounting it is the job of
/// [`Vitals`](crate::Vitals), which serves a `Tree` over FUSE.
pub struct Tree {
    pub(crate) inner: Mutex<TreeInner>,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    token: u32,
}

pub(crate) struct TreeInner {
    pub arena: Arena,
}

/// Attribute data the filesystem adapter turns into a kernel stat reply.
pub(crate) struct AttrData {
    pub ino: u64,
    pub is_dir: bool,
    pub writable: bool,
}

/// One visible entry in a directory listing snapshot.
pub(crate) struct DirEntry {
    pub ino: u64,
    pub name: String,
    pub is_dir: bool,
}

/// What an open resolved to.
#[derive(Clone, Copy)]
pub(crate) enum OpenKind {
    Value,
    Aggregator { parent: u64 },
}

impl Tree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let mut root = Item::directory(".", DirKind::Plain);
        root.registered = true;
        root.refcount = 1;
        let root_ino = arena.insert(root);
        debug_assert_eq!(root_ino, ROOT_INO);

        Self {
            inner: Mutex::new(TreeInner { arena }),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The root directory. Registrations passing `None` as the parent land
    /// here.
    pub fn root(&self) -> ItemId {
        self.id(ROOT_INO)
    }

    /// True if `item` was issued by this tree.
    pub fn owns(&self, item: ItemId) -> bool {
        item.token == self.token
    }

    /// Create a sub-directory under `parent` (root when `None`).
    pub fn create_directory(&self, parent: Option<ItemId>, name: &str) -> Result<ItemId> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        let ino = inner.link_child(parent, Item::directory(name, DirKind::Plain))?;
        Ok(self.id(ino))
    }

    /// Register a batch of value files. Either every descriptor is
    /// registered or none is: on failure the already-created prefix is
    /// removed before the error is returned.
    pub fn create_simple(&self, parent: Option<ItemId>, descriptors: Vec<Simple>) -> Result<()> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        inner.create_simple_in(parent, descriptors)
    }

    /// Register `start`/`end` pairs, each grouped under its own
    /// sub-directory. Rolls back the created prefix on failure.
    pub fn create_start_end(&self, parent: Option<ItemId>, descriptors: Vec<StartEnd>) -> Result<()> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;

        let mut created = Vec::new();
        for descriptor in descriptors {
            match inner.start_end_in(parent, descriptor) {
                Ok(ino) => created.push(ino),
                Err(e) => {
                    for ino in created.into_iter().rev() {
                        inner.remove_ino(ino);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Create a series directory exporting the derived statistics of
    /// `series` plus its reset controls.
    pub fn create_u64_series(
        &self,
        parent: Option<ItemId>,
        name: &str,
        series: &Arc<SeriesU64>,
    ) -> Result<ItemId> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        let ino = inner.u64_series_in(parent, name, series)?;
        Ok(self.id(ino))
    }

    /// Register several series at once, rolling back the created prefix on
    /// failure.
    pub fn create_multiple_u64_series(
        &self,
        parent: Option<ItemId>,
        descriptors: Vec<SeriesU64Handle>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;

        let mut created = Vec::new();
        for descriptor in descriptors {
            match inner.u64_series_in(parent, &descriptor.name, &descriptor.series) {
                Ok(ino) => created.push(ino),
                Err(e) => {
                    for ino in created.into_iter().rev() {
                        inner.remove_ino(ino);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Create a histogram directory exporting scalars, one file per tracked
    /// fraction, and the reset controls.
    pub fn create_histogram_u32_series(
        &self,
        parent: Option<ItemId>,
        name: &str,
        histogram: &Arc<HistogramU32>,
    ) -> Result<ItemId> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        let ino = inner.histogram_in(parent, name, histogram)?;
        Ok(self.id(ino))
    }

    /// Create an aggregator file under `parent`. The file is hidden from
    /// directory listings but resolvable by name; reading it streams a dump
    /// of the parent's subtree.
    pub fn create_aggregator(&self, parent: Option<ItemId>, name: &str) -> Result<ItemId> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        let ino = inner.link_child(parent, Item::new(name, Node::Aggregator))?;
        Ok(self.id(ino))
    }

    /// Remove an item. Removing a directory detaches its whole subtree;
    /// removing the root only detaches the root's children. Removing an
    /// already-detached item is a no-op.
    pub fn remove(&self, item: ItemId) {
        let Some(ino) = self.own_ino(item) else {
            return;
        };
        let mut inner = self.inner.lock();
        if ino == ROOT_INO {
            inner.detach_children(ROOT_INO);
        } else {
            inner.remove_ino(ino);
        }
    }

    /// Look up `name` under `parent` and remove it.
    pub fn remove_by_name(&self, parent: Option<ItemId>, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent)?;
        let ino = inner.lookup_in(parent, name).ok_or(Error::NotFound)?;
        inner.remove_ino(ino);
        Ok(())
    }

    /// Find the child called `name` under `parent` (root when `None`).
    pub fn lookup_item(&self, parent: Option<ItemId>, name: &str) -> Option<ItemId> {
        let inner = self.inner.lock();
        let parent = self.resolve_dir(&inner, parent).ok()?;
        inner.lookup_in(parent, name).map(|ino| self.id(ino))
    }

    /// The accumulator behind a series directory, if `item` is one.
    pub fn u64_series(&self, item: ItemId) -> Option<Arc<SeriesU64>> {
        let ino = self.own_ino(item)?;
        let inner = self.inner.lock();
        match &inner.arena.get(ino)?.node {
            Node::Directory(d) => match &d.kind {
                DirKind::Series(series) => Some(Arc::clone(series)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The accumulator behind a histogram directory, if `item` is one.
    pub fn histogram_u32(&self, item: ItemId) -> Option<Arc<HistogramU32>> {
        let ino = self.own_ino(item)?;
        let inner = self.inner.lock();
        match &inner.arena.get(ino)?.node {
            Node::Directory(d) => match &d.kind {
                DirKind::Histogram(histogram) => Some(Arc::clone(histogram)),
                _ => None,
            },
            _ => None,
        }
    }

    fn id(&self, ino: u64) -> ItemId {
        ItemId {
            token: self.token,
            ino,
        }
    }

    fn own_ino(&self, item: ItemId) -> Option<u64> {
        (item.token == self.token).then_some(item.ino)
    }

    fn resolve_dir(&self, inner: &TreeInner, parent: Option<ItemId>) -> Result<u64> {
        let ino = match parent {
            None => ROOT_INO,
            Some(p) => self.own_ino(p).ok_or(Error::InvalidArgument)?,
        };
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }
        if !item.is_directory() {
            return Err(Error::InvalidArgument);
        }
        Ok(ino)
    }

    // filesystem-facing operations

    pub(crate) fn fs_lookup(&self, parent: u64, name: &str) -> Result<(AttrData, u64)> {
        let mut inner = self.inner.lock();

        let parent_item = inner.arena.get(parent).ok_or(Error::NotFound)?;
        if !parent_item.registered || !parent_item.is_directory() {
            return Err(Error::NotFound);
        }

        let ino = inner.lookup_in(parent, name).ok_or(Error::NotFound)?;
        let generation = inner.arena.generation(ino);
        let item = inner.arena.get_mut(ino).ok_or(Error::NotFound)?;
        item.refcount += 1;
        item.nlookup += 1;

        Ok((Self::attr_of(ino, item), generation))
    }

    pub(crate) fn fs_forget(&self, ino: u64, nlookup: u64) {
        let mut inner = self.inner.lock();
        let release = match inner.arena.get_mut(ino) {
            Some(item) => {
                let release = nlookup.min(item.nlookup);
                item.nlookup -= release;
                release
            }
            None => return,
        };
        inner.put_n(ino, release);
    }

    pub(crate) fn fs_getattr(&self, ino: u64) -> Result<AttrData> {
        let inner = self.inner.lock();
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }
        Ok(Self::attr_of(ino, item))
    }

    pub(crate) fn fs_opendir(&self, ino: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let item = inner.arena.get_mut(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }
        item.refcount += 1;
        Ok(())
    }

    pub(crate) fn fs_releasedir(&self, ino: u64) {
        self.inner.lock().put_n(ino, 1);
    }

    /// Snapshot the visible children of a directory. Aggregators are not
    /// listed.
    pub(crate) fn fs_readdir(&self, ino: u64) -> Result<Vec<DirEntry>> {
        let inner = self.inner.lock();
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }
        let dir = item.as_dir().ok_or(Error::InvalidArgument)?;

        let mut entries = Vec::with_capacity(dir.children.len());
        for &child in &dir.children {
            let Some(child_item) = inner.arena.get(child) else {
                continue;
            };
            if !child_item.registered || child_item.is_aggregator() {
                continue;
            }
            entries.push(DirEntry {
                ino: child,
                name: child_item.name.to_string(),
                is_dir: child_item.is_directory(),
            });
        }
        Ok(entries)
    }

    pub(crate) fn fs_open(&self, ino: u64, read_only: bool) -> Result<OpenKind> {
        let mut inner = self.inner.lock();

        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }

        let kind = match &item.node {
            Node::Value(v) => {
                if !read_only && v.write.is_none() {
                    return Err(Error::PermissionDenied);
                }
                OpenKind::Value
            }
            Node::Aggregator => {
                if !read_only {
                    return Err(Error::PermissionDenied);
                }
                OpenKind::Aggregator {
                    parent: item.parent.ok_or(Error::NotFound)?,
                }
            }
            Node::Directory(_) => return Err(Error::InvalidArgument),
        };

        inner.get_mut_expect(ino).refcount += 1;
        if let OpenKind::Aggregator { parent } = kind {
            // pin the parent so the sibling list survives while streaming
            inner.get_mut_expect(parent).refcount += 1;
        }
        Ok(kind)
    }

    pub(crate) fn fs_release(&self, ino: u64) {
        self.inner.lock().put_n(ino, 1);
    }

    /// Render a value file into at most `cap` bytes.
    pub(crate) fn fs_render(&self, ino: u64, cap: usize) -> Result<Vec<u8>> {
        let inner = self.inner.lock();
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        match &item.node {
            Node::Value(v) => {
                let mut out = String::new();
                (v.read)(v.tag, &mut out);
                let mut bytes = out.into_bytes();
                bytes.truncate(cap);
                Ok(bytes)
            }
            _ => Err(Error::Io),
        }
    }

    pub(crate) fn fs_write(&self, ino: u64, data: &[u8]) -> Result<()> {
        let inner = self.inner.lock();
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        match &item.node {
            Node::Value(v) => match &v.write {
                Some(write) => {
                    if write(v.tag, data) == 1 {
                        Ok(())
                    } else {
                        Err(Error::InvalidArgument)
                    }
                }
                None => Err(Error::Io),
            },
            _ => Err(Error::Io),
        }
    }

    pub(crate) fn fs_writable(&self, ino: u64) -> Result<bool> {
        let inner = self.inner.lock();
        let item = inner.arena.get(ino).ok_or(Error::NotFound)?;
        if !item.registered {
            return Err(Error::NotFound);
        }
        Ok(item.writable())
    }

    fn attr_of(ino: u64, item: &Item) -> AttrData {
        AttrData {
            ino,
            is_dir: item.is_directory(),
            writable: item.writable(),
        }
    }
}

/// Shortcuts for the common case of exposing a bare shared counter.
impl Tree {
    /// Register a read-only decimal view of a shared `u64`.
    pub fn create_u64(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<std::sync::atomic::AtomicU64>,
    ) -> Result<()> {
        self.create_simple(
            parent,
            vec![Simple::new(name, crate::formatter::u64_decimal(value))],
        )
    }

    /// Register a read-only decimal view of a shared `u32`.
    pub fn create_u32(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<std::sync::atomic::AtomicU32>,
    ) -> Result<()> {
        self.create_simple(
            parent,
            vec![Simple::new(name, crate::formatter::u32_decimal(value))],
        )
    }

    /// Register a tunable: readable and writable as a decimal `u64`.
    pub fn create_u64_parameter(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<std::sync::atomic::AtomicU64>,
    ) -> Result<()> {
        self.create_simple(
            parent,
            vec![Simple::new(name, crate::formatter::u64_decimal(value))
                .with_writer(crate::formatter::u64_decimal_writer(value))],
        )
    }

    /// Register a tunable: readable and writable as a decimal `u32`.
    pub fn create_u32_parameter(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<std::sync::atomic::AtomicU32>,
    ) -> Result<()> {
        self.create_simple(
            parent,
            vec![Simple::new(name, crate::formatter::u32_decimal(value))
                .with_writer(crate::formatter::u32_decimal_writer(value))],
        )
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeInner {
    pub fn lookup_in(&self, parent: u64, name: &str) -> Option<u64> {
        let hash = crate::item::name_hash(name);
        let dir = self.arena.get(parent)?.as_dir()?;
        for &child in &dir.children {
            if let Some(item) = self.arena.get(child) {
                if item.name_hash == hash && &*item.name == name {
                    return Some(child);
                }
            }
        }
        None
    }

    fn link_child(&mut self, parent: u64, mut item: Item) -> Result<u64> {
        if !crate::item::valid_name(&item.name) {
            return Err(Error::InvalidArgument);
        }
        if self.lookup_in(parent, &item.name).is_some() {
            return Err(Error::AlreadyExists);
        }

        item.parent = Some(parent);
        item.registered = true;
        item.refcount = 1;
        let ino = self.arena.insert(item);

        self.get_mut_expect(parent)
            .as_dir_mut()
            .expect("verified directory")
            .children
            .push(ino);
        Ok(ino)
    }

    fn create_simple_in(&mut self, parent: u64, descriptors: Vec<Simple>) -> Result<()> {
        let mut created = Vec::new();
        for descriptor in descriptors {
            let item = Item::new(
                &descriptor.name,
                Node::Value(ValueFile {
                    tag: descriptor.tag,
                    read: descriptor.read,
                    write: descriptor.write,
                }),
            );
            match self.link_child(parent, item) {
                Ok(ino) => created.push(ino),
                Err(e) => {
                    for ino in created.into_iter().rev() {
                        self.remove_ino(ino);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn start_end_in(&mut self, parent: u64, descriptor: StartEnd) -> Result<u64> {
        let dir = self.link_child(parent, Item::directory(&descriptor.name, DirKind::Plain))?;

        let files = vec![
            Simple::new("start", descriptor.start),
            Simple::new("end", descriptor.end),
        ];
        if let Err(e) = self.create_simple_in(dir, files) {
            self.remove_ino(dir);
            return Err(e);
        }
        Ok(dir)
    }

    fn u64_series_in(&mut self, parent: u64, name: &str, series: &Arc<SeriesU64>) -> Result<u64> {
        let dir = self.link_child(
            parent,
            Item::directory(name, DirKind::Series(Arc::clone(series))),
        )?;

        let mut files = vec![
            Simple::new("sum", series_field(series, |s| s.sum)),
            Simple::new("count", series_field(series, |s| s.count)),
            Simple::new("min", series_field(series, |s| s.min)),
            Simple::new("max", series_field(series, |s| s.max)),
            Simple::new("last", series_field(series, |s| s.last)),
            Simple::new("avg", series_field(series, |s| s.avg)),
            Simple::new("mean", series_field(series, |s| s.mean)),
            Simple::new("stddev", series_field(series, |s| s.stddev)),
        ];
        files.extend(reset_files(series, SeriesU64::reset_block));

        if let Err(e) = self.create_simple_in(dir, files) {
            self.remove_ino(dir);
            return Err(e);
        }
        Ok(dir)
    }

    fn histogram_in(
        &mut self,
        parent: u64,
        name: &str,
        histogram: &Arc<HistogramU32>,
    ) -> Result<u64> {
        let dir = self.link_child(
            parent,
            Item::directory(name, DirKind::Histogram(Arc::clone(histogram))),
        )?;

        let mut files = vec![
            Simple::new("sum", histogram_field(histogram, |s| s.sum)),
            Simple::new("count", histogram_field(histogram, |s| s.count)),
            Simple::new("last", histogram_field(histogram, |s| s.last)),
            Simple::new("avg", histogram_field(histogram, |s| s.avg)),
        ];
        for (index, fraction) in histogram.fractions().iter().enumerate() {
            files.push(
                Simple::new(format_sig4(fraction * 100.0), percentile_file(histogram))
                    .with_tag(index as u64),
            );
        }
        files.extend(reset_files(histogram, HistogramU32::reset_block));

        if let Err(e) = self.create_simple_in(dir, files) {
            self.remove_ino(dir);
            return Err(e);
        }
        Ok(dir)
    }

    fn remove_ino(&mut self, ino: u64) {
        let (is_dir, parent) = match self.arena.get_mut(ino) {
            Some(item) if item.registered => {
                item.registered = false;
                (item.is_directory(), item.parent.take())
            }
            _ => return,
        };

        if is_dir {
            self.detach_children(ino);
        }
        if let Some(parent) = parent {
            self.unlink(parent, ino);
        }
        self.put_n(ino, 1);
    }

    pub fn detach_children(&mut self, dir: u64) {
        let children = match self.arena.get_mut(dir).and_then(Item::as_dir_mut) {
            Some(dir) => std::mem::take(&mut dir.children),
            None => return,
        };

        for child in children {
            let is_dir = match self.arena.get_mut(child) {
                Some(item) => {
                    item.registered = false;
                    item.parent = None;
                    item.is_directory()
                }
                None => continue,
            };
            if is_dir {
                self.detach_children(child);
            }
            self.put_n(child, 1);
        }
    }

    fn unlink(&mut self, parent: u64, child: u64) {
        if let Some(dir) = self.arena.get_mut(parent).and_then(Item::as_dir_mut) {
            dir.children.retain(|&c| c != child);
        }
    }

    pub fn put_n(&mut self, ino: u64, n: u64) {
        if n == 0 {
            return;
        }
        let free = match self.arena.get_mut(ino) {
            Some(item) => {
                debug_assert!(item.refcount >= n);
                item.refcount = item.refcount.saturating_sub(n);
                item.refcount == 0
            }
            None => false,
        };
        if free {
            self.free(ino);
        }
    }

    fn free(&mut self, ino: u64) {
        if let Some(item) = self.arena.remove(ino) {
            debug_assert!(item.parent.is_none());
            debug_assert!(item.as_dir().map_or(true, |d| d.children.is_empty()));
        }
    }

    pub fn get_mut_expect(&mut self, ino: u64) -> &mut Item {
        self.arena.get_mut(ino).expect("item alive")
    }
}

fn series_field(series: &Arc<SeriesU64>, field: fn(&SeriesSnapshot) -> u64) -> ReadFormatter {
    let series = Arc::clone(series);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{}", field(&series.snapshot()));
    })
}

fn histogram_field(
    histogram: &Arc<HistogramU32>,
    field: fn(&vitals_stats::HistogramSnapshot) -> u64,
) -> ReadFormatter {
    let histogram = Arc::clone(histogram);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{}", field(&histogram.snapshot()));
    })
}

fn percentile_file(histogram: &Arc<HistogramU32>) -> ReadFormatter {
    let histogram = Arc::clone(histogram);
    Arc::new(move |tag, out| {
        let value = histogram
            .percentile_values()
            .get(tag as usize)
            .copied()
            .unwrap_or(0);
        let _ = writeln!(out, "{}", value);
    })
}

/// The `get_reset_interval_sec`, `reset`, and `reset_interval_sec` files
/// every series and histogram directory carries. Writing `1` to `reset`
/// schedules a clear; writing a number of seconds to `reset_interval_sec`
/// enables periodic clears.
fn reset_files<T>(owner: &Arc<T>, block: fn(&T) -> &ResetBlock) -> Vec<Simple>
where
    T: Send + Sync + 'static,
{
    let interval_read: ReadFormatter = {
        let owner = Arc::clone(owner);
        Arc::new(move |_tag, out| {
            let _ = writeln!(out, "{}", block(&owner).interval());
        })
    };

    let flag_read: ReadFormatter = {
        let owner = Arc::clone(owner);
        Arc::new(move |_tag, out| {
            let _ = writeln!(out, "{}", block(&owner).pending() as u32);
        })
    };

    let flag_write: WriteFormatter = {
        let owner = Arc::clone(owner);
        Arc::new(move |_tag, buf| match parse_decimal::<u32>(buf) {
            Some(1) => {
                block(&owner).request();
                1
            }
            _ => 0,
        })
    };

    let interval_write: WriteFormatter = {
        let owner = Arc::clone(owner);
        Arc::new(move |_tag, buf| match parse_decimal::<u64>(buf) {
            Some(secs) => {
                block(&owner).set_interval(secs);
                1
            }
            None => 0,
        })
    };

    vec![
        Simple::new("get_reset_interval_sec", Arc::clone(&interval_read)),
        Simple::new("reset", flag_read).with_writer(flag_write),
        Simple::new("reset_interval_sec", interval_read).with_writer(interval_write),
    ]
}

/// Formats with up to four significant digits, the way percentile files are
/// named: `10`, `99.99`, `100`.
fn format_sig4(x: f64) -> String {
    let digits_before = if x >= 1.0 {
        x.log10().floor() as i32 + 1
    } else {
        1
    };
    let precision = (4 - digits_before).max(0) as usize;
    let mut s = format!("{:.*}", precision, x);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_names() {
        assert_eq!(format_sig4(0.1 * 100.0), "10");
        assert_eq!(format_sig4(0.6 * 100.0), "60");
        assert_eq!(format_sig4(0.99 * 100.0), "99");
        assert_eq!(format_sig4(0.9999 * 100.0), "99.99");
        assert_eq!(format_sig4(0.5 * 100.0), "50");
        assert_eq!(format_sig4(1.0 * 100.0), "100");
        assert_eq!(format_sig4(0.005 * 100.0), "0.5");
    }

    #[test]
    fn handles_are_tree_scoped() {
        let a = Tree::new();
        let b = Tree::new();
        assert!(a.owns(a.root()));
        assert!(!a.owns(b.root()));
        assert!(b.create_directory(Some(a.root()), "dir").is_err());
    }
}
