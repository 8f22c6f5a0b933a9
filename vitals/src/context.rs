// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The mount lifecycle: create, serve, stop, tear down.

use crate::formatter::{Simple, StartEnd};
use crate::fs::VitalsFs;
use crate::item::ItemId;
use crate::tree::{SeriesU64Handle, Tree};
use crate::{Error, Result};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::Arc;

use fuser::{MountOption, Session, SessionUnmounter};
use log::{debug, warn};
use parking_lot::Mutex;
use vitals_stats::{HistogramU32, SeriesU64};

/// A statistics tree mounted as a filesystem.
///
/// `create` mounts, [`run`](Self::run) serves (blocking, from a dedicated
/// thread), [`stop`](Self::stop) makes `run` return. Registration methods
/// may be called from any thread at any point in between.
///
/// ```no_run
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// fn main() -> vitals::Result<()> {
///     let vitals = Arc::new(vitals::Vitals::create("/run/myapp-stats")?);
///
///     let requests = Arc::new(AtomicU64::new(0));
///     vitals.create_u64(None, "requests", &requests)?;
///
///     let server = Arc::clone(&vitals);
///     let looper = std::thread::spawn(move || server.run());
///
///     requests.fetch_add(1, Ordering::Relaxed);
///     // ... `cat /run/myapp-stats/requests` now reads "1" ...
///
///     vitals.stop();
///     looper.join().unwrap()
/// }
/// ```
pub struct Vitals {
    tree: Arc<Tree>,
    session: Mutex<Option<Session<VitalsFs>>>,
    unmounter: Mutex<Option<SessionUnmounter>>,
    mountpoint: PathBuf,
}

impl Vitals {
    /// Mount a fresh statistics tree at `mountpoint`, creating the
    /// directory if it does not exist.
    pub fn create(mountpoint: impl AsRef<Path>) -> Result<Self> {
        let mountpoint = mountpoint.as_ref().to_path_buf();
        match std::fs::create_dir(&mountpoint) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Error::Mount(e)),
        }

        let tree = Arc::new(Tree::new());
        let options = [
            MountOption::FSName("vitals".to_string()),
            MountOption::AutoUnmount,
        ];
        let mut session = Session::new(VitalsFs::new(Arc::clone(&tree)), &mountpoint, &options)?;
        let unmounter = session.unmount_callable();
        debug!("mounted statistics tree at {}", mountpoint.display());

        Ok(Self {
            tree,
            session: Mutex::new(Some(session)),
            unmounter: Mutex::new(Some(unmounter)),
            mountpoint,
        })
    }

    /// Service filesystem requests until [`stop`](Self::stop) is called or
    /// the tree is unmounted externally. Must be called exactly once, from
    /// a dedicated thread.
    pub fn run(&self) -> Result<()> {
        let mut session = self.session.lock().take().ok_or(Error::InvalidArgument)?;
        session.run()?;
        debug!("serving loop for {} exited", self.mountpoint.display());
        Ok(())
    }

    /// Make [`run`](Self::run) return. Unmounting doubles as the wake-up:
    /// the serving loop only notices shutdown on filesystem activity.
    pub fn stop(&self) {
        if let Some(mut unmounter) = self.unmounter.lock().take() {
            if let Err(e) = unmounter.unmount() {
                warn!("unmount of {} failed: {}", self.mountpoint.display(), e);
            }
        }
    }

    /// Where this tree is mounted.
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// The backing tree, for callers that want to hold it directly.
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// The root directory; registrations passing `None` land here.
    pub fn root(&self) -> ItemId {
        self.tree.root()
    }

    /// True if `item` was issued by this context.
    pub fn owns(&self, item: ItemId) -> bool {
        self.tree.owns(item)
    }

    pub fn lookup_item(&self, parent: Option<ItemId>, name: &str) -> Option<ItemId> {
        self.tree.lookup_item(parent, name)
    }

    pub fn create_directory(&self, parent: Option<ItemId>, name: &str) -> Result<ItemId> {
        self.tree.create_directory(parent, name)
    }

    pub fn create_simple(&self, parent: Option<ItemId>, descriptors: Vec<Simple>) -> Result<()> {
        self.tree.create_simple(parent, descriptors)
    }

    pub fn create_start_end(
        &self,
        parent: Option<ItemId>,
        descriptors: Vec<StartEnd>,
    ) -> Result<()> {
        self.tree.create_start_end(parent, descriptors)
    }

    pub fn create_u64_series(
        &self,
        parent: Option<ItemId>,
        name: &str,
        series: &Arc<SeriesU64>,
    ) -> Result<ItemId> {
        self.tree.create_u64_series(parent, name, series)
    }

    pub fn create_multiple_u64_series(
        &self,
        parent: Option<ItemId>,
        descriptors: Vec<SeriesU64Handle>,
    ) -> Result<()> {
        self.tree.create_multiple_u64_series(parent, descriptors)
    }

    pub fn create_histogram_u32_series(
        &self,
        parent: Option<ItemId>,
        name: &str,
        histogram: &Arc<HistogramU32>,
    ) -> Result<ItemId> {
        self.tree.create_histogram_u32_series(parent, name, histogram)
    }

    pub fn create_aggregator(&self, parent: Option<ItemId>, name: &str) -> Result<ItemId> {
        self.tree.create_aggregator(parent, name)
    }

    pub fn create_u64(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<AtomicU64>,
    ) -> Result<()> {
        self.tree.create_u64(parent, name, value)
    }

    pub fn create_u32(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<AtomicU32>,
    ) -> Result<()> {
        self.tree.create_u32(parent, name, value)
    }

    pub fn create_u64_parameter(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<AtomicU64>,
    ) -> Result<()> {
        self.tree.create_u64_parameter(parent, name, value)
    }

    pub fn create_u32_parameter(
        &self,
        parent: Option<ItemId>,
        name: &str,
        value: &Arc<AtomicU32>,
    ) -> Result<()> {
        self.tree.create_u32_parameter(parent, name, value)
    }

    pub fn remove(&self, item: ItemId) {
        self.tree.remove(item)
    }

    pub fn remove_by_name(&self, parent: Option<ItemId>, name: &str) -> Result<()> {
        self.tree.remove_by_name(parent, name)
    }
}

impl Drop for Vitals {
    fn drop(&mut self) {
        self.stop();
        // detach everything under the root so accumulators shared with the
        // host are released even if handles linger
        self.tree.remove(self.tree.root());
    }
}
