//! Process-shared progress counters: `total_files`, `parsed_files` and the `done` flag.
//!
//! The counters live in a small memory map. The orchestrator creates a file-backed map per task
//! and hands its path to the worker process, which opens the same file; both sides then see the
//! same three atomics. In-process users (foreground crawl, tests) use an anonymous map.

use anyhow::{Context, Result};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ProgressSnapshot;

const SLOT_TOTAL: usize = 0;
const SLOT_PARSED: usize = 1;
const SLOT_DONE: usize = 2;
const SLOTS: usize = 3;
const MAP_LEN: usize = SLOTS * std::mem::size_of::<u64>();

/// Handle to the shared counters. Cheap to share by reference across threads.
pub struct SharedProgress {
    map: MmapMut,
}

impl SharedProgress {
    /// Counters private to this process (all zero).
    pub fn anonymous() -> Result<Self> {
        let map = MmapMut::map_anon(MAP_LEN).context("map anonymous progress counters")?;
        Ok(Self { map })
    }

    /// Create (or reset) the progress file at `path`, zeroed, and map it.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create progress dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create progress file {}", path.display()))?;
        file.set_len(MAP_LEN as u64)
            .context("size progress file")?;
        let map = unsafe { MmapMut::map_mut(&file) }.context("map progress file")?;
        Ok(Self { map })
    }

    /// Map an existing progress file created by [`SharedProgress::create`].
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open progress file {}", path.display()))?;
        let len = file.metadata().context("stat progress file")?.len();
        if len < MAP_LEN as u64 {
            anyhow::bail!(
                "progress file {} is {} bytes, expected {}",
                path.display(),
                len,
                MAP_LEN
            );
        }
        let map = unsafe { MmapMut::map_mut(&file) }.context("map progress file")?;
        Ok(Self { map })
    }

    fn slot(&self, i: usize) -> &AtomicU64 {
        debug_assert!(i < SLOTS);
        // The map is page aligned and at least MAP_LEN long; every access goes through atomics.
        unsafe { &*(self.map.as_ptr().add(i * std::mem::size_of::<u64>()) as *const AtomicU64) }
    }

    pub fn add_total(&self, n: u64) {
        self.slot(SLOT_TOTAL).fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_total(&self, n: u64) {
        self.slot(SLOT_TOTAL).store(n, Ordering::Relaxed);
    }

    /// Increment `parsed_files`; returns the new value.
    pub fn inc_parsed(&self) -> u64 {
        self.slot(SLOT_PARSED).fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark the work complete. Call once, after the last flush.
    pub fn set_done(&self) {
        self.slot(SLOT_DONE).store(1, Ordering::Release);
    }

    pub fn total(&self) -> u64 {
        self.slot(SLOT_TOTAL).load(Ordering::Relaxed)
    }

    pub fn parsed(&self) -> u64 {
        self.slot(SLOT_PARSED).load(Ordering::Relaxed)
    }

    pub fn is_done(&self) -> bool {
        self.slot(SLOT_DONE).load(Ordering::Acquire) != 0
    }

    pub fn snapshot(&self, task_id: i64) -> ProgressSnapshot {
        ProgressSnapshot {
            parsed: self.parsed(),
            total: self.total(),
            id: task_id,
        }
    }
}
