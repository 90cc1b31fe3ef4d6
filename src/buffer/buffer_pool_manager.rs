use std::collections::HashMap;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{BufferId, MinirelError, PageId, Result};
use crate::storage::DiskManager;

use super::{BufferPool, ReadPageGuard, WritePageGuard};

/// BufferPoolManager services page requests out of a fixed set of in-memory
/// frames, reading from and writing back to the disk manager as frames are
/// rebound. Callers receive RAII guards that pin the frame for as long as
/// they hold a reference to its bytes.
///
/// Write-back is lazy: a dirty page reaches disk when its frame is evicted
/// or when `flush` is called. Guards must be dropped before `flush`;
/// operations are expected to run to completion without retaining page
/// references, so between public calls nothing is pinned.
pub struct BufferPoolManager {
    disk: DiskManager,
    pool: BufferPool,
    /// Maps each cached page to the frame slot holding it
    page_table: Mutex<HashMap<PageId, BufferId>>,
}

impl BufferPoolManager {
    pub fn new(disk: DiskManager, pool: BufferPool) -> Self {
        Self {
            disk,
            pool,
            page_table: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a page for read access.
    pub fn fetch_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let buffer_id = self.fetch_frame(page_id)?;
        let frame = self.pool.frame(buffer_id).clone();
        Ok(unsafe { ReadPageGuard::new(page_id, frame) })
    }

    /// Fetches a page for write access.
    pub fn fetch_page_mut(&self, page_id: PageId) -> Result<WritePageGuard> {
        let buffer_id = self.fetch_frame(page_id)?;
        let frame = self.pool.frame(buffer_id).clone();
        Ok(unsafe { WritePageGuard::new(page_id, frame) })
    }

    /// Allocates a fresh page on disk and binds it to a frame, returning a
    /// write guard over its zeroed image. The frame starts dirty so the
    /// page reaches disk even if the caller never touches a byte.
    pub fn create_page(&self) -> Result<WritePageGuard> {
        let buffer_id = self.take_victim_frame()?;
        let frame = self.pool.frame(buffer_id).clone();

        let page_id = self.disk.allocate_page();

        frame.bind(page_id);
        frame.mark_dirty();
        frame.pin();
        frame.set_usage_count(1);

        self.page_table.lock().insert(page_id, buffer_id);

        trace!("created page {} in frame {}", page_id, buffer_id);
        Ok(unsafe { WritePageGuard::new(page_id, frame) })
    }

    /// Writes every dirty frame back to disk, clears the dirty flags, and
    /// fsyncs the heap file. Only after this returns are prior writes
    /// guaranteed to sit on stable storage.
    pub fn flush(&self) -> Result<()> {
        let page_table = self.page_table.lock();

        for (&page_id, &buffer_id) in page_table.iter() {
            let frame = self.pool.frame(buffer_id);
            if frame.is_dirty() {
                self.disk.write_page_data(page_id, &frame.data.read()[..])?;
                frame.clear_dirty();
                debug!("flushed page {} from frame {}", page_id, buffer_id);
            }
        }

        self.disk.sync()?;
        Ok(())
    }

    /// Returns the pin count of a cached page, or None if it is not
    /// resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&buffer_id| self.pool.frame(buffer_id).pin_count())
    }

    /// Snapshot of the page table, for diagnostics and invariant checks.
    pub fn cached_pages(&self) -> Vec<(PageId, BufferId)> {
        let page_table = self.page_table.lock();
        page_table.iter().map(|(&p, &b)| (p, b)).collect()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    /// Returns the frame in the given pool slot.
    pub fn frame_at(&self, buffer_id: BufferId) -> &std::sync::Arc<super::Frame> {
        self.pool.frame(buffer_id)
    }

    /// Locates (or loads) the page and pins its frame.
    fn fetch_frame(&self, page_id: PageId) -> Result<BufferId> {
        if page_id.valid().is_none() {
            return Err(MinirelError::InvalidPageId(page_id));
        }

        {
            let page_table = self.page_table.lock();
            if let Some(&buffer_id) = page_table.get(&page_id) {
                let frame = self.pool.frame(buffer_id);
                frame.pin();
                frame.bump_usage();
                return Ok(buffer_id);
            }
        }

        let buffer_id = self.take_victim_frame()?;
        let frame = self.pool.frame(buffer_id);

        frame.bind(page_id);
        self.disk
            .read_page_data(page_id, &mut frame.data.write()[..])?;
        frame.pin();
        frame.set_usage_count(1);

        self.page_table.lock().insert(page_id, buffer_id);

        trace!("fetched page {} into frame {}", page_id, buffer_id);
        Ok(buffer_id)
    }

    /// Claims a frame via the clock sweep, writing back its current page
    /// if dirty and unlinking it from the page table.
    fn take_victim_frame(&self) -> Result<BufferId> {
        let buffer_id = self.pool.evict().ok_or(MinirelError::NoFreeBuffer)?;
        let frame = self.pool.frame(buffer_id);
        let evicted_page_id = frame.page_id();

        if frame.is_dirty() {
            self.disk
                .write_page_data(evicted_page_id, &frame.data.read()[..])?;
            debug!(
                "evicting frame {}: wrote back dirty page {}",
                buffer_id, evicted_page_id
            );
        }

        if evicted_page_id.valid().is_some() {
            self.page_table.lock().remove(&evicted_page_id);
        }

        frame.clear();
        Ok(buffer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bufmgr(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let disk = DiskManager::open(temp_file.path()).unwrap();
        let bufmgr = BufferPoolManager::new(disk, BufferPool::new(pool_size));
        (bufmgr, temp_file)
    }

    #[test]
    fn test_create_page_ids_are_dense() {
        let (bufmgr, _temp) = create_bufmgr(10);

        let p0 = bufmgr.create_page().unwrap().page_id();
        let p1 = bufmgr.create_page().unwrap().page_id();

        assert_eq!(p0, PageId::new(0));
        assert_eq!(p1, PageId::new(1));
    }

    #[test]
    fn test_read_write_roundtrip() {
        let (bufmgr, _temp) = create_bufmgr(10);

        let page_id = {
            let mut guard = bufmgr.create_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
            guard.page_id()
        };

        // Guard dropped, nothing pinned
        assert_eq!(bufmgr.pin_count(page_id), Some(0));

        let guard = bufmgr.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data()[100], 255);
    }

    #[test]
    fn test_eviction_writes_back_dirty_page() {
        let (bufmgr, _temp) = create_bufmgr(1);

        let first = {
            let mut guard = bufmgr.create_page().unwrap();
            guard.data_mut()[0] = 7;
            guard.page_id()
        };

        // The single frame must be reclaimed, forcing a write-back of the
        // dirty first page.
        let second = {
            let mut guard = bufmgr.create_page().unwrap();
            guard.data_mut()[0] = 8;
            guard.page_id()
        };
        assert_ne!(first, second);

        // Fetching the first page again evicts the second and reads the
        // first back from disk.
        let guard = bufmgr.fetch_page(first).unwrap();
        assert_eq!(guard.data()[0], 7);
    }

    #[test]
    fn test_no_free_buffer_when_all_pinned() {
        let (bufmgr, _temp) = create_bufmgr(2);

        let _g1 = bufmgr.create_page().unwrap();
        let _g2 = bufmgr.create_page().unwrap();

        assert!(matches!(
            bufmgr.create_page(),
            Err(MinirelError::NoFreeBuffer)
        ));
    }

    #[test]
    fn test_fetch_invalid_page_id() {
        let (bufmgr, _temp) = create_bufmgr(2);

        assert!(matches!(
            bufmgr.fetch_page(crate::common::INVALID_PAGE_ID),
            Err(MinirelError::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_flush_persists_dirty_pages() {
        let temp_file = NamedTempFile::new().unwrap();

        let page_id = {
            let disk = DiskManager::open(temp_file.path()).unwrap();
            let bufmgr = BufferPoolManager::new(disk, BufferPool::new(10));

            let page_id = {
                let mut guard = bufmgr.create_page().unwrap();
                guard.data_mut()[..5].copy_from_slice(b"hello");
                guard.page_id()
            };
            bufmgr.flush().unwrap();
            page_id
        };

        let disk = DiskManager::open(temp_file.path()).unwrap();
        let bufmgr = BufferPoolManager::new(disk, BufferPool::new(10));
        let guard = bufmgr.fetch_page(page_id).unwrap();
        assert_eq!(&guard.data()[..5], b"hello");
    }

    #[test]
    fn test_page_table_matches_frames() {
        let (bufmgr, _temp) = create_bufmgr(3);

        for _ in 0..5 {
            let mut guard = bufmgr.create_page().unwrap();
            guard.data_mut()[0] = 1;
        }

        for (page_id, buffer_id) in bufmgr.cached_pages() {
            assert_eq!(bufmgr.frame_at(buffer_id).page_id(), page_id);
        }
    }
}
