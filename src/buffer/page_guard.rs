use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::Frame;

/// RAII guard for read-only access to a page.
/// Holds a pin on the frame and releases it when dropped.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Read lock on the page data; declared before the frame so it is
    /// released while the frame is still alive
    data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
    /// Kept alive for the guard's lifetime so the data lock stays valid
    frame: Arc<Frame>,
}

impl ReadPageGuard {
    /// Creates a new ReadPageGuard. The frame must already be pinned.
    /// # Safety
    /// The caller must ensure that the frame outlives this guard.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.read();
        // Transmute to static lifetime - the frame is kept alive via Arc
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            frame,
            data_guard,
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data_guard[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

/// RAII guard for read-write access to a page.
/// Marks the frame dirty once mutated and unpins it when dropped.
pub struct WritePageGuard {
    page_id: PageId,
    frame: Arc<Frame>,
    /// Write lock on the page data; taken out first in drop
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    dirtied: bool,
}

impl WritePageGuard {
    /// Creates a new WritePageGuard. The frame must already be pinned.
    /// # Safety
    /// The caller must ensure that the frame outlives this guard.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.write();
        // Transmute to static lifetime - the frame is kept alive via Arc
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            frame,
            data_guard: Some(data_guard),
            dirtied: false,
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Returns a mutable reference to the page data and marks the page
    /// dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirtied = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the data lock before touching frame metadata
        self.data_guard.take();
        if self.dirtied {
            self.frame.mark_dirty();
        }
        self.frame.unpin();
    }
}
