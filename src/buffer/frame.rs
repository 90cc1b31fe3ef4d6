use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::common::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One slot of the buffer pool: a page image plus the bookkeeping the
/// manager and the clock sweep work with.
///
/// Two counters with different jobs: `pins` counts the guards holding the
/// frame right now (the sweep must not touch it while > 0), while `usage`
/// is second-chance credit the clock hand spends down as it passes. The
/// metadata is atomic so the manager can share `Arc<Frame>` freely; the
/// page bytes sit behind their own lock, held by a page guard for as long
/// as a caller can see them.
pub struct Frame {
    /// Raw id of the page bound here; INVALID_PAGE_ID when empty
    page: AtomicU64,
    /// Outstanding guard count
    pins: AtomicU32,
    /// Second-chance credit for the clock sweep
    usage: AtomicU64,
    dirty: AtomicBool,
    /// The page image (pub(crate) for guard and manager access)
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: AtomicU64::new(INVALID_PAGE_ID.as_u64()),
            pins: AtomicU32::new(0),
            usage: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page.load(Ordering::Acquire))
    }

    /// Binds the frame to a page. Loading the matching image is the
    /// caller's job.
    pub fn bind(&self, page_id: PageId) {
        self.page.store(page_id.as_u64(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Takes a pin; the frame stays off-limits to the sweep until the
    /// matching `unpin`.
    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unpin(&self) {
        let had = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(had > 0, "unpin without a matching pin");
    }

    pub fn usage_count(&self) -> u64 {
        self.usage.load(Ordering::Acquire)
    }

    pub fn set_usage_count(&self, count: u64) {
        self.usage.store(count, Ordering::Release);
    }

    /// Credits the frame on a page-table hit.
    pub fn bump_usage(&self) {
        self.usage.fetch_add(1, Ordering::AcqRel);
    }

    /// Spends one usage credit, stopping at zero. The clock hand calls
    /// this when it passes an unpinned frame that still has credit.
    pub fn decay_usage(&self) {
        let _ = self
            .usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |u| u.checked_sub(1));
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flags the image as modified since it last matched disk.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Called once the image has been written back.
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Returns the frame to its empty state: no page, no pins, no credit,
    /// zeroed image.
    pub fn clear(&self) {
        self.page.store(INVALID_PAGE_ID.as_u64(), Ordering::Release);
        self.pins.store(0, Ordering::Release);
        self.usage.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
