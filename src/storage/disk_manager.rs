use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// DiskManager projects a single heap file as a sequence of fixed-size pages.
/// Page `N` lives at byte offset `N * PAGE_SIZE`; ids are handed out densely
/// and monotonically. Allocation alone never extends the file - the first
/// write to a fresh page does.
pub struct DiskManager {
    /// The heap file handle. The mutex serializes access to the file cursor.
    heap_file: Mutex<File>,
    /// Next page id to hand out (current file length / PAGE_SIZE at open)
    next_page_id: AtomicU64,
    /// Number of page reads performed
    num_reads: AtomicU64,
    /// Number of page writes performed
    num_writes: AtomicU64,
}

impl DiskManager {
    /// Opens the heap file at the given path, creating it if it does not
    /// exist. Existing content is preserved; the next page id resumes after
    /// the last fully allocated page.
    pub fn open<P: AsRef<Path>>(heap_file_path: P) -> Result<Self> {
        let heap_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(heap_file_path)?;

        let file_size = heap_file.metadata()?.len();
        let next_page_id = file_size / PAGE_SIZE as u64;

        Ok(Self {
            heap_file: Mutex::new(heap_file),
            next_page_id: AtomicU64::new(next_page_id),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    /// Hands out the next page id. The file itself grows lazily: the page
    /// occupies disk space only once it is first written.
    pub fn allocate_page(&self) -> PageId {
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        PageId::new(page_id)
    }

    /// Reads a page from disk into the provided buffer. A short read (page
    /// allocated but never written) leaves the tail zero-filled.
    pub fn read_page_data(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.heap_file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page_data(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        let mut file = self.heap_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flushes userspace buffers and fsyncs the heap file. Until this
    /// returns, written pages may still sit in OS caches.
    pub fn sync(&self) -> Result<()> {
        let mut file = self.heap_file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Returns the id the next allocation will hand out.
    pub fn next_page_id(&self) -> u64 {
        self.next_page_id.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.heap_file.get_mut();
        let _ = file.flush();
        let _ = file.sync_all();
    }
}
