use minirel::buffer::{BufferPool, BufferPoolManager};
use minirel::common::{MinirelError, PageId};
use minirel::storage::DiskManager;

use tempfile::NamedTempFile;

fn create_bufmgr(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_file = NamedTempFile::new().unwrap();
    let disk = DiskManager::open(temp_file.path()).unwrap();
    (
        BufferPoolManager::new(disk, BufferPool::new(pool_size)),
        temp_file,
    )
}

#[test]
fn test_two_pages_survive_flush_in_pool_of_two() {
    let (bufmgr, _temp) = create_bufmgr(2);

    let page1_id = {
        let mut guard = bufmgr.create_page().unwrap();
        guard.data_mut()[..5].copy_from_slice(b"hello");
        guard.page_id()
    };

    let page2_id = {
        let mut guard = bufmgr.create_page().unwrap();
        guard.data_mut()[..5].copy_from_slice(b"world");
        guard.page_id()
    };

    bufmgr.flush().unwrap();

    // Both pages fit the pool, so neither fetch may fail
    let guard1 = bufmgr.fetch_page(page1_id).unwrap();
    assert_eq!(&guard1.data()[..5], b"hello");
    drop(guard1);

    let guard2 = bufmgr.fetch_page(page2_id).unwrap();
    assert_eq!(&guard2.data()[..5], b"world");
}

#[test]
fn test_eviction_churn_preserves_content() {
    let (bufmgr, _temp) = create_bufmgr(3);

    // Ten pages through a three-frame pool: most creates evict a dirty
    // page, exercising the write-back path.
    let mut page_ids = Vec::new();
    for i in 0..10u8 {
        let mut guard = bufmgr.create_page().unwrap();
        guard.data_mut()[0] = i;
        guard.data_mut()[100] = 0xAB;
        page_ids.push(guard.page_id());
    }

    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = bufmgr.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], i as u8, "page {} lost its content", page_id);
        assert_eq!(guard.data()[100], 0xAB);
    }
}

#[test]
fn test_no_free_buffer_when_every_frame_pinned() {
    let (bufmgr, _temp) = create_bufmgr(2);

    let p1 = bufmgr.create_page().unwrap().page_id();
    let p2 = bufmgr.create_page().unwrap().page_id();

    let _guard1 = bufmgr.fetch_page(p1).unwrap();
    let _guard2 = bufmgr.fetch_page(p2).unwrap();

    assert!(matches!(
        bufmgr.fetch_page(PageId::new(99)),
        Err(MinirelError::NoFreeBuffer)
    ));
    assert!(matches!(
        bufmgr.create_page(),
        Err(MinirelError::NoFreeBuffer)
    ));
}

#[test]
fn test_pool_recovers_after_guards_drop() {
    let (bufmgr, _temp) = create_bufmgr(2);

    let p1 = bufmgr.create_page().unwrap().page_id();
    let p2 = bufmgr.create_page().unwrap().page_id();

    {
        let _guard1 = bufmgr.fetch_page(p1).unwrap();
        let _guard2 = bufmgr.fetch_page(p2).unwrap();
        assert!(bufmgr.create_page().is_err());
    }

    // Guards gone, the clock sweep can reclaim a frame again
    assert!(bufmgr.create_page().is_ok());
}

#[test]
fn test_dirty_pages_persist_across_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    let page_ids: Vec<PageId> = {
        let disk = DiskManager::open(temp_file.path()).unwrap();
        let bufmgr = BufferPoolManager::new(disk, BufferPool::new(5));

        let page_ids: Vec<PageId> = (0..4u8)
            .map(|i| {
                let mut guard = bufmgr.create_page().unwrap();
                guard.data_mut()[0] = i + 10;
                guard.page_id()
            })
            .collect();

        bufmgr.flush().unwrap();
        page_ids
    };

    // A fresh disk manager sees the last flushed bytes
    let disk = DiskManager::open(temp_file.path()).unwrap();
    let bufmgr = BufferPoolManager::new(disk, BufferPool::new(5));

    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = bufmgr.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], i as u8 + 10);
    }
}

#[test]
fn test_page_table_stays_consistent_under_churn() {
    let (bufmgr, _temp) = create_bufmgr(4);

    let mut page_ids = Vec::new();
    for i in 0..12u8 {
        let mut guard = bufmgr.create_page().unwrap();
        guard.data_mut()[0] = i;
        page_ids.push(guard.page_id());
    }
    for &page_id in page_ids.iter().rev().take(6) {
        bufmgr.fetch_page(page_id).unwrap();
    }

    let cached = bufmgr.cached_pages();
    assert!(cached.len() <= bufmgr.pool_size());

    // Every table entry points at a frame that agrees on the page id, and
    // no frame is referenced twice.
    let mut seen_frames = Vec::new();
    for (page_id, buffer_id) in cached {
        assert_eq!(bufmgr.frame_at(buffer_id).page_id(), page_id);
        assert!(!seen_frames.contains(&buffer_id));
        seen_frames.push(buffer_id);
    }
}
