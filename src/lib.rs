//! Minirel - a disk-backed storage engine in Rust
//!
//! This crate provides the core storage layers of a small relational
//! database: a paged heap file, an in-memory buffer pool with clock-sweep
//! replacement and write-back semantics, and a B+Tree index on which a
//! primary-key table and unique secondary indexes are built.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Page-granular disk I/O
//!   - `DiskManager`: Projects a heap file as fixed-size pages
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Fetches pages from disk and caches them
//!   - `BufferPool`: Frame array plus the clock-sweep victim selection
//!   - `Frame`: Per-frame page image and metadata
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins on a cached page
//!
//! - **Codecs** (`codec`): Order-preserving serialization
//!   - `memcmp`: Memcomparable byte-string encoding
//!   - `tuple`: Records as concatenations of encoded elements
//!
//! - **Index** (`index`): `BPlusTree` with split-on-overflow
//!
//! - **Table** (`table`): `SimpleTable`, `UniqueIndex` and `Table`
//!
//! # Example
//!
//! ```rust,no_run
//! use minirel::buffer::{BufferPool, BufferPoolManager};
//! use minirel::storage::DiskManager;
//! use minirel::table::SimpleTable;
//!
//! // Open a heap file and build the buffer pool on top of it
//! let disk = DiskManager::open("example.mrl").unwrap();
//! let bufmgr = BufferPoolManager::new(disk, BufferPool::new(10));
//!
//! // One-column primary key, two payload columns
//! let table = SimpleTable::create(&bufmgr, 1).unwrap();
//! table.insert(&bufmgr, &[b"x", b"Bob", b"Johnson"]).unwrap();
//!
//! // Nothing is durable until the pool is flushed
//! bufmgr.flush().unwrap();
//!
//! for record in table.scan(&bufmgr).unwrap() {
//!     println!("{:?}", record);
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod common;
pub mod index;
pub mod storage;
pub mod table;

// Re-export commonly used types at the crate root
pub use common::{BufferId, MinirelError, PageId, Result};
