//! Table abstractions over the B+Tree.
//!
//! A table keeps one tree for its rows: the memcomparable encoding of the
//! first `num_key_elems` record elements is the key, the encoding of the
//! rest is the value. A unique secondary index keeps another tree mapping
//! the encoded projection of chosen columns to the encoded primary key.

use crate::buffer::BufferPoolManager;
use crate::codec::tuple;
use crate::common::{PageId, Result};
use crate::index::{BPlusTree, SearchMode};

/// A primary-key table: one B+Tree, records split into key and value at
/// `num_key_elems`.
pub struct SimpleTable {
    meta_page_id: PageId,
    num_key_elems: usize,
}

impl SimpleTable {
    /// Creates the table's underlying tree.
    pub fn create(bufmgr: &BufferPoolManager, num_key_elems: usize) -> Result<Self> {
        assert!(num_key_elems > 0, "a record needs at least one key element");
        let btree = BPlusTree::create(bufmgr)?;
        Ok(Self {
            meta_page_id: btree.meta_page_id(),
            num_key_elems,
        })
    }

    /// Reopens a table from its meta page id.
    pub fn open(meta_page_id: PageId, num_key_elems: usize) -> Self {
        Self {
            meta_page_id,
            num_key_elems,
        }
    }

    pub fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    /// Inserts a record. The first `num_key_elems` elements form the
    /// primary key; a record with the same key is rejected with
    /// `DuplicateKey`.
    pub fn insert(&self, bufmgr: &BufferPoolManager, record: &[&[u8]]) -> Result<()> {
        assert!(
            record.len() >= self.num_key_elems,
            "record shorter than its key"
        );

        let mut key = Vec::new();
        tuple::encode(&record[..self.num_key_elems], &mut key);
        let mut value = Vec::new();
        tuple::encode(&record[self.num_key_elems..], &mut value);

        BPlusTree::new(self.meta_page_id).insert(bufmgr, &key, &value)
    }

    /// Returns every record, ordered by primary key.
    pub fn scan(&self, bufmgr: &BufferPoolManager) -> Result<Vec<Vec<Vec<u8>>>> {
        let pairs = BPlusTree::new(self.meta_page_id).scan_all(bufmgr)?;
        pairs
            .into_iter()
            .map(|(key, value)| {
                let mut record = Vec::new();
                tuple::decode(&key, &mut record)?;
                tuple::decode(&value, &mut record)?;
                Ok(record)
            })
            .collect()
    }
}

/// A unique secondary index: maps the encoded projection of the `skey`
/// columns to the encoded primary key. Uniqueness falls out of the tree's
/// duplicate rejection.
pub struct UniqueIndex {
    meta_page_id: PageId,
    skey: Vec<usize>,
}

impl UniqueIndex {
    pub fn create(bufmgr: &BufferPoolManager, skey: Vec<usize>) -> Result<Self> {
        assert!(!skey.is_empty(), "an index needs at least one column");
        let btree = BPlusTree::create(bufmgr)?;
        Ok(Self {
            meta_page_id: btree.meta_page_id(),
            skey,
        })
    }

    pub fn open(meta_page_id: PageId, skey: Vec<usize>) -> Self {
        Self { meta_page_id, skey }
    }

    pub fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    /// Indexes a record under its projected secondary key.
    pub fn insert(&self, bufmgr: &BufferPoolManager, pkey: &[u8], record: &[&[u8]]) -> Result<()> {
        let projected: Vec<&[u8]> = self.skey.iter().map(|&i| record[i]).collect();
        let mut skey_encoded = Vec::new();
        tuple::encode(&projected, &mut skey_encoded);

        BPlusTree::new(self.meta_page_id).insert(bufmgr, &skey_encoded, pkey)
    }

    /// Looks up the encoded primary key stored under the given secondary
    /// key elements.
    pub fn get(&self, bufmgr: &BufferPoolManager, skey_elems: &[&[u8]]) -> Result<Option<Vec<u8>>> {
        let mut encoded = Vec::new();
        tuple::encode(skey_elems, &mut encoded);

        let found = BPlusTree::new(self.meta_page_id).search(bufmgr, SearchMode::Key(encoded))?;
        Ok(found.map(|(_, pkey)| pkey))
    }
}

/// A table plus its unique secondary indexes.
pub struct Table {
    meta_page_id: PageId,
    num_key_elems: usize,
    unique_indices: Vec<UniqueIndex>,
}

impl Table {
    /// Creates the primary tree and one `UniqueIndex` per column list in
    /// `skeys`.
    pub fn create(
        bufmgr: &BufferPoolManager,
        num_key_elems: usize,
        skeys: Vec<Vec<usize>>,
    ) -> Result<Self> {
        assert!(num_key_elems > 0, "a record needs at least one key element");
        let btree = BPlusTree::create(bufmgr)?;
        let unique_indices = skeys
            .into_iter()
            .map(|skey| UniqueIndex::create(bufmgr, skey))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            meta_page_id: btree.meta_page_id(),
            num_key_elems,
            unique_indices,
        })
    }

    pub fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    pub fn unique_indices(&self) -> &[UniqueIndex] {
        &self.unique_indices
    }

    /// Inserts a record into the primary tree and every secondary index.
    ///
    /// The primary row is written first; if a secondary index then rejects
    /// its key as a duplicate, the primary row stays behind - there is no
    /// rollback here, the caller decides what to do with the orphan.
    pub fn insert(&self, bufmgr: &BufferPoolManager, record: &[&[u8]]) -> Result<()> {
        assert!(
            record.len() >= self.num_key_elems,
            "record shorter than its key"
        );

        let mut key = Vec::new();
        tuple::encode(&record[..self.num_key_elems], &mut key);
        let mut value = Vec::new();
        tuple::encode(&record[self.num_key_elems..], &mut value);

        BPlusTree::new(self.meta_page_id).insert(bufmgr, &key, &value)?;
        for index in &self.unique_indices {
            index.insert(bufmgr, &key, record)?;
        }
        Ok(())
    }

    /// Returns every record, ordered by primary key.
    pub fn scan(&self, bufmgr: &BufferPoolManager) -> Result<Vec<Vec<Vec<u8>>>> {
        let pairs = BPlusTree::new(self.meta_page_id).scan_all(bufmgr)?;
        pairs
            .into_iter()
            .map(|(key, value)| {
                let mut record = Vec::new();
                tuple::decode(&key, &mut record)?;
                tuple::decode(&value, &mut record)?;
                Ok(record)
            })
            .collect()
    }
}
