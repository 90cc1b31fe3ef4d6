//! Disk-resident B+Tree over the buffer pool.
//!
//! A tree is identified by its meta page, whose first 8 bytes hold the
//! current root page id (the root moves when it splits). Search and insert
//! descend recursively, holding the descent path pinned; range scans
//! re-descend from the root into every overlapping subtree - leaves carry
//! no sibling links.
//!
//! Descent pins one frame per level plus the pages a split allocates, so
//! the buffer pool must be a few frames larger than the tree is tall.

use log::{debug, trace};

use crate::buffer::BufferPoolManager;
use crate::common::{
    MinirelError, PageId, Result, DEFAULT_BRANCH_MAX_KEYS, DEFAULT_LEAF_MAX_PAIRS, PAGE_SIZE,
};

use super::node;
use super::node::{NodeKind, NodeMut, NodeRef, Pair};

/// Where a search positions itself.
#[derive(Debug, Clone)]
pub enum SearchMode {
    /// The first pair of the tree
    Start,
    /// The pair with exactly this key
    Key(Vec<u8>),
}

pub struct BPlusTree {
    meta_page_id: PageId,
    /// A leaf holding more pairs than this splits
    leaf_max_pairs: usize,
    /// A branch holding more keys than this splits
    branch_max_keys: usize,
}

impl BPlusTree {
    /// Creates a new empty tree: a meta page pointing at a root page
    /// initialized as an empty leaf.
    pub fn create(bufmgr: &BufferPoolManager) -> Result<Self> {
        Self::create_with_limits(bufmgr, DEFAULT_LEAF_MAX_PAIRS, DEFAULT_BRANCH_MAX_KEYS)
    }

    /// Creates a new empty tree with explicit node-size limits.
    pub fn create_with_limits(
        bufmgr: &BufferPoolManager,
        leaf_max_pairs: usize,
        branch_max_keys: usize,
    ) -> Result<Self> {
        assert!(leaf_max_pairs >= 2, "a leaf must hold at least two pairs");
        assert!(branch_max_keys >= 2, "a branch must hold at least two keys");

        let mut meta = bufmgr.create_page()?;
        let mut root = bufmgr.create_page()?;

        NodeMut::new(root.data_mut()).init_leaf();
        meta.data_mut()[..8].copy_from_slice(&root.page_id().to_bytes());

        Ok(Self {
            meta_page_id: meta.page_id(),
            leaf_max_pairs,
            branch_max_keys,
        })
    }

    /// Reopens an existing tree by its meta page id.
    pub fn new(meta_page_id: PageId) -> Self {
        Self::with_limits(meta_page_id, DEFAULT_LEAF_MAX_PAIRS, DEFAULT_BRANCH_MAX_KEYS)
    }

    /// Reopens an existing tree with the node-size limits it was built
    /// with.
    pub fn with_limits(meta_page_id: PageId, leaf_max_pairs: usize, branch_max_keys: usize) -> Self {
        Self {
            meta_page_id,
            leaf_max_pairs,
            branch_max_keys,
        }
    }

    pub fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    /// Reads the current root page id out of the meta page.
    pub fn root_page_id(&self, bufmgr: &BufferPoolManager) -> Result<PageId> {
        let meta = bufmgr.fetch_page(self.meta_page_id)?;
        let bytes: [u8; 8] = meta.data()[..8].try_into().unwrap();
        Ok(PageId::from_bytes(bytes))
    }

    /// Looks up a pair. `SearchMode::Key` returns the exact match if
    /// present; `SearchMode::Start` returns the tree's first pair.
    pub fn search(
        &self,
        bufmgr: &BufferPoolManager,
        mode: SearchMode,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let root_id = self.root_page_id(bufmgr)?;
        self.search_node(bufmgr, root_id, &mode)
    }

    fn search_node(
        &self,
        bufmgr: &BufferPoolManager,
        page_id: PageId,
        mode: &SearchMode,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let guard = bufmgr.fetch_page(page_id)?;
        let node = NodeRef::new(guard.data());

        match node.kind()? {
            NodeKind::Leaf => {
                let pairs = node.leaf_pairs()?;
                let found = match mode {
                    SearchMode::Start => pairs.into_iter().next(),
                    SearchMode::Key(key) => {
                        pairs.into_iter().find(|p| p.key.as_slice() == key.as_slice())
                    }
                };
                Ok(found.map(|p| (p.key, p.value)))
            }
            NodeKind::Branch => {
                let (keys, children) = node.branch_keys_children()?;
                let child_id = match mode {
                    SearchMode::Start => children[0],
                    SearchMode::Key(key) => children[child_index(&keys, key)],
                };
                drop(guard);
                self.search_node(bufmgr, child_id, mode)
            }
        }
    }

    /// Inserts a pair. Fails with `DuplicateKey` if the key is already
    /// present, leaving the tree untouched.
    pub fn insert(&self, bufmgr: &BufferPoolManager, key: &[u8], value: &[u8]) -> Result<()> {
        let record_size = Pair::record_size_for(key.len(), value.len());
        if node::HEADER_SIZE + record_size > PAGE_SIZE {
            return Err(MinirelError::PairTooLarge {
                size: record_size,
                max: PAGE_SIZE - node::HEADER_SIZE,
            });
        }

        let root_id = self.root_page_id(bufmgr)?;
        if let Some((separator, new_right_id)) = self.insert_node(bufmgr, root_id, key, value)? {
            // The root itself split: promote a new branch root and repoint
            // the meta page at it.
            let new_root_id = {
                let mut root = bufmgr.create_page()?;
                let mut node = NodeMut::new(root.data_mut());
                node.init_branch();
                node.set_branch(&[separator], &[root_id, new_right_id])?;
                root.page_id()
            };

            let mut meta = bufmgr.fetch_page_mut(self.meta_page_id)?;
            meta.data_mut()[..8].copy_from_slice(&new_root_id.to_bytes());
            debug!("root {} split, new root {}", root_id, new_root_id);
        }
        Ok(())
    }

    /// Recursive insert. Returns `Some((separator, right_id))` when this
    /// node split and the parent must absorb the promoted separator.
    fn insert_node(
        &self,
        bufmgr: &BufferPoolManager,
        page_id: PageId,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<(Vec<u8>, PageId)>> {
        let mut guard = bufmgr.fetch_page_mut(page_id)?;

        match NodeRef::new(guard.data()).kind()? {
            NodeKind::Leaf => {
                let mut pairs = NodeRef::new(guard.data()).leaf_pairs()?;

                if pairs.iter().any(|p| p.key.as_slice() == key) {
                    return Err(MinirelError::DuplicateKey);
                }

                let pos = pairs.partition_point(|p| p.key.as_slice() < key);
                pairs.insert(pos, Pair::new(key.to_vec(), value.to_vec()));

                if pairs.len() <= self.leaf_max_pairs {
                    NodeMut::new(guard.data_mut()).set_leaf_pairs(&pairs)?;
                    return Ok(None);
                }

                // Overflow: left keeps [0, mid), right takes [mid, n); the
                // right node's first key is promoted as the separator.
                let mid = pairs.len() / 2;
                let right_pairs = pairs.split_off(mid);
                let separator = right_pairs[0].key.clone();

                let right_id = {
                    let mut right = bufmgr.create_page()?;
                    let mut right_node = NodeMut::new(right.data_mut());
                    right_node.init_leaf();
                    right_node.set_leaf_pairs(&right_pairs)?;
                    right.page_id()
                };
                NodeMut::new(guard.data_mut()).set_leaf_pairs(&pairs)?;

                trace!(
                    "leaf {} split: {} + {} pairs, right {}",
                    page_id,
                    pairs.len(),
                    right_pairs.len(),
                    right_id
                );
                Ok(Some((separator, right_id)))
            }
            NodeKind::Branch => {
                let (mut keys, mut children) =
                    NodeRef::new(guard.data()).branch_keys_children()?;

                let child_id = children[child_index(&keys, key)];
                let Some((separator, new_child_id)) =
                    self.insert_node(bufmgr, child_id, key, value)?
                else {
                    return Ok(None);
                };

                // Absorb the separator promoted by the split child; its new
                // right sibling slots in just after the child we descended.
                let pos = keys.partition_point(|k| k.as_slice() < separator.as_slice());
                keys.insert(pos, separator);
                children.insert(pos + 1, new_child_id);

                if keys.len() <= self.branch_max_keys {
                    NodeMut::new(guard.data_mut()).set_branch(&keys, &children)?;
                    return Ok(None);
                }

                // Overflow: the middle key moves up and is kept by neither
                // half.
                let mid = keys.len() / 2;
                let right_keys = keys.split_off(mid + 1);
                let promoted = keys.pop().expect("split point inside key array");
                let right_children = children.split_off(mid + 1);

                let right_id = {
                    let mut right = bufmgr.create_page()?;
                    let mut right_node = NodeMut::new(right.data_mut());
                    right_node.init_branch();
                    right_node.set_branch(&right_keys, &right_children)?;
                    right.page_id()
                };
                NodeMut::new(guard.data_mut()).set_branch(&keys, &children)?;

                trace!("branch {} split, right {}", page_id, right_id);
                Ok(Some((promoted, right_id)))
            }
        }
    }

    /// Collects every pair with `start_key <= key <= end_key`, ascending.
    /// Implemented by full descent: every subtree whose range may overlap
    /// is visited, so cost is proportional to the overlapping region.
    pub fn search_range(
        &self,
        bufmgr: &BufferPoolManager,
        start_key: &[u8],
        end_key: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let root_id = self.root_page_id(bufmgr)?;
        self.collect_range(bufmgr, root_id, start_key, Some(end_key), &mut out)?;
        Ok(out)
    }

    /// Collects every pair in the tree, ascending.
    pub fn scan_all(&self, bufmgr: &BufferPoolManager) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let root_id = self.root_page_id(bufmgr)?;
        self.collect_range(bufmgr, root_id, &[], None, &mut out)?;
        Ok(out)
    }

    fn collect_range(
        &self,
        bufmgr: &BufferPoolManager,
        page_id: PageId,
        start_key: &[u8],
        end_key: Option<&[u8]>,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<()> {
        let guard = bufmgr.fetch_page(page_id)?;
        let node = NodeRef::new(guard.data());

        match node.kind()? {
            NodeKind::Leaf => {
                for pair in node.leaf_pairs()? {
                    let in_range = pair.key.as_slice() >= start_key
                        && end_key.map_or(true, |end| pair.key.as_slice() <= end);
                    if in_range {
                        out.push((pair.key, pair.value));
                    }
                }
            }
            NodeKind::Branch => {
                let (keys, children) = node.branch_keys_children()?;
                drop(guard);

                // A child left of separator i only holds keys below it, so
                // it can contain the range iff the separator exceeds the
                // start; the rightmost child is unbounded above.
                for (i, separator) in keys.iter().enumerate() {
                    if separator.as_slice() > start_key {
                        self.collect_range(bufmgr, children[i], start_key, end_key, out)?;
                    }
                }
                self.collect_range(bufmgr, children[keys.len()], start_key, end_key, out)?;
            }
        }
        Ok(())
    }

    /// Number of levels from the root down to the leaves.
    pub fn height(&self, bufmgr: &BufferPoolManager) -> Result<usize> {
        let mut levels = 1;
        let mut page_id = self.root_page_id(bufmgr)?;
        loop {
            let guard = bufmgr.fetch_page(page_id)?;
            let node = NodeRef::new(guard.data());
            match node.kind()? {
                NodeKind::Leaf => return Ok(levels),
                NodeKind::Branch => {
                    let (_, children) = node.branch_keys_children()?;
                    page_id = children[0];
                    levels += 1;
                }
            }
        }
    }
}

/// Index of the child to descend for `key`: the first child whose
/// separator exceeds the key, or the last child when none does.
fn child_index(keys: &[Vec<u8>], key: &[u8]) -> usize {
    keys.partition_point(|k| k.as_slice() <= key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::storage::DiskManager;
    use tempfile::NamedTempFile;

    fn create_bufmgr(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let disk = DiskManager::open(temp_file.path()).unwrap();
        (
            BufferPoolManager::new(disk, BufferPool::new(pool_size)),
            temp_file,
        )
    }

    #[test]
    fn test_child_index() {
        let keys = vec![b"d".to_vec(), b"m".to_vec(), b"t".to_vec()];

        assert_eq!(child_index(&keys, b"a"), 0);
        assert_eq!(child_index(&keys, b"d"), 1); // equal goes right
        assert_eq!(child_index(&keys, b"k"), 1);
        assert_eq!(child_index(&keys, b"m"), 2);
        assert_eq!(child_index(&keys, b"z"), 3);
    }

    #[test]
    fn test_empty_tree_search() {
        let (bufmgr, _temp) = create_bufmgr(10);
        let btree = BPlusTree::create(&bufmgr).unwrap();

        assert!(btree.search(&bufmgr, SearchMode::Start).unwrap().is_none());
        assert!(btree
            .search(&bufmgr, SearchMode::Key(b"missing".to_vec()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_insert_search_single_leaf() {
        let (bufmgr, _temp) = create_bufmgr(10);
        let btree = BPlusTree::create(&bufmgr).unwrap();

        btree
            .insert(&bufmgr, &6u64.to_be_bytes(), b"world")
            .unwrap();
        btree
            .insert(&bufmgr, &3u64.to_be_bytes(), b"hello")
            .unwrap();
        btree.insert(&bufmgr, &8u64.to_be_bytes(), b"!").unwrap();
        btree.insert(&bufmgr, &4u64.to_be_bytes(), b",").unwrap();

        let (key, value) = btree
            .search(&bufmgr, SearchMode::Key(3u64.to_be_bytes().to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(key, 3u64.to_be_bytes());
        assert_eq!(value, b"hello");

        // Start mode positions at the smallest key
        let (key, value) = btree
            .search(&bufmgr, SearchMode::Start)
            .unwrap()
            .unwrap();
        assert_eq!(key, 3u64.to_be_bytes());
        assert_eq!(value, b"hello");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let (bufmgr, _temp) = create_bufmgr(10);
        let btree = BPlusTree::create(&bufmgr).unwrap();

        btree.insert(&bufmgr, b"k", b"a").unwrap();
        assert!(matches!(
            btree.insert(&bufmgr, b"k", b"b"),
            Err(MinirelError::DuplicateKey)
        ));

        let (_, value) = btree
            .search(&bufmgr, SearchMode::Key(b"k".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(value, b"a");
    }

    #[test]
    fn test_oversized_pair_rejected() {
        let (bufmgr, _temp) = create_bufmgr(10);
        let btree = BPlusTree::create(&bufmgr).unwrap();

        let huge = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            btree.insert(&bufmgr, b"k", &huge),
            Err(MinirelError::PairTooLarge { .. })
        ));
    }
}
