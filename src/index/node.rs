//! On-page layout of B+Tree nodes.
//!
//! Every node page starts with an 8-byte header: bytes `[0..4)` hold the
//! node type (big-endian u32, 0 = leaf, 1 = branch) and bytes `[4..8)` the
//! count (pairs for a leaf, separator keys for a branch).
//!
//! A leaf body is a run of records `[pair_size: u32 BE][payload]`, where
//! the payload is `[key_len: u32 BE][key bytes][value bytes]`. A branch
//! body holds `count` length-prefixed keys (`[key_len: u32 BE][key]`)
//! followed by `count + 1` child page ids, 8 bytes little-endian each.

use crate::common::{MinirelError, PageId, Result, PAGE_SIZE};

pub const HEADER_SIZE: usize = 8;

const NODE_TYPE_LEAF: u32 = 0;
const NODE_TYPE_BRANCH: u32 = 1;

const LEN_PREFIX: usize = 4;
const CHILD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Branch,
}

/// A key/value pair held by a leaf node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Pair {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// On-page size of a record holding a key and value of these lengths.
    pub fn record_size_for(key_len: usize, value_len: usize) -> usize {
        LEN_PREFIX + LEN_PREFIX + key_len + value_len
    }

    /// On-page size of this pair's record, length prefixes included.
    pub fn record_size(&self) -> usize {
        Self::record_size_for(self.key.len(), self.value.len())
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| MinirelError::Corrupted("node field out of page bounds".to_string()))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Read-only view over a node page.
pub struct NodeRef<'a> {
    data: &'a [u8],
}

impl<'a> NodeRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn kind(&self) -> Result<NodeKind> {
        match read_u32(self.data, 0)? {
            NODE_TYPE_LEAF => Ok(NodeKind::Leaf),
            NODE_TYPE_BRANCH => Ok(NodeKind::Branch),
            other => Err(MinirelError::Corrupted(format!(
                "unknown node type tag {}",
                other
            ))),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let count = read_u32(self.data, 4)? as usize;
        // Even zero-length entries take a length prefix each, so any count
        // past this bound cannot fit the page body
        if count > (PAGE_SIZE - HEADER_SIZE) / LEN_PREFIX {
            return Err(MinirelError::Corrupted(format!(
                "node claims {} entries, page cannot hold that many",
                count
            )));
        }
        Ok(count)
    }

    /// Deserializes a leaf body into its pairs, in stored (ascending key)
    /// order.
    pub fn leaf_pairs(&self) -> Result<Vec<Pair>> {
        let count = self.count()?;
        let mut pairs = Vec::with_capacity(count);
        let mut offset = HEADER_SIZE;

        for _ in 0..count {
            let pair_size = read_u32(self.data, offset)? as usize;
            offset += LEN_PREFIX;
            let payload = self.data.get(offset..offset + pair_size).ok_or_else(|| {
                MinirelError::Corrupted("leaf pair runs past page end".to_string())
            })?;

            let key_len = read_u32(payload, 0)? as usize;
            if LEN_PREFIX + key_len > pair_size {
                return Err(MinirelError::Corrupted(
                    "leaf pair key length exceeds pair size".to_string(),
                ));
            }
            let key = payload[LEN_PREFIX..LEN_PREFIX + key_len].to_vec();
            let value = payload[LEN_PREFIX + key_len..].to_vec();
            pairs.push(Pair::new(key, value));

            offset += pair_size;
        }

        Ok(pairs)
    }

    /// Deserializes a branch body into its separator keys and child ids.
    pub fn branch_keys_children(&self) -> Result<(Vec<Vec<u8>>, Vec<PageId>)> {
        let count = self.count()?;
        if count == 0 {
            return Err(MinirelError::Corrupted(
                "branch node with no separator keys".to_string(),
            ));
        }

        let mut keys = Vec::with_capacity(count);
        let mut offset = HEADER_SIZE;

        for _ in 0..count {
            let key_len = read_u32(self.data, offset)? as usize;
            offset += LEN_PREFIX;
            let key = self.data.get(offset..offset + key_len).ok_or_else(|| {
                MinirelError::Corrupted("branch key runs past page end".to_string())
            })?;
            keys.push(key.to_vec());
            offset += key_len;
        }

        let mut children = Vec::with_capacity(count + 1);
        for _ in 0..count + 1 {
            let bytes: [u8; 8] = self
                .data
                .get(offset..offset + CHILD_SIZE)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| {
                    MinirelError::Corrupted("branch child id runs past page end".to_string())
                })?;
            children.push(PageId::from_bytes(bytes));
            offset += CHILD_SIZE;
        }

        Ok((keys, children))
    }
}

/// Mutable view over a node page.
pub struct NodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> NodeMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes the page as an empty leaf.
    pub fn init_leaf(&mut self) {
        self.data.fill(0);
        self.set_kind(NodeKind::Leaf);
        self.set_count(0);
    }

    /// Initializes the page as a branch with no keys yet. The caller must
    /// populate it with `set_branch` before the page is read back.
    pub fn init_branch(&mut self) {
        self.data.fill(0);
        self.set_kind(NodeKind::Branch);
        self.set_count(0);
    }

    fn set_kind(&mut self, kind: NodeKind) {
        let tag = match kind {
            NodeKind::Leaf => NODE_TYPE_LEAF,
            NodeKind::Branch => NODE_TYPE_BRANCH,
        };
        self.data[0..4].copy_from_slice(&tag.to_be_bytes());
    }

    fn set_count(&mut self, count: usize) {
        self.data[4..8].copy_from_slice(&(count as u32).to_be_bytes());
    }

    /// Serializes the pairs into the leaf body. The pairs must already be
    /// sorted by key.
    pub fn set_leaf_pairs(&mut self, pairs: &[Pair]) -> Result<()> {
        let body_size: usize = pairs.iter().map(Pair::record_size).sum();
        if HEADER_SIZE + body_size > PAGE_SIZE {
            return Err(MinirelError::Corrupted(format!(
                "{} leaf pairs need {} bytes, page holds {}",
                pairs.len(),
                HEADER_SIZE + body_size,
                PAGE_SIZE
            )));
        }

        self.set_count(pairs.len());
        let mut offset = HEADER_SIZE;
        for pair in pairs {
            let payload_size = LEN_PREFIX + pair.key.len() + pair.value.len();
            self.data[offset..offset + LEN_PREFIX]
                .copy_from_slice(&(payload_size as u32).to_be_bytes());
            offset += LEN_PREFIX;
            self.data[offset..offset + LEN_PREFIX]
                .copy_from_slice(&(pair.key.len() as u32).to_be_bytes());
            offset += LEN_PREFIX;
            self.data[offset..offset + pair.key.len()].copy_from_slice(&pair.key);
            offset += pair.key.len();
            self.data[offset..offset + pair.value.len()].copy_from_slice(&pair.value);
            offset += pair.value.len();
        }
        // Stale bytes past the body are never read; count bounds all reads
        Ok(())
    }

    /// Serializes separator keys and child ids into the branch body.
    pub fn set_branch(&mut self, keys: &[Vec<u8>], children: &[PageId]) -> Result<()> {
        assert_eq!(
            children.len(),
            keys.len() + 1,
            "branch must have one more child than keys"
        );

        let body_size: usize = keys.iter().map(|k| LEN_PREFIX + k.len()).sum::<usize>()
            + children.len() * CHILD_SIZE;
        if HEADER_SIZE + body_size > PAGE_SIZE {
            return Err(MinirelError::Corrupted(format!(
                "{} branch keys need {} bytes, page holds {}",
                keys.len(),
                HEADER_SIZE + body_size,
                PAGE_SIZE
            )));
        }

        self.set_count(keys.len());
        let mut offset = HEADER_SIZE;
        for key in keys {
            self.data[offset..offset + LEN_PREFIX]
                .copy_from_slice(&(key.len() as u32).to_be_bytes());
            offset += LEN_PREFIX;
            self.data[offset..offset + key.len()].copy_from_slice(key);
            offset += key.len();
        }
        for child in children {
            self.data[offset..offset + CHILD_SIZE].copy_from_slice(&child.to_bytes());
            offset += CHILD_SIZE;
        }
        Ok(())
    }
}
