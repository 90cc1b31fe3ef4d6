mod btree;
mod node;

pub use btree::{BPlusTree, SearchMode};
pub use node::{NodeKind, NodeMut, NodeRef, Pair};
