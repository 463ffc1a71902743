//! In-memory ordered index for Canopy.
//!
//! This crate provides:
//! - An arena-backed B+ tree set storing unique keys in sorted order
//! - Point lookup, lower/upper bound, and equal-range queries
//! - Bidirectional cursors and sorted iteration over the leaf chain
//! - Structural diagnostics: level-order dump and invariant checker

mod bptree;

pub use bptree::{
    BPlusTreeSet, Cursor, Iter, KeyOrder, NaturalOrder, NodeId, OrderFn, MIN_ORDER,
};
