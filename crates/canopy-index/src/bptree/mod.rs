//! B+ tree index with arena-backed node storage.
//!
//! ## Structure
//!
//! ```text
//!                  [ root ]
//!             ┌───────┴───────┐
//!           [..]            [..]        internal records are routers:
//!         ┌───┴──┐        ┌───┴──┐      key = max key of the child subtree
//! header ↔ L1 ↔ L2   ↔    L3 ↔ L4 ↔ header
//! ```
//!
//! All keys live in the leaves, which form a doubly linked cycle closed
//! through a per-tree header sentinel; internal levels carry sibling links
//! too (null-terminated), which the deletion repair uses to find borrow and
//! merge candidates.
//!
//! Every node lives in a slot arena owned by the tree and is addressed by a
//! stable `NodeId`, so splits and merges are index rewrites rather than
//! pointer surgery, and freed slots are recycled. Cursors are plain
//! `(node, position, generation)` triples; the generation stamp exposes
//! cursors that outlived a structural mutation.
//!
//! Insertion descends by router lower bound. A key above the current
//! maximum is routed down the rightmost spine, overwriting each router on
//! the way; an overfull leaf splits off a left sibling and the split
//! cascades while ancestors overflow. Deletion classifies each repair step
//! into a strategy (direct removal, borrow, merge, detach) and rewrites
//! router keys along the ancestor path whenever a subtree maximum changes.

pub mod arena;
pub mod constants;
pub mod cursor;
pub mod index;
mod repair;
pub mod types;

pub use arena::NodeId;
pub use constants::MIN_ORDER;
pub use cursor::{Cursor, Iter};
pub use index::BPlusTreeSet;
pub use types::{KeyOrder, NaturalOrder, OrderFn};
