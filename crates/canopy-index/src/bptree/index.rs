//! The B+ tree set: construction, search, insertion, and diagnostics.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::{self, Write as _};

use canopy_common::{CanopyError, Result};

use super::arena::{NodeArena, NodeId, Record};
use super::constants::{min_fill, MIN_ORDER};
use super::cursor::{Cursor, Iter};
use super::types::{KeyOrder, NaturalOrder};

/// An ordered set of unique keys backed by a B+ tree.
///
/// All keys live in the leaves; internal records are routers whose key is
/// the maximum key of the child subtree. Leaves are chained into a cycle
/// closed through a header sentinel, giving amortised constant-time
/// stepping between adjacent keys in both directions.
///
/// Point operations cost `O(log n)` comparisons. The branching factor
/// (`order`) is fixed at construction: a node holds at most `order`
/// records, one more only transiently while a split is in flight.
pub struct BPlusTreeSet<K, C = NaturalOrder> {
    pub(crate) arena: NodeArena<K>,
    pub(crate) root: NodeId,
    pub(crate) order: usize,
    pub(crate) len: usize,
    pub(crate) comparator: C,
}

impl<K: Ord> BPlusTreeSet<K> {
    /// Creates an empty tree ordered by the keys' natural order.
    pub fn new(order: usize) -> Result<Self> {
        Self::with_comparator(order, NaturalOrder)
    }
}

impl<K, C> BPlusTreeSet<K, C> {
    /// Creates an empty tree with an explicit comparator.
    pub fn with_comparator(order: usize, comparator: C) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(CanopyError::InvalidOrder(order));
        }
        Ok(BPlusTreeSet {
            arena: NodeArena::new(order + 1),
            root: NodeId::NULL,
            order,
            len: 0,
            comparator,
        })
    }

    /// Number of keys in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set contains no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The tree's branching factor.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of levels from the root down to the leaves (0 when empty).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cur = self.root;
        while !cur.is_null() {
            height += 1;
            if self.arena[cur].is_leaf {
                break;
            }
            cur = self.arena[cur].records[0].child;
        }
        height
    }

    /// Removes every key and frees every node.
    pub fn clear(&mut self) {
        self.arena.reset();
        self.arena.bump_generation();
        self.root = NodeId::NULL;
        self.len = 0;
    }

    /// Iterates the keys in ascending order.
    pub fn iter(&self) -> Iter<'_, K, C> {
        Iter::new(self)
    }

    /// Level-order structural dump for diagnostics.
    ///
    /// Each node is rendered as `[k1,k2,...]`; a newline ends every level.
    pub fn dump(&self) -> String
    where
        K: fmt::Display,
    {
        let mut out = String::new();
        if self.root.is_null() {
            return out;
        }

        let mut queue = VecDeque::new();
        queue.push_back(self.root);

        while let Some(cur) = queue.pop_front() {
            let node = &self.arena[cur];
            out.push('[');
            for (i, rec) in node.records.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", rec.key);
                if !rec.child.is_null() {
                    queue.push_back(rec.child);
                }
            }
            out.push(']');
            // The rightmost node of a level has a null next link (internal
            // levels) or loops back to the header (leaf level).
            if node.next.is_null() || node.next == NodeId::HEADER {
                out.push('\n');
            }
        }
        out
    }
}

// =============================================================================
// Search
// =============================================================================

impl<K, C: KeyOrder<K>> BPlusTreeSet<K, C> {
    /// First record position in `node` whose key is not less than `key`.
    #[inline]
    pub(crate) fn lower_bound_in(&self, node: NodeId, key: &K) -> usize {
        self.arena[node]
            .records
            .partition_point(|r| self.comparator.cmp(&r.key, key) == Ordering::Less)
    }

    /// First record position in `node` whose key is greater than `key`.
    #[inline]
    pub(crate) fn upper_bound_in(&self, node: NodeId, key: &K) -> usize {
        self.arena[node]
            .records
            .partition_point(|r| self.comparator.cmp(&r.key, key) != Ordering::Greater)
    }

    /// Position of the record carrying exactly `key`. The key must be
    /// present; violations only trip an assertion in debug builds.
    #[inline]
    pub(crate) fn find_record(&self, node: NodeId, key: &K) -> usize {
        let pos = self.lower_bound_in(node, key);
        debug_assert!(
            pos < self.arena[node].len()
                && self.comparator.eq(&self.arena[node].records[pos].key, key),
            "record lookup for an absent key in {node:?}"
        );
        pos
    }

    /// A cursor at `(node, pos)`, rolled over to the next leaf (or *end*)
    /// when `pos` is one past the node's last record.
    fn cursor_or_roll(&self, node: NodeId, pos: usize) -> Cursor {
        if pos < self.arena[node].len() {
            return self.cursor_at(node, pos);
        }
        let next = self.arena[node].next;
        if next.is_null() || next == NodeId::HEADER {
            self.end_cursor()
        } else {
            self.cursor_at(next, 0)
        }
    }

    /// Looks up `key`, returning a cursor to its entry or *end*.
    pub fn find(&self, key: &K) -> Cursor {
        let mut cur = self.root;
        while !cur.is_null() {
            if self.arena[cur].is_leaf {
                let pos = self.lower_bound_in(cur, key);
                if pos < self.arena[cur].len()
                    && self.comparator.eq(&self.arena[cur].records[pos].key, key)
                {
                    return self.cursor_at(cur, pos);
                }
                return self.end_cursor();
            }
            let pos = self.lower_bound_in(cur, key);
            if pos == self.arena[cur].len() {
                // Larger than the tree's maximum.
                return self.end_cursor();
            }
            cur = self.arena[cur].records[pos].child;
        }
        self.end_cursor()
    }

    /// Cursor to the first key not less than `key`, or *end*.
    pub fn lower_bound(&self, key: &K) -> Cursor {
        let mut cur = self.root;
        while !cur.is_null() {
            let pos = self.lower_bound_in(cur, key);
            if self.arena[cur].is_leaf {
                return self.cursor_or_roll(cur, pos);
            }
            if pos == self.arena[cur].len() {
                return self.end_cursor();
            }
            cur = self.arena[cur].records[pos].child;
        }
        self.end_cursor()
    }

    /// Cursor to the first key greater than `key`, or *end*.
    pub fn upper_bound(&self, key: &K) -> Cursor {
        let mut cur = self.root;
        while !cur.is_null() {
            let pos = self.upper_bound_in(cur, key);
            if self.arena[cur].is_leaf {
                return self.cursor_or_roll(cur, pos);
            }
            if pos == self.arena[cur].len() {
                return self.end_cursor();
            }
            cur = self.arena[cur].records[pos].child;
        }
        self.end_cursor()
    }

    /// The half-open cursor range holding exactly `key`.
    ///
    /// Keys are unique, so the range spans one entry when `key` is present
    /// and is empty otherwise.
    pub fn equal_range(&self, key: &K) -> (Cursor, Cursor) {
        (self.lower_bound(key), self.upper_bound(key))
    }

    /// Returns `true` if `key` is in the set.
    pub fn contains(&self, key: &K) -> bool {
        !self.find(key).is_end()
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<K: Clone, C: KeyOrder<K>> BPlusTreeSet<K, C> {
    /// Inserts `key`, returning a cursor to its entry and whether the key
    /// was newly added. Inserting a present key changes nothing and
    /// reports `false`.
    pub fn insert(&mut self, key: K) -> (Cursor, bool) {
        if self.root.is_null() {
            let leaf = self.arena.allocate();
            {
                let node = &mut self.arena[leaf];
                node.next = NodeId::HEADER;
                node.prev = NodeId::HEADER;
                node.records.push(Record {
                    key,
                    child: NodeId::NULL,
                });
            }
            let header = &mut self.arena[NodeId::HEADER];
            header.next = leaf;
            header.prev = leaf;
            self.root = leaf;
            self.len = 1;
            return (self.cursor_at(leaf, 0), true);
        }

        let mut cur = self.root;
        loop {
            if !self.arena[cur].is_leaf {
                let pos = self.lower_bound_in(cur, &key);
                if pos == self.arena[cur].len() {
                    // New maximum: descend the rightmost spine, rewriting
                    // each router on the way to carry the new max.
                    let last = pos - 1;
                    self.arena[cur].records[last].key = key.clone();
                    cur = self.arena[cur].records[last].child;
                } else {
                    cur = self.arena[cur].records[pos].child;
                }
                continue;
            }

            let pos = self.lower_bound_in(cur, &key);
            if pos < self.arena[cur].len()
                && self.comparator.eq(&self.arena[cur].records[pos].key, &key)
            {
                return (self.cursor_at(cur, pos), false);
            }

            self.arena[cur].records.insert(
                pos,
                Record {
                    key: key.clone(),
                    child: NodeId::NULL,
                },
            );
            self.len += 1;

            if self.arena[cur].len() <= self.order {
                return (self.cursor_at(cur, pos), true);
            }

            // Overflow: split, then keep splitting up the spine while the
            // current ancestor holds more than `order` records.
            self.arena.bump_generation();
            let (mut parent, left) = self.split(cur);
            let target = if self.comparator.lt(&key, &self.arena[cur].records[0].key) {
                left
            } else {
                cur
            };
            let target_pos = self.find_record(target, &key);
            while self.arena[parent].len() > self.order {
                parent = self.split(parent).0;
            }
            return (self.cursor_at(target, target_pos), true);
        }
    }

    /// Splits an overfull node, moving its first `min_fill` records into a
    /// fresh left sibling. Returns `(parent, left)`; the parent is created
    /// (becoming the new root) when the split node had none.
    fn split(&mut self, node: NodeId) -> (NodeId, NodeId) {
        let half = min_fill(self.order);
        let left = self.arena.allocate();

        let moved: Vec<Record<K>> = self.arena[node].records.drain(..half).collect();
        for rec in &moved {
            if !rec.child.is_null() {
                self.arena[rec.child].parent = left;
            }
        }
        let is_leaf = self.arena[node].is_leaf;
        {
            let l = &mut self.arena[left];
            l.records = moved;
            l.is_leaf = is_leaf;
        }

        // Wire the sibling into the level chain to the left of `node`.
        // Sibling links first, parent linkage after, so no step observes a
        // half-connected chain.
        let node_prev = self.arena[node].prev;
        self.arena[left].next = node;
        if !node_prev.is_null() {
            self.arena[left].prev = node_prev;
            self.arena[node_prev].next = left;
        }
        self.arena[node].prev = left;

        let mut parent = self.arena[node].parent;
        if parent.is_null() {
            // The root split: a fresh root starts with a single router
            // carrying the old root's post-split maximum.
            parent = self.arena.allocate();
            self.arena[parent].is_leaf = false;
            self.root = parent;
            let node_max = self.arena[node].last_key().clone();
            self.arena[parent].records.push(Record {
                key: node_max,
                child: node,
            });
        }

        let left_max = self.arena[left].last_key().clone();
        let pos = self.lower_bound_in(parent, &left_max);
        self.arena[parent].records.insert(
            pos,
            Record {
                key: left_max,
                child: left,
            },
        );

        self.arena[node].parent = parent;
        self.arena[left].parent = parent;

        (parent, left)
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

struct CheckState {
    leaf_depth: Option<usize>,
    leaves: Vec<NodeId>,
}

impl<K, C: KeyOrder<K>> BPlusTreeSet<K, C> {
    /// Verifies every structural invariant, reporting the first violation.
    ///
    /// Checked: parent back-references, router keys equalling their subtree
    /// maxima, uniform leaf depth, fill bounds, strict key order within
    /// nodes and across the leaf chain, chain closure through the header,
    /// and the size counter.
    pub fn check_invariants(&self) -> Result<()> {
        if self.root.is_null() {
            if self.len != 0 {
                return Err(CanopyError::Corrupted(format!(
                    "empty tree reports {} keys",
                    self.len
                )));
            }
            let header = &self.arena[NodeId::HEADER];
            if header.next != NodeId::HEADER || header.prev != NodeId::HEADER {
                return Err(CanopyError::Corrupted(
                    "empty tree with a non-trivial leaf chain".to_string(),
                ));
            }
            return Ok(());
        }

        if !self.arena[self.root].parent.is_null() {
            return Err(CanopyError::Corrupted(
                "root has a parent back-reference".to_string(),
            ));
        }
        if !self.arena[self.root].is_leaf && self.arena[self.root].len() < 2 {
            return Err(CanopyError::Corrupted(
                "internal root with fewer than two children".to_string(),
            ));
        }

        let mut state = CheckState {
            leaf_depth: None,
            leaves: Vec::new(),
        };
        self.check_subtree(self.root, 1, &mut state)?;

        // The chain must visit exactly the tree's leaves, left to right,
        // with agreeing next/prev links, and close back on the header.
        let mut chain = Vec::new();
        let mut cur = self.arena[NodeId::HEADER].next;
        while cur != NodeId::HEADER {
            let node = self
                .arena
                .get(cur)
                .ok_or_else(|| CanopyError::Corrupted(format!("chain reaches dead {cur:?}")))?;
            if !node.is_leaf {
                return Err(CanopyError::Corrupted(format!(
                    "chain reaches non-leaf {cur:?}"
                )));
            }
            let next = node.next;
            let backlink = self.arena.get(next).map(|n| n.prev);
            if backlink != Some(cur) {
                return Err(CanopyError::Corrupted(format!(
                    "chain links disagree between {cur:?} and {next:?}"
                )));
            }
            chain.push(cur);
            if chain.len() > state.leaves.len() {
                return Err(CanopyError::Corrupted(
                    "leaf chain does not close on the header".to_string(),
                ));
            }
            cur = next;
        }
        if chain != state.leaves {
            return Err(CanopyError::Corrupted(
                "leaf chain order differs from tree order".to_string(),
            ));
        }

        let mut prev_key: Option<&K> = None;
        let mut count = 0usize;
        for &leaf in &chain {
            for rec in &self.arena[leaf].records {
                if !rec.child.is_null() {
                    return Err(CanopyError::Corrupted(format!(
                        "leaf {leaf:?} carries a child link"
                    )));
                }
                if let Some(prev) = prev_key {
                    if self.comparator.cmp(prev, &rec.key) != Ordering::Less {
                        return Err(CanopyError::Corrupted(format!(
                            "keys out of order in the chain at {leaf:?}"
                        )));
                    }
                }
                prev_key = Some(&rec.key);
                count += 1;
            }
        }
        if count != self.len {
            return Err(CanopyError::Corrupted(format!(
                "size counter {} disagrees with {} stored keys",
                self.len, count
            )));
        }

        Ok(())
    }

    /// Walks a subtree, validating per-node invariants. Returns the
    /// subtree's maximum key so callers can check their router.
    fn check_subtree<'a>(
        &'a self,
        node: NodeId,
        depth: usize,
        state: &mut CheckState,
    ) -> Result<&'a K> {
        let n = self
            .arena
            .get(node)
            .ok_or_else(|| CanopyError::Corrupted(format!("tree references dead {node:?}")))?;

        if n.len() == 0 {
            return Err(CanopyError::Corrupted(format!("empty node {node:?}")));
        }
        if n.len() > self.order {
            return Err(CanopyError::Corrupted(format!(
                "node {node:?} holds {} records, order is {}",
                n.len(),
                self.order
            )));
        }
        for i in 1..n.len() {
            if self.comparator.cmp(&n.records[i - 1].key, &n.records[i].key) != Ordering::Less {
                return Err(CanopyError::Corrupted(format!(
                    "records out of order in {node:?}"
                )));
            }
        }

        if n.is_leaf {
            match state.leaf_depth {
                None => state.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(CanopyError::Corrupted(format!(
                        "leaf {node:?} at depth {depth}, expected {expected}"
                    )));
                }
                _ => {}
            }
            state.leaves.push(node);
            return Ok(n.last_key());
        }

        for rec in &n.records {
            if rec.child.is_null() {
                return Err(CanopyError::Corrupted(format!(
                    "dangling router in {node:?}"
                )));
            }
            let child = self.arena.get(rec.child).ok_or_else(|| {
                CanopyError::Corrupted(format!("router in {node:?} targets a dead node"))
            })?;
            if child.parent != node {
                return Err(CanopyError::Corrupted(format!(
                    "parent back-reference of {:?} is not {node:?}",
                    rec.child
                )));
            }
            let subtree_max = self.check_subtree(rec.child, depth + 1, state)?;
            if !self.comparator.eq(&rec.key, subtree_max) {
                return Err(CanopyError::Corrupted(format!(
                    "router key in {node:?} is not the maximum of {:?}",
                    rec.child
                )));
            }
        }
        Ok(n.last_key())
    }
}

impl<K: fmt::Debug, C> fmt::Debug for BPlusTreeSet<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_validation() {
        assert!(BPlusTreeSet::<i32>::new(1).is_err());
        assert!(BPlusTreeSet::<i32>::new(2).is_ok());
    }

    #[test]
    fn test_empty_tree_queries() {
        let tree = BPlusTreeSet::<i32>::new(3).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.find(&1).is_end());
        assert!(tree.lower_bound(&1).is_end());
        assert!(tree.upper_bound(&1).is_end());
        assert_eq!(tree.dump(), "");
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_rightmost_routing_overwrite() {
        let mut tree = BPlusTreeSet::<i32>::new(3).unwrap();
        for key in [1, 2, 3, 4] {
            tree.insert(key);
        }
        // Inserting past the maximum must rewrite the rightmost router.
        tree.insert(9);
        assert!(tree.check_invariants().is_ok());
        let dump = tree.dump();
        let root_line = dump.lines().next().unwrap();
        assert!(root_line.ends_with(",9]"), "root line was {root_line}");
    }

    #[test]
    fn test_split_keeps_inserted_key_reachable() {
        let mut tree = BPlusTreeSet::<i32>::new(3).unwrap();
        for key in [10, 20, 30] {
            tree.insert(key);
        }
        // 15 lands in the left half of the split.
        let (cursor, inserted) = tree.insert(15);
        assert!(inserted);
        assert_eq!(tree.key(cursor), Some(&15));
        // 40 lands in the right half.
        let (cursor, inserted) = tree.insert(40);
        assert!(inserted);
        assert_eq!(tree.key(cursor), Some(&40));
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_reverse_comparator() {
        use crate::bptree::types::OrderFn;

        let mut tree =
            BPlusTreeSet::with_comparator(3, OrderFn(|a: &i32, b: &i32| b.cmp(a))).unwrap();
        for key in [1, 5, 3, 4, 2] {
            tree.insert(key);
        }
        let keys: Vec<i32> = tree.iter().copied().collect();
        assert_eq!(keys, vec![5, 4, 3, 2, 1]);
        assert!(tree.check_invariants().is_ok());
    }
}
