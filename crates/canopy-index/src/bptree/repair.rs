//! Deletion: strategy selection, underflow repair, and router-key fixups.
//!
//! Erasing a record may leave its node underfull. Repair walks upward from
//! the target leaf: each step classifies the node into one strategy
//! (remove in place, borrow from a neighbour, merge with a sibling, or
//! detach), applies it, and either finishes or hands the parent a dangling
//! router to erase next. Because routers carry subtree *maxima*, every step
//! that changes a node's maximum also rewrites the routers on the path to
//! the common ancestor with the right neighbour.

use canopy_common::{CanopyError, Result};

use super::arena::NodeId;
use super::constants::min_fill;
use super::cursor::Cursor;
use super::index::BPlusTreeSet;
use super::types::{EraseStrategy, KeyOrder};

impl<K: Clone, C: KeyOrder<K>> BPlusTreeSet<K, C> {
    /// Removes the entry a cursor points at.
    ///
    /// Returns a cursor to the next key in ascending order, or *end* when
    /// the largest key was removed. Erasing from an empty tree is an
    /// underflow error; a stale or non-entry cursor is rejected.
    pub fn erase(&mut self, cursor: Cursor) -> Result<Cursor> {
        if self.len == 0 {
            return Err(CanopyError::Underflow);
        }
        if cursor.generation != self.arena.generation() {
            return Err(CanopyError::StaleCursor {
                minted: cursor.generation,
                current: self.arena.generation(),
            });
        }
        let live = !cursor.is_end()
            && self
                .arena
                .get(cursor.node)
                .is_some_and(|node| node.is_leaf && cursor.pos < node.len());
        if !live {
            return Err(CanopyError::InvalidCursor);
        }

        self.len -= 1;
        self.arena.bump_generation();

        if self.len == 0 {
            self.clear();
            return Ok(self.end_cursor());
        }

        let erased_key = self.arena[cursor.node].records[cursor.pos].key.clone();

        let mut node = cursor.node;
        let mut pos = cursor.pos;
        while self.repair_step(&mut node, &mut pos) {}

        // Merges can leave a unary spine above; promote until the root has
        // two children again (or is the one remaining leaf).
        while !self.arena[self.root].is_leaf && self.arena[self.root].len() == 1 {
            let child = self.arena[self.root].records[0].child;
            let old_root = self.root;
            self.arena.release(old_root);
            self.root = child;
            self.arena[child].parent = NodeId::NULL;
        }

        Ok(self.lower_bound(&erased_key))
    }

    /// Picks the repair strategy for removing one record from `node`.
    ///
    /// Borrowing only needs a real chain neighbour; merging also needs the
    /// neighbour to share `node`'s parent. At order 2 a node freed of one
    /// record cannot host a borrow without immediately re-splitting, so
    /// merges are preferred when feasible.
    fn erase_strategy(&self, node: NodeId) -> EraseStrategy {
        if node == self.root {
            return EraseStrategy::Root;
        }

        let fill = min_fill(self.order);
        let n = &self.arena[node];
        let left = n.prev;
        let right = n.next;
        let left_is_end = left.is_null() || left == NodeId::HEADER;
        let right_is_end = right.is_null() || right == NodeId::HEADER;
        let has_left_sibling = !left_is_end && self.arena[left].parent == n.parent;
        let has_right_sibling = !right_is_end && self.arena[right].parent == n.parent;

        let merge_left_fits =
            has_left_sibling && n.len() - 1 + self.arena[left].len() <= self.order;
        let merge_right_fits =
            has_right_sibling && n.len() - 1 + self.arena[right].len() <= self.order;

        if self.order == 2 {
            if merge_left_fits {
                return EraseStrategy::MergeLeft;
            }
            if merge_right_fits {
                return EraseStrategy::MergeRight;
            }
        }

        if n.len() > fill {
            return EraseStrategy::RemoveDirectly;
        }
        if !right_is_end && self.arena[right].len() > fill {
            return EraseStrategy::BorrowRight;
        }
        if !left_is_end && self.arena[left].len() > fill {
            return EraseStrategy::BorrowLeft;
        }
        if merge_left_fits {
            return EraseStrategy::MergeLeft;
        }
        if merge_right_fits {
            return EraseStrategy::MergeRight;
        }
        EraseStrategy::SingleChild
    }

    /// Applies one repair step at `(node, pos)`. Returns `true` when the
    /// parent must erase a record next, updating `node`/`pos` to it.
    fn repair_step(&mut self, node: &mut NodeId, pos: &mut usize) -> bool {
        let strategy = self.erase_strategy(*node);
        let n = *node;
        let at = *pos;
        let erased_key = self.arena[n].records[at].key.clone();
        let left = self.arena[n].prev;
        let right = self.arena[n].next;

        match strategy {
            EraseStrategy::Root => {
                self.arena[n].records.remove(at);
                false
            }

            EraseStrategy::RemoveDirectly => {
                let was_max = at + 1 == self.arena[n].len();
                self.arena[n].records.remove(at);
                if was_max {
                    let new_max = self.arena[n].last_key().clone();
                    self.fix_path(n, &erased_key, &new_max);
                }
                false
            }

            EraseStrategy::BorrowRight => {
                // The borrowed record becomes this node's new maximum; fix
                // the path first, while the ancestors still carry old_max.
                let old_max = self.arena[n].last_key().clone();
                let new_max = self.arena[right].records[0].key.clone();
                self.fix_path(n, &old_max, &new_max);

                self.arena[n].records.remove(at);
                let moved = self.arena[right].records.remove(0);
                if !moved.child.is_null() {
                    self.arena[moved.child].parent = n;
                }
                self.arena[n].records.push(moved);
                false
            }

            EraseStrategy::BorrowLeft => {
                let was_max = at + 1 == self.arena[n].len();
                self.arena[n].records.remove(at);

                let left_last = self.arena[left].len() - 1;
                let moved = self.arena[left].records.remove(left_last);
                let left_old_max = moved.key.clone();
                if !moved.child.is_null() {
                    self.arena[moved.child].parent = n;
                }
                self.arena[n].records.insert(0, moved);

                // The donor lost its maximum.
                let left_new_max = self.arena[left].last_key().clone();
                self.fix_path(left, &left_old_max, &left_new_max);

                if was_max {
                    let new_max = self.arena[n].last_key().clone();
                    self.fix_path(n, &erased_key, &new_max);
                }
                false
            }

            EraseStrategy::MergeLeft => {
                let parent = self.arena[n].parent;
                let was_max = at + 1 == self.arena[n].len();
                self.arena[n].records.remove(at);

                let left_max = self.arena[left].last_key().clone();
                let router = self.find_record(parent, &left_max);

                // Splice the sibling's records in front and adopt its
                // children.
                let mut merged = std::mem::take(&mut self.arena[left].records);
                for rec in &merged {
                    if !rec.child.is_null() {
                        self.arena[rec.child].parent = n;
                    }
                }
                merged.append(&mut self.arena[n].records);
                self.arena[n].records = merged;

                if was_max {
                    let new_max = self.arena[n].last_key().clone();
                    self.fix_path(n, &erased_key, &new_max);
                }

                let left_prev = self.arena[left].prev;
                if !left_prev.is_null() {
                    self.arena[left_prev].next = n;
                }
                self.arena[n].prev = left_prev;
                self.arena.release(left);

                self.arena[parent].records[router].child = NodeId::NULL;
                *node = parent;
                *pos = router;
                true
            }

            EraseStrategy::MergeRight => {
                let parent = self.arena[n].parent;
                let node_max = self.arena[n].last_key().clone();
                self.arena[n].records.remove(at);

                let router = self.find_record(parent, &node_max);

                let mut merged = std::mem::take(&mut self.arena[n].records);
                for rec in &merged {
                    if !rec.child.is_null() {
                        self.arena[rec.child].parent = right;
                    }
                }
                merged.append(&mut self.arena[right].records);
                self.arena[right].records = merged;

                let node_prev = self.arena[n].prev;
                if !node_prev.is_null() {
                    self.arena[node_prev].next = right;
                }
                self.arena[right].prev = node_prev;
                self.arena.release(n);

                self.arena[parent].records[router].child = NodeId::NULL;
                *node = parent;
                *pos = router;
                true
            }

            EraseStrategy::SingleChild => {
                // No neighbour can lend or absorb: the node is an only
                // child holding nothing but the dangling router, so its
                // own router is the parent's first record.
                let parent = self.arena[n].parent;
                self.arena[parent].records[0].child = NodeId::NULL;

                if !left.is_null() {
                    self.arena[left].next = right;
                }
                if !right.is_null() {
                    self.arena[right].prev = left;
                }
                self.arena.release(n);

                *node = parent;
                *pos = 0;
                true
            }
        }
    }

    /// Rewrites router keys after `node`'s maximum changed from `old_max`
    /// to `new_max`.
    ///
    /// On the rightmost spine the new maximum simply rides every ancestor's
    /// last record. Otherwise the ancestors of `node` and of its right
    /// neighbour converge; each ancestor below the meeting point has `node`
    /// rightmost, and the common ancestor holds the router under its old
    /// key.
    fn fix_path(&mut self, node: NodeId, old_max: &K, new_max: &K) {
        let next = self.arena[node].next;
        if next.is_null() || next == NodeId::HEADER {
            let mut cur = self.arena[node].parent;
            while !cur.is_null() {
                let last = self.arena[cur].len() - 1;
                self.arena[cur].records[last].key = new_max.clone();
                cur = self.arena[cur].parent;
            }
        } else {
            let mut right = self.arena[next].parent;
            let mut cur = self.arena[node].parent;
            while cur != right {
                let last = self.arena[cur].len() - 1;
                self.arena[cur].records[last].key = new_max.clone();
                cur = self.arena[cur].parent;
                right = self.arena[right].parent;
            }
            let router = self.find_record(cur, old_max);
            self.arena[cur].records[router].key = new_max.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_tree(order: usize, keys: impl IntoIterator<Item = i32>) -> BPlusTreeSet<i32> {
        let mut tree = BPlusTreeSet::new(order).unwrap();
        for key in keys {
            tree.insert(key);
        }
        tree
    }

    #[test]
    fn test_erase_from_empty_underflows() {
        let mut tree = BPlusTreeSet::<i32>::new(3).unwrap();
        let end = tree.end_cursor();
        assert!(matches!(tree.erase(end), Err(CanopyError::Underflow)));
    }

    #[test]
    fn test_erase_rejects_end_cursor() {
        let mut tree = filled_tree(3, [1, 2, 3]);
        let end = tree.end_cursor();
        assert!(matches!(tree.erase(end), Err(CanopyError::InvalidCursor)));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_erase_rejects_stale_cursor() {
        let mut tree = filled_tree(3, 1..=3);
        let cursor = tree.find(&2);
        // Force a split so the generation moves on.
        tree.insert(4);
        assert!(matches!(
            tree.erase(cursor),
            Err(CanopyError::StaleCursor { .. })
        ));
    }

    #[test]
    fn test_erase_last_key_clears_tree() {
        let mut tree = filled_tree(3, [7]);
        let cursor = tree.find(&7);
        let next = tree.erase(cursor).unwrap();
        assert!(next.is_end());
        assert!(tree.is_empty());
        assert_eq!(tree.first_cursor(), tree.end_cursor());
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_erase_maximum_fixes_routers() {
        let mut tree = filled_tree(3, 1..=8);
        let cursor = tree.find(&8);
        tree.erase(cursor).unwrap();
        assert!(tree.check_invariants().is_ok());

        let dump = tree.dump();
        let root_line = dump.lines().next().unwrap();
        assert!(root_line.ends_with(",7]"), "root line was {root_line}");
        let keys: Vec<i32> = tree.iter().copied().collect();
        assert_eq!(keys, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_borrow_right_updates_router() {
        let mut tree = filled_tree(3, [10, 20, 30, 40, 50, 60, 70]);
        let cursor = tree.find(&40);
        let next = tree.erase(cursor).unwrap();
        assert_eq!(tree.key(next), Some(&50));
        assert!(tree.find(&40).is_end());
        assert_eq!(tree.len(), 6);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_erase_everything_ascending() {
        let mut tree = filled_tree(3, 1..=4);
        for key in 1..=4 {
            let cursor = tree.find(&key);
            let next = tree.erase(cursor).unwrap();
            assert_eq!(next, tree.lower_bound(&key));
            assert!(tree.check_invariants().is_ok());
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn test_order_two_detach_path() {
        // Ascending inserts at order 2 build a tall spine; erasing from the
        // middle exercises the detach arm and the dangling-router cleanup.
        let mut tree = filled_tree(2, 1..=7);
        let cursor = tree.find(&4);
        tree.erase(cursor).unwrap();
        assert!(tree.check_invariants().is_ok());
        let keys: Vec<i32> = tree.iter().copied().collect();
        assert_eq!(keys, vec![1, 2, 3, 5, 6, 7]);
    }
}
