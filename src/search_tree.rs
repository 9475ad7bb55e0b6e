//! Binary search tree over window positions, arranged as an arena of
//! `window_max + 1` slots (`parent`/`smaller`/`larger`), expressed as three
//! parallel index arrays rather than owning pointers per node. Index
//! `window_max` is the sentinel root whose `larger` child is the tree's
//! real root; comparisons walk the full `lookahead_max`-byte key starting
//! at each slot's window position.
//!
//! A missing child is represented as `None` rather than an out-of-band
//! sentinel value: with `window_max` allowed up to 65535, a `0xFFFF`
//! sentinel would collide with a legal slot index at the top of the range,
//! so `Option<usize>` is used instead of a magic constant.
//!
//! The actual longest-prefix *comparison* (walking window bytes) is owned
//! by `ustream`, which holds the window data; this module only owns tree
//! shape. `find_and_insert` takes a `compare` closure supplied by the
//! caller (`compare(test_slot) -> (common_prefix_len, Ordering)`) and does
//! the traversal/splice/insert bookkeeping.

use std::cmp::Ordering;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Smaller,
    Larger,
}

/// A binary search tree over `0..capacity` window positions, slot
/// `capacity` being the sentinel root.
pub struct SearchTree {
    capacity: usize,
    parent: Vec<Option<usize>>,
    smaller: Vec<Option<usize>>,
    larger: Vec<Option<usize>>,
}

/// Result of a `find_and_insert` traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub length: usize,
    /// Window distance behind the inserted slot, i.e. `phrase.offset`.
    pub offset: usize,
}

impl SearchTree {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            parent: vec![None; capacity + 1],
            smaller: vec![None; capacity + 1],
            larger: vec![None; capacity + 1],
        }
    }

    fn sentinel(&self) -> usize {
        self.capacity
    }

    /// Resets the tree to empty.
    pub fn init(&mut self) {
        let sentinel = self.sentinel();
        self.parent.iter_mut().for_each(|p| *p = None);
        self.smaller.iter_mut().for_each(|p| *p = None);
        self.larger.iter_mut().for_each(|p| *p = None);
        let _ = sentinel;
    }

    fn child(&self, slot: usize, side: Side) -> Option<usize> {
        match side {
            Side::Smaller => self.smaller[slot],
            Side::Larger => self.larger[slot],
        }
    }

    fn set_child(&mut self, slot: usize, side: Side, value: Option<usize>) {
        match side {
            Side::Smaller => self.smaller[slot] = value,
            Side::Larger => self.larger[slot] = value,
        }
    }

    /// Is `slot` currently linked into the tree (has a parent, including the
    /// sentinel root)?
    pub fn is_linked(&self, slot: usize) -> bool {
        self.parent[slot].is_some()
    }

    fn side_of(&self, parent: usize, child: usize) -> Side {
        if self.smaller[parent] == Some(child) {
            Side::Smaller
        } else {
            assert_eq!(
                self.larger[parent],
                Some(child),
                "node {child} is not linked as a child of {parent}"
            );
            Side::Larger
        }
    }

    fn attach(&mut self, parent: usize, side: Side, child: usize) {
        self.set_child(parent, side, Some(child));
        self.parent[child] = Some(parent);
    }

    /// Window distance from `r` back to `p`, expressed purely as a function
    /// of slot indices, independent of window contents.
    fn offset_between(&self, r: usize, p: usize) -> usize {
        let capacity = self.capacity as i64;
        (((r as i64 - p as i64).rem_euclid(capacity)) - 1) as usize
    }

    /// Searches for the longest match to the `lookahead_max`-byte key that
    /// starts at slot `r`, inserting `r` into the tree along the way (or
    /// splicing it in place of a full-length duplicate). `compare(p)` must
    /// return the length of the common prefix between the key at `r` and
    /// the key at `p`, plus the `Ordering` of the first differing byte
    /// (`Less` if the key at `r` sorts before the key at `p`).
    /// `lookahead_max` bounds how long a match can possibly be (a full-length
    /// match triggers the duplicate-merge path instead of a further
    /// descent).
    pub fn find_and_insert(
        &mut self,
        r: usize,
        lookahead_max: usize,
        mut compare: impl FnMut(usize) -> (usize, Ordering),
    ) -> MatchResult {
        self.smaller[r] = None;
        self.larger[r] = None;
        self.parent[r] = None;

        let mut best = MatchResult { length: 0, offset: 0 };
        let sentinel = self.sentinel();
        let mut side = Side::Larger;
        let mut parent_slot = sentinel;
        let mut p = match self.child(parent_slot, side) {
            Some(p) => p,
            None => {
                self.attach(parent_slot, side, r);
                return best;
            }
        };

        loop {
            if p == r {
                // Nothing to do: the position is already where we'd insert it.
                return best;
            }
            let (common_len, order) = compare(p);
            if common_len > best.length {
                best.length = common_len;
                best.offset = self.offset_between(r, p);
            } else if common_len == best.length && common_len > 0 {
                let candidate_offset = self.offset_between(r, p);
                if candidate_offset < best.offset {
                    best.offset = candidate_offset;
                }
            }
            if common_len >= lookahead_max {
                // Full-length match: splice r in place of p (duplicate-key
                // merge).
                self.replace_in_place(p, r);
                return best;
            }
            side = match order {
                Ordering::Less => Side::Smaller,
                _ => Side::Larger,
            };
            parent_slot = p;
            p = match self.child(parent_slot, side) {
                Some(next) => next,
                None => {
                    self.attach(parent_slot, side, r);
                    return best;
                }
            };
        }
    }

    /// Splices `new_slot` into the tree in place of `old_slot`, copying
    /// `old_slot`'s children and parent link over: the old slot's position
    /// has fallen out of favour (a newer position has the identical key),
    /// but the subtree structure rooted there is preserved.
    fn replace_in_place(&mut self, old_slot: usize, new_slot: usize) {
        let parent = self.parent[old_slot].expect("old_slot must be linked");
        let side = self.side_of(parent, old_slot);
        let smaller = self.smaller[old_slot];
        let larger = self.larger[old_slot];
        self.set_child(parent, side, Some(new_slot));
        self.parent[new_slot] = Some(parent);
        self.smaller[new_slot] = smaller;
        self.larger[new_slot] = larger;
        if let Some(s) = smaller {
            self.parent[s] = Some(new_slot);
        }
        if let Some(l) = larger {
            self.parent[l] = Some(new_slot);
        }
        self.parent[old_slot] = None;
        self.smaller[old_slot] = None;
        self.larger[old_slot] = None;
    }

    /// Removes `slot` from the tree if it is currently linked; a no-op
    /// otherwise (the position may never have been indexed, or may already
    /// have been spliced out by an earlier duplicate-merge).
    ///
    /// Ported from `LZSS::delete_node`: a node with at most one child is
    /// replaced directly by that child; a node with two children is
    /// replaced by its in-order predecessor (the rightmost descendant of
    /// its smaller subtree).
    pub fn delete(&mut self, slot: usize) {
        if self.parent[slot].is_none() {
            return;
        }
        let replacement = match (self.smaller[slot], self.larger[slot]) {
            (None, None) => {
                self.detach_leaf(slot);
                return;
            }
            (Some(only), None) | (None, Some(only)) => only,
            (Some(left), Some(right)) => {
                if self.larger[left].is_none() {
                    // Left child has no right subtree: it becomes the
                    // replacement directly, picking up `right` as its new
                    // larger child.
                    self.attach(left, Side::Larger, right);
                    left
                } else {
                    // Walk down the rightmost spine of `left` to find the
                    // in-order predecessor.
                    let mut terminus = left;
                    while let Some(next) = self.larger[terminus] {
                        terminus = next;
                    }
                    let terminus_parent = self.parent[terminus].unwrap();
                    // Detach terminus from its parent, promoting its
                    // (possible) smaller child into its place.
                    if let Some(term_left) = self.smaller[terminus] {
                        self.attach(terminus_parent, Side::Larger, term_left);
                    } else {
                        self.smaller[terminus_parent] = None;
                    }
                    self.attach(terminus, Side::Smaller, left);
                    self.attach(terminus, Side::Larger, right);
                    terminus
                }
            }
        };
        let parent = self.parent[slot].unwrap();
        let side = self.side_of(parent, slot);
        self.attach(parent, side, replacement);
        self.parent[slot] = None;
        self.smaller[slot] = None;
        self.larger[slot] = None;
    }

    fn detach_leaf(&mut self, slot: usize) {
        let parent = self.parent[slot].unwrap();
        let side = self.side_of(parent, slot);
        self.set_child(parent, side, None);
        self.parent[slot] = None;
    }

    /// Left-rotates the slot array by `shift` positions and decrements every
    /// stored index by `shift mod capacity`, preserving the sentinel (index
    /// `capacity`) in place. Used when the backing window buffer is
    /// compacted and the slot-to-position mapping shifts by `shift`.
    pub fn rotate(&mut self, shift: usize) {
        if shift == 0 {
            return;
        }
        let capacity = self.capacity;
        let remap = |idx: usize| -> usize {
            if idx == capacity {
                capacity
            } else {
                (idx + capacity - shift % capacity) % capacity
            }
        };
        let rotate_vec = |v: &mut Vec<Option<usize>>| {
            let mut rotated = vec![None; capacity + 1];
            for old_idx in 0..=capacity {
                let new_idx = remap(old_idx);
                rotated[new_idx] = v[old_idx].map(remap);
            }
            *v = rotated;
        };
        rotate_vec(&mut self.parent);
        rotate_vec(&mut self.smaller);
        rotate_vec(&mut self.larger);
    }
}
