//! # Trie Iteration
//!
//! Cursors over the ordered key space of one trie root. Both directions
//! keep a small explicit stack of (node, progress) frames instead of
//! parent pointers: nodes are shared between revisions, so they cannot
//! know their parents.
//!
//! ## Seeking
//!
//! - `seek_prefix(p)` restricts the iterator's domain to keys that start
//!   with `p` and positions at the first (forward) or last (reverse) key
//!   of that domain.
//! - `seek_lower_bound(k)` (forward) positions at the smallest key >= `k`.
//! - `seek_below(k)` (reverse) positions at the greatest key < `k`.
//!
//! Prefix and bound combine: the prefix restricts the domain, the bound
//! positions inside it. The bound is an absolute key (it carries the
//! prefix bytes), which keeps a single descent routine for both seeks.
//!
//! ## Rewind
//!
//! `back(n)` moves a forward iterator n positions earlier without
//! yielding. There are no parent pointers to climb, so the rewind runs a
//! bounded reverse seek from the root: find the n-th predecessor of the
//! current position within the prefix domain, then re-seek forward to it.
//! Rewinding past the start of the domain is an error.
//!
//! ## Stability
//!
//! An iterator owns its root; whatever the writer does afterwards, the
//! frames walk the frozen revision the iterator was created from.

use std::sync::Arc;

use eyre::{bail, Result};
use smallvec::SmallVec;

use super::node::{common_prefix_len, Node};

struct Frame<V> {
    node: Arc<Node<V>>,
    emit_leaf: bool,
    next_edge: usize,
}

/// Ascending iterator over one trie root.
pub struct Iter<V> {
    root: Arc<Node<V>>,
    stack: SmallVec<[Frame<V>; 8]>,
    prefix: Vec<u8>,
    peeked: Option<(Arc<[u8]>, V)>,
    done: bool,
}

impl<V: Clone> Iter<V> {
    pub(crate) fn new(root: Arc<Node<V>>) -> Self {
        let mut iter = Iter {
            root,
            stack: SmallVec::new(),
            prefix: Vec::new(),
            peeked: None,
            done: false,
        };
        iter.reseek(&[]);
        iter
    }

    /// Restricts the domain to keys starting with `prefix` and positions
    /// at the first such key.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        self.prefix = prefix.to_vec();
        let bound = prefix.to_vec();
        self.reseek(&bound);
    }

    /// Positions at the smallest key >= `bound`, keeping any prefix
    /// restriction in place. The bound is absolute (includes the prefix).
    pub fn seek_lower_bound(&mut self, bound: &[u8]) {
        self.reseek(bound);
    }

    /// Moves the iterator `steps` positions earlier in key order.
    ///
    /// Fails without moving when fewer than `steps` positions exist
    /// between the start of the (prefix-restricted) domain and the current
    /// position.
    pub fn back(&mut self, steps: u64) -> Result<()> {
        if steps == 0 {
            return Ok(());
        }
        let bound = self.peek().map(|(key, _)| key.clone());
        let prefix = self.prefix.clone();

        let mut rev = RevIter::new(self.root.clone());
        rev.seek_prefix(&prefix);
        if let Some(key) = &bound {
            rev.seek_below(key);
        }

        let mut target = None;
        for taken in 0..steps {
            match rev.next() {
                Some((key, _)) => target = Some(key),
                None => bail!(
                    "cannot rewind {} positions, only {} available",
                    steps,
                    taken
                ),
            }
        }
        if let Some(key) = target {
            self.reseek(&key);
        }
        Ok(())
    }

    /// The entry `next` would yield, without consuming it.
    pub fn peek(&mut self) -> Option<&(Arc<[u8]>, V)> {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked.as_ref()
    }

    fn reseek(&mut self, bound: &[u8]) {
        self.stack.clear();
        self.peeked = None;
        self.done = false;

        let mut node = self.root.clone();
        let mut search: &[u8] = bound;
        loop {
            let common = common_prefix_len(&node.prefix, search);
            if common == search.len() {
                // Bound exhausted inside (or exactly at) this node's
                // prefix: the whole subtree is >= bound.
                self.stack.push(Frame {
                    node,
                    emit_leaf: true,
                    next_edge: 0,
                });
                return;
            }
            if common < node.prefix.len() {
                if node.prefix[common] > search[common] {
                    // Subtree diverges above the bound.
                    self.stack.push(Frame {
                        node,
                        emit_leaf: true,
                        next_edge: 0,
                    });
                }
                // Otherwise the subtree is entirely below the bound.
                return;
            }

            // Prefix consumed; descend toward the bound, queueing the
            // sibling edges that sort after it. The node's own leaf is a
            // strict prefix of the bound, hence below it.
            search = &search[common..];
            let label = search[0];
            let idx = node.lower_edge(label);
            let descend = node.find_edge(label);
            self.stack.push(Frame {
                node: node.clone(),
                emit_leaf: false,
                next_edge: if descend.is_some() { idx + 1 } else { idx },
            });
            match descend {
                Some(edge) => {
                    let child = node.edges[edge].clone();
                    node = child;
                }
                None => return,
            }
        }
    }

    fn advance(&mut self) -> Option<(Arc<[u8]>, V)> {
        if self.done {
            return None;
        }
        loop {
            let frame = self.stack.last_mut()?;
            if frame.emit_leaf {
                frame.emit_leaf = false;
                let entry = frame
                    .node
                    .leaf
                    .as_ref()
                    .map(|leaf| (leaf.key.clone(), leaf.value.clone()));
                if let Some((key, value)) = entry {
                    if key.starts_with(&self.prefix) {
                        return Some((key, value));
                    }
                    if key.as_ref() > self.prefix.as_slice() {
                        // Ordered ascent has left the prefix domain.
                        self.done = true;
                        self.stack.clear();
                        return None;
                    }
                    // Below the domain; keep walking up to it.
                }
                continue;
            }
            if frame.next_edge < frame.node.edges.len() {
                let child = frame.node.edges[frame.next_edge].clone();
                frame.next_edge += 1;
                self.stack.push(Frame {
                    node: child,
                    emit_leaf: true,
                    next_edge: 0,
                });
            } else {
                self.stack.pop();
            }
        }
    }
}

impl<V: Clone> Iterator for Iter<V> {
    type Item = (Arc<[u8]>, V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.peeked.take() {
            return Some(entry);
        }
        self.advance()
    }
}

struct RevFrame<V> {
    node: Arc<Node<V>>,
    /// Edges `[..remaining]` are still to be visited, highest label first.
    remaining: usize,
    emit_leaf: bool,
}

/// Descending iterator over one trie root.
pub struct RevIter<V> {
    root: Arc<Node<V>>,
    stack: SmallVec<[RevFrame<V>; 8]>,
    prefix: Vec<u8>,
    done: bool,
}

impl<V: Clone> RevIter<V> {
    pub(crate) fn new(root: Arc<Node<V>>) -> Self {
        let mut iter = RevIter {
            root,
            stack: SmallVec::new(),
            prefix: Vec::new(),
            done: false,
        };
        iter.seek_prefix(&[]);
        iter
    }

    /// Restricts the domain to keys starting with `prefix` and positions
    /// at the last such key.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        self.prefix = prefix.to_vec();
        self.stack.clear();
        self.done = false;

        let mut node = self.root.clone();
        let mut search: &[u8] = prefix;
        loop {
            let common = common_prefix_len(&node.prefix, search);
            if common == search.len() {
                // Whole subtree lies inside the domain.
                let remaining = node.edges.len();
                self.stack.push(RevFrame {
                    node,
                    remaining,
                    emit_leaf: true,
                });
                return;
            }
            if common < node.prefix.len() {
                // Diverges: no keys carry this prefix.
                return;
            }
            // This node's leaf and its other children fall outside the
            // domain; only the matching edge can carry it.
            search = &search[common..];
            match node.find_edge(search[0]) {
                Some(edge) => {
                    let child = node.edges[edge].clone();
                    node = child;
                }
                None => return,
            }
        }
    }

    /// Positions at the greatest key strictly below `bound`, keeping any
    /// prefix restriction in place. The bound is absolute.
    pub fn seek_below(&mut self, bound: &[u8]) {
        self.stack.clear();
        self.done = false;

        let mut node = self.root.clone();
        let mut search: &[u8] = bound;
        loop {
            let common = common_prefix_len(&node.prefix, search);
            if common == search.len() {
                // Every key in this subtree extends or equals the bound:
                // all >= bound, nothing to visit.
                return;
            }
            if common < node.prefix.len() {
                if node.prefix[common] < search[common] {
                    let remaining = node.edges.len();
                    self.stack.push(RevFrame {
                        node,
                        remaining,
                        emit_leaf: true,
                    });
                }
                return;
            }

            // Prefix consumed: edges below the bound's next byte are fully
            // below it, and the node's own leaf (a strict prefix of the
            // bound) is too.
            search = &search[common..];
            let label = search[0];
            let idx = node.lower_edge(label);
            self.stack.push(RevFrame {
                node: node.clone(),
                remaining: idx,
                emit_leaf: true,
            });
            match node.find_edge(label) {
                Some(edge) => {
                    let child = node.edges[edge].clone();
                    node = child;
                }
                None => return,
            }
        }
    }

    fn advance(&mut self) -> Option<(Arc<[u8]>, V)> {
        if self.done {
            return None;
        }
        loop {
            let frame = self.stack.last_mut()?;
            if frame.remaining > 0 {
                frame.remaining -= 1;
                let child = frame.node.edges[frame.remaining].clone();
                let remaining = child.edges.len();
                self.stack.push(RevFrame {
                    node: child,
                    remaining,
                    emit_leaf: true,
                });
                continue;
            }
            if frame.emit_leaf {
                frame.emit_leaf = false;
                let entry = frame
                    .node
                    .leaf
                    .as_ref()
                    .map(|leaf| (leaf.key.clone(), leaf.value.clone()));
                if let Some((key, value)) = entry {
                    if key.starts_with(&self.prefix) {
                        return Some((key, value));
                    }
                    if key.as_ref() < self.prefix.as_slice() {
                        // Ordered descent has left the prefix domain.
                        self.done = true;
                        self.stack.clear();
                        return None;
                    }
                    // Above the domain; keep walking down to it.
                }
                continue;
            }
            self.stack.pop();
        }
    }
}

impl<V: Clone> Iterator for RevIter<V> {
    type Item = (Arc<[u8]>, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tree::Tree;
    use std::sync::Arc;

    fn sample() -> Tree<u32> {
        let tree: Tree<u32> = Tree::new();
        let mut txn = tree.txn();
        let keys: [&[u8]; 8] = [
            b"aa", b"ab", b"abc", b"b", b"ba", b"bb", b"ca", b"cab",
        ];
        for (i, key) in keys.iter().enumerate() {
            txn.insert(key, i as u32);
        }
        txn.commit()
    }

    fn keys_of(entries: Vec<(Arc<[u8]>, u32)>) -> Vec<Vec<u8>> {
        entries.into_iter().map(|(k, _)| k.to_vec()).collect()
    }

    #[test]
    fn full_ascending_order() {
        let tree = sample();
        let got = keys_of(tree.iter().collect());
        let expected: Vec<Vec<u8>> = [
            &b"aa"[..], b"ab", b"abc", b"b", b"ba", b"bb", b"ca", b"cab",
        ]
        .iter()
        .map(|k| k.to_vec())
        .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn full_descending_order() {
        let tree = sample();
        let got = keys_of(tree.rev_iter().collect());
        let mut expected: Vec<Vec<u8>> = [
            &b"aa"[..], b"ab", b"abc", b"b", b"ba", b"bb", b"ca", b"cab",
        ]
        .iter()
        .map(|k| k.to_vec())
        .collect();
        expected.reverse();
        assert_eq!(got, expected);
    }

    #[test]
    fn seek_prefix_restricts_domain() {
        let tree = sample();
        let mut iter = tree.iter();
        iter.seek_prefix(b"ab");
        assert_eq!(keys_of(iter.collect()), vec![b"ab".to_vec(), b"abc".to_vec()]);

        let mut iter = tree.iter();
        iter.seek_prefix(b"b");
        assert_eq!(
            keys_of(iter.collect()),
            vec![b"b".to_vec(), b"ba".to_vec(), b"bb".to_vec()]
        );

        let mut iter = tree.iter();
        iter.seek_prefix(b"zz");
        assert_eq!(keys_of(iter.collect()), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn seek_lower_bound_existing_and_missing() {
        let tree = sample();

        let mut iter = tree.iter();
        iter.seek_lower_bound(b"b");
        assert_eq!(
            keys_of(iter.collect()),
            vec![
                b"b".to_vec(),
                b"ba".to_vec(),
                b"bb".to_vec(),
                b"ca".to_vec(),
                b"cab".to_vec()
            ]
        );

        // A bound between keys lands on the next key.
        let mut iter = tree.iter();
        iter.seek_lower_bound(b"abz");
        assert_eq!(
            keys_of(iter.collect()),
            vec![
                b"b".to_vec(),
                b"ba".to_vec(),
                b"bb".to_vec(),
                b"ca".to_vec(),
                b"cab".to_vec()
            ]
        );

        // A bound past everything yields nothing.
        let mut iter = tree.iter();
        iter.seek_lower_bound(b"zz");
        assert_eq!(keys_of(iter.collect()), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn lower_bound_mirrors_sparse_key_layout() {
        // Sparse fixed-width keys with gaps, like primary identifiers.
        let tree: Tree<u32> = Tree::new();
        let mut txn = tree.txn();
        let rows: [[u8; 5]; 6] = [
            [0, 0, 0, 0, 1],
            [0, 0, 0, 0, 2],
            [0, 0, 0, 0, 4],
            [0, 0, 0, 0, 5],
            [0, 0, 0, 1, 0],
            [1, 0, 0, 1, 0],
        ];
        for (i, row) in rows.iter().enumerate() {
            txn.insert(row, i as u32);
        }
        let tree = txn.commit();

        let mut iter = tree.iter();
        iter.seek_lower_bound(&[0, 0, 0, 0, 5]);
        assert_eq!(
            keys_of(iter.collect()),
            vec![
                vec![0, 0, 0, 0, 5],
                vec![0, 0, 0, 1, 0],
                vec![1, 0, 0, 1, 0]
            ]
        );

        let mut iter = tree.iter();
        iter.seek_lower_bound(&[0, 0, 0, 0, 6]);
        assert_eq!(
            keys_of(iter.collect()),
            vec![vec![0, 0, 0, 1, 0], vec![1, 0, 0, 1, 0]]
        );

        let mut iter = tree.iter();
        iter.seek_lower_bound(&[9, 9, 9, 9, 9]);
        assert_eq!(keys_of(iter.collect()), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn prefix_and_lower_bound_combine() {
        let tree = sample();
        let mut iter = tree.iter();
        iter.seek_prefix(b"b");
        iter.seek_lower_bound(b"ba");
        assert_eq!(keys_of(iter.collect()), vec![b"ba".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn seek_below_is_strict() {
        let tree = sample();
        let mut rev = tree.rev_iter();
        rev.seek_below(b"b");
        assert_eq!(
            keys_of(rev.collect()),
            vec![b"abc".to_vec(), b"ab".to_vec(), b"aa".to_vec()]
        );

        let mut rev = tree.rev_iter();
        rev.seek_below(b"aa");
        assert_eq!(keys_of(rev.collect()), Vec::<Vec<u8>>::new());

        // A bound above everything covers the whole tree, descending.
        let mut rev = tree.rev_iter();
        rev.seek_below(b"zzz");
        assert_eq!(keys_of(rev.collect()).len(), 8);
    }

    #[test]
    fn rev_seek_prefix_starts_at_domain_end() {
        let tree = sample();
        let mut rev = tree.rev_iter();
        rev.seek_prefix(b"b");
        assert_eq!(
            keys_of(rev.collect()),
            vec![b"bb".to_vec(), b"ba".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let tree = sample();
        let mut iter = tree.iter();
        let peeked = iter.peek().map(|(k, _)| k.to_vec());
        assert_eq!(peeked, Some(b"aa".to_vec()));
        let first = iter.next().map(|(k, _)| k.to_vec());
        assert_eq!(first, Some(b"aa".to_vec()));
        let second = iter.next().map(|(k, _)| k.to_vec());
        assert_eq!(second, Some(b"ab".to_vec()));
    }

    #[test]
    fn back_rewinds_from_seek_position() {
        let tree: Tree<u32> = Tree::new();
        let mut txn = tree.txn();
        let rows: [[u8; 5]; 6] = [
            [0, 0, 0, 0, 1],
            [0, 0, 0, 0, 2],
            [0, 0, 0, 0, 4],
            [0, 0, 0, 0, 5],
            [0, 0, 0, 1, 0],
            [1, 0, 0, 1, 0],
        ];
        for (i, row) in rows.iter().enumerate() {
            txn.insert(row, i as u32);
        }
        let tree = txn.commit();

        let mut iter = tree.iter();
        iter.seek_lower_bound(&rows[5]);
        iter.back(3).unwrap();
        let got = keys_of(iter.collect());
        let expected: Vec<Vec<u8>> = rows[2..].iter().map(|r| r.to_vec()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn back_from_exhausted_iterator_rewinds_from_the_end() {
        let tree = sample();
        let mut iter = tree.iter();
        while iter.next().is_some() {}
        iter.back(2).unwrap();
        assert_eq!(keys_of(iter.collect()), vec![b"ca".to_vec(), b"cab".to_vec()]);
    }

    #[test]
    fn back_past_start_is_an_error() {
        let tree = sample();
        let mut iter = tree.iter();
        iter.seek_lower_bound(b"ab");
        let err = iter.back(5).unwrap_err();
        assert!(err.to_string().contains("cannot rewind"));
    }

    #[test]
    fn back_respects_prefix_domain() {
        let tree = sample();
        let mut iter = tree.iter();
        iter.seek_prefix(b"b");
        iter.seek_lower_bound(b"bb");
        iter.back(2).unwrap();
        assert_eq!(
            keys_of(iter.collect()),
            vec![b"b".to_vec(), b"ba".to_vec(), b"bb".to_vec()]
        );
        // Rewinding further would escape the "b" domain.
        let mut iter = tree.iter();
        iter.seek_prefix(b"b");
        iter.seek_lower_bound(b"bb");
        assert!(iter.back(3).is_err());
    }

    #[test]
    fn back_zero_is_a_noop() {
        let tree = sample();
        let mut iter = tree.iter();
        iter.seek_lower_bound(b"ba");
        iter.back(0).unwrap();
        assert_eq!(iter.next().map(|(k, _)| k.to_vec()), Some(b"ba".to_vec()));
    }
}
