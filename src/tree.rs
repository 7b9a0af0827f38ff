//! The adaptive radix tree itself: arena, recursive insert/search/delete,
//! min/max, and in-order traversal.
//!
//! Nodes live in a `slab::Slab` keyed by [`NodeId`] rather than behind
//! `Box` pointers. A parent holds its child's id, never a pointer to it, so
//! [`Node::grow`]/[`Node::shrink`] can replace a node's variant in place
//! without the parent needing to be touched. End-of-key is represented by a
//! `terminator` slot on every inner node's header rather than a 257th child
//! byte: the terminator is itself just a leaf id, so traversal code that
//! walks "the node's children" only has to special-case it at the very
//! edges (ordering, min/max), not throughout.

use bytes::Bytes;
use slab::Slab;

use crate::error::{ArtError, CallbackError, Result};
use crate::node::{common_len, Leaf, Node, Node16, Node256, Node4, Node48, NodeId, MAX_PREFIX_LEN, NIL};

/// Result of matching a node's compressed prefix against a key at some depth.
enum PrefixMatch {
    /// The entire true-length prefix matched.
    Full,
    /// Only `usize` bytes matched before a mismatch (or the key ran out).
    Mismatch(usize),
}

/// An in-memory adaptive radix tree mapping byte-string keys to values.
///
/// Keys are [`Bytes`] (cheap to clone and slice); values are any `V`. Node
/// fan-out adapts between four variants (4/16/48/256 children) as entries
/// are inserted and removed, so a tree of short, sparse keys costs little
/// more than the keys themselves, while dense key spaces still get O(1)
/// child lookups.
pub struct AdaptiveRadixTree<V> {
    arena: Slab<Node<V>>,
    root: NodeId,
    len: usize,
}

impl<V> Default for AdaptiveRadixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AdaptiveRadixTree<V> {
    /// Creates an empty tree with a modest pre-sized arena.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Creates an empty tree, pre-sizing the node arena for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Slab::with_capacity(capacity),
            root: NIL,
            len: 0,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        self.arena.insert(node) as NodeId
    }

    /// The key of *some* leaf reachable from `id`'s subtree, materialised in
    /// full. Used to recover the true bytes of a compressed prefix once they
    /// exceed `MAX_PREFIX_LEN` and are no longer stored directly: any leaf
    /// under `id` shares `id`'s prefix at the corresponding offset, so the
    /// minimum one works as well as any other.
    fn min_leaf_key(&self, id: NodeId) -> Bytes {
        let mut cur = id;
        loop {
            match &self.arena[cur as usize] {
                Node::Leaf(l) => return l.key.clone(),
                node => {
                    let h = node.header();
                    cur = if h.has_terminator() {
                        h.terminator
                    } else {
                        node.min_child().expect("inner node needs a child or terminator").1
                    };
                }
            }
        }
    }

    /// The true-length prefix bytes of inner node `id`, whose path begins at
    /// `depth`. Reconstructs beyond `MAX_PREFIX_LEN` via [`Self::min_leaf_key`].
    fn full_prefix(&self, id: NodeId, depth: usize) -> Vec<u8> {
        let header = self.arena[id as usize].header();
        let true_len = header.prefix_len as usize;
        let avail = true_len.min(MAX_PREFIX_LEN);
        if true_len == avail {
            return header.prefix[..avail].to_vec();
        }
        let min_key = self.min_leaf_key(id);
        min_key[depth..depth + true_len].to_vec()
    }

    /// Matches node `id`'s compressed prefix against `key[depth..]`,
    /// reconstructing the optimistic tail from a descendant leaf only when
    /// the materialised bytes alone aren't enough to decide.
    fn match_prefix(&self, id: NodeId, key: &[u8], depth: usize) -> PrefixMatch {
        let header = self.arena[id as usize].header();
        let true_len = header.prefix_len as usize;
        let avail = true_len.min(MAX_PREFIX_LEN);
        let key_rest = &key[depth..];

        let avail_cmp = avail.min(key_rest.len());
        let m1 = common_len(&header.prefix[..avail_cmp], &key_rest[..avail_cmp]);
        if m1 < avail {
            return PrefixMatch::Mismatch(m1);
        }
        if avail == true_len {
            return if key_rest.len() >= true_len {
                PrefixMatch::Full
            } else {
                PrefixMatch::Mismatch(key_rest.len())
            };
        }

        let min_key = self.min_leaf_key(id);
        let tail_true = &min_key[depth + avail..depth + true_len];
        let key_tail = if key_rest.len() > avail { &key_rest[avail..] } else { &[][..] };
        let m2 = common_len(tail_true, key_tail);
        let total = avail + m2;
        if total == true_len {
            PrefixMatch::Full
        } else {
            PrefixMatch::Mismatch(total)
        }
    }

    /// Looks up `key`, returning a reference to its value.
    pub fn search(&self, key: &[u8]) -> Result<&V> {
        if self.root == NIL {
            return Err(ArtError::NotFound);
        }
        let mut cur = self.root;
        let mut depth = 0usize;
        loop {
            match &self.arena[cur as usize] {
                Node::Leaf(l) => {
                    return if l.key.as_ref() == key {
                        Ok(&l.value)
                    } else {
                        Err(ArtError::NotFound)
                    };
                }
                node => match self.match_prefix(cur, key, depth) {
                    PrefixMatch::Mismatch(_) => return Err(ArtError::NotFound),
                    PrefixMatch::Full => {
                        let true_len = node.header().prefix_len as usize;
                        depth += true_len;
                        if depth == key.len() {
                            let term = node.header().terminator;
                            if term == NIL {
                                return Err(ArtError::NotFound);
                            }
                            cur = term;
                            continue;
                        }
                        match node.find_child(key[depth]) {
                            Some(next) => {
                                cur = next;
                                depth += 1;
                            }
                            None => return Err(ArtError::NotFound),
                        }
                    }
                },
            }
        }
    }

    /// Inserts `key` with `value`, returning the previous value if `key` was
    /// already present.
    pub fn insert(&mut self, key: Bytes, value: V) -> Option<V> {
        if self.root == NIL {
            self.root = self.alloc(Node::Leaf(Leaf { key, value }));
            self.len += 1;
            return None;
        }
        let full_key = key.clone();
        let (new_root, old) = self.insert_at(self.root, &key, 0, full_key, value);
        self.root = new_root;
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    fn insert_at(&mut self, id: NodeId, key: &[u8], depth: usize, full_key: Bytes, value: V) -> (NodeId, Option<V>) {
        if matches!(self.arena[id as usize], Node::Leaf(_)) {
            return self.insert_into_leaf(id, key, depth, full_key, value);
        }
        match self.match_prefix(id, key, depth) {
            PrefixMatch::Mismatch(m) => self.split_inner(id, key, depth, m, full_key, value),
            PrefixMatch::Full => {
                let true_len = self.arena[id as usize].header().prefix_len as usize;
                let new_depth = depth + true_len;
                if new_depth == key.len() {
                    let term = self.arena[id as usize].header().terminator;
                    if term == NIL {
                        let leaf_id = self.alloc(Node::Leaf(Leaf { key: full_key, value }));
                        self.arena[id as usize].header_mut().terminator = leaf_id;
                        (id, None)
                    } else {
                        let old = match &mut self.arena[term as usize] {
                            Node::Leaf(l) => std::mem::replace(&mut l.value, value),
                            _ => unreachable!("terminator always points at a leaf"),
                        };
                        (id, Some(old))
                    }
                } else {
                    let byte = key[new_depth];
                    match self.arena[id as usize].find_child(byte) {
                        Some(child_id) => {
                            let (new_child, old) = self.insert_at(child_id, key, new_depth + 1, full_key, value);
                            self.arena[id as usize].add_child(byte, new_child);
                            (id, old)
                        }
                        None => {
                            if self.arena[id as usize].is_full() {
                                self.arena[id as usize].grow();
                            }
                            let leaf_id = self.alloc(Node::Leaf(Leaf { key: full_key, value }));
                            self.arena[id as usize].add_child(byte, leaf_id);
                            (id, None)
                        }
                    }
                }
            }
        }
    }

    /// Case 2/3 of insertion: `id` is a leaf. Either overwrite its value
    /// (same key) or split it into a fresh `Node4` holding both the old leaf
    /// and a new one for `key`.
    fn insert_into_leaf(&mut self, id: NodeId, key: &[u8], depth: usize, full_key: Bytes, value: V) -> (NodeId, Option<V>) {
        let same = match &self.arena[id as usize] {
            Node::Leaf(l) => l.key.as_ref() == key,
            _ => unreachable!(),
        };
        if same {
            let old = match &mut self.arena[id as usize] {
                Node::Leaf(l) => std::mem::replace(&mut l.value, value),
                _ => unreachable!(),
            };
            return (id, Some(old));
        }

        let leaf_key = match &self.arena[id as usize] {
            Node::Leaf(l) => l.key.clone(),
            _ => unreachable!(),
        };
        let cpl = common_len(&leaf_key[depth..], &key[depth..]);
        let split = depth + cpl;

        let mut n4 = Node4::new();
        n4.header.set_prefix(&key[depth..split]);
        let old_byte = leaf_key.get(split).copied();
        let new_byte = key.get(split).copied();

        let inner_id = self.alloc(Node::Node4(n4));
        let new_leaf_id = self.alloc(Node::Leaf(Leaf { key: full_key, value }));

        match old_byte {
            Some(b) => self.arena[inner_id as usize].add_child(b, id),
            None => self.arena[inner_id as usize].header_mut().terminator = id,
        }
        match new_byte {
            Some(b) => self.arena[inner_id as usize].add_child(b, new_leaf_id),
            None => self.arena[inner_id as usize].header_mut().terminator = new_leaf_id,
        }
        (inner_id, None)
    }

    /// Case 4 of insertion: `id`'s prefix disagrees with `key` after `m`
    /// common bytes. Splits `id`'s compressed prefix at `m`, inserting a
    /// fresh `Node4` above both `id` (keeping its remaining prefix tail) and
    /// a new leaf for `key`.
    fn split_inner(&mut self, id: NodeId, key: &[u8], depth: usize, m: usize, full_key: Bytes, value: V) -> (NodeId, Option<V>) {
        let full = self.full_prefix(id, depth);
        let edge_byte = full[m];
        let remaining = full[m + 1..].to_vec();

        let mut n4 = Node4::new();
        n4.header.set_prefix(&full[..m]);
        let inner_id = self.alloc(Node::Node4(n4));

        self.arena[id as usize].header_mut().set_prefix(&remaining);
        self.arena[inner_id as usize].add_child(edge_byte, id);

        let new_depth = depth + m;
        let leaf_id = self.alloc(Node::Leaf(Leaf { key: full_key, value }));
        if new_depth < key.len() {
            self.arena[inner_id as usize].add_child(key[new_depth], leaf_id);
        } else {
            self.arena[inner_id as usize].header_mut().terminator = leaf_id;
        }
        (inner_id, None)
    }

    /// Removes `key`, returning its value if present.
    pub fn delete(&mut self, key: &[u8]) -> Result<V> {
        if self.root == NIL {
            return Err(ArtError::NotFound);
        }
        let (new_root, old) = self.delete_at(self.root, key, 0);
        self.root = new_root.unwrap_or(NIL);
        match old {
            Some(v) => {
                self.len -= 1;
                Ok(v)
            }
            None => Err(ArtError::NotFound),
        }
    }

    fn delete_at(&mut self, id: NodeId, key: &[u8], depth: usize) -> (Option<NodeId>, Option<V>) {
        if matches!(self.arena[id as usize], Node::Leaf(_)) {
            let hit = match &self.arena[id as usize] {
                Node::Leaf(l) => l.key.as_ref() == key,
                _ => unreachable!(),
            };
            if !hit {
                return (Some(id), None);
            }
            let value = match self.arena.remove(id as usize) {
                Node::Leaf(l) => l.value,
                _ => unreachable!(),
            };
            return (None, Some(value));
        }

        match self.match_prefix(id, key, depth) {
            PrefixMatch::Mismatch(_) => (Some(id), None),
            PrefixMatch::Full => {
                let true_len = self.arena[id as usize].header().prefix_len as usize;
                let new_depth = depth + true_len;
                if new_depth == key.len() {
                    let term = self.arena[id as usize].header().terminator;
                    if term == NIL {
                        return (Some(id), None);
                    }
                    let hit = match &self.arena[term as usize] {
                        Node::Leaf(l) => l.key.as_ref() == key,
                        _ => unreachable!(),
                    };
                    if !hit {
                        return (Some(id), None);
                    }
                    let value = match self.arena.remove(term as usize) {
                        Node::Leaf(l) => l.value,
                        _ => unreachable!(),
                    };
                    self.arena[id as usize].header_mut().terminator = NIL;
                    (self.maybe_shrink(id, depth), Some(value))
                } else {
                    let byte = key[new_depth];
                    match self.arena[id as usize].find_child(byte) {
                        None => (Some(id), None),
                        Some(child_id) => {
                            let (new_child, value) = self.delete_at(child_id, key, new_depth + 1);
                            if value.is_none() {
                                return (Some(id), None);
                            }
                            match new_child {
                                Some(nc) => {
                                    self.arena[id as usize].add_child(byte, nc);
                                }
                                None => {
                                    self.arena[id as usize].remove_child(byte);
                                }
                            }
                            (self.maybe_shrink(id, depth), value)
                        }
                    }
                }
            }
        }
    }

    /// Applies `id`'s shrink/collapse thresholds after a removal below or at
    /// it. `depth` is the key-offset at which `id`'s own prefix starts.
    /// Returns `None` when `id` disappeared entirely (no children, no
    /// terminator), or the (possibly new) id that should replace it in the
    /// parent's link.
    fn maybe_shrink(&mut self, id: NodeId, depth: usize) -> Option<NodeId> {
        let nc = self.arena[id as usize].num_children();
        let is_node4 = matches!(self.arena[id as usize], Node::Node4(_));

        if !is_node4 {
            let threshold = match &self.arena[id as usize] {
                Node::Node256(_) => Some(37),
                Node::Node48(_) => Some(12),
                Node::Node16(_) => Some(3),
                _ => None,
            };
            if threshold == Some(nc) {
                self.arena[id as usize].shrink();
            }
            return Some(id);
        }

        let has_term = self.arena[id as usize].header().has_terminator();
        if nc == 0 {
            if has_term {
                let term = self.arena[id as usize].header().terminator;
                self.arena.remove(id as usize);
                return Some(term);
            }
            self.arena.remove(id as usize);
            return None;
        }
        if nc == 1 && !has_term {
            let (byte, child_id) = self.arena[id as usize].single_child().unwrap();
            let own_prefix = self.full_prefix(id, depth);
            self.arena.remove(id as usize);

            let child_is_leaf = matches!(self.arena[child_id as usize], Node::Leaf(_));
            if !child_is_leaf {
                let child_depth = depth + own_prefix.len() + 1;
                let child_prefix = self.full_prefix(child_id, child_depth);
                let mut merged = Vec::with_capacity(own_prefix.len() + 1 + child_prefix.len());
                merged.extend_from_slice(&own_prefix);
                merged.push(byte);
                merged.extend_from_slice(&child_prefix);
                self.arena[child_id as usize].header_mut().set_prefix(&merged);
            }
            return Some(child_id);
        }
        Some(id)
    }

    /// The lexicographically smallest key and its value.
    pub fn minimum(&self) -> Result<(Bytes, &V)> {
        if self.root == NIL {
            return Err(ArtError::Empty);
        }
        let mut cur = self.root;
        loop {
            match &self.arena[cur as usize] {
                Node::Leaf(l) => return Ok((l.key.clone(), &l.value)),
                node => {
                    let h = node.header();
                    cur = if h.has_terminator() {
                        h.terminator
                    } else {
                        node.min_child().expect("inner node needs a child or terminator").1
                    };
                }
            }
        }
    }

    /// The lexicographically largest key and its value.
    pub fn maximum(&self) -> Result<(Bytes, &V)> {
        if self.root == NIL {
            return Err(ArtError::Empty);
        }
        let mut cur = self.root;
        loop {
            match &self.arena[cur as usize] {
                Node::Leaf(l) => return Ok((l.key.clone(), &l.value)),
                node => {
                    cur = match node.max_child() {
                        Some((_, id)) => id,
                        None => node.header().terminator,
                    };
                }
            }
        }
    }

    /// Ordered iterator over every `(key, value)` pair.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push(self.root);
        }
        Iter { tree: self, stack }
    }

    /// Ordered iterator over every `(key, value)` pair whose key starts with
    /// `prefix`.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        let mut stack = Vec::new();
        if self.root != NIL {
            self.seed_prefix_stack(self.root, prefix, 0, &mut stack);
        }
        Iter { tree: self, stack }
    }

    fn seed_prefix_stack(&self, id: NodeId, prefix: &[u8], depth: usize, stack: &mut Vec<NodeId>) {
        match &self.arena[id as usize] {
            Node::Leaf(l) => {
                if prefix.len() <= l.key.len() && &l.key[..prefix.len()] == prefix {
                    stack.push(id);
                }
            }
            node => {
                let header = node.header();
                let true_len = header.prefix_len as usize;
                let remaining = &prefix[depth..];

                if remaining.len() <= true_len {
                    if self.prefix_bytes_eq(id, depth, remaining) {
                        stack.push(id);
                    }
                    return;
                }

                let avail = true_len.min(MAX_PREFIX_LEN);
                let m1 = common_len(&header.prefix[..avail], &remaining[..avail]);
                if m1 < avail {
                    return;
                }
                if true_len > avail {
                    let min_key = self.min_leaf_key(id);
                    let tail_true = &min_key[depth + avail..depth + true_len];
                    if tail_true != &remaining[avail..true_len] {
                        return;
                    }
                }

                let next_depth = depth + true_len;
                if let Some(child_id) = node.find_child(prefix[next_depth]) {
                    self.seed_prefix_stack(child_id, prefix, next_depth + 1, stack);
                }
            }
        }
    }

    /// Whether `remaining` (length `<=` this node's true prefix length)
    /// equals the corresponding leading bytes of the node's true prefix.
    fn prefix_bytes_eq(&self, id: NodeId, depth: usize, remaining: &[u8]) -> bool {
        let header = self.arena[id as usize].header();
        let avail = (header.prefix_len as usize).min(MAX_PREFIX_LEN);
        let check_len = remaining.len().min(avail);
        if header.prefix[..check_len] != remaining[..check_len] {
            return false;
        }
        if remaining.len() <= avail {
            return true;
        }
        let min_key = self.min_leaf_key(id);
        let tail_true = &min_key[depth + avail..depth + remaining.len()];
        tail_true == &remaining[avail..]
    }

    /// Visits every `(key, value)` pair in order, stopping at the first
    /// error the callback returns.
    pub fn try_for_each<E>(&self, mut f: impl FnMut(&Bytes, &V) -> std::result::Result<(), E>) -> std::result::Result<(), CallbackError<E>> {
        for (k, v) in self.iter() {
            f(&k, v).map_err(CallbackError)?;
        }
        Ok(())
    }
}

impl<V: Clone> Clone for AdaptiveRadixTree<V> {
    fn clone(&self) -> Self {
        let mut target = AdaptiveRadixTree::with_capacity(self.arena.capacity());
        if self.root != NIL {
            target.root = self.clone_subtree(self.root, &mut target);
        }
        target.len = self.len;
        target
    }
}

impl<V: Clone> AdaptiveRadixTree<V> {
    fn clone_subtree(&self, id: NodeId, target: &mut Self) -> NodeId {
        if let Node::Leaf(l) = &self.arena[id as usize] {
            return target.alloc(Node::Leaf(Leaf {
                key: l.key.clone(),
                value: l.value.clone(),
            }));
        }

        let node_ref = &self.arena[id as usize];
        let header = node_ref.header().clone();
        let children = node_ref.iter_children();
        let shell = match node_ref {
            Node::Node4(_) => Node::Node4(Node4::new()),
            Node::Node16(_) => Node::Node16(Node16::new()),
            Node::Node48(_) => Node::Node48(Box::new(Node48::new())),
            Node::Node256(_) => Node::Node256(Box::new(Node256::new())),
            Node::Leaf(_) => unreachable!(),
        };
        let new_id = target.alloc(shell);
        {
            let h = target.arena[new_id as usize].header_mut();
            h.prefix = header.prefix.clone();
            h.prefix_len = header.prefix_len;
        }
        if header.has_terminator() {
            let new_term = self.clone_subtree(header.terminator, target);
            target.arena[new_id as usize].header_mut().terminator = new_term;
        }
        for (byte, child_id) in children {
            let new_child = self.clone_subtree(child_id, target);
            if target.arena[new_id as usize].is_full() {
                target.arena[new_id as usize].grow();
            }
            target.arena[new_id as usize].add_child(byte, new_child);
        }
        new_id
    }
}

/// Resumable, ordered cursor over `(key, value)` pairs produced by
/// [`AdaptiveRadixTree::iter`] / [`AdaptiveRadixTree::iter_prefix`].
///
/// Holds a stack of pending arena ids rather than borrowed node references,
/// so stepping it never pins more of the tree's internal structure than the
/// path currently being unwound.
pub struct Iter<'a, V> {
    tree: &'a AdaptiveRadixTree<V>,
    stack: Vec<NodeId>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Bytes, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            match &self.tree.arena[id as usize] {
                Node::Leaf(l) => return Some((l.key.clone(), &l.value)),
                node => {
                    for (_, cid) in node.iter_children().into_iter().rev() {
                        self.stack.push(cid);
                    }
                    let term = node.header().terminator;
                    if term != NIL {
                        self.stack.push(term);
                    }
                }
            }
        }
    }
}
