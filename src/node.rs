//! Node layout and variant selection for the adaptive radix tree.
//!
//! Four inner-node variants (`Node4`, `Node16`, `Node48`, `Node256`) share a
//! common [`Header`] carrying the path-compressed prefix and the end-of-key
//! terminator slot (see module docs in `tree.rs` for why a `terminator`
//! field rather than a 257th child byte). Nodes live in a `slab::Slab` arena
//! owned by the tree and are referenced by [`NodeId`], never by raw pointer,
//! so growing/shrinking a node can replace its contents in place without
//! invalidating the parent's link to it.

use arrayvec::ArrayVec;
use bytes::Bytes;
use smallvec::SmallVec;

/// Children as `(byte, id)` pairs; inline up to `Node16`'s capacity so
/// enumerating a `Node4`/`Node16` never touches the heap.
pub(crate) type Children = SmallVec<[(u8, NodeId); 16]>;

/// Bound on the materialised compressed-prefix bytes (the "optimistic" path
/// compression threshold). `Header::prefix_len` may exceed this; the
/// remaining bytes are recovered on demand from a descendant leaf.
pub const MAX_PREFIX_LEN: usize = 10;

/// Arena index. `NIL` stands in for "no such child" / "no such node".
pub(crate) type NodeId = u32;
pub(crate) const NIL: NodeId = u32::MAX;

/// Number of leading bytes of `a` and `b` that agree.
pub(crate) fn common_len(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    for i in 0..n {
        if a[i] != b[i] {
            return i;
        }
    }
    n
}

/// Header shared by every inner node variant.
#[derive(Clone)]
pub(crate) struct Header {
    /// Materialised prefix bytes, length `<= MAX_PREFIX_LEN`.
    pub prefix: ArrayVec<u8, MAX_PREFIX_LEN>,
    /// True length of the compressed prefix; may exceed `prefix.len()`.
    pub prefix_len: u32,
    /// Leaf ending exactly at this node's key-path, if any.
    pub terminator: NodeId,
}

impl Header {
    pub fn new() -> Self {
        Self {
            prefix: ArrayVec::new(),
            prefix_len: 0,
            terminator: NIL,
        }
    }

    pub fn has_terminator(&self) -> bool {
        self.terminator != NIL
    }

    /// Set the prefix from a full byte slice, truncating materialised bytes
    /// to `MAX_PREFIX_LEN` but recording the true length.
    pub fn set_prefix(&mut self, bytes: &[u8]) {
        self.prefix_len = bytes.len() as u32;
        self.prefix.clear();
        let take = bytes.len().min(MAX_PREFIX_LEN);
        self.prefix.try_extend_from_slice(&bytes[..take]).unwrap();
    }
}

pub(crate) struct Leaf<V> {
    pub key: Bytes,
    pub value: V,
}

pub(crate) struct Node4 {
    pub header: Header,
    pub len: u8,
    pub keys: [u8; 4],
    pub children: [NodeId; 4],
}

pub(crate) struct Node16 {
    pub header: Header,
    pub len: u8,
    pub keys: [u8; 16],
    pub children: [NodeId; 16],
}

pub(crate) struct Node48 {
    pub header: Header,
    pub len: u8,
    /// 0 = empty, else `slot + 1`.
    pub index: [u8; 256],
    pub children: [NodeId; 48],
}

pub(crate) struct Node256 {
    pub header: Header,
    pub len: u16,
    pub children: [NodeId; 256],
}

impl Node4 {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            len: 0,
            keys: [0; 4],
            children: [NIL; 4],
        }
    }
}

impl Node16 {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            len: 0,
            keys: [0; 16],
            children: [NIL; 16],
        }
    }
}

impl Node48 {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            len: 0,
            index: [0; 256],
            children: [NIL; 48],
        }
    }
}

impl Node256 {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            len: 0,
            children: [NIL; 256],
        }
    }
}

/// A node in the arena: a leaf or one of the four inner-node variants.
pub(crate) enum Node<V> {
    Leaf(Leaf<V>),
    Node4(Node4),
    Node16(Node16),
    Node48(Box<Node48>),
    Node256(Box<Node256>),
}

impl<V> Node<V> {
    pub fn header(&self) -> &Header {
        match self {
            Node::Leaf(_) => unreachable!("leaf has no header"),
            Node::Node4(n) => &n.header,
            Node::Node16(n) => &n.header,
            Node::Node48(n) => &n.header,
            Node::Node256(n) => &n.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Node::Leaf(_) => unreachable!("leaf has no header"),
            Node::Node4(n) => &mut n.header,
            Node::Node16(n) => &mut n.header,
            Node::Node48(n) => &mut n.header,
            Node::Node256(n) => &mut n.header,
        }
    }

    pub fn num_children(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Node4(n) => n.len as usize,
            Node::Node16(n) => n.len as usize,
            Node::Node48(n) => n.len as usize,
            Node::Node256(n) => n.len as usize,
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            Node::Leaf(_) => false,
            Node::Node4(n) => n.len as usize == 4,
            Node::Node16(n) => n.len as usize == 16,
            Node::Node48(n) => n.len as usize == 48,
            Node::Node256(n) => n.len as usize == 256,
        }
    }

    /// Find the arena id of the child keyed by `byte`, if any.
    pub fn find_child(&self, byte: u8) -> Option<NodeId> {
        match self {
            Node::Leaf(_) => None,
            Node::Node4(n) => {
                for i in 0..n.len as usize {
                    if n.keys[i] == byte {
                        return Some(n.children[i]);
                    }
                }
                None
            }
            Node::Node16(n) => {
                for i in 0..n.len as usize {
                    if n.keys[i] == byte {
                        return Some(n.children[i]);
                    }
                }
                None
            }
            Node::Node48(n) => {
                let slot = n.index[byte as usize];
                if slot == 0 {
                    None
                } else {
                    Some(n.children[slot as usize - 1])
                }
            }
            Node::Node256(n) => {
                let id = n.children[byte as usize];
                if id == NIL { None } else { Some(id) }
            }
        }
    }

    /// Insert or overwrite the child keyed by `byte`. Caller must ensure the
    /// node is not full (grow first via [`Self::grow`]).
    pub fn add_child(&mut self, byte: u8, child: NodeId) {
        match self {
            Node::Leaf(_) => unreachable!("leaf has no children"),
            Node::Node4(n) => {
                for i in 0..n.len as usize {
                    if n.keys[i] == byte {
                        n.children[i] = child;
                        return;
                    }
                }
                assert!((n.len as usize) < 4, "Node4 full, should have grown");
                let mut pos = n.len as usize;
                while pos > 0 && n.keys[pos - 1] > byte {
                    n.keys[pos] = n.keys[pos - 1];
                    n.children[pos] = n.children[pos - 1];
                    pos -= 1;
                }
                n.keys[pos] = byte;
                n.children[pos] = child;
                n.len += 1;
            }
            Node::Node16(n) => {
                for i in 0..n.len as usize {
                    if n.keys[i] == byte {
                        n.children[i] = child;
                        return;
                    }
                }
                assert!((n.len as usize) < 16, "Node16 full, should have grown");
                let mut pos = n.len as usize;
                while pos > 0 && n.keys[pos - 1] > byte {
                    n.keys[pos] = n.keys[pos - 1];
                    n.children[pos] = n.children[pos - 1];
                    pos -= 1;
                }
                n.keys[pos] = byte;
                n.children[pos] = child;
                n.len += 1;
            }
            Node::Node48(n) => {
                let slot = n.index[byte as usize];
                if slot != 0 {
                    n.children[slot as usize - 1] = child;
                    return;
                }
                assert!((n.len as usize) < 48, "Node48 full, should have grown");
                let free = n.len as usize;
                n.children[free] = child;
                n.index[byte as usize] = (free + 1) as u8;
                n.len += 1;
            }
            Node::Node256(n) => {
                if n.children[byte as usize] == NIL {
                    n.len += 1;
                }
                n.children[byte as usize] = child;
            }
        }
    }

    /// Remove the child keyed by `byte`, returning its id.
    pub fn remove_child(&mut self, byte: u8) -> Option<NodeId> {
        match self {
            Node::Leaf(_) => None,
            Node::Node4(n) => {
                let pos = (0..n.len as usize).find(|&i| n.keys[i] == byte)?;
                let id = n.children[pos];
                for i in pos..(n.len as usize - 1) {
                    n.keys[i] = n.keys[i + 1];
                    n.children[i] = n.children[i + 1];
                }
                n.len -= 1;
                Some(id)
            }
            Node::Node16(n) => {
                let pos = (0..n.len as usize).find(|&i| n.keys[i] == byte)?;
                let id = n.children[pos];
                for i in pos..(n.len as usize - 1) {
                    n.keys[i] = n.keys[i + 1];
                    n.children[i] = n.children[i + 1];
                }
                n.len -= 1;
                Some(id)
            }
            Node::Node48(n) => {
                let slot = n.index[byte as usize];
                if slot == 0 {
                    return None;
                }
                let slot = slot as usize - 1;
                let id = n.children[slot];
                let last = n.len as usize - 1;
                if slot != last {
                    // Move the last occupied slot into the freed one and fix
                    // up whichever byte pointed at it.
                    n.children[slot] = n.children[last];
                    if let Some(b) = n.index.iter().position(|&s| s as usize == last + 1) {
                        n.index[b] = (slot + 1) as u8;
                    }
                }
                n.index[byte as usize] = 0;
                n.len -= 1;
                Some(id)
            }
            Node::Node256(n) => {
                let id = n.children[byte as usize];
                if id == NIL {
                    return None;
                }
                n.children[byte as usize] = NIL;
                n.len -= 1;
                Some(id)
            }
        }
    }

    /// Children in ascending byte order, as `(byte, id)` pairs.
    pub fn iter_children(&self) -> Children {
        match self {
            Node::Leaf(_) => Children::new(),
            Node::Node4(n) => (0..n.len as usize).map(|i| (n.keys[i], n.children[i])).collect(),
            Node::Node16(n) => (0..n.len as usize).map(|i| (n.keys[i], n.children[i])).collect(),
            Node::Node48(n) => {
                let mut out = Children::with_capacity(n.len as usize);
                for byte in 0..256usize {
                    let slot = n.index[byte];
                    if slot != 0 {
                        out.push((byte as u8, n.children[slot as usize - 1]));
                    }
                }
                out
            }
            Node::Node256(n) => (0..256usize)
                .filter_map(|byte| {
                    let id = n.children[byte];
                    (id != NIL).then_some((byte as u8, id))
                })
                .collect(),
        }
    }

    /// Byte and id of the first child in ascending order, if any.
    pub fn min_child(&self) -> Option<(u8, NodeId)> {
        match self {
            Node::Leaf(_) => None,
            Node::Node4(n) if n.len > 0 => Some((n.keys[0], n.children[0])),
            Node::Node16(n) if n.len > 0 => Some((n.keys[0], n.children[0])),
            Node::Node48(n) => {
                for byte in 0..256usize {
                    let slot = n.index[byte];
                    if slot != 0 {
                        return Some((byte as u8, n.children[slot as usize - 1]));
                    }
                }
                None
            }
            Node::Node256(n) => (0..256usize).find_map(|byte| {
                let id = n.children[byte];
                (id != NIL).then_some((byte as u8, id))
            }),
            _ => None,
        }
    }

    /// Byte and id of the last child in ascending order, if any.
    pub fn max_child(&self) -> Option<(u8, NodeId)> {
        match self {
            Node::Leaf(_) => None,
            Node::Node4(n) if n.len > 0 => {
                let i = n.len as usize - 1;
                Some((n.keys[i], n.children[i]))
            }
            Node::Node16(n) if n.len > 0 => {
                let i = n.len as usize - 1;
                Some((n.keys[i], n.children[i]))
            }
            Node::Node48(n) => {
                for byte in (0..256usize).rev() {
                    let slot = n.index[byte];
                    if slot != 0 {
                        return Some((byte as u8, n.children[slot as usize - 1]));
                    }
                }
                None
            }
            Node::Node256(n) => (0..256usize).rev().find_map(|byte| {
                let id = n.children[byte];
                (id != NIL).then_some((byte as u8, id))
            }),
            _ => None,
        }
    }

    /// Only child's `(byte, id)`, iff this node has exactly one child and no
    /// terminator of its own (the collapse precondition).
    pub fn single_child(&self) -> Option<(u8, NodeId)> {
        if self.header().has_terminator() || self.num_children() != 1 {
            return None;
        }
        self.min_child()
    }

    /// Promote to the next variant, preserving header, children and
    /// terminator. Panics on `Node256` (nothing to grow into) or `Leaf`.
    pub fn grow(&mut self) {
        *self = match std::mem::replace(self, Node::Node4(Node4::new())) {
            Node::Leaf(_) => unreachable!("leaf cannot grow"),
            Node::Node4(n4) => {
                let mut n16 = Node16::new();
                n16.header = n4.header;
                n16.len = n4.len;
                n16.keys[..4].copy_from_slice(&n4.keys);
                n16.children[..4].copy_from_slice(&n4.children);
                Node::Node16(n16)
            }
            Node::Node16(n16) => {
                let mut n48 = Node48::new();
                n48.header = n16.header;
                n48.len = n16.len;
                for i in 0..n16.len as usize {
                    n48.children[i] = n16.children[i];
                    n48.index[n16.keys[i] as usize] = (i + 1) as u8;
                }
                Node::Node48(Box::new(n48))
            }
            Node::Node48(n48) => {
                let mut n256 = Node256::new();
                n256.header = n48.header;
                n256.len = n48.len as u16;
                for byte in 0..256usize {
                    let slot = n48.index[byte];
                    if slot != 0 {
                        n256.children[byte] = n48.children[slot as usize - 1];
                    }
                }
                Node::Node256(Box::new(n256))
            }
            Node::Node256(_) => unreachable!("Node256 cannot grow"),
        };
    }

    /// Demote to the previous variant, preserving header, children and
    /// terminator. Caller is responsible for checking the shrink threshold.
    /// Never called on `Node4` (that case is a collapse, handled by the
    /// tree, not a shrink).
    pub fn shrink(&mut self) {
        *self = match std::mem::replace(self, Node::Node4(Node4::new())) {
            Node::Leaf(_) => unreachable!("leaf cannot shrink"),
            Node::Node4(n4) => Node::Node4(n4),
            Node::Node16(n16) => {
                let mut n4 = Node4::new();
                n4.header = n16.header;
                n4.len = n16.len;
                n4.keys.copy_from_slice(&n16.keys[..4]);
                n4.children.copy_from_slice(&n16.children[..4]);
                Node::Node4(n4)
            }
            Node::Node48(n48) => {
                let mut n16 = Node16::new();
                n16.header = n48.header;
                n16.len = n48.len;
                let mut i = 0;
                for byte in 0..256usize {
                    let slot = n48.index[byte];
                    if slot != 0 {
                        n16.keys[i] = byte as u8;
                        n16.children[i] = n48.children[slot as usize - 1];
                        i += 1;
                    }
                }
                Node::Node16(n16)
            }
            Node::Node256(n256) => {
                let mut n48 = Node48::new();
                n48.header = n256.header;
                n48.len = n256.len as u8;
                let mut i = 0;
                for byte in 0..256usize {
                    if n256.children[byte] != NIL {
                        n48.children[i] = n256.children[byte];
                        n48.index[byte] = (i + 1) as u8;
                        i += 1;
                    }
                }
                Node::Node48(Box::new(n48))
            }
        };
    }
}
