//! Prefix index: a trie over byte-string keys.
//!
//! Each level maps a key byte to the node one level deeper. A key is stored
//! as one node per byte followed by a sentinel leaf carrying the caller's
//! payload handle. The set `ann`, `andrew`, `annabel`, `dilbert` looks like:
//!
//! ```text
//!   a ---------------> d
//!   n                  i
//!   n --------> d      l
//!   $ --> a     r      b
//!         b     e      e
//!         e     w      r
//!         l     $      t
//!         $            $
//! ```
//!
//! Branches at one level keep the order they were created in, so
//! [`PrefixIndex::least`], [`PrefixIndex::next`] and [`PrefixIndex::iter`]
//! visit keys in per-level insertion order, not lexicographic order.
//!
//! Unlike the ordered index, the trie owns its nodes: they are allocated on
//! insert and freed on remove. Payload handles stay owned by the host.

use std::fmt;
use std::iter;
use std::marker::PhantomData;

use indexmap::IndexMap;
use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::arena::{Arena, Handle};
use crate::config::Config;
use crate::error::{DestroyError, Error, Result};

/// End-of-key marker. Keys may not contain this byte.
pub const SENTINEL: u8 = 0;

/// Node ids along one key, root level first.
type Path = SmallVec<[NodeId; 32]>;

/// Per-level children, in creation order.
type Level = IndexMap<u8, NodeId>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
enum NodeKind {
    Branch { children: Level },
    Leaf { data: Handle },
}

#[derive(Clone, Debug)]
struct Node {
    byte: u8,
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// Node storage with a free list of vacated slots.
#[derive(Clone, Debug, Default)]
struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    live: usize,
    /// Reservations left to grant before one is refused.
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl NodeArena {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
            #[cfg(test)]
            fail_after: None,
        }
    }

    #[cfg(test)]
    fn failpoint(&mut self) -> Result<()> {
        match &mut self.fail_after {
            Some(0) => Err(Error::AllocationFailed),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn failpoint(&mut self) -> Result<()> {
        Ok(())
    }

    /// Make room for `additional` allocations without growing afterwards.
    fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.failpoint()?;
        let fresh = additional.saturating_sub(self.free.len());
        if self.slots.len() + fresh > u32::MAX as usize {
            return Err(Error::AllocationFailed);
        }
        self.slots
            .try_reserve(fresh)
            .map_err(|_| Error::AllocationFailed)?;
        // Releasing a partly built chain must not allocate.
        self.free
            .try_reserve(additional)
            .map_err(|_| Error::AllocationFailed)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            debug_assert!(self.slots[id.index()].is_none());
            self.slots[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    fn free(&mut self, id: NodeId) -> Node {
        let node = self.slots[id.index()]
            .take()
            .expect("double free of trie node");
        self.free.push(id);
        self.live -= 1;
        node
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node {
        self.slots[id.index()]
            .as_ref()
            .expect("dangling trie node id")
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.index()]
            .as_mut()
            .expect("dangling trie node id")
    }

    #[inline]
    fn len(&self) -> usize {
        self.live
    }
}

/// Key bytes followed by the sentinel.
fn symbols(key: &[u8]) -> impl Iterator<Item = u8> + '_ {
    key.iter().copied().chain(iter::once(SENTINEL))
}

/// An intrusive trie mapping byte-string keys to record handles.
pub struct PrefixIndex<T, F> {
    name: String,
    nodes: NodeArena,
    /// Level zero.
    roots: Level,
    leaf_count: usize,
    config: Config,
    extractor: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> PrefixIndex<T, F>
where
    F: Fn(&T) -> &[u8],
{
    pub fn new(name: &str, extractor: F) -> Result<Self> {
        Self::with_config(name, extractor, Config::default())
    }

    pub fn with_config(name: &str, extractor: F, config: Config) -> Result<Self> {
        config.check_name(name)?;
        debug!("creating prefix index {name:?}");
        Ok(Self {
            name: name.to_owned(),
            nodes: NodeArena::with_capacity(config.initial_capacity),
            roots: Level::new(),
            leaf_count: 0,
            config,
            extractor,
            _marker: PhantomData,
        })
    }

    /// The entry stored after the one keyed by `prev`'s record.
    ///
    /// `prev`'s key is re-derived through the extractor and its leaf located
    /// again, so the record must still carry the key it was inserted under.
    pub fn next(&self, records: &Arena<T>, prev: Handle) -> Result<Option<Handle>> {
        let record = records.get(prev).ok_or(Error::InvalidHandle)?;
        let key = (self.extractor)(record);
        let path = self.descend(key).ok_or(Error::KeyNotFound)?;

        let mut current = *path.last().expect("path ends at a leaf");
        loop {
            let node = self.nodes.get(current);
            let level = self.children(node.parent);
            let position = level
                .get_index_of(&node.byte)
                .expect("node is linked into its level");
            if let Some((_, &sibling)) = level.get_index(position + 1) {
                return Ok(self.first_leaf(sibling));
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }
}

impl<T, F> PrefixIndex<T, F> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored keys.
    #[inline]
    pub fn count(&self) -> usize {
        self.leaf_count
    }

    /// Number of live nodes, internal and leaf.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Store `data` under `key`.
    ///
    /// Either the whole chain of new nodes is linked in or the trie is left
    /// exactly as it was.
    pub fn insert(&mut self, key: &[u8], data: Handle) -> Result<()> {
        self.check_key(key)?;

        // Longest stored prefix of the key.
        let mut parent = None;
        let mut depth = 0;
        for symbol in symbols(key) {
            match self.children(parent).get(&symbol) {
                Some(_) if symbol == SENTINEL => {
                    debug!(
                        "{}: rejecting duplicate key \"{}\"",
                        self.name,
                        key.escape_ascii()
                    );
                    return Err(Error::DuplicateKey);
                }
                Some(&child) => {
                    parent = Some(child);
                    depth += 1;
                }
                None => break,
            }
        }

        let suffix = &key[depth..];
        self.nodes.failpoint()?;
        self.level_mut(parent)
            .try_reserve(1)
            .map_err(|_| Error::AllocationFailed)?;
        let head = self.build_chain(parent, suffix, data)?;
        let first = suffix.first().copied().unwrap_or(SENTINEL);
        self.level_mut(parent).insert(first, head);
        self.leaf_count += 1;
        trace!(
            "{}: branched at depth {depth}, {} new nodes",
            self.name,
            suffix.len() + 1
        );
        Ok(())
    }

    /// Remove the entry stored under `key`, returning its payload.
    pub fn remove(&mut self, key: &[u8]) -> Result<Handle> {
        self.check_key(key)?;
        let path = self.descend(key).ok_or(Error::KeyNotFound)?;

        // Free from the leaf upward until a level still has other children.
        let mut data = None;
        let mut pruned = 0;
        for &id in path.iter().rev() {
            let node = self.nodes.free(id);
            pruned += 1;
            if let NodeKind::Leaf { data: handle } = node.kind {
                data = Some(handle);
            }
            let level = self.level_mut(node.parent);
            level.shift_remove(&node.byte);
            if !level.is_empty() || node.parent.is_none() {
                break;
            }
        }

        self.leaf_count -= 1;
        trace!("{}: pruned {pruned} nodes", self.name);
        Ok(data.expect("path ends at a leaf"))
    }

    /// The payload stored under exactly `key`.
    pub fn lookup(&self, key: &[u8]) -> Option<Handle> {
        let path = self.descend(key)?;
        match self.nodes.get(*path.last()?).kind {
            NodeKind::Leaf { data } => Some(data),
            NodeKind::Branch { .. } => None,
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.descend(key).is_some()
    }

    /// The first entry: the first branch of every level down to a leaf.
    pub fn least(&self) -> Option<Handle> {
        let (_, &first) = self.roots.first()?;
        self.first_leaf(first)
    }

    /// Iterate over `(key, payload)` pairs in the order of [`least`](Self::least)
    /// and [`next`](Self::next).
    pub fn iter(&self) -> Iter<'_, T, F> {
        Iter {
            index: self,
            stack: self.roots.values().rev().map(|&id| (id, 0)).collect(),
            key: Vec::new(),
        }
    }

    /// Tear down the index. Fails, returning the index intact, unless empty.
    pub fn destroy(self) -> std::result::Result<(), DestroyError<Self>> {
        if !self.is_empty() {
            let error = Error::NotEmpty {
                name: self.name.clone(),
                count: self.leaf_count,
            };
            return Err(DestroyError::new(error, self));
        }
        debug!("destroying prefix index {:?}", self.name);
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        self.config.check_key_len(key)?;
        if let Some(position) = key.iter().position(|&b| b == SENTINEL) {
            return Err(Error::SentinelInKey { position });
        }
        Ok(())
    }

    /// Children of `parent`, or level zero for `None`.
    fn children(&self, parent: Option<NodeId>) -> &Level {
        match parent {
            None => &self.roots,
            Some(id) => match &self.nodes.get(id).kind {
                NodeKind::Branch { children } => children,
                NodeKind::Leaf { .. } => unreachable!("leaf nodes have no children"),
            },
        }
    }

    fn level_mut(&mut self, parent: Option<NodeId>) -> &mut Level {
        match parent {
            None => &mut self.roots,
            Some(id) => match &mut self.nodes.get_mut(id).kind {
                NodeKind::Branch { children } => children,
                NodeKind::Leaf { .. } => unreachable!("leaf nodes have no children"),
            },
        }
    }

    /// Node ids matching every byte of `key` and its sentinel, if stored.
    fn descend(&self, key: &[u8]) -> Option<Path> {
        if key.contains(&SENTINEL) {
            return None;
        }
        let mut path = Path::new();
        let mut parent = None;
        for symbol in symbols(key) {
            let &child = self.children(parent).get(&symbol)?;
            path.push(child);
            parent = Some(child);
        }
        Some(path)
    }

    fn first_leaf(&self, mut id: NodeId) -> Option<Handle> {
        loop {
            match &self.nodes.get(id).kind {
                NodeKind::Leaf { data } => return Some(*data),
                NodeKind::Branch { children } => id = *children.first()?.1,
            }
        }
    }

    /// Build a detached chain for `suffix` plus its leaf below `parent`.
    ///
    /// Returns the chain's first node. Nodes built so far are released again
    /// if any reservation fails.
    fn build_chain(
        &mut self,
        parent: Option<NodeId>,
        suffix: &[u8],
        data: Handle,
    ) -> Result<NodeId> {
        self.nodes.try_reserve(suffix.len() + 1)?;
        let mut built: SmallVec<[NodeId; 16]> = SmallVec::new();
        built
            .try_reserve(suffix.len())
            .map_err(|_| Error::AllocationFailed)?;

        let mut up = parent;
        for &byte in suffix {
            let mut children = Level::new();
            let reserved = self.nodes.failpoint().and_then(|()| {
                children
                    .try_reserve(1)
                    .map_err(|_| Error::AllocationFailed)
            });
            if let Err(err) = reserved {
                for &id in built.iter().rev() {
                    self.nodes.free(id);
                }
                return Err(err);
            }
            let id = self.nodes.alloc(Node {
                byte,
                parent: up,
                kind: NodeKind::Branch { children },
            });
            if let Some(&prev) = built.last() {
                self.level_mut(Some(prev)).insert(byte, id);
            }
            built.push(id);
            up = Some(id);
        }

        let leaf = self.nodes.alloc(Node {
            byte: SENTINEL,
            parent: up,
            kind: NodeKind::Leaf { data },
        });
        if let Some(&last) = built.last() {
            self.level_mut(Some(last)).insert(SENTINEL, leaf);
        }
        Ok(built.first().copied().unwrap_or(leaf))
    }
}

impl<T, F> fmt::Debug for PrefixIndex<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixIndex")
            .field("name", &self.name)
            .field("leaf_count", &self.leaf_count)
            .field("node_count", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl<T, F> Drop for PrefixIndex<T, F> {
    fn drop(&mut self) {
        if self.leaf_count != 0 {
            warn!(
                "prefix index {:?} dropped with {} entries",
                self.name, self.leaf_count
            );
        }
    }
}

/// Depth-first iterator over a [`PrefixIndex`].
pub struct Iter<'a, T, F> {
    index: &'a PrefixIndex<T, F>,
    /// Pending nodes with their depth.
    stack: Vec<(NodeId, usize)>,
    /// Bytes of the path to the node on top of the stack.
    key: Vec<u8>,
}

impl<T, F> Iterator for Iter<'_, T, F> {
    type Item = (Vec<u8>, Handle);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            let node = self.index.nodes.get(id);
            self.key.truncate(depth);
            match &node.kind {
                NodeKind::Leaf { data } => return Some((self.key.clone(), *data)),
                NodeKind::Branch { children } => {
                    self.key.push(node.byte);
                    self.stack
                        .extend(children.values().rev().map(|&child| (child, depth + 1)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) fn validate_trie<T, F>(t: &PrefixIndex<T, F>) {
    let mut stack: Vec<(NodeId, Option<NodeId>, u8)> = t
        .roots
        .iter()
        .map(|(&byte, &id)| (id, None, byte))
        .collect();

    let mut reachable = 0usize;
    let mut leaves = 0usize;
    while let Some((id, parent, byte)) = stack.pop() {
        reachable += 1;
        let node = t.nodes.get(id);
        assert_eq!(node.parent, parent, "parent link must match owning level");
        assert_eq!(node.byte, byte, "level key must match node byte");
        match &node.kind {
            NodeKind::Leaf { .. } => {
                assert_eq!(node.byte, SENTINEL, "only sentinels carry data");
                leaves += 1;
            }
            NodeKind::Branch { children } => {
                assert_ne!(node.byte, SENTINEL, "sentinel nodes must be leaves");
                assert!(!children.is_empty(), "branch without children");
                stack.extend(children.iter().map(|(&b, &c)| (c, Some(id), b)));
            }
        }
    }

    assert_eq!(reachable, t.node_count(), "reachable nodes must match node count");
    assert_eq!(leaves, t.count(), "reachable leaves must match count");
}
