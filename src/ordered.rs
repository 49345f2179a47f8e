//! Ordered index: an unbalanced binary search tree over `i32` keys.
//!
//! The tree links host records by [`Handle`]. Link fields (left, right,
//! parent) live in a side table indexed by the handle's slot, and a record's
//! key is re-extracted from the [`Arena`] every time it is compared, never
//! cached.
//!
//! ```text
//!            50
//!          /    \
//!        25      75
//!       /  \
//!     10    40
//! ```
//!
//! Removing a node with two children promotes its in-order successor (the
//! minimum of its right subtree) into its place.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use log::{debug, trace, warn};

use crate::arena::{Arena, Handle};
use crate::config::Config;
use crate::error::{DestroyError, Error, Result};

/// Link fields of one linked record.
#[derive(Clone, Copy, Debug)]
struct Link {
    /// Handle that owns this slot; guards against stale handles sharing the index.
    owner: Handle,
    left: Option<Handle>,
    right: Option<Handle>,
    parent: Option<Handle>,
}

impl Link {
    fn detached(owner: Handle) -> Self {
        Self {
            owner,
            left: None,
            right: None,
            parent: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// An intrusive binary search tree ordered by an extracted `i32` key.
///
/// Keys are unique: inserting a record whose key is already present is
/// rejected with [`Error::DuplicateKey`].
pub struct OrderedIndex<T, F> {
    name: String,
    /// Slot index -> links of the record in that slot.
    links: Vec<Option<Link>>,
    root: Option<Handle>,
    count: usize,
    extractor: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> OrderedIndex<T, F>
where
    F: Fn(&T) -> i32,
{
    pub fn new(name: &str, extractor: F) -> Result<Self> {
        Self::with_config(name, extractor, Config::default())
    }

    pub fn with_config(name: &str, extractor: F, config: Config) -> Result<Self> {
        config.check_name(name)?;
        debug!("creating ordered index {name:?}");
        Ok(Self {
            name: name.to_owned(),
            links: Vec::with_capacity(config.initial_capacity),
            root: None,
            count: 0,
            extractor,
            _marker: PhantomData,
        })
    }

    fn key_of(&self, records: &Arena<T>, handle: Handle) -> Result<i32> {
        records
            .get(handle)
            .map(&self.extractor)
            .ok_or(Error::InvalidHandle)
    }

    /// Link a record into the tree.
    pub fn insert(&mut self, records: &Arena<T>, handle: Handle) -> Result<()> {
        let key = self.key_of(records, handle)?;
        if let Some(Some(link)) = self.links.get(handle.index()) {
            return Err(if link.owner == handle {
                Error::AlreadyLinked
            } else {
                Error::InvalidHandle
            });
        }

        // Walk down to the empty slot where the key belongs.
        let mut parent = None;
        let mut side = Side::Left;
        let mut cursor = self.root;
        while let Some(node) = cursor {
            let node_key = self.key_of(records, node)?;
            match key.cmp(&node_key) {
                Ordering::Less => {
                    side = Side::Left;
                    cursor = self.node(node).left;
                }
                Ordering::Greater => {
                    side = Side::Right;
                    cursor = self.node(node).right;
                }
                Ordering::Equal => {
                    debug!("{}: rejecting duplicate key {key}", self.name);
                    return Err(Error::DuplicateKey);
                }
            }
            parent = Some(node);
        }

        if self.links.len() <= handle.index() {
            self.links.resize(handle.index() + 1, None);
        }
        let mut link = Link::detached(handle);
        link.parent = parent;
        self.links[handle.index()] = Some(link);

        match parent {
            None => self.root = Some(handle),
            Some(p) => {
                let parent_link = self.node_mut(p);
                match side {
                    Side::Left => parent_link.left = Some(handle),
                    Side::Right => parent_link.right = Some(handle),
                }
            }
        }

        self.count += 1;
        Ok(())
    }

    /// Unlink a record from the tree.
    ///
    /// The record itself is left untouched in `records` and may be inserted
    /// again.
    pub fn remove(&mut self, records: &Arena<T>, handle: Handle) -> Result<()> {
        let key = self.key_of(records, handle)?;
        let victim = self.find(records, key)?.ok_or(Error::KeyNotFound)?;
        if victim != handle {
            // Another record holds this key.
            return Err(Error::KeyNotFound);
        }

        let Link {
            left,
            right,
            parent,
            ..
        } = *self.node(victim);

        match (left, right) {
            (Some(left), Some(right)) => {
                let successor = self.subtree_min(right);
                trace!("{}: promoting successor of key {key}", self.name);
                if successor != right {
                    // The successor has no left child; its right subtree takes its place.
                    let link = *self.node(successor);
                    self.replace_child(link.parent, successor, link.right);
                    self.node_mut(successor).right = Some(right);
                }
                self.node_mut(successor).left = Some(left);
                self.replace_child(parent, victim, Some(successor));
                self.fix_parents(successor);
            }
            (child, None) | (None, child) => self.replace_child(parent, victim, child),
        }

        self.links[victim.index()] = None;
        self.count -= 1;
        Ok(())
    }

    /// Find the record with the given key.
    pub fn lookup(&self, records: &Arena<T>, key: i32) -> Result<Option<Handle>> {
        self.find(records, key)
    }

    fn find(&self, records: &Arena<T>, key: i32) -> Result<Option<Handle>> {
        let mut cursor = self.root;
        while let Some(node) = cursor {
            cursor = match key.cmp(&self.key_of(records, node)?) {
                Ordering::Less => self.node(node).left,
                Ordering::Greater => self.node(node).right,
                Ordering::Equal => return Ok(Some(node)),
            };
        }
        Ok(None)
    }
}

impl<T, F> OrderedIndex<T, F> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Whether this exact handle is linked into the tree.
    pub fn contains(&self, handle: Handle) -> bool {
        self.link(handle).is_some()
    }

    /// The record with the smallest key.
    pub fn least(&self) -> Option<Handle> {
        self.root.map(|root| self.subtree_min(root))
    }

    /// The in-order successor of `handle`, or `None` past the largest key.
    pub fn next(&self, handle: Handle) -> Result<Option<Handle>> {
        if !self.contains(handle) {
            return Err(Error::NotLinked);
        }
        Ok(self.successor(handle))
    }

    /// Iterate over linked records in ascending key order.
    pub fn iter(&self) -> Iter<'_, T, F> {
        Iter {
            index: self,
            next: self.least(),
        }
    }

    /// Tear down the index. Fails, returning the index intact, unless empty.
    pub fn destroy(self) -> std::result::Result<(), DestroyError<Self>> {
        if !self.is_empty() {
            let error = Error::NotEmpty {
                name: self.name.clone(),
                count: self.count,
            };
            return Err(DestroyError::new(error, self));
        }
        debug!("destroying ordered index {:?}", self.name);
        Ok(())
    }

    fn link(&self, handle: Handle) -> Option<&Link> {
        self.links
            .get(handle.index())?
            .as_ref()
            .filter(|link| link.owner == handle)
    }

    #[inline]
    fn node(&self, handle: Handle) -> &Link {
        self.links[handle.index()]
            .as_ref()
            .expect("tree references an unlinked slot")
    }

    #[inline]
    fn node_mut(&mut self, handle: Handle) -> &mut Link {
        self.links[handle.index()]
            .as_mut()
            .expect("tree references an unlinked slot")
    }

    fn subtree_min(&self, mut node: Handle) -> Handle {
        while let Some(left) = self.node(node).left {
            node = left;
        }
        node
    }

    fn successor(&self, node: Handle) -> Option<Handle> {
        if let Some(right) = self.node(node).right {
            return Some(self.subtree_min(right));
        }

        // Climb until we arrive from a left child.
        let mut child = node;
        let mut parent = self.node(node).parent;
        while let Some(p) = parent {
            if self.node(p).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// Put `new` into the child slot of `parent` that holds `old` (or the root).
    fn replace_child(&mut self, parent: Option<Handle>, old: Handle, new: Option<Handle>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let link = self.node_mut(p);
                if link.left == Some(old) {
                    link.left = new;
                } else {
                    debug_assert_eq!(link.right, Some(old));
                    link.right = new;
                }
            }
        }
        if let Some(n) = new {
            self.node_mut(n).parent = parent;
        }
    }

    /// Point both children of `node` back at it.
    fn fix_parents(&mut self, node: Handle) {
        let Link { left, right, .. } = *self.node(node);
        for child in [left, right].into_iter().flatten() {
            self.node_mut(child).parent = Some(node);
        }
    }
}

impl<T, F> fmt::Debug for OrderedIndex<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedIndex")
            .field("name", &self.name)
            .field("count", &self.count)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<T, F> Drop for OrderedIndex<T, F> {
    fn drop(&mut self) {
        if self.count != 0 {
            warn!(
                "ordered index {:?} dropped with {} linked records",
                self.name, self.count
            );
        }
    }
}

/// Ascending iterator over an [`OrderedIndex`].
pub struct Iter<'a, T, F> {
    index: &'a OrderedIndex<T, F>,
    next: Option<Handle>,
}

impl<T, F> Iterator for Iter<'_, T, F> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let current = self.next?;
        self.next = self.index.successor(current);
        Some(current)
    }
}

#[cfg(test)]
pub(crate) fn validate_tree<T, F>(t: &OrderedIndex<T, F>, records: &Arena<T>)
where
    F: Fn(&T) -> i32,
{
    let mut stack = Vec::new();
    if let Some(root) = t.root {
        assert_eq!(t.node(root).parent, None, "root must have no parent");
        stack.push((root, i64::MIN, i64::MAX));
    }

    let mut reachable = 0usize;
    while let Some((node, lo, hi)) = stack.pop() {
        reachable += 1;
        let key = i64::from(t.key_of(records, node).expect("linked record must be live"));
        assert!(lo < key && key < hi, "key {key} outside ({lo}, {hi})");

        let link = t.node(node);
        assert_eq!(link.owner, node);
        if let Some(left) = link.left {
            assert_eq!(t.node(left).parent, Some(node), "left child parent link");
            stack.push((left, lo, key));
        }
        if let Some(right) = link.right {
            assert_eq!(t.node(right).parent, Some(node), "right child parent link");
            stack.push((right, key, hi));
        }
    }

    assert_eq!(reachable, t.count, "reachable nodes must match count");
    let linked = t.links.iter().filter(|l| l.is_some()).count();
    assert_eq!(linked, t.count, "link table must match count");
}
