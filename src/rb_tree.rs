//! RbTree: ordered storage engine behind `OrderedSet`, `OrderedMultiSet` and `OrderedMap`.
//!
//! Nodes live in a generational arena and link to each other by key. The tree keeps a header of
//! cached links (root, leftmost, rightmost); the past-the-end position is `None`, and stepping
//! back from it lands on the rightmost node.
//!
//! Erasing a node with two children relinks its in-order successor into its place instead of
//! moving values around, so a [`Handle`] stays valid until its own node is erased.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Bound, RangeBounds};

use slotmap::SlotMap;

use crate::error::{Error, Rejected, ResultExt};
use crate::functional::{Compare, Less};
use crate::value_traits::{MappedMut, ValueTraits};

slotmap::new_key_type! {
    struct NodeKey;
}

/// Stable position of a value in an [`RbTree`]. Resolves to `None` once its node is erased.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NodeKey);

pub type InsertResult<T> = Result<Handle, Rejected<Handle, T>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

struct Node<T> {
    parent: Option<NodeKey>,
    left: Option<NodeKey>,
    right: Option<NodeKey>,
    color: Color,
    value: T,
}

type Nodes<T> = SlotMap<NodeKey, Node<T>>;

#[derive(Copy, Clone, Debug, Default)]
struct Header {
    root: Option<NodeKey>,
    leftmost: Option<NodeKey>,
    rightmost: Option<NodeKey>,
}

fn minimum<T>(nodes: &Nodes<T>, mut k: NodeKey) -> NodeKey {
    while let Some(l) = nodes[k].left {
        k = l;
    }
    k
}

fn maximum<T>(nodes: &Nodes<T>, mut k: NodeKey) -> NodeKey {
    while let Some(r) = nodes[k].right {
        k = r;
    }
    k
}

/// In-order successor; `None` past the maximum.
fn next_key<T>(nodes: &Nodes<T>, k: NodeKey) -> Option<NodeKey> {
    if let Some(r) = nodes[k].right {
        return Some(minimum(nodes, r));
    }
    let mut child = k;
    let mut parent = nodes[k].parent;
    while let Some(p) = parent {
        if nodes[p].right != Some(child) {
            break;
        }
        child = p;
        parent = nodes[p].parent;
    }
    parent
}

/// In-order predecessor; `None` before the minimum.
fn prev_key<T>(nodes: &Nodes<T>, k: NodeKey) -> Option<NodeKey> {
    if let Some(l) = nodes[k].left {
        return Some(maximum(nodes, l));
    }
    let mut child = k;
    let mut parent = nodes[k].parent;
    while let Some(p) = parent {
        if nodes[p].left != Some(child) {
            break;
        }
        child = p;
        parent = nodes[p].parent;
    }
    parent
}

/// Structural defects reported by [`RbTree::check_invariants`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("root is red")]
    RedRoot,
    #[error("red node has a red child")]
    RedRed,
    #[error("black height differs between paths ({left} vs {right})")]
    BlackHeight { left: usize, right: usize },
    #[error("child does not link back to its parent")]
    BrokenParentLink,
    #[error("cached leftmost/rightmost does not match the tree")]
    StaleExtremum,
    #[error("in-order traversal is not sorted")]
    OutOfOrder,
    #[error("reachable nodes ({reachable}) differ from len ({len})")]
    LengthMismatch { reachable: usize, len: usize },
}

/// Red-black tree over values described by `Tr`, ordered on `Tr::Key` by `C`.
pub struct RbTree<Tr: ValueTraits, C = Less> {
    nodes: Nodes<Tr::Value>,
    header: Header,
    cmp: C,
    _traits: PhantomData<fn() -> Tr>,
}

impl<Tr: ValueTraits, C: Default> Default for RbTree<Tr, C> {
    fn default() -> Self {
        Self::with_compare(C::default())
    }
}

impl<Tr: ValueTraits, C> RbTree<Tr, C> {
    pub fn with_compare(cmp: C) -> Self {
        RbTree {
            nodes: SlotMap::with_key(),
            header: Header::default(),
            cmp,
            _traits: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Largest number of nodes the arena can index.
    pub const fn max_len(&self) -> usize {
        u32::MAX as usize - 1
    }

    pub fn compare(&self) -> &C {
        &self.cmp
    }

    pub fn first(&self) -> Option<Handle> {
        self.header.leftmost.map(Handle)
    }

    pub fn last(&self) -> Option<Handle> {
        self.header.rightmost.map(Handle)
    }

    pub fn get(&self, h: Handle) -> Option<&Tr::Value> {
        self.nodes.get(h.0).map(|n| &n.value)
    }

    /// Mutable access to the non-key part of an entry.
    pub fn mapped_mut(&mut self, h: Handle) -> Option<&mut Tr::Mapped>
    where
        Tr: MappedMut,
    {
        self.nodes.get_mut(h.0).map(|n| Tr::mapped_mut(&mut n.value))
    }

    /// The position after `h`; `None` is past-the-end (also for a stale handle).
    pub fn successor(&self, h: Handle) -> Option<Handle> {
        if !self.nodes.contains_key(h.0) {
            return None;
        }
        next_key(&self.nodes, h.0).map(Handle)
    }

    /// The position before `pos`. Stepping back from past-the-end (`None`) yields the maximum.
    pub fn predecessor(&self, pos: Option<Handle>) -> Option<Handle> {
        match pos {
            None => self.last(),
            Some(h) if self.nodes.contains_key(h.0) => prev_key(&self.nodes, h.0).map(Handle),
            Some(_) => None,
        }
    }

    pub fn iter(&self) -> Iter<'_, Tr::Value> {
        Iter {
            nodes: &self.nodes,
            front: self.header.leftmost,
            back: self.header.rightmost,
        }
    }

    /// Iterates the half-open position range `[from, to)`. `from` must not come after `to`.
    /// An erased handle at either end yields an empty range.
    pub fn range(&self, from: Option<Handle>, to: Option<Handle>) -> Iter<'_, Tr::Value> {
        let front = from.map(|h| h.0).filter(|k| self.nodes.contains_key(*k));
        let back = if front.is_none() || from == to {
            None
        } else {
            self.predecessor(to).map(|h| h.0)
        };
        Iter {
            nodes: &self.nodes,
            front: back.and(front),
            back,
        }
    }

    pub fn clear(&mut self) {
        log::trace!("rb_tree: clearing {} nodes", self.nodes.len());
        self.nodes.clear();
        self.header = Header::default();
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Moves the contents out, leaving an empty tree with the same comparator.
    pub fn take(&mut self) -> Self
    where
        C: Clone,
    {
        let empty = Self::with_compare(self.cmp.clone());
        mem::replace(self, empty)
    }

    fn is_red(&self, k: Option<NodeKey>) -> bool {
        k.is_some_and(|k| self.nodes[k].color == Color::Red)
    }

    fn set_color(&mut self, k: Option<NodeKey>, color: Color) {
        if let Some(k) = k {
            self.nodes[k].color = color;
        }
    }

    fn set_parent(&mut self, k: Option<NodeKey>, parent: Option<NodeKey>) {
        if let Some(k) = k {
            self.nodes[k].parent = parent;
        }
    }

    /// Points whatever referenced `old` from above (its parent or the root link) at `new`.
    fn replace_child(&mut self, parent: Option<NodeKey>, old: NodeKey, new: Option<NodeKey>) {
        match parent {
            None => self.header.root = new,
            Some(p) if self.nodes[p].left == Some(old) => self.nodes[p].left = new,
            Some(p) => self.nodes[p].right = new,
        }
    }

    //       p                         p
    //      / \                       / \
    //     x   d    rotate left      y   d
    //    / \       ===========>    / \
    //   a   y                     x   c
    //      / \                   / \
    //     b   c                 a   b
    fn rotate_left(&mut self, x: NodeKey) {
        let Some(y) = self.nodes[x].right else { return };
        let b = self.nodes[y].left;
        self.nodes[x].right = b;
        self.set_parent(b, Some(x));
        let p = self.nodes[x].parent;
        self.nodes[y].parent = p;
        self.replace_child(p, x, Some(y));
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn rotate_right(&mut self, x: NodeKey) {
        let Some(y) = self.nodes[x].left else { return };
        let b = self.nodes[y].right;
        self.nodes[x].left = b;
        self.set_parent(b, Some(x));
        let p = self.nodes[x].parent;
        self.nodes[y].parent = p;
        self.replace_child(p, x, Some(y));
        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);
    }

    /// Links a new red node under `parent` on the given side, then restores the invariants.
    /// The slot on that side must be empty.
    fn check_room(&self) -> Result<(), Error> {
        if self.nodes.len() >= self.max_len() {
            return Err(Error::Length {
                requested: self.nodes.len() + 1,
                max: self.max_len(),
            });
        }
        Ok(())
    }

    fn link(&mut self, parent: Option<NodeKey>, as_left: bool, value: Tr::Value) -> NodeKey {
        self.check_room().throw();
        let k = self.nodes.insert(Node {
            parent,
            left: None,
            right: None,
            color: Color::Red,
            value,
        });
        match parent {
            None => {
                self.header.root = Some(k);
                self.header.leftmost = Some(k);
                self.header.rightmost = Some(k);
            }
            Some(p) if as_left => {
                debug_assert!(self.nodes[p].left.is_none());
                self.nodes[p].left = Some(k);
                if self.header.leftmost == Some(p) {
                    self.header.leftmost = Some(k);
                }
            }
            Some(p) => {
                debug_assert!(self.nodes[p].right.is_none());
                self.nodes[p].right = Some(k);
                if self.header.rightmost == Some(p) {
                    self.header.rightmost = Some(k);
                }
            }
        }
        self.rebalance_after_insert(k);
        k
    }

    fn rebalance_after_insert(&mut self, mut x: NodeKey) {
        loop {
            let Some(p) = self.nodes[x].parent else { break };
            if self.nodes[p].color == Color::Black {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(g) = self.nodes[p].parent else { break };
            if self.nodes[g].left == Some(p) {
                let uncle = self.nodes[g].right;
                if self.is_red(uncle) {
                    self.set_color(Some(p), Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(Some(g), Color::Red);
                    x = g;
                    continue;
                }
                if self.nodes[p].right == Some(x) {
                    // Inner child: turn it into the outer case.
                    x = p;
                    self.rotate_left(x);
                }
                let Some(p) = self.nodes[x].parent else { break };
                let Some(g) = self.nodes[p].parent else { break };
                self.set_color(Some(p), Color::Black);
                self.set_color(Some(g), Color::Red);
                self.rotate_right(g);
            } else {
                let uncle = self.nodes[g].left;
                if self.is_red(uncle) {
                    self.set_color(Some(p), Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(Some(g), Color::Red);
                    x = g;
                    continue;
                }
                if self.nodes[p].left == Some(x) {
                    x = p;
                    self.rotate_right(x);
                }
                let Some(p) = self.nodes[x].parent else { break };
                let Some(g) = self.nodes[p].parent else { break };
                self.set_color(Some(p), Color::Black);
                self.set_color(Some(g), Color::Red);
                self.rotate_left(g);
            }
        }
        let root = self.header.root;
        self.set_color(root, Color::Black);
    }

    /// Unlinks `z` from the structure, rebalances, and frees its slot.
    fn unlink(&mut self, z: NodeKey) -> Tr::Value {
        let Node {
            left: z_left,
            right: z_right,
            parent: z_parent,
            ..
        } = self.nodes[z];

        let x: Option<NodeKey>;
        let x_parent: Option<NodeKey>;
        // Colour of the position that physically loses a node.
        let removed_color: Color;

        match (z_left, z_right) {
            (Some(zl), Some(zr)) => {
                // Two children: move the successor `y` into z's place.
                let y = minimum(&self.nodes, zr);
                x = self.nodes[y].right;
                self.nodes[zl].parent = Some(y);
                self.nodes[y].left = Some(zl);
                if y != zr {
                    let yp = self.nodes[y].parent;
                    x_parent = yp;
                    self.set_parent(x, yp);
                    if let Some(yp) = yp {
                        self.nodes[yp].left = x;
                    }
                    self.nodes[y].right = Some(zr);
                    self.nodes[zr].parent = Some(y);
                } else {
                    x_parent = Some(y);
                }
                self.replace_child(z_parent, z, Some(y));
                self.nodes[y].parent = z_parent;
                let z_color = self.nodes[z].color;
                removed_color = mem::replace(&mut self.nodes[y].color, z_color);
            }
            _ => {
                x = z_left.or(z_right);
                x_parent = z_parent;
                self.set_parent(x, z_parent);
                self.replace_child(z_parent, z, x);
                if self.header.leftmost == Some(z) {
                    self.header.leftmost = match z_right {
                        None => z_parent,
                        Some(_) => x.map(|x| minimum(&self.nodes, x)),
                    };
                }
                if self.header.rightmost == Some(z) {
                    self.header.rightmost = match z_left {
                        None => z_parent,
                        Some(_) => x.map(|x| maximum(&self.nodes, x)),
                    };
                }
                removed_color = self.nodes[z].color;
            }
        }

        if removed_color == Color::Black {
            self.rebalance_after_erase(x, x_parent);
        }

        // The slot is still occupied: it was only unlinked above.
        match self.nodes.remove(z) {
            Some(node) => node.value,
            None => unreachable!("unlinked node vanished from the arena"),
        }
    }

    /// `x` carries one unit of black deficiency; `x_parent` is its parent even when `x` is nil.
    fn rebalance_after_erase(&mut self, mut x: Option<NodeKey>, mut x_parent: Option<NodeKey>) {
        while x != self.header.root && !self.is_red(x) {
            let Some(p) = x_parent else { break };
            if self.nodes[p].left == x {
                let Some(mut w) = self.nodes[p].right else { break };
                if self.is_red(Some(w)) {
                    self.set_color(Some(w), Color::Black);
                    self.set_color(Some(p), Color::Red);
                    self.rotate_left(p);
                    let Some(next) = self.nodes[p].right else { break };
                    w = next;
                }
                let (near, far) = (self.nodes[w].left, self.nodes[w].right);
                if !self.is_red(near) && !self.is_red(far) {
                    self.set_color(Some(w), Color::Red);
                    x = Some(p);
                    x_parent = self.nodes[p].parent;
                    continue;
                }
                if !self.is_red(far) {
                    self.set_color(near, Color::Black);
                    self.set_color(Some(w), Color::Red);
                    self.rotate_right(w);
                    let Some(next) = self.nodes[p].right else { break };
                    w = next;
                }
                let p_color = self.nodes[p].color;
                self.nodes[w].color = p_color;
                self.set_color(Some(p), Color::Black);
                let far = self.nodes[w].right;
                self.set_color(far, Color::Black);
                self.rotate_left(p);
                break;
            } else {
                let Some(mut w) = self.nodes[p].left else { break };
                if self.is_red(Some(w)) {
                    self.set_color(Some(w), Color::Black);
                    self.set_color(Some(p), Color::Red);
                    self.rotate_right(p);
                    let Some(next) = self.nodes[p].left else { break };
                    w = next;
                }
                let (near, far) = (self.nodes[w].right, self.nodes[w].left);
                if !self.is_red(near) && !self.is_red(far) {
                    self.set_color(Some(w), Color::Red);
                    x = Some(p);
                    x_parent = self.nodes[p].parent;
                    continue;
                }
                if !self.is_red(far) {
                    self.set_color(near, Color::Black);
                    self.set_color(Some(w), Color::Red);
                    self.rotate_left(w);
                    let Some(next) = self.nodes[p].left else { break };
                    w = next;
                }
                let p_color = self.nodes[p].color;
                self.nodes[w].color = p_color;
                self.set_color(Some(p), Color::Black);
                let far = self.nodes[w].left;
                self.set_color(far, Color::Black);
                self.rotate_right(p);
                break;
            }
        }
        self.set_color(x, Color::Black);
    }

    /// Removes the entry at `h` and returns its value. Other handles stay valid.
    pub fn erase(&mut self, h: Handle) -> Option<Tr::Value> {
        if !self.nodes.contains_key(h.0) {
            return None;
        }
        Some(self.unlink(h.0))
    }

    /// Removes every entry in `[from, to)` and returns how many were removed.
    pub fn erase_range(&mut self, from: Option<Handle>, to: Option<Handle>) -> usize {
        if from == self.first() && to.is_none() {
            let n = self.len();
            self.clear();
            return n;
        }
        let mut removed = 0;
        let mut cur = from;
        while let Some(h) = cur {
            if cur == to {
                break;
            }
            cur = self.successor(h);
            if self.erase(h).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

impl<Tr, C> RbTree<Tr, C>
where
    Tr: ValueTraits,
    C: Compare<Tr::Key>,
{
    #[inline]
    fn key_at(&self, k: NodeKey) -> &Tr::Key {
        Tr::key(&self.nodes[k].value)
    }

    /// `key(k) < key` for a borrowed lookup key.
    #[inline]
    fn node_less<Q>(&self, k: NodeKey, key: &Q) -> bool
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        Compare::<Q>::less(&self.cmp, self.key_at(k).borrow(), key)
    }

    /// `key < key(k)` for a borrowed lookup key.
    #[inline]
    fn less_node<Q>(&self, key: &Q, k: NodeKey) -> bool
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        Compare::<Q>::less(&self.cmp, key, self.key_at(k).borrow())
    }

    /// Where a unique insert of `key` would link, or the equivalent node already present.
    fn unique_slot(&self, key: &Tr::Key) -> Result<(Option<NodeKey>, bool), NodeKey> {
        let mut parent = None;
        let mut as_left = true;
        let mut x = self.header.root;
        while let Some(k) = x {
            parent = Some(k);
            as_left = self.cmp.less(key, self.key_at(k));
            x = if as_left { self.nodes[k].left } else { self.nodes[k].right };
        }
        let candidate = match parent {
            None => return Ok((None, true)),
            Some(p) if as_left => {
                if self.header.leftmost == Some(p) {
                    return Ok((parent, true));
                }
                match prev_key(&self.nodes, p) {
                    Some(before) => before,
                    None => return Ok((parent, true)),
                }
            }
            Some(p) => p,
        };
        if self.cmp.less(self.key_at(candidate), key) {
            Ok((parent, as_left))
        } else {
            Err(candidate)
        }
    }

    /// Where a multi insert of `key` links: after every equivalent key already present.
    fn multi_slot(&self, key: &Tr::Key) -> (Option<NodeKey>, bool) {
        let mut parent = None;
        let mut as_left = true;
        let mut x = self.header.root;
        while let Some(k) = x {
            parent = Some(k);
            as_left = self.cmp.less(key, self.key_at(k));
            x = if as_left { self.nodes[k].left } else { self.nodes[k].right };
        }
        (parent, as_left)
    }

    /// Inserts `value` unless an equivalent key is present, in which case the value comes back
    /// together with the position of the existing entry.
    /// Inserts `value` unless an equivalent key is present, in which case the value comes back
    /// together with the position of the existing entry.
    ///
    /// # Errors
    /// [`Error::Length`] if the tree already holds [`RbTree::max_len`] values; the tree is
    /// unchanged and `value` is dropped.
    pub fn try_insert_unique(
        &mut self,
        value: Tr::Value,
    ) -> Result<InsertResult<Tr::Value>, Error> {
        match self.unique_slot(Tr::key(&value)) {
            Ok((parent, as_left)) => {
                self.check_room()?;
                Ok(Ok(Handle(self.link(parent, as_left, value))))
            }
            Err(existing) => Ok(Err(Rejected {
                existing: Handle(existing),
                value,
            })),
        }
    }

    /// Inserts `value` after any entries with an equivalent key.
    ///
    /// # Errors
    /// As [`RbTree::try_insert_unique`].
    pub fn try_insert_multi(&mut self, value: Tr::Value) -> Result<Handle, Error> {
        self.check_room()?;
        let (parent, as_left) = self.multi_slot(Tr::key(&value));
        Ok(Handle(self.link(parent, as_left, value)))
    }

    pub fn insert_unique(&mut self, value: Tr::Value) -> InsertResult<Tr::Value> {
        self.try_insert_unique(value).throw()
    }

    pub fn insert_multi(&mut self, value: Tr::Value) -> Handle {
        self.try_insert_multi(value).throw()
    }

    pub fn insert(&mut self, value: Tr::Value, allow_duplicates: bool) -> InsertResult<Tr::Value> {
        if allow_duplicates {
            Ok(self.insert_multi(value))
        } else {
            self.insert_unique(value)
        }
    }

    /// Builds the value first; if that fails the tree is untouched.
    pub fn try_insert_unique_with<E>(
        &mut self,
        make: impl FnOnce() -> Result<Tr::Value, E>,
    ) -> Result<InsertResult<Tr::Value>, E> {
        let value = make()?;
        Ok(self.insert_unique(value))
    }

    /// Builds the value first; if that fails the tree is untouched.
    pub fn try_insert_multi_with<E>(
        &mut self,
        make: impl FnOnce() -> Result<Tr::Value, E>,
    ) -> Result<Handle, E> {
        let value = make()?;
        Ok(self.insert_multi(value))
    }

    /// Unique insert that links directly next to `hint` when the value belongs there, skipping
    /// the descent from the root. Falls back to [`RbTree::insert_unique`] otherwise.
    pub fn insert_unique_hint(
        &mut self,
        hint: Option<Handle>,
        value: Tr::Value,
    ) -> InsertResult<Tr::Value> {
        if let Some(slot) = self.hinted_slot(hint, Tr::key(&value), |c, a, b| c.less(a, b)) {
            let (parent, as_left) = slot;
            return Ok(Handle(self.link(Some(parent), as_left, value)));
        }
        self.insert_unique(value)
    }

    /// Multi insert counterpart of [`RbTree::insert_unique_hint`].
    pub fn insert_multi_hint(&mut self, hint: Option<Handle>, value: Tr::Value) -> Handle {
        if let Some((parent, as_left)) =
            self.hinted_slot(hint, Tr::key(&value), |c, a, b| !c.less(b, a))
        {
            return Handle(self.link(Some(parent), as_left, value));
        }
        self.insert_multi(value)
    }

    /// `before(a, b)` decides whether `a` may sit before `b`: strict for unique inserts,
    /// non-strict for multi inserts.
    fn hinted_slot(
        &self,
        hint: Option<Handle>,
        key: &Tr::Key,
        before: impl Fn(&C, &Tr::Key, &Tr::Key) -> bool,
    ) -> Option<(NodeKey, bool)> {
        match hint {
            None => {
                let last = self.header.rightmost?;
                before(&self.cmp, self.key_at(last), key).then_some((last, false))
            }
            Some(h) if !self.nodes.contains_key(h.0) => None,
            Some(Handle(h)) if self.header.leftmost == Some(h) => {
                before(&self.cmp, key, self.key_at(h)).then_some((h, true))
            }
            Some(Handle(h)) => {
                let prev = prev_key(&self.nodes, h)?;
                if !(before(&self.cmp, self.key_at(prev), key) && before(&self.cmp, key, self.key_at(h))) {
                    return None;
                }
                if self.nodes[prev].right.is_none() {
                    Some((prev, false))
                } else {
                    Some((h, true))
                }
            }
        }
    }

    /// First position whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Option<Handle>
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut found = None;
        let mut x = self.header.root;
        while let Some(k) = x {
            if !self.node_less(k, key) {
                found = Some(k);
                x = self.nodes[k].left;
            } else {
                x = self.nodes[k].right;
            }
        }
        found.map(Handle)
    }

    /// First position whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Option<Handle>
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut found = None;
        let mut x = self.header.root;
        while let Some(k) = x {
            if self.less_node(key, k) {
                found = Some(k);
                x = self.nodes[k].left;
            } else {
                x = self.nodes[k].right;
            }
        }
        found.map(Handle)
    }

    pub fn equal_range<Q>(&self, key: &Q) -> (Option<Handle>, Option<Handle>)
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        (self.lower_bound(key), self.upper_bound(key))
    }

    /// The first entry with a key equivalent to `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.lower_bound(key)
            .filter(|h| !self.less_node(key, h.0))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.find(key).is_some()
    }

    pub fn count<Q>(&self, key: &Q) -> usize
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (from, to) = self.equal_range(key);
        self.range(from, to).count()
    }

    /// Positions delimiting the entries whose keys fall in `range`.
    pub fn bounds<Q, R>(&self, range: R) -> (Option<Handle>, Option<Handle>)
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        let from = match range.start_bound() {
            Bound::Included(q) => self.lower_bound(q),
            Bound::Excluded(q) => self.upper_bound(q),
            Bound::Unbounded => self.first(),
        };
        let to = match range.end_bound() {
            Bound::Included(q) => self.upper_bound(q),
            Bound::Excluded(q) => self.lower_bound(q),
            Bound::Unbounded => None,
        };
        // An inverted range is empty.
        if let (Some(f), Some(t)) = (from, to) {
            if Compare::<Tr::Key>::less(&self.cmp, self.key_at(t.0), self.key_at(f.0)) {
                return (to, to);
            }
        }
        (from, to)
    }

    /// Iterates the entries whose keys fall in `range`, in order.
    pub fn range_by<Q, R>(&self, range: R) -> Iter<'_, Tr::Value>
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        let (from, to) = self.bounds(range);
        self.range(from, to)
    }

    /// Removes every entry equivalent to `key`.
    pub fn erase_key<Q>(&mut self, key: &Q) -> usize
    where
        Tr::Key: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (from, to) = self.equal_range(key);
        self.erase_range(from, to)
    }

    /// Checks every structural invariant and returns the black height.
    pub fn check_invariants(&self) -> Result<usize, InvariantError> {
        let Some(root) = self.header.root else {
            return if self.header.leftmost.is_none() && self.header.rightmost.is_none() {
                if self.nodes.is_empty() {
                    Ok(0)
                } else {
                    Err(InvariantError::LengthMismatch {
                        reachable: 0,
                        len: self.nodes.len(),
                    })
                }
            } else {
                Err(InvariantError::StaleExtremum)
            };
        };
        if self.nodes[root].color == Color::Red {
            return Err(InvariantError::RedRoot);
        }
        if self.nodes[root].parent.is_some() {
            return Err(InvariantError::BrokenParentLink);
        }
        if self.header.leftmost != Some(minimum(&self.nodes, root))
            || self.header.rightmost != Some(maximum(&self.nodes, root))
        {
            return Err(InvariantError::StaleExtremum);
        }
        let mut reachable = 0;
        let height = self.check_subtree(root, &mut reachable)?;
        if reachable != self.nodes.len() {
            return Err(InvariantError::LengthMismatch {
                reachable,
                len: self.nodes.len(),
            });
        }
        let mut it = self.iter().map(Tr::key);
        if let Some(mut prev) = it.next() {
            for key in it {
                if self.cmp.less(key, prev) {
                    return Err(InvariantError::OutOfOrder);
                }
                prev = key;
            }
        }
        Ok(height)
    }

    fn check_subtree(&self, k: NodeKey, reachable: &mut usize) -> Result<usize, InvariantError> {
        *reachable += 1;
        let node = &self.nodes[k];
        let mut heights = [0usize; 2];
        for (i, child) in [node.left, node.right].into_iter().enumerate() {
            let Some(c) = child else { continue };
            if self.nodes[c].parent != Some(k) {
                return Err(InvariantError::BrokenParentLink);
            }
            if node.color == Color::Red && self.nodes[c].color == Color::Red {
                return Err(InvariantError::RedRed);
            }
            heights[i] = self.check_subtree(c, reachable)?;
        }
        if heights[0] != heights[1] {
            return Err(InvariantError::BlackHeight {
                left: heights[0],
                right: heights[1],
            });
        }
        Ok(heights[0] + usize::from(node.color == Color::Black))
    }
}

impl<Tr, C> Clone for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: Clone,
    C: Clone,
{
    /// Copies the exact shape and colouring. If a value's `clone` panics, the partial copy is
    /// dropped with the unwinding and `self` is unaffected.
    fn clone(&self) -> Self {
        let mut copy = Self::with_compare(self.cmp.clone());
        copy.nodes.reserve(self.nodes.len());
        if let Some(root) = self.header.root {
            let new_root = copy_subtree(&self.nodes, root, None, &mut copy.nodes);
            copy.header = Header {
                root: Some(new_root),
                leftmost: Some(minimum(&copy.nodes, new_root)),
                rightmost: Some(maximum(&copy.nodes, new_root)),
            };
        }
        copy
    }
}

fn copy_subtree<T: Clone>(
    src: &Nodes<T>,
    k: NodeKey,
    parent: Option<NodeKey>,
    dst: &mut Nodes<T>,
) -> NodeKey {
    let node = &src[k];
    let new = dst.insert(Node {
        parent,
        left: None,
        right: None,
        color: node.color,
        value: node.value.clone(),
    });
    if let Some(l) = node.left {
        let nl = copy_subtree(src, l, Some(new), dst);
        dst[new].left = Some(nl);
    }
    if let Some(r) = node.right {
        let nr = copy_subtree(src, r, Some(new), dst);
        dst[new].right = Some(nr);
    }
    new
}

impl<Tr, C> PartialEq for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<Tr, C> Eq for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: Eq,
{
}

impl<Tr, C> PartialOrd for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: PartialOrd,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<Tr, C> Ord for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: Ord,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<Tr, C> fmt::Debug for RbTree<Tr, C>
where
    Tr: ValueTraits,
    Tr::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// In-order iterator over a position range, usable from both ends.
pub struct Iter<'a, T> {
    nodes: &'a Nodes<T>,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<T: fmt::Debug> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let k = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = next_key(self.nodes, k);
        }
        Some(&self.nodes[k].value)
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        let k = self.back?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = prev_key(self.nodes, k);
        }
        Some(&self.nodes[k].value)
    }
}

impl<T> core::iter::FusedIterator for Iter<'_, T> {}

/// Owning in-order iterator.
pub struct IntoIter<T> {
    order: std::vec::IntoIter<NodeKey>,
    nodes: Nodes<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let k = self.order.next()?;
        self.nodes.remove(k).map(|n| n.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        let k = self.order.next_back()?;
        self.nodes.remove(k).map(|n| n.value)
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<Tr: ValueTraits, C> IntoIterator for RbTree<Tr, C> {
    type Item = Tr::Value;
    type IntoIter = IntoIter<Tr::Value>;

    fn into_iter(self) -> IntoIter<Tr::Value> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut cur = self.header.leftmost;
        while let Some(k) = cur {
            order.push(k);
            cur = next_key(&self.nodes, k);
        }
        IntoIter {
            order: order.into_iter(),
            nodes: self.nodes,
        }
    }
}

impl<'a, Tr: ValueTraits, C> IntoIterator for &'a RbTree<Tr, C> {
    type Item = &'a Tr::Value;
    type IntoIter = Iter<'a, Tr::Value>;

    fn into_iter(self) -> Iter<'a, Tr::Value> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::{CompareFn, Greater};
    use crate::value_traits::{Identity, PairKey};
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    type Tree = RbTree<Identity<i32>>;

    fn tree_of(keys: &[i32]) -> Tree {
        let mut t = Tree::default();
        for &k in keys {
            let _ = t.insert_unique(k);
            t.check_invariants().unwrap();
        }
        t
    }

    fn contents<Tr: ValueTraits<Value = i32>, C>(t: &RbTree<Tr, C>) -> Vec<i32> {
        t.iter().copied().collect()
    }

    /// Invariant: in-order traversal is sorted and the tree stays red-black valid through an
    /// insert and an erase of an inner node.
    #[test]
    fn insert_then_erase_root_keeps_order() {
        let mut t = tree_of(&[5, 3, 8, 1, 4, 7, 9]);
        assert_eq!(contents(&t), [1, 3, 4, 5, 7, 8, 9]);
        let h = t.find(&5).unwrap();
        assert_eq!(t.erase(h), Some(5));
        assert_eq!(contents(&t), [1, 3, 4, 7, 8, 9]);
        t.check_invariants().unwrap();
    }

    /// Invariant: duplicate unique insert returns the existing position and the rejected value.
    #[test]
    fn unique_insert_rejects_equivalent_key() {
        let mut t = tree_of(&[1, 2, 3]);
        let existing = t.find(&2).unwrap();
        let rejected = t.insert_unique(2).unwrap_err();
        assert_eq!(rejected.existing, existing);
        assert_eq!(rejected.value, 2);
        assert_eq!(t.len(), 3);
    }

    /// Invariant: multi inserts keep equivalent keys in insertion order.
    #[test]
    fn multi_insert_appends_after_equivalents() {
        let mut t: RbTree<PairKey<i32, char>> = RbTree::default();
        for (k, tag) in [(2, 'a'), (1, 'x'), (2, 'b'), (3, 'y'), (2, 'c')] {
            t.insert_multi((k, tag));
        }
        let tags: Vec<char> = t.range(t.lower_bound(&2), t.upper_bound(&2)).map(|e| e.1).collect();
        assert_eq!(tags, ['a', 'b', 'c']);
        assert_eq!(t.count(&2), 3);
        t.check_invariants().unwrap();
    }

    /// Invariant: handles to other nodes survive erasing a node with two children.
    #[test]
    fn handles_survive_unrelated_erase() {
        let mut t = Tree::default();
        let handles: Vec<Handle> = (0..64).map(|k| t.insert_unique(k).unwrap()).collect();
        let victim = handles[31];
        assert_eq!(t.erase(victim), Some(31));
        assert_eq!(t.get(victim), None, "stale handle must not resolve");
        for (k, h) in handles.iter().enumerate() {
            if k != 31 {
                assert_eq!(t.get(*h), Some(&(k as i32)));
            }
        }
        t.check_invariants().unwrap();
    }

    #[test]
    fn bounds_and_ranges() {
        let t = tree_of(&[10, 20, 30, 40]);
        let at = |h: Option<Handle>| h.and_then(|h| t.get(h)).copied();
        assert_eq!(at(t.lower_bound(&20)), Some(20));
        assert_eq!(at(t.upper_bound(&20)), Some(30));
        assert_eq!(at(t.lower_bound(&25)), Some(30));
        assert_eq!(at(t.lower_bound(&41)), None);
        assert_eq!(at(t.upper_bound(&5)), Some(10));
        assert!(t.find(&25).is_none());
        let (lo, hi) = t.equal_range(&25);
        assert_eq!(lo, hi);
        assert_eq!(t.range(lo, hi).count(), 0);
        let mid: Vec<i32> = t.range(t.lower_bound(&15), t.lower_bound(&40)).copied().collect();
        assert_eq!(mid, [20, 30]);
        assert_eq!(format!("{:?}", t.range(t.find(&20), None)), "[20, 30, 40]");
    }

    #[test]
    fn range_with_erased_end_is_empty() {
        let mut t = tree_of(&[10, 20, 30, 40]);
        let from = t.find(&10);
        let stale = t.find(&30);
        t.erase_key(&30);
        assert_eq!(t.range(from, stale).count(), 0);
        assert_eq!(t.range(stale, None).count(), 0);
        assert_eq!(t.range(from, t.find(&40)).count(), 2);
    }

    /// Invariant: stepping back from past-the-end yields the maximum, and successor/predecessor
    /// walk the whole tree in both directions.
    #[test]
    fn navigation_from_both_ends() {
        let t = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
        let mut pos = t.predecessor(None);
        let mut down = Vec::new();
        while let Some(h) = pos {
            down.push(*t.get(h).unwrap());
            pos = t.predecessor(Some(h));
        }
        assert_eq!(down, [7, 6, 5, 4, 3, 2, 1]);

        let mut pos = t.first();
        let mut up = Vec::new();
        while let Some(h) = pos {
            up.push(*t.get(h).unwrap());
            pos = t.successor(h);
        }
        assert_eq!(up, [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(t.iter().rev().copied().collect::<Vec<_>>(), down);
    }

    #[test]
    fn range_by_bounds() {
        let t = tree_of(&[1, 3, 5, 7, 9]);
        let get = |r: Iter<'_, i32>| r.copied().collect::<Vec<_>>();
        assert_eq!(get(t.range_by(3..7)), [3, 5]);
        assert_eq!(get(t.range_by(3..=7)), [3, 5, 7]);
        assert_eq!(get(t.range_by(..4)), [1, 3]);
        assert_eq!(get(t.range_by(6..)), [7, 9]);
        assert_eq!(get(t.range_by::<i32, _>(..)), [1, 3, 5, 7, 9]);
        assert_eq!(get(t.range_by((Bound::Excluded(3), Bound::Excluded(9)))), [5, 7]);
        assert!(get(t.range_by((Bound::Excluded(5), Bound::Excluded(5)))).is_empty());
        assert!(get(t.range_by((Bound::Included(8), Bound::Included(2)))).is_empty());
    }

    #[test]
    fn iterator_meets_in_the_middle() {
        let t = tree_of(&[1, 2, 3, 4, 5]);
        let mut it = t.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&5));
        assert_eq!(it.next(), Some(&2));
        assert_eq!(it.next_back(), Some(&4));
        assert_eq!(it.next(), Some(&3));
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);
    }

    #[test]
    fn erase_key_and_range() {
        let mut t: RbTree<Identity<i32>> = RbTree::default();
        for k in [1, 2, 2, 2, 3, 4, 5] {
            t.insert_multi(k);
        }
        assert_eq!(t.erase_key(&2), 3);
        assert_eq!(contents(&t), [1, 3, 4, 5]);
        let removed = t.erase_range(t.find(&3), t.find(&5));
        assert_eq!(removed, 2);
        assert_eq!(contents(&t), [1, 5]);
        assert_eq!(t.erase_range(t.first(), None), 2);
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
        assert_eq!(t.last(), None);
        t.check_invariants().unwrap();
    }

    #[test]
    fn hinted_inserts_link_in_place_or_fall_back() {
        let mut t = Tree::default();
        for k in 0..100 {
            // Always appending: the end hint is exact.
            t.insert_unique_hint(None, k).unwrap();
        }
        t.check_invariants().unwrap();
        let h50 = t.find(&50).unwrap();
        assert!(t.insert_unique_hint(Some(h50), 50).is_err());
        // Wrong hint still inserts correctly.
        let h10 = t.find(&10).unwrap();
        t.insert_multi_hint(Some(h10), 75);
        t.insert_multi_hint(t.find(&75), 75);
        assert_eq!(t.count(&75), 3);
        t.check_invariants().unwrap();
        let first = t.first();
        t.insert_unique_hint(first, -1).unwrap();
        assert_eq!(t.iter().next(), Some(&-1));
        t.check_invariants().unwrap();
    }

    #[test]
    fn custom_comparators() {
        let mut t: RbTree<Identity<i32>, Greater> = RbTree::default();
        for k in [3, 1, 2] {
            t.insert_unique(k).unwrap();
        }
        assert_eq!(contents(&t), [3, 2, 1]);

        let by_abs = CompareFn(|a: &i32, b: &i32| a.abs() < b.abs());
        let mut t: RbTree<Identity<i32>, _> = RbTree::with_compare(by_abs);
        t.insert_unique(-2).unwrap();
        // 2 is equivalent to -2 under |x| ordering.
        assert!(t.insert_unique(2).is_err());
        assert!(t.contains(&2));
    }

    #[test]
    fn borrowed_lookup_with_str() {
        let mut t: RbTree<Identity<String>> = RbTree::default();
        t.insert_unique("pear".to_string()).unwrap();
        t.insert_unique("apple".to_string()).unwrap();
        assert!(t.contains("pear"));
        assert!(!t.contains("plum"));
        assert_eq!(t.lower_bound("b").and_then(|h| t.get(h)).map(String::as_str), Some("pear"));
    }

    #[test]
    fn clone_preserves_shape_and_equality() {
        let t = tree_of(&[8, 4, 12, 2, 6, 10, 14, 1]);
        let c = t.clone();
        assert_eq!(t, c);
        assert_eq!(t.check_invariants(), c.check_invariants());
        let mut d = c.clone();
        d.erase_key(&1);
        assert_ne!(t, d);
        assert!(d > t, "lexicographic: [2, ..] sorts after [1, ..]");
    }

    /// Value whose `clone` panics on the `limit`-th call; counts clones and drops.
    #[derive(Debug)]
    struct Fuse {
        clones: Rc<Cell<usize>>,
        drops: Rc<Cell<usize>>,
        limit: usize,
    }

    impl Clone for Fuse {
        fn clone(&self) -> Self {
            let n = self.clones.get() + 1;
            self.clones.set(n);
            if n == self.limit {
                panic!("clone {n} failed");
            }
            Fuse {
                clones: Rc::clone(&self.clones),
                drops: Rc::clone(&self.drops),
                limit: self.limit,
            }
        }
    }

    impl Drop for Fuse {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    /// Failure atomicity: a panic on the 7th value clone drops the six copies already made and
    /// leaves the source intact.
    #[test]
    fn clone_panic_drops_partial_copy() {
        let clones = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));
        let mut t: RbTree<PairKey<u32, Fuse>> = RbTree::default();
        for k in 0..20 {
            let fuse = Fuse {
                clones: Rc::clone(&clones),
                drops: Rc::clone(&drops),
                limit: 7,
            };
            t.insert_unique((k, fuse)).unwrap();
        }

        let r = panic::catch_unwind(AssertUnwindSafe(|| t.clone()));
        assert!(r.is_err());
        assert_eq!(clones.get(), 7);
        assert_eq!(drops.get(), 6);
        assert_eq!(t.len(), 20);
        t.check_invariants().unwrap();
        assert!(t.iter().map(|e| e.0).eq(0..20));
    }

    #[test]
    fn checked_inserts_match_plain_ones() {
        let mut t = tree_of(&[1, 3]);
        let h = t.try_insert_unique(2).unwrap().unwrap();
        assert_eq!(t.get(h), Some(&2));
        let rejected = t.try_insert_unique(3).unwrap().unwrap_err();
        assert_eq!(rejected.value, 3);
        assert_eq!(Some(rejected.existing), t.find(&3));
        let h = t.try_insert_multi(3).unwrap();
        assert_eq!(t.successor(h), None);
        assert_eq!(contents(&t), [1, 2, 3, 3]);
        assert!(t.len() < t.max_len());
        t.check_invariants().unwrap();
    }

    #[test]
    fn take_leaves_valid_empty_tree() {
        let mut t = tree_of(&[1, 2, 3]);
        let moved = t.take();
        assert!(t.is_empty());
        t.check_invariants().unwrap();
        assert_eq!(contents(&moved), [1, 2, 3]);
        t.insert_unique(9).unwrap();
        assert_eq!(contents(&t), [9]);
    }

    #[test]
    fn into_iter_yields_sorted_owned_values() {
        let t = tree_of(&[3, 1, 2]);
        let v: Vec<i32> = t.into_iter().collect();
        assert_eq!(v, [1, 2, 3]);
    }

    #[test]
    fn failed_construction_leaves_tree_untouched() {
        let mut t = tree_of(&[1, 2]);
        let r: Result<_, &str> = t.try_insert_unique_with(|| Err("boom"));
        assert!(r.is_err());
        assert_eq!(contents(&t), [1, 2]);
        let r: Result<_, &str> = t.try_insert_multi_with(|| Ok(2));
        assert!(r.is_ok());
        assert_eq!(t.count(&2), 2);
    }

    #[test]
    fn mapped_mut_edits_value_not_key() {
        let mut t: RbTree<PairKey<&str, i32>> = RbTree::default();
        let h = t.insert_unique(("a", 1)).unwrap();
        *t.mapped_mut(h).unwrap() += 41;
        assert_eq!(t.get(h), Some(&("a", 42)));
    }
}
