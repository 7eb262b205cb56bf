//! Self-balancing ordered index over [`SerializedRecord`]s.
//!
//! A red-black tree stored in an arena: nodes live in a `Vec`, links are indices, and
//! freed slots are recycled through a free list. Records are ordered by `id`.
//!
//! Invariants kept after every mutation:
//! - the root is black
//! - a red node never has a red child
//! - every root-to-leaf path crosses the same number of black nodes
//!
//! The tree is not internally synchronized. Lookups hand out owned snapshots, so callers
//! can only change contents through `insert` / `delete`.

use meshledger_types::SerializedRecord;
use std::cmp::Ordering;
use std::mem;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Clone, Debug)]
struct Node {
    record: SerializedRecord,
    color: Color,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// A broken tree invariant, as reported by [`RedBlackTree::verify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("root is red")]
    RedRoot,

    #[error("red node 0x{0} has a red child")]
    RedRed(String),

    #[error("black height differs below node 0x{0}")]
    BlackHeight(String),

    #[error("node 0x{0} is out of order")]
    Order(String),

    #[error("node 0x{0} has a stale parent link")]
    ParentLink(String),

    #[error("count mismatch: tracked {tracked}, reachable {reachable}")]
    Count { tracked: usize, reachable: usize },
}

/// Red-black tree keyed by record id.
#[derive(Clone, Debug, Default)]
pub struct RedBlackTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl RedBlackTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `record`. A record with the same id is replaced and returned.
    pub fn insert(&mut self, record: SerializedRecord) -> Option<SerializedRecord> {
        let mut parent = None;
        let mut current = self.root;
        let mut go_left = false;

        while let Some(i) = current {
            match record.id.as_slice().cmp(self.nodes[i].record.id.as_slice()) {
                Ordering::Less => {
                    parent = Some(i);
                    go_left = true;
                    current = self.nodes[i].left;
                }
                Ordering::Greater => {
                    parent = Some(i);
                    go_left = false;
                    current = self.nodes[i].right;
                }
                Ordering::Equal => {
                    return Some(mem::replace(&mut self.nodes[i].record, record));
                }
            }
        }

        let z = self.alloc(Node {
            record,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        });

        match parent {
            None => self.root = Some(z),
            Some(p) if go_left => self.nodes[p].left = Some(z),
            Some(p) => self.nodes[p].right = Some(z),
        }

        self.len += 1;
        self.insert_fixup(z);
        None
    }

    /// Remove the record with `id`, returning it.
    pub fn delete(&mut self, id: &[u8]) -> Option<SerializedRecord> {
        let z = self.find(id)?;
        let mut removed_color = self.nodes[z].color;
        let x;
        let x_parent;

        match (self.nodes[z].left, self.nodes[z].right) {
            (None, right) => {
                x = right;
                x_parent = self.nodes[z].parent;
                self.transplant(z, right);
            }
            (left, None) => {
                x = left;
                x_parent = self.nodes[z].parent;
                self.transplant(z, left);
            }
            (Some(z_left), Some(z_right)) => {
                // Successor takes z's place
                let y = self.minimum(z_right);
                removed_color = self.nodes[y].color;
                x = self.nodes[y].right;

                if self.nodes[y].parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.nodes[y].parent;
                    self.transplant(y, x);
                    self.nodes[y].right = Some(z_right);
                    self.nodes[z_right].parent = Some(y);
                }

                self.transplant(z, Some(y));
                self.nodes[y].left = Some(z_left);
                self.nodes[z_left].parent = Some(y);
                self.nodes[y].color = self.nodes[z].color;
            }
        }

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }

        self.len -= 1;
        Some(self.release(z))
    }

    /// Snapshot of the record with `id`.
    pub fn search(&self, id: &[u8]) -> Option<SerializedRecord> {
        self.find(id).map(|i| self.nodes[i].record.clone())
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.find(id).is_some()
    }

    /// Smallest record by id
    pub fn min(&self) -> Option<SerializedRecord> {
        self.root.map(|r| self.nodes[self.minimum(r)].record.clone())
    }

    /// Largest record by id
    pub fn max(&self) -> Option<SerializedRecord> {
        self.root.map(|r| self.nodes[self.maximum(r)].record.clone())
    }

    /// All records in id order.
    pub fn all_elements(&self) -> Vec<SerializedRecord> {
        self.iter().cloned().collect()
    }

    /// In-order iterator over the records.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    /// Check every structural invariant. Diagnostic only.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if let Some(root) = self.root {
            if self.nodes[root].color == Color::Red {
                return Err(InvariantViolation::RedRoot);
            }
            if self.nodes[root].parent.is_some() {
                return Err(InvariantViolation::ParentLink(self.hex_id(root)));
            }
        }

        let mut reachable = 0;
        self.check_subtree(self.root, None, None, &mut reachable)?;

        if reachable != self.len {
            return Err(InvariantViolation::Count {
                tracked: self.len,
                reachable,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    /// Returns the black height of the subtree at `node`.
    fn check_subtree(
        &self,
        node: Option<usize>,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        reachable: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        let Some(i) = node else {
            return Ok(1);
        };
        *reachable += 1;

        let n = &self.nodes[i];
        let id = n.record.id.as_slice();

        if lower.map_or(false, |lo| id <= lo) || upper.map_or(false, |hi| id >= hi) {
            return Err(InvariantViolation::Order(self.hex_id(i)));
        }

        for child in [n.left, n.right].into_iter().flatten() {
            if self.nodes[child].parent != Some(i) {
                return Err(InvariantViolation::ParentLink(self.hex_id(child)));
            }
            if n.color == Color::Red && self.nodes[child].color == Color::Red {
                return Err(InvariantViolation::RedRed(self.hex_id(i)));
            }
        }

        let left_height = self.check_subtree(n.left, lower, Some(id), reachable)?;
        let right_height = self.check_subtree(n.right, Some(id), upper, reachable)?;
        if left_height != right_height {
            return Err(InvariantViolation::BlackHeight(self.hex_id(i)));
        }

        Ok(left_height + usize::from(n.color == Color::Black))
    }

    fn hex_id(&self, i: usize) -> String {
        hex::encode(&self.nodes[i].record.id)
    }

    fn find(&self, id: &[u8]) -> Option<usize> {
        let mut current = self.root;
        while let Some(i) = current {
            current = match id.cmp(self.nodes[i].record.id.as_slice()) {
                Ordering::Less => self.nodes[i].left,
                Ordering::Greater => self.nodes[i].right,
                Ordering::Equal => return Some(i),
            };
        }
        None
    }

    fn minimum(&self, mut i: usize) -> usize {
        while let Some(left) = self.nodes[i].left {
            i = left;
        }
        i
    }

    fn maximum(&self, mut i: usize) -> usize {
        while let Some(right) = self.nodes[i].right {
            i = right;
        }
        i
    }

    fn color(&self, node: Option<usize>) -> Color {
        node.map_or(Color::Black, |i| self.nodes[i].color)
    }

    fn set_color(&mut self, node: Option<usize>, color: Color) {
        if let Some(i) = node {
            self.nodes[i].color = color;
        }
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, i: usize) -> SerializedRecord {
        self.free.push(i);
        let node = &mut self.nodes[i];
        node.parent = None;
        node.left = None;
        node.right = None;
        mem::take(&mut node.record)
    }

    /// Replace the subtree at `u` with the one at `v` in u's parent.
    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let parent = self.nodes[u].parent;
        match parent {
            None => self.root = v,
            Some(p) if self.nodes[p].left == Some(u) => self.nodes[p].left = v,
            Some(p) => self.nodes[p].right = v,
        }
        if let Some(v) = v {
            self.nodes[v].parent = parent;
        }
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: usize) {
        match parent {
            None => self.root = Some(new),
            Some(p) if self.nodes[p].left == Some(old) => self.nodes[p].left = Some(new),
            Some(p) => self.nodes[p].right = Some(new),
        }
    }

    fn rotate_left(&mut self, x: usize) {
        let Some(y) = self.nodes[x].right else {
            return;
        };
        let y_left = self.nodes[y].left;
        self.nodes[x].right = y_left;
        if let Some(yl) = y_left {
            self.nodes[yl].parent = Some(x);
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        self.replace_child(x_parent, x, y);

        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let Some(y) = self.nodes[x].left else {
            return;
        };
        let y_right = self.nodes[y].right;
        self.nodes[x].left = y_right;
        if let Some(yr) = y_right {
            self.nodes[yr].parent = Some(x);
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        self.replace_child(x_parent, x, y);

        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while let Some(p) = self.nodes[z].parent {
            if self.nodes[p].color == Color::Black {
                break;
            }
            // A red parent is never the root
            let Some(g) = self.nodes[p].parent else {
                break;
            };

            if self.nodes[g].left == Some(p) {
                let uncle = self.nodes[g].right;
                if self.color(uncle) == Color::Red {
                    self.nodes[p].color = Color::Black;
                    self.set_color(uncle, Color::Black);
                    self.nodes[g].color = Color::Red;
                    z = g;
                } else {
                    let mut parent = p;
                    if self.nodes[p].right == Some(z) {
                        self.rotate_left(p);
                        // z moved up into p's slot
                        parent = z;
                        z = p;
                    }
                    self.nodes[parent].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.nodes[g].left;
                if self.color(uncle) == Color::Red {
                    self.nodes[p].color = Color::Black;
                    self.set_color(uncle, Color::Black);
                    self.nodes[g].color = Color::Red;
                    z = g;
                } else {
                    let mut parent = p;
                    if self.nodes[p].left == Some(z) {
                        self.rotate_right(p);
                        // z moved up into p's slot
                        parent = z;
                        z = p;
                    }
                    self.nodes[parent].color = Color::Black;
                    self.nodes[g].color = Color::Red;
                    self.rotate_left(g);
                }
            }
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Restore the black height after removing a black node. `x` took the removed
    /// node's place (possibly empty) under `parent`.
    fn delete_fixup(&mut self, mut x: Option<usize>, mut parent: Option<usize>) {
        while x != self.root && self.color(x) == Color::Black {
            let Some(p) = parent else {
                break;
            };

            if self.nodes[p].left == x {
                let mut w = self.nodes[p].right;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.nodes[p].color = Color::Red;
                    self.rotate_left(p);
                    w = self.nodes[p].right;
                }
                let Some(s) = w else {
                    x = Some(p);
                    parent = self.nodes[p].parent;
                    continue;
                };

                if self.color(self.nodes[s].left) == Color::Black
                    && self.color(self.nodes[s].right) == Color::Black
                {
                    self.nodes[s].color = Color::Red;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    let mut s = s;
                    if self.color(self.nodes[s].right) == Color::Black {
                        let near = self.nodes[s].left;
                        self.set_color(near, Color::Black);
                        self.nodes[s].color = Color::Red;
                        self.rotate_right(s);
                        match self.nodes[p].right {
                            Some(next) => s = next,
                            None => break,
                        }
                    }
                    self.nodes[s].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let far = self.nodes[s].right;
                    self.set_color(far, Color::Black);
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = self.nodes[p].left;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.nodes[p].color = Color::Red;
                    self.rotate_right(p);
                    w = self.nodes[p].left;
                }
                let Some(s) = w else {
                    x = Some(p);
                    parent = self.nodes[p].parent;
                    continue;
                };

                if self.color(self.nodes[s].left) == Color::Black
                    && self.color(self.nodes[s].right) == Color::Black
                {
                    self.nodes[s].color = Color::Red;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    let mut s = s;
                    if self.color(self.nodes[s].left) == Color::Black {
                        let near = self.nodes[s].right;
                        self.set_color(near, Color::Black);
                        self.nodes[s].color = Color::Red;
                        self.rotate_left(s);
                        match self.nodes[p].left {
                            Some(next) => s = next,
                            None => break,
                        }
                    }
                    self.nodes[s].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let far = self.nodes[s].left;
                    self.set_color(far, Color::Black);
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }

        self.set_color(x, Color::Black);
    }
}

/// In-order iterator, see [`RedBlackTree::iter`].
pub struct Iter<'a> {
    tree: &'a RedBlackTree,
    stack: Vec<usize>,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut node: Option<usize>) {
        while let Some(i) = node {
            self.stack.push(i);
            node = self.tree.nodes[i].left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a SerializedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.stack.pop()?;
        self.push_left(self.tree.nodes[i].right);
        Some(&self.tree.nodes[i].record)
    }
}

impl<'a> IntoIterator for &'a RedBlackTree {
    type Item = &'a SerializedRecord;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<SerializedRecord> for RedBlackTree {
    fn from_iter<I: IntoIterator<Item = SerializedRecord>>(iter: I) -> Self {
        let mut tree = Self::new();
        for record in iter {
            tree.insert(record);
        }
        tree
    }
}
