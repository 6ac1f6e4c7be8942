//! Incremental, size-balanced binary Merkle hash tree, per spec.md §4.1.
//!
//! Two tag bytes provide domain separation between leaves and interior
//! nodes: a leaf label is `0x00 || H`, an interior label is
//! `0x01 || SHA-512(children's labels concatenated)`. Without the tag an
//! attacker could replay a victim tree's two interior labels as the leaves
//! of a forged two-leaf tree with the same root; the tag makes the two
//! byte strings structurally distinguishable.
//!
//! `insert` walks the right spine of the tree: it fills a missing left or
//! right child directly, rotates the current node down a level and starts
//! a fresh singleton on the right when both children are present and
//! equally sized, or otherwise recurses into the right child. This keeps
//! the tree at depth `O(log n)`.
//!
//! Leaves are accepted as any byte slice rather than a fixed-width digest:
//! in ordinary use they are transaction hashes (64 bytes), but the
//! second-preimage property in spec.md §8 is stated over tree *labels*
//! (65 bytes, already tagged) re-inserted as leaves, so the API must not
//! assume a fixed leaf width.

use crate::hash;

const LEAF_TAG: u8 = 0x00;
const INTERIOR_TAG: u8 = 0x01;

/// One hash triple `(label, left_label, right_label)` on a path from the
/// root to a leaf, as returned by [`MerkleTree::contains`].
pub type HashTriple = (Vec<u8>, Option<Vec<u8>>, Option<Vec<u8>>);

/// A node in the Merkle tree. Each parent exclusively owns its children;
/// there are no back-pointers, and validation is purely bottom-up.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    label: Vec<u8>,
    left: Option<Box<MerkleTree>>,
    right: Option<Box<MerkleTree>>,
    size: usize,
}

impl MerkleTree {
    /// The node's domain-separated label.
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    /// Number of leaves reachable from this node plus the interior nodes
    /// above them (matches the reference implementation's `size` field,
    /// which counts nodes, not leaves).
    pub fn size(&self) -> usize {
        self.size
    }

    fn leaf(leaf: &[u8]) -> Self {
        let mut label = Vec::with_capacity(1 + leaf.len());
        label.push(LEAF_TAG);
        label.extend_from_slice(leaf);
        MerkleTree {
            label,
            left: None,
            right: None,
            size: 1,
        }
    }

    fn interior(label: Vec<u8>, left: Box<MerkleTree>, right: Box<MerkleTree>) -> Self {
        let size = 1 + left.size + right.size;
        MerkleTree {
            label,
            left: Some(left),
            right: Some(right),
            size,
        }
    }

    /// Creates a spine root with a single leaf child.
    pub fn from_singleton(leaf: &[u8]) -> Self {
        let leaf_node = Self::leaf(leaf);
        let mut root = MerkleTree {
            label: Vec::new(),
            left: Some(Box::new(leaf_node)),
            right: None,
            size: 0,
        };
        root.update();
        root
    }

    /// Builds a tree from an ordered, non-empty list of leaves. Returns
    /// `None` for an empty input (the empty-tree sentinel).
    pub fn from_list<T: AsRef<[u8]>>(leaves: &[T]) -> Option<Self> {
        let (head, tail) = leaves.split_first()?;
        let mut tree = Self::from_singleton(head.as_ref());
        for leaf in tail {
            tree.insert(leaf.as_ref());
        }
        Some(tree)
    }

    /// Inserts a new leaf, descending the right spine.
    pub fn insert(&mut self, leaf: &[u8]) {
        if self.left.is_none() {
            self.left = Some(Box::new(Self::leaf(leaf)));
            self.update();
        } else if self.right.is_none() {
            self.right = Some(Box::new(Self::leaf(leaf)));
            self.update();
        } else if self.left.as_ref().unwrap().size == self.right.as_ref().unwrap().size {
            let left = self.left.take().unwrap();
            let right = self.right.take().unwrap();
            let rotated = Self::interior(self.label.clone(), left, right);
            self.left = Some(Box::new(rotated));
            self.right = Some(Box::new(Self::from_singleton(leaf)));
            self.update();
        } else {
            self.right.as_mut().unwrap().insert(leaf);
            self.update();
        }
    }

    /// Recomputes this node's label and size from its current children.
    fn update(&mut self) {
        let left = self.left.as_ref().expect("update requires a left child");
        let (hashed, size) = match &self.right {
            Some(right) => {
                let mut buf = Vec::with_capacity(left.label.len() + right.label.len());
                buf.extend_from_slice(&left.label);
                buf.extend_from_slice(&right.label);
                (hash::hash(&buf), left.size + right.size)
            }
            None => (hash::hash(&left.label), left.size),
        };
        let mut label = Vec::with_capacity(65);
        label.push(INTERIOR_TAG);
        label.extend_from_slice(&hashed);
        self.label = label;
        self.size = 1 + size;
    }

    /// Checks bottom-up that every leaf label is tagged `0x00` and every
    /// interior label is the tagged hash of its children's labels.
    pub fn valid(&self) -> bool {
        match (&self.left, &self.right) {
            (None, None) => self.label.first() == Some(&LEAF_TAG) && self.label.len() > 1,
            (Some(left), None) => {
                let expect_hash = hash::hash(&left.label);
                self.label[0] == INTERIOR_TAG && self.label[1..] == expect_hash && left.valid()
            }
            (Some(left), Some(right)) => {
                let mut buf = left.label.clone();
                buf.extend_from_slice(&right.label);
                let expect_hash = hash::hash(&buf);
                self.label[0] == INTERIOR_TAG
                    && self.label[1..] == expect_hash
                    && left.valid()
                    && right.valid()
            }
            (None, Some(_)) => false,
        }
    }

    /// Finds the hash path from the root to `leaf`, or an empty path if
    /// `leaf` is absent from the tree.
    pub fn contains(&self, leaf: &[u8]) -> Vec<HashTriple> {
        let mut path = Vec::new();
        if self.find(leaf, &mut path) {
            path
        } else {
            Vec::new()
        }
    }

    fn find(&self, leaf: &[u8], path: &mut Vec<HashTriple>) -> bool {
        path.push(self.hash_triple());

        let mut target = Vec::with_capacity(1 + leaf.len());
        target.push(LEAF_TAG);
        target.extend_from_slice(leaf);

        if self.label == target {
            return true;
        }
        if let Some(left) = &self.left {
            if left.find(leaf, path) {
                return true;
            }
        }
        if let Some(right) = &self.right {
            if right.find(leaf, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    fn hash_triple(&self) -> HashTriple {
        (
            self.label.clone(),
            self.left.as_ref().map(|t| t.label.clone()),
            self.right.as_ref().map(|t| t.label.clone()),
        )
    }
}
