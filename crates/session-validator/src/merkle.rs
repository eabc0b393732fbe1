//! Sorted-pair keccak Merkle commitments.
//!
//! Sessions are never stored on-chain; a wallet commits to the *root* of a
//! Merkle tree over session leaves and the operator proves membership at
//! validation time. Pair hashing sorts the two children first, so a proof is
//! just the sibling path with no direction bits.

use alloy_primitives::{keccak256, B256};

/// Hashes a sorted pair of nodes.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

/// Verifies a Merkle membership proof against a committed root.
pub fn verify_proof(proof: &[B256], root: B256, leaf: B256) -> bool {
    proof.iter().fold(leaf, |node, sibling| hash_pair(node, *sibling)) == root
}

/// An in-memory Merkle tree over session leaves.
///
/// This is the off-chain half of the commitment: management tooling and tests
/// build the tree, publish [`Self::root`] into the operator's permission, and
/// hand each operator call a [`Self::proof`]. An odd node at any layer is
/// carried up unchanged.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<B256>>,
}

impl MerkleTree {
    /// Builds a tree over the given leaves, preserving their order.
    pub fn new(leaves: Vec<B256>) -> Self {
        let mut layers = vec![leaves];
        while layers.last().expect("at least one layer").len() > 1 {
            let previous = layers.last().expect("at least one layer");
            let mut next = Vec::with_capacity(previous.len().div_ceil(2));
            for pair in previous.chunks(2) {
                match pair {
                    [a, b] => next.push(hash_pair(*a, *b)),
                    [a] => next.push(*a),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                }
            }
            layers.push(next);
        }
        Self { layers }
    }

    /// The committed root. An empty tree commits to the zero hash, which no
    /// proof can satisfy.
    pub fn root(&self) -> B256 {
        self.layers.last().and_then(|layer| layer.first()).copied().unwrap_or(B256::ZERO)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sibling path proving membership of the leaf at `index`.
    ///
    /// Returns `None` when the index is out of range.
    pub fn proof(&self, index: usize) -> Option<Vec<B256>> {
        if index >= self.len() {
            return None;
        }
        let mut proof = Vec::new();
        let mut position = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = position ^ 1;
            if let Some(node) = layer.get(sibling) {
                proof.push(*node);
            }
            position /= 2;
        }
        Some(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u8) -> Vec<B256> {
        (0..n).map(|i| keccak256([i])).collect()
    }

    #[test]
    fn every_leaf_of_a_built_tree_verifies() {
        for n in 1..=9 {
            let leaves = leaves(n);
            let tree = MerkleTree::new(leaves.clone());
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_proof(&proof, tree.root(), *leaf), "leaf {i} of {n}");
            }
        }
    }

    #[test]
    fn foreign_leaf_fails_verification() {
        let tree = MerkleTree::new(leaves(5));
        let proof = tree.proof(2).unwrap();
        assert!(!verify_proof(&proof, tree.root(), keccak256([0xff])));
    }

    #[test]
    fn proof_against_a_different_root_fails() {
        let leaves = leaves(4);
        let tree = MerkleTree::new(leaves.clone());
        let other = MerkleTree::new(leaves[1..].to_vec());
        let proof = tree.proof(0).unwrap();
        assert!(verify_proof(&proof, tree.root(), leaves[0]));
        assert!(!verify_proof(&proof, other.root(), leaves[0]));
    }

    #[test]
    fn single_leaf_tree_has_leaf_as_root() {
        let leaf = keccak256([1]);
        let tree = MerkleTree::new(vec![leaf]);
        assert_eq!(tree.root(), leaf);
        assert_eq!(tree.proof(0).unwrap(), Vec::<B256>::new());
    }

    #[test]
    fn empty_tree_admits_nothing() {
        let tree = MerkleTree::new(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.root(), B256::ZERO);
        assert!(tree.proof(0).is_none());
        assert!(!verify_proof(&[], tree.root(), keccak256([0])));
    }

    #[test]
    fn pair_hashing_is_symmetric() {
        let a = keccak256([1]);
        let b = keccak256([2]);
        assert_eq!(hash_pair(a, b), hash_pair(b, a));
    }
}
