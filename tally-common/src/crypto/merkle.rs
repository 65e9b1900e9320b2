use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Root reported for a tree with no leaves.
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

/// Which side of the pair the sibling hash sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One level of an inclusion proof: the sibling hash and its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "hex::serde")]
    pub sibling: [u8; 32],
    pub side: Side,
}

/// Inclusion proof for a single leaf, ordered leaf-to-root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Folds the proof from `leaf` and checks the result against `root`.
    pub fn verify(&self, leaf: [u8; 32], root: [u8; 32]) -> bool {
        let mut current = leaf;
        for step in &self.steps {
            current = match step.side {
                Side::Left => combine(&step.sibling, &current),
                Side::Right => combine(&current, &step.sibling),
            };
        }
        current == root
    }
}

/// Binary SHA-256 Merkle tree over pre-hashed 32-byte leaves.
///
/// A level with an odd node count pairs its last node with itself, the
/// Bitcoin convention, so trees built here interoperate with verifiers
/// that expect that rule.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

fn combine(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

impl MerkleTree {
    pub fn build(leaves: Vec<[u8; 32]>) -> Self {
        let mut levels = vec![leaves];
        while levels.last().map_or(false, |l| l.len() > 1) {
            let below = levels.last().expect("levels is never empty");
            let mut above = Vec::with_capacity((below.len() + 1) / 2);
            for pair in below.chunks(2) {
                let left = &pair[0];
                // Odd node: pair the last node with itself.
                let right = pair.get(1).unwrap_or(left);
                above.push(combine(left, right));
            }
            levels.push(above);
        }
        Self { levels }
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    /// Builds the inclusion proof for the leaf at `index`.
    ///
    /// Returns `None` when the index is out of range.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut steps = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let (sibling_idx, side) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            // A missing right sibling means this node was duplicated.
            let sibling = *level.get(sibling_idx).unwrap_or(&level[idx]);
            steps.push(ProofStep { sibling, side });
            idx /= 2;
        }
        Some(MerkleProof {
            leaf_index: index,
            steps,
        })
    }
}
