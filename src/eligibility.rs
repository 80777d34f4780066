//! Anonymous eligibility. At registration each voter publishes a commitment H(voterId, secret)
//! which becomes a leaf of the voter tree; at voting time the voter reveals only the nullifier
//! H(secret, electionId) together with a proof (produced outside this crate) that the nullifier
//! belongs to some leaf under the published root.
use crate::{
    error::{Error, Result},
    hash,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use std::{fmt, str::FromStr};

/// A voter's long-lived secret. Never leaves the voter's device.
#[derive(Clone, Eq, PartialEq)]
pub struct VoterSecret(String);

impl fmt::Debug for VoterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoterSecret(..)")
    }
}

impl VoterSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// 32 random bytes, hex encoded
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        return Self(hex::encode(bytes));
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// The per-election idempotence key of a voter
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({self})")
    }
}

impl FromStr for Nullifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidNullifier(format!("{s:?}: {e}")))?;
        return Ok(Self(bytes));
    }
}

impl TryFrom<String> for Nullifier {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Nullifier> for String {
    fn from(nullifier: Nullifier) -> Self {
        nullifier.to_string()
    }
}

/// A leaf of the voter tree
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterCommitment(String);

impl VoterCommitment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn commit_voter(voter_id: &str, secret: &VoterSecret) -> VoterCommitment {
    VoterCommitment(hash::digest_parts(&[
        voter_id.as_bytes(),
        secret.expose().as_bytes(),
    ]))
}

/// Deterministic in (secret, electionId); different elections give unlinkable nullifiers
pub fn derive_nullifier(secret: &VoterSecret, election_id: &str) -> Nullifier {
    let digest = hash::framed::<Sha3_256>(&[secret.expose().as_bytes(), election_id.as_bytes()]);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    return Nullifier(bytes);
}

/// What the external prover needs to show membership of a commitment under a root.
/// `path_indices[i]` is 0 when the running node is the left child at level i, 1 otherwise.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStatement {
    pub commitment: VoterCommitment,
    pub merkle_path: Vec<String>,
    pub path_indices: Vec<u8>,
    pub merkle_root: String,
}

impl MembershipStatement {
    pub fn verify(&self) -> bool {
        if self.merkle_path.len() != self.path_indices.len() {
            return false;
        }
        let root = self
            .merkle_path
            .iter()
            .zip(self.path_indices.iter())
            .fold(self.commitment.0.clone(), |node, (sibling, index)| {
                if *index == 0 {
                    hash_pair(&node, sibling)
                } else {
                    hash_pair(sibling, &node)
                }
            });
        return root == self.merkle_root;
    }
}

fn hash_pair(left: &str, right: &str) -> String {
    hex::encode(hash::digest_concat(left, right))
}

/// Fixed-depth binary Merkle tree over voter commitments. Unoccupied positions hold the zero
/// leaf H("0"), and an empty subtree of height i hashes to zeros[i], so only occupied leaves are
/// ever materialized.
#[derive(Debug, Clone)]
pub struct VoterTree {
    depth: usize,
    leaves: Vec<VoterCommitment>,
    zeros: Vec<String>,
}

impl VoterTree {
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 || depth > 32 {
            return Err(Error::VoterTree(format!("unsupported depth {depth}")));
        }
        let mut zeros = vec![hash::digest_hex(b"0")];
        for level in 0..depth {
            let zero = hash_pair(&zeros[level], &zeros[level]);
            zeros.push(zero);
        }
        return Ok(Self {
            depth,
            leaves: vec![],
            zeros,
        });
    }

    pub fn get_depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Append a commitment, returning its leaf index
    pub fn add_leaf(&mut self, commitment: VoterCommitment) -> Result<usize> {
        let index = self.leaves.len();
        if (index as u64) >= 1u64 << self.depth {
            return Err(Error::VoterTree("tree is full".into()));
        }
        self.leaves.push(commitment);
        return Ok(index);
    }

    /// Every materialized level from the leaves up to the root
    fn levels(&self) -> Vec<Vec<String>> {
        let mut levels = vec![self
            .leaves
            .iter()
            .map(|leaf| leaf.0.clone())
            .collect::<Vec<String>>()];
        for level in 0..self.depth {
            let next = levels[level]
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&self.zeros[level])))
                .collect();
            levels.push(next);
        }
        return levels;
    }

    pub fn root(&self) -> String {
        if self.leaves.is_empty() {
            return self.zeros[self.depth].clone();
        }
        let mut levels = self.levels();
        return levels[self.depth].swap_remove(0);
    }

    /// The membership statement for the leaf at `index`
    pub fn path(&self, index: usize) -> Result<MembershipStatement> {
        let commitment = self
            .leaves
            .get(index)
            .cloned()
            .ok_or_else(|| Error::VoterTree(format!("no leaf at index {index}")))?;
        let levels = self.levels();
        let mut merkle_path = vec![];
        let mut path_indices = vec![];
        let mut position = index;
        for level in 0..self.depth {
            let sibling = position ^ 1;
            merkle_path.push(
                levels[level]
                    .get(sibling)
                    .cloned()
                    .unwrap_or_else(|| self.zeros[level].clone()),
            );
            path_indices.push((position & 1) as u8);
            position >>= 1;
        }
        return Ok(MembershipStatement {
            commitment,
            merkle_path,
            path_indices,
            merkle_root: levels[self.depth][0].clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_nullifier_determinism() {
        let secret = VoterSecret::new("correct horse battery staple");
        let first = derive_nullifier(&secret, "election-A");
        let second = derive_nullifier(&secret, "election-A");
        assert_eq!(first, second);
        assert_ne!(first, derive_nullifier(&secret, "election-B"));
        assert_ne!(
            first,
            derive_nullifier(&VoterSecret::new("another secret"), "election-A")
        );
    }

    #[test]
    fn test_nullifier_hex() {
        let nullifier = derive_nullifier(&VoterSecret::generate(), "e");
        let encoded = nullifier.to_string();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded.parse::<Nullifier>().unwrap(), nullifier);
        let json = serde_json::to_string(&nullifier).unwrap();
        assert_eq!(json, format!("\"{encoded}\""));
        assert!("abc".parse::<Nullifier>().is_err());
    }

    #[test]
    fn test_commitment() {
        let secret = VoterSecret::new("s");
        assert_eq!(commit_voter("alice", &secret), commit_voter("alice", &secret));
        assert_ne!(commit_voter("alice", &secret), commit_voter("bob", &secret));
        assert_eq!(format!("{secret:?}"), "VoterSecret(..)");
    }

    #[test]
    fn test_empty_tree() {
        let tree = VoterTree::new(3).unwrap();
        let zero = hash::digest_hex(b"0");
        let one = hash_pair(&zero, &zero);
        let two = hash_pair(&one, &one);
        assert_eq!(tree.root(), hash_pair(&two, &two));
        assert!(tree.path(0).is_err());
        assert!(VoterTree::new(0).is_err());
    }

    #[test]
    fn test_paths_verify() {
        let mut tree = VoterTree::new(4).unwrap();
        let commitments = (0..5)
            .map(|i| commit_voter(&format!("voter-{i}"), &VoterSecret::generate()))
            .collect::<Vec<VoterCommitment>>();
        for (i, commitment) in commitments.iter().enumerate() {
            assert_eq!(tree.add_leaf(commitment.clone()).unwrap(), i);
        }
        let root = tree.root();
        for i in 0..commitments.len() {
            let statement = tree.path(i).unwrap();
            assert_eq!(statement.merkle_root, root);
            assert_eq!(statement.merkle_path.len(), 4);
            assert!(statement.verify());

            let mut forged = statement.clone();
            forged.commitment = commit_voter("mallory", &VoterSecret::new("x"));
            assert!(!forged.verify());
        }
        assert_eq!(tree.path(4).unwrap().path_indices, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_full_tree() {
        let mut tree = VoterTree::new(1).unwrap();
        let secret = VoterSecret::new("s");
        tree.add_leaf(commit_voter("a", &secret)).unwrap();
        tree.add_leaf(commit_voter("b", &secret)).unwrap();
        assert!(matches!(
            tree.add_leaf(commit_voter("c", &secret)),
            Err(Error::VoterTree(_))
        ));
        assert_eq!(
            tree.root(),
            hash_pair(
                commit_voter("a", &secret).as_str(),
                commit_voter("b", &secret).as_str()
            )
        );
    }

    proptest! {
        #[test]
        fn prop_nullifier_is_a_function(secret in "[a-z0-9]{1,32}", election in "[a-z0-9-]{1,16}") {
            let secret = VoterSecret::new(secret);
            prop_assert_eq!(
                derive_nullifier(&secret, &election),
                derive_nullifier(&VoterSecret::new(secret.expose()), &election)
            );
            let other = format!("{election}-next");
            prop_assert_ne!(derive_nullifier(&secret, &election), derive_nullifier(&secret, &other));
        }
    }
}
