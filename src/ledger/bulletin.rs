//! The public audit anchor of an election: a Merkle root over its bulletin board
use super::records::BulletinBoardEntry;
use crate::hash;

/// Leaves are H(hash || txId); each level hashes adjacent pairs and promotes a trailing odd
/// node unchanged. An empty board has no root.
pub fn merkle_root(entries: &[BulletinBoardEntry]) -> Option<String> {
    let mut level = entries
        .iter()
        .map(|entry| hex::encode(hash::digest_concat(&entry.hash, &entry.tx_id)))
        .collect::<Vec<String>>();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair.get(1) {
                Some(right) => hex::encode(hash::digest_concat(&pair[0], right)),
                None => pair[0].clone(),
            })
            .collect();
    }
    return level.pop();
}

/// Verification code of a receipt: the leading `bytes` bytes of H(txId || ballotHash), hex
/// encoded
pub fn verification_code(tx_id: &str, ballot_hash: &str, bytes: usize) -> String {
    let digest = hash::digest_concat(tx_id, ballot_hash);
    return hex::encode(&digest[..bytes.min(digest.len())]);
}
