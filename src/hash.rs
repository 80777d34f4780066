//! Digest helpers. Every public digest in the ledger is SHA3-256 rendered as lowercase hex.
use digest::Digest;
use sha3::Sha3_256;

/// Hash a sequence of byte strings. Each part is prefixed with its length so that the
/// boundaries between parts are part of the digest.
pub fn framed<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let hash = parts
        .iter()
        .fold(D::new(), |hasher, part| {
            hasher
                .chain_update((part.len() as u64).to_be_bytes())
                .chain_update(part)
        })
        .finalize();
    return hash.to_vec();
}

/// Framed SHA3-256, hex encoded
pub fn digest_parts(parts: &[&[u8]]) -> String {
    return hex::encode(framed::<Sha3_256>(parts));
}

/// Plain SHA3-256 of a single byte string, hex encoded
pub fn digest_hex(bytes: &[u8]) -> String {
    return hex::encode(Sha3_256::digest(bytes));
}

/// Plain SHA3-256 of the concatenation of two strings, as used by the bulletin Merkle tree and
/// the verification code
pub fn digest_concat(left: &str, right: &str) -> Vec<u8> {
    let mut hasher = Sha3_256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    return hasher.finalize().to_vec();
}
