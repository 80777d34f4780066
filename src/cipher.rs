//! Exponential ElGamal over the election group. A ballot is a one-hot vector: one ciphertext per
//! candidate slot, exactly one of which encrypts 1. Multiplying ciphertexts adds their plaintexts,
//! so the slot-wise product of every ballot encrypts the per-candidate counts.
use crate::{
    arithmetics::Group,
    error::{Error, Result},
    hash,
    keys::GroupParams,
    BigInt,
};
use num_traits::One;
use serde::{Deserialize, Serialize};
use std::fmt;

/// (c1, c2) = (g ** r, h ** r * g ** m)
#[derive(Debug, Eq, PartialEq, Clone, Hash, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "crate::serialize::biguint")]
    c1: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    c2: BigInt,
}

impl Ciphertext {
    pub fn new(c1: BigInt, c2: BigInt) -> Self {
        Self { c1, c2 }
    }

    /// The encryption of 0 with zero randomness; the neutral element of [Ciphertext::add]
    pub fn identity() -> Self {
        Self::new(BigInt::one(), BigInt::one())
    }

    pub fn get_c1(&self) -> &BigInt {
        &self.c1
    }

    pub fn get_c2(&self) -> &BigInt {
        &self.c2
    }

    /// Encrypt m under the given nonce
    pub fn encrypt_with(m: u64, r: &BigInt, params: &GroupParams) -> Self {
        let group = params.get_group();
        let c1 = group.g_pow(r);
        let c2 = group.mul(
            &group.pow(params.get_h(), r),
            &group.g_pow(&BigInt::from(m)),
        );
        return Self::new(c1, c2);
    }

    /// Encrypt m under a fresh nonce, returning the nonce alongside
    pub fn encrypt(m: u64, params: &GroupParams) -> (Self, BigInt) {
        let r = params.get_group().random_exponent();
        return (Self::encrypt_with(m, &r, params), r);
    }

    /// Homomorphic addition: the product of two ciphertexts encrypts the sum of their plaintexts
    pub fn add(&self, other: &Self, group: &Group) -> Self {
        return Self::new(
            group.mul(&self.c1, &other.c1),
            group.mul(&self.c2, &other.c2),
        );
    }

    /// Both components must be subgroup elements
    pub fn check(&self, group: &Group) -> Result<()> {
        group.check_element(&self.c1)?;
        group.check_element(&self.c2)?;
        return Ok(());
    }
}

/// The nonces r_i behind an [EncryptedBallot]. The voter keeps these to build the validity proof
/// and must never publish them: any one of them decrypts its slot.
#[derive(Clone)]
pub struct BallotNonces(Vec<BigInt>);

impl fmt::Debug for BallotNonces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BallotNonces({} hidden)", self.0.len())
    }
}

impl BallotNonces {
    pub fn as_slice(&self) -> &[BigInt] {
        &self.0
    }

    /// The public commitment to the nonces
    pub fn commitment(&self) -> String {
        let decimals = self
            .0
            .iter()
            .map(|r| r.to_str_radix(10))
            .collect::<Vec<String>>();
        let parts = decimals
            .iter()
            .map(|s| s.as_bytes())
            .collect::<Vec<&[u8]>>();
        return hash::digest_parts(&parts);
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBallot {
    ciphertexts: Vec<Ciphertext>,
    randomness_commitment: String,
}

impl EncryptedBallot {
    pub fn new(ciphertexts: Vec<Ciphertext>, randomness_commitment: String) -> Self {
        Self {
            ciphertexts,
            randomness_commitment,
        }
    }

    pub fn get_ciphertexts(&self) -> &[Ciphertext] {
        &self.ciphertexts
    }

    pub fn get_randomness_commitment(&self) -> &str {
        &self.randomness_commitment
    }

    pub fn num_candidates(&self) -> usize {
        self.ciphertexts.len()
    }

    /// Slot-wise homomorphic addition. The sum carries no randomness commitment.
    pub fn add(&self, other: &Self, group: &Group) -> Result<Self> {
        if self.num_candidates() != other.num_candidates() {
            return Err(Error::MalformedBallot(format!(
                "cannot add a {}-slot ballot to a {}-slot ballot",
                other.num_candidates(),
                self.num_candidates()
            )));
        }
        let ciphertexts = self
            .ciphertexts
            .iter()
            .zip(other.ciphertexts.iter())
            .map(|(a, b)| a.add(b, group))
            .collect();
        return Ok(Self::new(ciphertexts, String::new()));
    }

    /// A wrong number of slots is a malformed ballot; a component outside the group is an
    /// invalid group element
    pub fn check(&self, num_candidates: usize, group: &Group) -> Result<()> {
        if self.num_candidates() != num_candidates {
            return Err(Error::MalformedBallot(format!(
                "expected {num_candidates} slots, found {}",
                self.num_candidates()
            )));
        }
        for ciphertext in self.ciphertexts.iter() {
            ciphertext.check(group)?;
        }
        return Ok(());
    }

    /// Digest of the canonical encoding: every (c1, c2) in slot order, then the randomness
    /// commitment
    pub fn content_hash(&self) -> String {
        let mut decimals = self
            .ciphertexts
            .iter()
            .flat_map(|ct| [ct.c1.to_str_radix(10), ct.c2.to_str_radix(10)])
            .collect::<Vec<String>>();
        decimals.push(self.randomness_commitment.clone());
        let parts = decimals
            .iter()
            .map(|s| s.as_bytes())
            .collect::<Vec<&[u8]>>();
        return hash::digest_parts(&parts);
    }
}

/// Encrypt a vote for candidate `choice` (counted from 1) among `num_candidates`
pub fn encrypt_ballot(
    choice: usize,
    num_candidates: usize,
    params: &GroupParams,
) -> Result<(EncryptedBallot, BallotNonces)> {
    if choice == 0 || choice > num_candidates {
        return Err(Error::InvalidChoice {
            choice,
            candidates: num_candidates,
        });
    }
    let (ciphertexts, nonces): (Vec<Ciphertext>, Vec<BigInt>) = (1..=num_candidates)
        .map(|slot| Ciphertext::encrypt((slot == choice) as u64, params))
        .unzip();
    let nonces = BallotNonces(nonces);
    let ballot = EncryptedBallot::new(ciphertexts, nonces.commitment());
    return Ok((ballot, nonces));
}
