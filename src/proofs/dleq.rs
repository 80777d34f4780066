//! Non-interactive Chaum-Pedersen proof of discrete log equality.
//!
//! The statement is a pair of bases (g, b) and a pair of values (y = g ** s, z = b ** s). The
//! prover convinces the verifier that both values share the exponent s without revealing it. In
//! this crate the first pair is a trustee's verification key and the second is the trustee's
//! partial decryption of some c1.
//!
//! The commit is (g ** t, b ** t) for a fresh t. The challenge is derived by hashing the statement
//! and the commit (Fiat-Shamir), and the response is t + c * s (mod q).
use crate::{arithmetics::Group, hash, BigInt};
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "crate::serialize::biguint")]
    commit_g: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    commit_base: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    challenge: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    response: BigInt,
}

impl Proof {
    /// Prove that log_g(g ** secret) = log_base(base ** secret)
    pub fn from_statement(group: &Group, base: &BigInt, secret: &BigInt) -> Self {
        let public = group.g_pow(secret);
        let value = group.pow(base, secret);
        let t = group.random_exponent();
        let commit_g = group.g_pow(&t);
        let commit_base = group.pow(base, &t);
        let challenge = Self::generate_challenge(
            group,
            [&public, base, &value, &commit_g, &commit_base],
        );
        let response = group.add_exp(&t, &group.mul_exp(&challenge, secret));

        return Self {
            commit_g,
            commit_base,
            challenge,
            response,
        };
    }

    fn generate_challenge(group: &Group, transcript: [&BigInt; 5]) -> BigInt {
        let decimals = [group.get_p(), group.get_g()]
            .into_iter()
            .chain(transcript)
            .map(|x| x.to_str_radix(10))
            .collect::<Vec<String>>();
        let parts = decimals
            .iter()
            .map(|s| s.as_bytes())
            .collect::<Vec<&[u8]>>();
        let digest = hash::framed::<Sha3_256>(&parts);
        return BigInt::from_bytes_be(&digest) % group.get_q();
    }

    /// Check the proof against public = g ** s and value = base ** s
    pub fn verify(&self, group: &Group, public: &BigInt, base: &BigInt, value: &BigInt) -> bool {
        let elements = [public, base, value, &self.commit_g, &self.commit_base];
        if elements.iter().any(|x| group.check_element(x).is_err()) {
            return false;
        }
        let challenge = Self::generate_challenge(group, elements);
        if challenge != self.challenge {
            return false;
        }

        let lhs_g = group.g_pow(&self.response);
        let rhs_g = group.mul(&self.commit_g, &group.pow(public, &challenge));
        let lhs_base = group.pow(base, &self.response);
        let rhs_base = group.mul(&self.commit_base, &group.pow(value, &challenge));
        return lhs_g == rhs_g && lhs_base == rhs_base;
    }
}
