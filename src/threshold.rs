//! k-of-n threshold decryption.
//!
//! A dealer samples a random polynomial f of degree k - 1 over Z_q. The election secret is
//! x = f(0) and trustee i receives s_i = f(i). Publishing C_j = g ** a_j for every coefficient lets
//! anyone compute trustee i's verification key g ** s_i = prod(C_j ** (i ** j)) without learning
//! s_i (Feldman's scheme).
//!
//! To decrypt (c1, c2), each trustee publishes d_i = c1 ** s_i together with a proof that
//! log_g(g ** s_i) = log_c1(d_i). Any k valid d_i combine to c1 ** x = prod(d_i ** lambda_i),
//! where lambda_i are the Lagrange coefficients at zero.
use crate::{
    arithmetics::Group,
    cipher::Ciphertext,
    error::{Error, Result},
    keys::GroupParams,
    proofs::dleq,
    BigInt,
};
use log::{debug, warn};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

/// A polynomial over Z_q; coefficients[i] is the coefficient of x ** i
struct Polynomial {
    coefficients: Vec<BigInt>,
}

impl Polynomial {
    fn random(number_of_coefficients: usize, group: &Group) -> Self {
        let coefficients = (0..number_of_coefficients)
            .map(|_| group.random_exponent())
            .collect();
        return Self { coefficients };
    }

    /// Horner's method
    fn evaluate_at(&self, x: &BigInt, group: &Group) -> BigInt {
        return self
            .coefficients
            .iter()
            .rev()
            .fold(BigInt::zero(), |acc, coefficient| {
                group.add_exp(&group.mul_exp(&acc, x), coefficient)
            });
    }
}

/// The public half of a dealing: Feldman commitments to every coefficient
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct VerificationData {
    threshold: usize,
    total: usize,
    #[serde(with = "crate::serialize::biguint_vec")]
    commitments: Vec<BigInt>,
}

impl VerificationData {
    pub fn get_threshold(&self) -> usize {
        self.threshold
    }

    pub fn get_total(&self) -> usize {
        self.total
    }

    pub fn get_commitments(&self) -> &[BigInt] {
        &self.commitments
    }

    /// g ** s_i, computed from the commitments alone
    pub fn verification_point(&self, index: u32, group: &Group) -> BigInt {
        let i = BigInt::from(index);
        let mut power = BigInt::one();
        let mut point = BigInt::one();
        for commitment in self.commitments.iter() {
            point = group.mul(&point, &group.pow(commitment, &power));
            power = group.mul_exp(&power, &i);
        }
        return point;
    }

    /// The data must describe a k-of-n dealing whose secret is the key behind `params`
    pub fn check(&self, params: &GroupParams) -> Result<()> {
        if self.threshold == 0 || self.threshold > self.total {
            return Err(Error::InvalidConfig(format!(
                "threshold {} of {}",
                self.threshold, self.total
            )));
        }
        if self.commitments.len() != self.threshold {
            return Err(Error::InvalidConfig(format!(
                "{} commitments for threshold {}",
                self.commitments.len(),
                self.threshold
            )));
        }
        if self.commitments.first() != Some(params.get_h()) {
            return Err(Error::InvalidConfig(
                "verification data belongs to another key".into(),
            ));
        }
        for commitment in self.commitments.iter() {
            params.get_group().check_element(commitment)?;
        }
        return Ok(());
    }
}

/// Trustee i's share s_i = f(i)
#[derive(Clone, Eq, PartialEq)]
pub struct KeyShare {
    index: u32,
    secret: BigInt,
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyShare({}, ..)", self.index)
    }
}

impl KeyShare {
    pub fn new(index: u32, secret: BigInt) -> Self {
        Self { index, secret }
    }

    pub fn get_index(&self) -> u32 {
        self.index
    }

    /// g ** s_i must match the point the commitments predict
    pub fn is_consistent(&self, verification: &VerificationData, group: &Group) -> bool {
        return group.g_pow(&self.secret) == verification.verification_point(self.index, group);
    }

    pub fn partial_decrypt(&self, ciphertext: &Ciphertext, group: &Group) -> PartialDecryption {
        let value = group.pow(ciphertext.get_c1(), &self.secret);
        let proof = dleq::Proof::from_statement(group, ciphertext.get_c1(), &self.secret);
        return PartialDecryption {
            index: self.index,
            value,
            proof,
        };
    }
}

/// d_i = c1 ** s_i with its proof of correctness
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PartialDecryption {
    index: u32,
    #[serde(with = "crate::serialize::biguint")]
    value: BigInt,
    proof: dleq::Proof,
}

impl PartialDecryption {
    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn get_value(&self) -> &BigInt {
        &self.value
    }

    pub fn verify(
        &self,
        ciphertext: &Ciphertext,
        verification: &VerificationData,
        group: &Group,
    ) -> bool {
        if self.index == 0 || self.index as usize > verification.total {
            return false;
        }
        let public = verification.verification_point(self.index, group);
        return self
            .proof
            .verify(group, &public, ciphertext.get_c1(), &self.value);
    }
}

/// Split a fresh election secret among `total` trustees so that any `threshold` of them can
/// decrypt
pub fn deal(
    group: &Group,
    threshold: usize,
    total: usize,
) -> Result<(GroupParams, VerificationData, Vec<KeyShare>)> {
    if threshold == 0 || threshold > total {
        return Err(Error::InvalidConfig(format!(
            "threshold {threshold} of {total}"
        )));
    }
    // indices must be distinct and non-zero mod q
    if u32::try_from(total).is_err() || &BigInt::from(total) >= group.get_q() {
        return Err(Error::InvalidConfig(format!(
            "{total} shares do not fit the group"
        )));
    }

    let polynomial = Polynomial::random(threshold, group);
    let commitments = polynomial
        .coefficients
        .iter()
        .map(|a| group.g_pow(a))
        .collect::<Vec<BigInt>>();
    let params = GroupParams::new(group, commitments[0].clone())?;
    let shares = (1..=total as u32)
        .map(|i| KeyShare::new(i, polynomial.evaluate_at(&BigInt::from(i), group)))
        .collect();
    let verification = VerificationData {
        threshold,
        total,
        commitments,
    };
    debug!("dealt {threshold}-of-{total} key shares");
    return Ok((params, verification, shares));
}

/// lambda_i = prod_{j != i} x_j / (x_j - x_i) (mod q)
pub fn lagrange_coefficients_at_zero(indices: &[u32], group: &Group) -> Result<Vec<BigInt>> {
    let mut coefficients = Vec::with_capacity(indices.len());
    for (i, x_i) in indices.iter().enumerate() {
        let x_i = BigInt::from(*x_i);
        let mut numerator = BigInt::one();
        let mut denominator = BigInt::one();
        for (j, x_j) in indices.iter().enumerate().filter(|(j, _)| *j != i) {
            let x_j = BigInt::from(*x_j);
            numerator = group.mul_exp(&numerator, &x_j);
            denominator = group.mul_exp(&denominator, &group.sub_exp(&x_j, &x_i));
            if denominator.is_zero() {
                return Err(Error::InvalidShare(indices[j]));
            }
        }
        let inverse = group
            .inv_exp(&denominator)
            .ok_or(Error::InvalidShare(indices[i]))?;
        coefficients.push(group.mul_exp(&numerator, &inverse));
    }
    return Ok(coefficients);
}

/// Recover the plaintext of `ciphertext` from at least `threshold` partial decryptions.
///
/// Too few partials is rejected before any of them is looked at. Otherwise every partial must
/// carry a known, unique index and a valid proof; the first `threshold` of them are combined.
pub fn threshold_decrypt(
    ciphertext: &Ciphertext,
    partials: &[PartialDecryption],
    params: &GroupParams,
    verification: &VerificationData,
    bound: u64,
) -> Result<u64> {
    if partials.len() < verification.threshold {
        return Err(Error::InsufficientShares {
            required: verification.threshold,
            supplied: partials.len(),
        });
    }
    verification.check(params)?;
    let group = params.get_group();

    let mut seen = HashSet::new();
    for partial in partials.iter() {
        if !seen.insert(partial.index) || !partial.verify(ciphertext, verification, group) {
            warn!("rejected partial decryption from trustee {}", partial.index);
            return Err(Error::InvalidShare(partial.index));
        }
    }

    let chosen = &partials[..verification.threshold];
    let indices = chosen.iter().map(|p| p.index).collect::<Vec<u32>>();
    let lambdas = lagrange_coefficients_at_zero(&indices, group)?;
    let mask = chosen
        .iter()
        .zip(lambdas.iter())
        .fold(BigInt::one(), |acc, (partial, lambda)| {
            group.mul(&acc, &group.pow(&partial.value, lambda))
        });
    let g_m = group.div(ciphertext.get_c2(), &mask);
    debug!("combined partial decryptions from trustees {indices:?}");

    return group
        .discrete_log(&g_m, bound)
        .ok_or_else(|| Error::DecryptionFailed(format!("plaintext exceeds {bound}")));
}
