//! The contract with the external zero-knowledge proving system.
//!
//! An eligibility proof shows that the submitted nullifier was derived from the secret behind
//! some voter commitment under the election's voter root. A validity proof shows that a ballot is
//! a one-hot encryption under the election key. Neither proof is interpreted here: a verifier
//! returns a boolean, and the ledger stores only a digest of each proof.
use crate::{
    cipher::EncryptedBallot,
    eligibility::Nullifier,
    error::{Error, Result},
    hash,
    ledger::records::Election,
};
use log::warn;
use serde::{Deserialize, Serialize};

/// Public inputs of the eligibility circuit
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityInputs {
    pub merkle_root: String,
    pub nullifier: Nullifier,
    pub election_id: String,
}

/// Public inputs of the ballot validity circuit
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityInputs {
    pub randomness_commitment: String,
    pub public_key_hash: String,
    pub num_candidates: usize,
}

pub trait EligibilityVerifier {
    fn verify_eligibility(&self, inputs: &EligibilityInputs, proof: &[u8]) -> bool;
}

pub trait ValidityVerifier {
    fn verify_validity(&self, inputs: &ValidityInputs, proof: &[u8]) -> bool;
}

/// Accepts nothing. Stands in until a real proving system is plugged in, so that no fabricated
/// proof can reach the ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingVerifier;

impl EligibilityVerifier for RejectingVerifier {
    fn verify_eligibility(&self, _inputs: &EligibilityInputs, _proof: &[u8]) -> bool {
        false
    }
}

impl ValidityVerifier for RejectingVerifier {
    fn verify_validity(&self, _inputs: &ValidityInputs, _proof: &[u8]) -> bool {
        false
    }
}

/// A ballot as it arrives from a voter, proofs attached
#[derive(Debug, Clone)]
pub struct Submission {
    pub ballot: EncryptedBallot,
    pub nullifier: Nullifier,
    pub eligibility_proof: Vec<u8>,
    pub validity_proof: Vec<u8>,
}

/// Digests of the two proofs, as stored in the vote record
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProofDigests {
    pub eligibility: String,
    pub validity: String,
}

impl Submission {
    pub fn eligibility_inputs(&self, election: &Election) -> EligibilityInputs {
        EligibilityInputs {
            merkle_root: election.voter_merkle_root.clone(),
            nullifier: self.nullifier,
            election_id: election.id.clone(),
        }
    }

    pub fn validity_inputs(&self, election: &Election) -> ValidityInputs {
        ValidityInputs {
            randomness_commitment: self.ballot.get_randomness_commitment().to_string(),
            public_key_hash: election.public_key.fingerprint(),
            num_candidates: election.num_candidates,
        }
    }
}

/// Run both verifiers against the election's public inputs before the ballot goes anywhere near
/// the ledger
pub fn check_submission(
    submission: &Submission,
    election: &Election,
    eligibility: &dyn EligibilityVerifier,
    validity: &dyn ValidityVerifier,
) -> Result<ProofDigests> {
    if !eligibility.verify_eligibility(
        &submission.eligibility_inputs(election),
        &submission.eligibility_proof,
    ) {
        warn!("eligibility proof rejected for {}", election.id);
        return Err(Error::ProofRejected("eligibility"));
    }
    if !validity.verify_validity(
        &submission.validity_inputs(election),
        &submission.validity_proof,
    ) {
        warn!("validity proof rejected for {}", election.id);
        return Err(Error::ProofRejected("validity"));
    }
    return Ok(ProofDigests {
        eligibility: hash::digest_hex(&submission.eligibility_proof),
        validity: hash::digest_hex(&submission.validity_proof),
    });
}
