//! The tally: multiply every recorded ballot slot-wise, have a quorum of trustees decrypt the
//! product, and publish the counts together with everything needed to check them.
//!
//! The published record binds the counts to the hash of the aggregate that was decrypted and to
//! the trustees' partial decryptions, so anyone holding the ledger can recompute the aggregate
//! from the recorded ballots and replay the decryption ([audit_tally]).
use crate::{
    arithmetics::Group,
    cipher::{Ciphertext, EncryptedBallot},
    error::{Error, Result},
    hash,
    keys::GroupParams,
    ledger::{records::TallyResult, store::Store, Clock, Ledger},
    threshold::{self, KeyShare, PartialDecryption, VerificationData},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The slot-wise product of a set of ballots; slot i encrypts the number of votes for candidate
/// i + 1
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AggregateBallot {
    ciphertexts: Vec<Ciphertext>,
}

impl AggregateBallot {
    pub fn get_ciphertexts(&self) -> &[Ciphertext] {
        &self.ciphertexts
    }

    pub fn hash(&self) -> String {
        let decimals = self
            .ciphertexts
            .iter()
            .flat_map(|ct| [ct.get_c1().to_str_radix(10), ct.get_c2().to_str_radix(10)])
            .collect::<Vec<String>>();
        let parts = decimals
            .iter()
            .map(|s| s.as_bytes())
            .collect::<Vec<&[u8]>>();
        return hash::digest_parts(&parts);
    }
}

/// Multiply `ballots` slot by slot. With no ballots every slot is the identity (1, 1), an
/// encryption of 0.
pub fn aggregate(
    ballots: &[EncryptedBallot],
    num_candidates: usize,
    group: &Group,
) -> Result<AggregateBallot> {
    let mut ciphertexts = vec![Ciphertext::identity(); num_candidates];
    for ballot in ballots.iter() {
        if ballot.num_candidates() != num_candidates {
            return Err(Error::MalformedBallot(format!(
                "{}-slot ballot in a {num_candidates}-candidate tally",
                ballot.num_candidates()
            )));
        }
        for (sum, ciphertext) in ciphertexts.iter_mut().zip(ballot.get_ciphertexts()) {
            *sum = sum.add(ciphertext, group);
        }
    }
    debug!("aggregated {} ballots", ballots.len());
    return Ok(AggregateBallot { ciphertexts });
}

pub fn aggregate_hash(aggregate: &AggregateBallot) -> String {
    aggregate.hash()
}

/// The aggregate of every ballot recorded for an election
pub fn aggregate_election<S: Store, C: Clock>(
    ledger: &Ledger<S, C>,
    election_id: &str,
) -> Result<AggregateBallot> {
    let election = ledger.get_election(election_id)?;
    let ballots = ledger
        .get_all_votes(election_id)?
        .into_iter()
        .map(|vote| vote.encrypted_vote)
        .collect::<Vec<EncryptedBallot>>();
    return aggregate(
        &ballots,
        election.num_candidates,
        election.public_key.get_group(),
    );
}

/// One trustee's partial decryption of every slot of an aggregate
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TrusteeTallyShare {
    index: u32,
    partials: Vec<PartialDecryption>,
}

impl TrusteeTallyShare {
    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn get_partials(&self) -> &[PartialDecryption] {
        &self.partials
    }
}

impl KeyShare {
    pub fn decrypt_aggregate(&self, aggregate: &AggregateBallot, group: &Group) -> TrusteeTallyShare {
        let partials = aggregate
            .ciphertexts
            .iter()
            .map(|ciphertext| self.partial_decrypt(ciphertext, group))
            .collect();
        return TrusteeTallyShare {
            index: self.get_index(),
            partials,
        };
    }
}

/// What was decrypted and by whom; published as the tally's decryption proof
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DecryptionTranscript {
    pub aggregate: AggregateBallot,
    pub shares: Vec<TrusteeTallyShare>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyOutcome {
    pub vote_counts: BTreeMap<String, u64>,
    pub aggregated_hash: String,
    /// JSON encoded [DecryptionTranscript]
    pub transcript: String,
}

/// Decrypt every slot of `aggregate` from the trustees' shares
pub fn decrypt_tally(
    aggregate: &AggregateBallot,
    shares: &[TrusteeTallyShare],
    params: &GroupParams,
    verification: &VerificationData,
    bound: u64,
) -> Result<TallyOutcome> {
    if shares.len() < verification.get_threshold() {
        return Err(Error::InsufficientShares {
            required: verification.get_threshold(),
            supplied: shares.len(),
        });
    }
    let mut vote_counts = BTreeMap::new();
    for (slot, ciphertext) in aggregate.ciphertexts.iter().enumerate() {
        let mut partials = Vec::with_capacity(shares.len());
        for share in shares.iter() {
            let partial = share.partials.get(slot).filter(|p| p.get_index() == share.index);
            match partial {
                Some(partial) => partials.push(partial.clone()),
                None => {
                    warn!("trustee {} sent an incomplete tally share", share.index);
                    return Err(Error::InvalidShare(share.index));
                }
            }
        }
        let count = threshold::threshold_decrypt(ciphertext, &partials, params, verification, bound)?;
        vote_counts.insert((slot + 1).to_string(), count);
    }

    let transcript = DecryptionTranscript {
        aggregate: aggregate.clone(),
        shares: shares.to_vec(),
    };
    return Ok(TallyOutcome {
        vote_counts,
        aggregated_hash: aggregate.hash(),
        transcript: serde_json::to_string(&transcript)?,
    });
}

pub fn publish_tally<S: Store, C: Clock>(
    ledger: &Ledger<S, C>,
    election_id: &str,
    outcome: &TallyOutcome,
) -> Result<TallyResult> {
    ledger.store_tally_result(
        election_id,
        &outcome.vote_counts,
        &outcome.aggregated_hash,
        &outcome.transcript,
    )
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub election_id: String,
    pub recorded_votes: u64,
    pub tallied_votes: u64,
    /// The published aggregate hash is the hash of the product of the recorded ballots
    pub aggregate_matches: bool,
    /// Replaying the published partial decryptions against that product gives the published
    /// counts
    pub decryption_matches: bool,
}

impl AuditReport {
    pub fn passed(&self) -> bool {
        self.aggregate_matches && self.decryption_matches && self.recorded_votes == self.tallied_votes
    }
}

/// Tallied-as-recorded check of a completed election
pub fn audit_tally<S: Store, C: Clock>(
    ledger: &Ledger<S, C>,
    verification: &VerificationData,
    election_id: &str,
) -> Result<AuditReport> {
    let election = ledger.get_election(election_id)?;
    let result = ledger.get_tally_result(election_id)?;
    let recorded_votes = ledger.get_all_votes(election_id)?.len() as u64;
    let recomputed = aggregate_election(ledger, election_id)?;
    let aggregate_matches = recomputed.hash() == result.aggregated_hash;

    let decryption_matches = match serde_json::from_str::<DecryptionTranscript>(&result.decryption_proof) {
        Ok(transcript) => {
            let replayed = decrypt_tally(
                &recomputed,
                &transcript.shares,
                &election.public_key,
                verification,
                ledger.get_config().max_tally,
            );
            transcript.aggregate == recomputed
                && replayed.is_ok_and(|outcome| outcome.vote_counts == result.vote_counts)
        }
        Err(e) => {
            warn!("unreadable decryption transcript for {election_id}: {e}");
            false
        }
    };

    let report = AuditReport {
        election_id: election_id.to_string(),
        recorded_votes,
        tallied_votes: result.total_votes,
        aggregate_matches,
        decryption_matches,
    };
    if report.passed() {
        info!("tally of {election_id} audited");
    } else {
        warn!("tally of {election_id} failed audit: {report:?}");
    }
    return Ok(report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cipher::encrypt_ballot, threshold::deal};

    #[test]
    fn test_empty_aggregate() {
        let group = Group::generate(64).unwrap();
        let empty = aggregate(&[], 3, &group).unwrap();
        assert_eq!(empty.get_ciphertexts(), &vec![Ciphertext::identity(); 3][..]);
        assert_eq!(aggregate_hash(&empty), empty.hash());
    }

    #[test]
    fn test_decrypt_tally() {
        let (params, verification, shares) = deal(&Group::generate(64).unwrap(), 3, 5).unwrap();
        let group = params.get_group();
        let ballots = [2, 2, 1]
            .iter()
            .map(|&choice| encrypt_ballot(choice, 3, &params).unwrap().0)
            .collect::<Vec<_>>();
        let sum = aggregate(&ballots, 3, group).unwrap();
        let tally_shares = shares[1..4]
            .iter()
            .map(|share| share.decrypt_aggregate(&sum, group))
            .collect::<Vec<_>>();

        let outcome = decrypt_tally(&sum, &tally_shares, &params, &verification, 100).unwrap();
        let expected = BTreeMap::from([
            ("1".to_string(), 1),
            ("2".to_string(), 2),
            ("3".to_string(), 0),
        ]);
        assert_eq!(outcome.vote_counts, expected);
        assert_eq!(outcome.aggregated_hash, sum.hash());
        let transcript: DecryptionTranscript = serde_json::from_str(&outcome.transcript).unwrap();
        assert_eq!(transcript.aggregate, sum);
        assert_eq!(transcript.shares.len(), 3);

        assert!(matches!(
            decrypt_tally(&sum, &tally_shares[..2], &params, &verification, 100),
            Err(Error::InsufficientShares { required: 3, supplied: 2 })
        ));
    }

    #[test]
    fn test_incomplete_share() {
        let (params, verification, shares) = deal(&Group::generate(64).unwrap(), 2, 3).unwrap();
        let group = params.get_group();
        let (ballot, _) = encrypt_ballot(1, 2, &params).unwrap();
        let sum = aggregate(&[ballot], 2, group).unwrap();
        let mut tally_shares = shares[..2]
            .iter()
            .map(|share| share.decrypt_aggregate(&sum, group))
            .collect::<Vec<_>>();
        tally_shares[1].partials.pop();
        assert!(matches!(
            decrypt_tally(&sum, &tally_shares, &params, &verification, 10),
            Err(Error::InvalidShare(2))
        ));
    }

    #[test]
    fn test_mismatched_ballot() {
        let (params, _, _) = deal(&Group::generate(64).unwrap(), 2, 3).unwrap();
        let (ballot, _) = encrypt_ballot(1, 2, &params).unwrap();
        assert!(matches!(
            aggregate(&[ballot], 3, params.get_group()),
            Err(Error::MalformedBallot(_))
        ));
    }
}
