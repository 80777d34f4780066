#![allow(dead_code)]

use ballot_ledger::{
    arithmetics::Group,
    cipher,
    config::LedgerConfig,
    eligibility::{derive_nullifier, VoterSecret},
    keys::GroupParams,
    ledger::{records::ElectionRequest, records::VoteReceipt, Ledger},
    threshold::{self, KeyShare, VerificationData},
    Result, TEST_GROUP_BITS,
};
use chrono::{Duration, Utc};

pub const ELECTION: &str = "election-A";

pub struct Fixture {
    pub ledger: Ledger,
    pub params: GroupParams,
    pub verification: VerificationData,
    pub shares: Vec<KeyShare>,
}

/// An active election with a 3-of-5 trustee key, open from an hour ago to an hour from now
pub fn active_election(num_candidates: usize, config: LedgerConfig) -> Fixture {
    let group = Group::generate(TEST_GROUP_BITS).unwrap();
    let (params, verification, shares) = threshold::deal(&group, 3, 5).unwrap();
    let ledger = Ledger::in_memory(config).unwrap();
    let now = Utc::now();
    ledger
        .create_election(ElectionRequest {
            id: ELECTION.into(),
            title: "Integration".into(),
            voter_merkle_root: "root".into(),
            public_key: params.clone(),
            num_candidates,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
        })
        .unwrap();
    ledger.activate_election(ELECTION).unwrap();
    return Fixture {
        ledger,
        params,
        verification,
        shares,
    };
}

impl Fixture {
    pub fn vote(&self, voter: &str, choice: usize, num_candidates: usize) -> Result<VoteReceipt> {
        let (ballot, _) = cipher::encrypt_ballot(choice, num_candidates, &self.params)?;
        let nullifier = derive_nullifier(&VoterSecret::new(voter), ELECTION);
        self.ledger
            .cast_vote(ELECTION, &ballot, &nullifier, "eligibility", "validity")
    }
}
