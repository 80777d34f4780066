//! The election ledger: lifecycle of every election, the vote store keyed by nullifier, the
//! bulletin board and the tally results.
//!
//! Every mutating operation runs as a [Transaction] against a [Store] and commits all of its
//! writes at once, so a vote record never exists without its index entry and bulletin entry,
//! and a status never changes without its payload. If a concurrent commit touched anything the
//! operation read, the whole operation is retried from scratch.
//!
//! ```text
//! pending --activate--> active --close--> closed --begin_tally--> tallying
//!                                            \                       |
//!                                             +---store_tally--------+--> completed
//! ```
pub mod bulletin;
pub mod records;
pub mod store;

use crate::{
    cipher::EncryptedBallot,
    config::LedgerConfig,
    eligibility::Nullifier,
    error::{Error, Result},
    hash,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use records::{
    BulletinBoard, BulletinBoardEntry, Election, ElectionRequest, ElectionStatus, EntryType,
    LedgerEvent, TallyResult, VoteReceipt, VoteRecord, VoteVerification,
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::RwLock};
use store::{MemoryStore, Record, Store, Transaction};

/// Source of transaction time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock(RwLock<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(RwLock::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receives [LedgerEvent]s once the write they describe has committed
pub trait LedgerListener: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}

pub struct Ledger<S: Store = MemoryStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: LedgerConfig,
    listeners: Vec<Box<dyn LedgerListener>>,
}

impl Ledger {
    pub fn in_memory(config: LedgerConfig) -> Result<Self> {
        Self::new(MemoryStore::new(), SystemClock, config)
    }
}

impl<S: Store, C: Clock> Ledger<S, C> {
    pub fn new(store: S, clock: C, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        return Ok(Self {
            store,
            clock,
            config,
            listeners: vec![],
        });
    }

    pub fn add_listener(&mut self, listener: Box<dyn LedgerListener>) {
        self.listeners.push(listener);
    }

    fn emit(&self, event: LedgerEvent) {
        for listener in self.listeners.iter() {
            listener.on_event(&event);
        }
    }

    pub fn get_config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn get_clock(&self) -> &C {
        &self.clock
    }

    /// Run `operation` in a fresh transaction until it commits without conflict. Errors raised by
    /// the operation abort immediately and nothing is written.
    fn execute<T>(
        &self,
        action: &'static str,
        operation: impl Fn(&mut Transaction) -> Result<T>,
    ) -> Result<T> {
        for attempt in 1..=self.config.max_commit_retries {
            let mut tx = Transaction::new(&self.store, self.clock.now());
            let output = operation(&mut tx)?;
            if tx.commit()? {
                return Ok(output);
            }
            debug!("{action}: commit conflict on attempt {attempt}, retrying");
        }
        warn!(
            "{action}: giving up after {} conflicting commits",
            self.config.max_commit_retries
        );
        return Err(Error::CommitConflict(self.config.max_commit_retries));
    }

    pub fn create_election(&self, request: ElectionRequest) -> Result<Election> {
        if request.num_candidates == 0 {
            return Err(Error::InvalidConfig("an election needs candidates".into()));
        }
        if request.end_time <= request.start_time {
            return Err(Error::InvalidConfig(format!(
                "election {} ends before it starts",
                request.id
            )));
        }
        let election = self.execute("create election", |tx| {
            if tx.get_election(&request.id)?.is_some() {
                return Err(Error::ElectionExists(request.id.clone()));
            }
            let election = Election {
                id: request.id.clone(),
                title: request.title.clone(),
                status: ElectionStatus::Pending,
                voter_merkle_root: request.voter_merkle_root.clone(),
                public_key: request.public_key.clone(),
                num_candidates: request.num_candidates,
                start_time: request.start_time,
                end_time: request.end_time,
                created_at: tx.timestamp(),
            };
            let digest = record_hash(&election)?;
            tx.put(Record::Election(election.clone()));
            append_entry(tx, &election.id, EntryType::ElectionCreated, digest)?;
            return Ok(election);
        })?;
        info!("created election {}", election.id);
        return Ok(election);
    }

    pub fn activate_election(&self, election_id: &str) -> Result<Election> {
        let election = self.transition(
            election_id,
            "activate",
            &[ElectionStatus::Pending],
            ElectionStatus::Active,
            EntryType::ElectionActivated,
        )?;
        info!("election {election_id} is active");
        return Ok(election);
    }

    pub fn close_election(&self, election_id: &str) -> Result<Election> {
        let election = self.transition(
            election_id,
            "close",
            &[ElectionStatus::Active],
            ElectionStatus::Closed,
            EntryType::ElectionClosed,
        )?;
        info!("election {election_id} is closed");
        return Ok(election);
    }

    pub fn begin_tally(&self, election_id: &str) -> Result<Election> {
        let election = self.transition(
            election_id,
            "begin tallying",
            &[ElectionStatus::Closed],
            ElectionStatus::Tallying,
            EntryType::TallyStarted,
        )?;
        info!("election {election_id} is tallying");
        return Ok(election);
    }

    /// A guarded status change with its bulletin entry
    fn transition(
        &self,
        election_id: &str,
        action: &'static str,
        from: &[ElectionStatus],
        to: ElectionStatus,
        entry_type: EntryType,
    ) -> Result<Election> {
        return self.execute(action, |tx| {
            let mut election = load_election(tx, election_id)?;
            if !from.contains(&election.status) {
                return Err(Error::InvalidStateTransition {
                    election: election_id.to_string(),
                    status: election.status.to_string(),
                    action,
                });
            }
            election.status = to;
            let digest = record_hash(&election)?;
            tx.put(Record::Election(election.clone()));
            append_entry(tx, election_id, entry_type, digest)?;
            return Ok(election);
        });
    }

    /// Record a ballot under its nullifier. Proofs must have been checked before this call; the
    /// ledger only keeps their digests.
    pub fn cast_vote(
        &self,
        election_id: &str,
        ballot: &EncryptedBallot,
        nullifier: &Nullifier,
        eligibility_proof_hash: &str,
        validity_proof_hash: &str,
    ) -> Result<VoteReceipt> {
        let outcome = self.execute("cast vote", |tx| {
            let election = load_election(tx, election_id)?;
            if election.status != ElectionStatus::Active {
                return Err(Error::InvalidStateTransition {
                    election: election_id.to_string(),
                    status: election.status.to_string(),
                    action: "accept votes",
                });
            }
            if !election.within_window(tx.timestamp()) {
                return Err(Error::ElectionWindowViolation(election_id.to_string()));
            }
            if tx.get_vote(election_id, nullifier)?.is_some() {
                return Err(Error::DuplicateNullifier);
            }
            ballot.check(election.num_candidates, election.public_key.get_group())?;

            let encrypted_vote_hash = ballot.content_hash();
            let vote = VoteRecord {
                election_id: election_id.to_string(),
                encrypted_vote: ballot.clone(),
                encrypted_vote_hash: encrypted_vote_hash.clone(),
                nullifier: *nullifier,
                eligibility_proof_hash: eligibility_proof_hash.to_string(),
                validity_proof_hash: validity_proof_hash.to_string(),
                timestamp: tx.timestamp(),
                tx_id: tx.id().to_string(),
            };
            tx.put(Record::Vote(vote));

            let mut nullifiers = tx.get_vote_index(election_id)?;
            nullifiers.push(*nullifier);
            tx.put(Record::VoteIndex {
                election_id: election_id.to_string(),
                nullifiers,
            });
            append_entry(tx, election_id, EntryType::VoteCast, encrypted_vote_hash.clone())?;

            return Ok(VoteReceipt {
                success: true,
                verification_code: bulletin::verification_code(
                    tx.id(),
                    &encrypted_vote_hash,
                    self.config.verification_code_bytes,
                ),
                encrypted_vote_hash,
                tx_id: tx.id().to_string(),
                timestamp: tx.timestamp(),
            });
        });
        match &outcome {
            Ok(receipt) => {
                info!("vote {} cast in {election_id}", receipt.tx_id);
                self.emit(LedgerEvent::VoteCast {
                    election_id: election_id.to_string(),
                    encrypted_vote_hash: receipt.encrypted_vote_hash.clone(),
                    tx_id: receipt.tx_id.clone(),
                });
            }
            Err(e) => warn!("vote rejected in {election_id}: {e}"),
        }
        return outcome;
    }

    /// Record an already decrypted tally. `vote_counts` is keyed by candidate number and must
    /// account for every recorded vote.
    pub fn store_tally_result(
        &self,
        election_id: &str,
        vote_counts: &BTreeMap<String, u64>,
        aggregated_hash: &str,
        decryption_proof: &str,
    ) -> Result<TallyResult> {
        let result = self.execute("store tally", |tx| {
            let mut election = load_election(tx, election_id)?;
            if !matches!(
                election.status,
                ElectionStatus::Closed | ElectionStatus::Tallying
            ) {
                return Err(Error::InvalidStateTransition {
                    election: election_id.to_string(),
                    status: election.status.to_string(),
                    action: "store a tally",
                });
            }
            check_candidates(vote_counts, election.num_candidates)?;

            let total_votes = vote_counts
                .values()
                .try_fold(0u64, |total, count| total.checked_add(*count))
                .ok_or_else(|| Error::InvalidVoteCounts("counts overflow a u64 total".into()))?;
            let recorded = tx.get_vote_index(election_id)?.len() as u64;
            if total_votes != recorded {
                return Err(Error::TallyMismatch {
                    tallied: total_votes,
                    recorded,
                });
            }

            let result = TallyResult {
                election_id: election_id.to_string(),
                vote_counts: vote_counts.clone(),
                total_votes,
                aggregated_hash: aggregated_hash.to_string(),
                decryption_proof: decryption_proof.to_string(),
                tally_timestamp: tx.timestamp(),
                tx_id: tx.id().to_string(),
            };
            let digest = record_hash(&result)?;
            tx.put(Record::Tally(result.clone()));
            election.status = ElectionStatus::Completed;
            tx.put(Record::Election(election));
            append_entry(tx, election_id, EntryType::TallyCompleted, digest)?;
            return Ok(result);
        })?;
        info!(
            "election {election_id} completed with {} votes",
            result.total_votes
        );
        self.emit(LedgerEvent::TallyCompleted {
            election_id: election_id.to_string(),
            total_votes: result.total_votes,
            tx_id: result.tx_id.clone(),
        });
        return Ok(result);
    }

    /// Run a read-only operation against the current state
    fn read<T>(&self, operation: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut tx = Transaction::new(&self.store, self.clock.now());
        return operation(&mut tx);
    }

    pub fn get_election(&self, election_id: &str) -> Result<Election> {
        self.read(|tx| load_election(tx, election_id))
    }

    pub fn get_vote(&self, election_id: &str, nullifier: &Nullifier) -> Result<VoteRecord> {
        self.read(|tx| tx.get_vote(election_id, nullifier)?.ok_or(Error::VoteNotFound))
    }

    /// Every vote of an election in the order it was cast
    pub fn get_all_votes(&self, election_id: &str) -> Result<Vec<VoteRecord>> {
        self.read(|tx| {
            load_election(tx, election_id)?;
            let mut votes = vec![];
            for nullifier in tx.get_vote_index(election_id)? {
                let vote = tx
                    .get_vote(election_id, &nullifier)?
                    .ok_or_else(|| Error::Storage(format!("index names missing vote {nullifier}")))?;
                votes.push(vote);
            }
            return Ok(votes);
        })
    }

    /// Whether the vote recorded under `nullifier` has the expected ballot hash
    pub fn verify_vote(
        &self,
        election_id: &str,
        nullifier: &Nullifier,
        expected_hash: &str,
    ) -> Result<VoteVerification> {
        let vote = match self.get_vote(election_id, nullifier) {
            Ok(vote) => vote,
            Err(Error::VoteNotFound) => {
                return Ok(VoteVerification {
                    verified: false,
                    tx_id: None,
                    timestamp: None,
                })
            }
            Err(e) => return Err(e),
        };
        return Ok(VoteVerification {
            verified: vote.encrypted_vote_hash == expected_hash,
            tx_id: Some(vote.tx_id),
            timestamp: Some(vote.timestamp),
        });
    }

    pub fn get_vote_by_hash(
        &self,
        election_id: &str,
        encrypted_vote_hash: &str,
    ) -> Result<Option<VoteRecord>> {
        let votes = self.get_all_votes(election_id)?;
        return Ok(votes
            .into_iter()
            .find(|vote| vote.encrypted_vote_hash == encrypted_vote_hash));
    }

    /// Recorded-as-cast check: the code must be the one derived from the receipt's txId and
    /// ballot hash, and that transaction must have recorded that ballot
    pub fn verify_receipt(&self, election_id: &str, receipt: &VoteReceipt) -> Result<bool> {
        let expected = bulletin::verification_code(
            &receipt.tx_id,
            &receipt.encrypted_vote_hash,
            self.config.verification_code_bytes,
        );
        if expected != receipt.verification_code {
            return Ok(false);
        }
        return Ok(self
            .get_vote_by_hash(election_id, &receipt.encrypted_vote_hash)?
            .is_some_and(|vote| vote.tx_id == receipt.tx_id));
    }

    pub fn get_bulletin_board(&self, election_id: &str) -> Result<BulletinBoard> {
        let entries = self.read(|tx| {
            load_election(tx, election_id)?;
            tx.get_bulletin_board(election_id)
        })?;
        let merkle_root = bulletin::merkle_root(&entries);
        return Ok(BulletinBoard {
            entries,
            merkle_root,
        });
    }

    pub fn get_tally_result(&self, election_id: &str) -> Result<TallyResult> {
        self.read(|tx| {
            load_election(tx, election_id)?;
            tx.get_tally(election_id)?
                .ok_or_else(|| Error::TallyNotFound(election_id.to_string()))
        })
    }
}

fn load_election(tx: &mut Transaction, election_id: &str) -> Result<Election> {
    tx.get_election(election_id)?
        .ok_or_else(|| Error::ElectionNotFound(election_id.to_string()))
}

/// Digest of a record's JSON encoding
fn record_hash(record: &impl Serialize) -> Result<String> {
    Ok(hash::digest_hex(&serde_json::to_vec(record)?))
}

fn append_entry(
    tx: &mut Transaction,
    election_id: &str,
    entry_type: EntryType,
    digest: String,
) -> Result<()> {
    let mut entries = tx.get_bulletin_board(election_id)?;
    entries.push(BulletinBoardEntry {
        sequence: entries.len() as u64 + 1,
        entry_type,
        hash: digest,
        tx_id: tx.id().to_string(),
        timestamp: tx.timestamp(),
    });
    tx.put(Record::BulletinBoard {
        election_id: election_id.to_string(),
        entries,
    });
    return Ok(());
}

/// Candidate keys must be the numbers 1 to n
fn check_candidates(vote_counts: &BTreeMap<String, u64>, num_candidates: usize) -> Result<()> {
    for key in vote_counts.keys() {
        let valid = key
            .parse::<usize>()
            .is_ok_and(|candidate| (1..=num_candidates).contains(&candidate));
        if !valid {
            return Err(Error::InvalidVoteCounts(format!(
                "{key:?} is not a candidate of {num_candidates}"
            )));
        }
    }
    return Ok(());
}
