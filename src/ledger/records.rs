//! Persisted record formats. Field names are stable across implementations, so every record is
//! serialized with camelCase names.
use crate::{cipher::EncryptedBallot, eligibility::Nullifier, keys::GroupParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Pending,
    Active,
    Closed,
    Tallying,
    Completed,
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Tallying => "tallying",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub id: String,
    pub title: String,
    pub status: ElectionStatus,
    pub voter_merkle_root: String,
    pub public_key: GroupParams,
    pub num_candidates: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Both ends of the voting window are inclusive
    pub fn within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Everything an administrator supplies to create an election
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRequest {
    pub id: String,
    pub title: String,
    pub voter_merkle_root: String,
    pub public_key: GroupParams,
    pub num_candidates: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub election_id: String,
    pub encrypted_vote: EncryptedBallot,
    pub encrypted_vote_hash: String,
    pub nullifier: Nullifier,
    pub eligibility_proof_hash: String,
    pub validity_proof_hash: String,
    pub timestamp: DateTime<Utc>,
    pub tx_id: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub success: bool,
    pub verification_code: String,
    pub encrypted_vote_hash: String,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    ElectionCreated,
    ElectionActivated,
    VoteCast,
    ElectionClosed,
    TallyStarted,
    TallyCompleted,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinBoardEntry {
    /// Starts at 1
    pub sequence: u64,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub hash: String,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinBoard {
    pub entries: Vec<BulletinBoardEntry>,
    /// None while the board is empty
    pub merkle_root: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResult {
    pub election_id: String,
    /// Keyed by candidate number, "1" to "n"
    pub vote_counts: BTreeMap<String, u64>,
    pub total_votes: u64,
    pub aggregated_hash: String,
    pub decryption_proof: String,
    pub tally_timestamp: DateTime<Utc>,
    pub tx_id: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Published after a successful commit, for listeners outside the ledger (indexers, notifiers,
/// anything that later attaches a confirmation depth)
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    VoteCast {
        election_id: String,
        encrypted_vote_hash: String,
        tx_id: String,
    },
    TallyCompleted {
        election_id: String,
        total_votes: u64,
        tx_id: String,
    },
}
