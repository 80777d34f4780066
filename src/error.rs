//! The error taxonomy shared by every layer of the crate
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid group element: {0}")]
    InvalidGroupElement(String),
    #[error("Insufficient shares: {supplied} supplied, {required} required")]
    InsufficientShares { required: usize, supplied: usize },
    #[error("Invalid decryption share from trustee {0}")]
    InvalidShare(u32),
    #[error("Election {election} cannot {action} while {status}")]
    InvalidStateTransition {
        election: String,
        status: String,
        action: &'static str,
    },
    #[error("Election {0} is not accepting votes at this time")]
    ElectionWindowViolation(String),
    #[error("Vote already submitted (duplicate nullifier)")]
    DuplicateNullifier,
    #[error("Election {0} does not exist")]
    ElectionNotFound(String),
    #[error("Election {0} already exists")]
    ElectionExists(String),
    #[error("Invalid nullifier {0}")]
    InvalidNullifier(String),
    #[error("Voter tree: {0}")]
    VoterTree(String),
    #[error("Vote not found")]
    VoteNotFound,
    #[error("Tally not found for election {0}")]
    TallyNotFound(String),
    #[error("Tally mismatch: {tallied} votes tallied, {recorded} recorded")]
    TallyMismatch { tallied: u64, recorded: u64 },
    #[error("Invalid vote counts: {0}")]
    InvalidVoteCounts(String),
    #[error("Choice {choice} is not one of {candidates} candidates")]
    InvalidChoice { choice: usize, candidates: usize },
    #[error("Malformed ballot: {0}")]
    MalformedBallot(String),
    #[error("Failed to decrypt: {0}")]
    DecryptionFailed(String),
    #[error("Proof rejected: {0}")]
    ProofRejected(&'static str),
    #[error("Commit abandoned after {0} conflicting attempts")]
    CommitConflict(usize),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
