//! The key-value substrate under the ledger.
//!
//! Keys and records are typed: every [Record] knows the [RecordKey] it lives under, so a record
//! can never be written to another record's slot. A [Store] only has to offer versioned reads and
//! an all-or-nothing conditional commit. A [Transaction] buffers writes and remembers the version
//! of every key it read; the commit succeeds only if none of those keys changed in the meantime.
use super::records::{BulletinBoardEntry, Election, TallyResult, VoteRecord};
use crate::{
    eligibility::Nullifier,
    error::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::RwLock,
};

/// Number of committed writes to a key; 0 for a key that was never written
pub type Version = u64;

#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Election(String),
    Vote {
        election_id: String,
        nullifier: Nullifier,
    },
    VoteIndex(String),
    BulletinBoard(String),
    Tally(String),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Election(id) => write!(f, "election:{id}"),
            Self::Vote {
                election_id,
                nullifier,
            } => write!(f, "vote:{election_id}:{nullifier}"),
            Self::VoteIndex(id) => write!(f, "voteindex:{id}"),
            Self::BulletinBoard(id) => write!(f, "bulletinboard:{id}"),
            Self::Tally(id) => write!(f, "tally:{id}"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Election(Election),
    Vote(VoteRecord),
    VoteIndex {
        election_id: String,
        nullifiers: Vec<Nullifier>,
    },
    BulletinBoard {
        election_id: String,
        entries: Vec<BulletinBoardEntry>,
    },
    Tally(TallyResult),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Election(election) => RecordKey::Election(election.id.clone()),
            Self::Vote(vote) => RecordKey::Vote {
                election_id: vote.election_id.clone(),
                nullifier: vote.nullifier,
            },
            Self::VoteIndex { election_id, .. } => RecordKey::VoteIndex(election_id.clone()),
            Self::BulletinBoard { election_id, .. } => {
                RecordKey::BulletinBoard(election_id.clone())
            }
            Self::Tally(result) => RecordKey::Tally(result.election_id.clone()),
        }
    }
}

pub trait Store: Send + Sync {
    /// The current record under `key` (if any) and its version
    fn get(&self, key: &RecordKey) -> Result<(Option<Record>, Version)>;

    /// Apply every write if and only if every key in `reads` is still at the recorded version.
    /// Return whether the writes were applied.
    fn commit(&self, reads: &HashMap<RecordKey, Version>, writes: Vec<Record>) -> Result<bool>;
}

/// A [Store] held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<RecordKey, (Record, Version)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<(Option<Record>, Version)> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        return Ok(match entries.get(key) {
            Some((record, version)) => (Some(record.clone()), *version),
            None => (None, 0),
        });
    }

    fn commit(&self, reads: &HashMap<RecordKey, Version>, writes: Vec<Record>) -> Result<bool> {
        // checks and writes happen under one write lock
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stale = reads.iter().any(|(key, version)| {
            let current = entries.get(key).map_or(0, |(_, v)| *v);
            current != *version
        });
        if stale {
            return Ok(false);
        }
        for record in writes {
            let key = record.key();
            let version = entries.get(&key).map_or(0, |(_, v)| *v) + 1;
            entries.insert(key, (record, version));
        }
        return Ok(true);
    }
}

/// One attempt at a ledger operation: a transaction id, a timestamp, the versions observed so
/// far and the writes to apply on commit
pub struct Transaction<'a> {
    store: &'a dyn Store,
    id: String,
    timestamp: DateTime<Utc>,
    reads: HashMap<RecordKey, Version>,
    writes: BTreeMap<RecordKey, Record>,
}

impl<'a> Transaction<'a> {
    pub fn new(store: &'a dyn Store, timestamp: DateTime<Utc>) -> Self {
        let mut id = [0u8; 32];
        OsRng.fill_bytes(&mut id);
        return Self {
            store,
            id: hex::encode(id),
            timestamp,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        };
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Read through the write buffer, remembering the version of the first read of every key
    pub fn get(&mut self, key: &RecordKey) -> Result<Option<Record>> {
        if let Some(record) = self.writes.get(key) {
            return Ok(Some(record.clone()));
        }
        let (record, version) = self.store.get(key)?;
        self.reads.entry(key.clone()).or_insert(version);
        return Ok(record);
    }

    pub fn put(&mut self, record: Record) {
        self.writes.insert(record.key(), record);
    }

    pub fn get_election(&mut self, id: &str) -> Result<Option<Election>> {
        let key = RecordKey::Election(id.to_string());
        return match self.get(&key)? {
            None => Ok(None),
            Some(Record::Election(election)) => Ok(Some(election)),
            Some(_) => Err(mismatch(&key)),
        };
    }

    pub fn get_vote(&mut self, election_id: &str, nullifier: &Nullifier) -> Result<Option<VoteRecord>> {
        let key = RecordKey::Vote {
            election_id: election_id.to_string(),
            nullifier: *nullifier,
        };
        return match self.get(&key)? {
            None => Ok(None),
            Some(Record::Vote(vote)) => Ok(Some(vote)),
            Some(_) => Err(mismatch(&key)),
        };
    }

    pub fn get_vote_index(&mut self, election_id: &str) -> Result<Vec<Nullifier>> {
        let key = RecordKey::VoteIndex(election_id.to_string());
        return match self.get(&key)? {
            None => Ok(vec![]),
            Some(Record::VoteIndex { nullifiers, .. }) => Ok(nullifiers),
            Some(_) => Err(mismatch(&key)),
        };
    }

    pub fn get_bulletin_board(&mut self, election_id: &str) -> Result<Vec<BulletinBoardEntry>> {
        let key = RecordKey::BulletinBoard(election_id.to_string());
        return match self.get(&key)? {
            None => Ok(vec![]),
            Some(Record::BulletinBoard { entries, .. }) => Ok(entries),
            Some(_) => Err(mismatch(&key)),
        };
    }

    pub fn get_tally(&mut self, election_id: &str) -> Result<Option<TallyResult>> {
        let key = RecordKey::Tally(election_id.to_string());
        return match self.get(&key)? {
            None => Ok(None),
            Some(Record::Tally(result)) => Ok(Some(result)),
            Some(_) => Err(mismatch(&key)),
        };
    }

    /// Apply the buffered writes. False means another commit touched something this transaction
    /// read, and nothing was written.
    pub fn commit(self) -> Result<bool> {
        if self.writes.is_empty() {
            return Ok(true);
        }
        return self
            .store
            .commit(&self.reads, self.writes.into_values().collect());
    }
}

fn mismatch(key: &RecordKey) -> Error {
    Error::Storage(format!("unexpected record kind under {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(election_id: &str, nullifiers: Vec<Nullifier>) -> Record {
        Record::VoteIndex {
            election_id: election_id.to_string(),
            nullifiers,
        }
    }

    fn nullifier(byte: u8) -> Nullifier {
        hex::encode([byte; 32]).parse().unwrap()
    }

    #[test]
    fn test_key_display() {
        let key = RecordKey::Vote {
            election_id: "e1".into(),
            nullifier: nullifier(0xab),
        };
        assert_eq!(key.to_string(), format!("vote:e1:{}", "ab".repeat(32)));
        assert_eq!(RecordKey::Tally("e1".into()).to_string(), "tally:e1");
    }

    #[test]
    fn test_read_your_writes() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new(&store, Utc::now());
        assert!(tx.get_vote_index("e").unwrap().is_empty());
        tx.put(index("e", vec![nullifier(1)]));
        assert_eq!(tx.get_vote_index("e").unwrap(), vec![nullifier(1)]);
        assert!(store.is_empty());
        assert!(tx.commit().unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&RecordKey::VoteIndex("e".into())).unwrap().1,
            1
        );
    }

    #[test]
    fn test_conflicting_commit() {
        let store = MemoryStore::new();
        let mut first = Transaction::new(&store, Utc::now());
        let mut second = Transaction::new(&store, Utc::now());
        first.get_vote_index("e").unwrap();
        second.get_vote_index("e").unwrap();
        first.put(index("e", vec![nullifier(1)]));
        second.put(index("e", vec![nullifier(2)]));
        assert!(first.commit().unwrap());
        assert!(!second.commit().unwrap());
        let (record, version) = store.get(&RecordKey::VoteIndex("e".into())).unwrap();
        assert_eq!(record, Some(index("e", vec![nullifier(1)])));
        assert_eq!(version, 1);
    }

    #[test]
    fn test_blind_write() {
        let store = MemoryStore::new();
        assert!(store.commit(&HashMap::new(), vec![index("e", vec![])]).unwrap());
        assert!(store.commit(&HashMap::new(), vec![index("e", vec![nullifier(3)])]).unwrap());
        let (record, version) = store.get(&RecordKey::VoteIndex("e".into())).unwrap();
        assert_eq!(record, Some(index("e", vec![nullifier(3)])));
        assert_eq!(version, 2);

        // a transaction that only reads commits trivially
        let mut tx = Transaction::new(&store, Utc::now());
        assert!(tx.get_bulletin_board("e").unwrap().is_empty());
        assert_eq!(tx.id().len(), 64);
        assert!(tx.commit().unwrap());
    }
}
