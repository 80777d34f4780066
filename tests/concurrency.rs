mod common;

use ballot_ledger::{cipher, config::LedgerConfig, eligibility, Error};
use common::{active_election, ELECTION};
use std::thread;

#[test]
fn test_racing_duplicate_votes() {
    let fixture = active_election(2, LedgerConfig::default());
    let nullifier = eligibility::derive_nullifier(&eligibility::VoterSecret::new("mallory"), ELECTION);
    let ballots = (0..8)
        .map(|i| cipher::encrypt_ballot(i % 2 + 1, 2, &fixture.params).unwrap().0)
        .collect::<Vec<_>>();

    let outcomes = thread::scope(|s| {
        let handles = ballots
            .iter()
            .map(|ballot| {
                let ledger = &fixture.ledger;
                let nullifier = &nullifier;
                s.spawn(move || ledger.cast_vote(ELECTION, ballot, nullifier, "e", "v"))
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|e| matches!(e, Error::DuplicateNullifier)));
    assert_eq!(fixture.ledger.get_all_votes(ELECTION).unwrap().len(), 1);
    // election_created, election_activated and the single vote
    assert_eq!(fixture.ledger.get_bulletin_board(ELECTION).unwrap().entries.len(), 3);
}

#[test]
fn test_parallel_distinct_voters() {
    let config = LedgerConfig {
        max_commit_retries: 1000,
        ..LedgerConfig::default()
    };
    let fixture = active_election(3, config);

    let receipts = thread::scope(|s| {
        let handles = (0..8)
            .map(|worker| {
                let fixture = &fixture;
                s.spawn(move || {
                    (0..5)
                        .map(|i| fixture.vote(&format!("voter-{worker}-{i}"), i % 3 + 1, 3))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(receipts.len(), 40);
    for receipt in receipts.iter() {
        let receipt = receipt.as_ref().unwrap();
        assert!(fixture.ledger.verify_receipt(ELECTION, receipt).unwrap());
    }
    assert_eq!(fixture.ledger.get_all_votes(ELECTION).unwrap().len(), 40);

    let board = fixture.ledger.get_bulletin_board(ELECTION).unwrap();
    assert_eq!(board.entries.len(), 42);
    for (i, entry) in board.entries.iter().enumerate() {
        assert_eq!(entry.sequence, i as u64 + 1);
    }
}
