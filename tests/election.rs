mod common;

use ballot_ledger::{
    cipher,
    config::LedgerConfig,
    eligibility::{derive_nullifier, VoterSecret},
    ledger::{
        bulletin,
        records::{ElectionStatus, EntryType},
    },
    tally, Error,
};
use common::{active_election, ELECTION};
use std::collections::BTreeMap;

fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_three_of_five_tally() {
    let fixture = active_election(3, LedgerConfig::default());
    for (voter, choice) in [("alice", 2), ("bob", 2), ("carol", 1)] {
        fixture.vote(voter, choice, 3).unwrap();
    }
    fixture.ledger.close_election(ELECTION).unwrap();
    fixture.ledger.begin_tally(ELECTION).unwrap();

    let group = fixture.params.get_group();
    let aggregate = tally::aggregate_election(&fixture.ledger, ELECTION).unwrap();
    let tally_shares = [0, 2, 4]
        .iter()
        .map(|&i| fixture.shares[i].decrypt_aggregate(&aggregate, group))
        .collect::<Vec<_>>();

    // two trustees are not enough
    assert!(matches!(
        tally::decrypt_tally(
            &aggregate,
            &tally_shares[..2],
            &fixture.params,
            &fixture.verification,
            1000
        ),
        Err(Error::InsufficientShares {
            required: 3,
            supplied: 2
        })
    ));

    let outcome = tally::decrypt_tally(
        &aggregate,
        &tally_shares,
        &fixture.params,
        &fixture.verification,
        1000,
    )
    .unwrap();
    assert_eq!(outcome.vote_counts, counts(&[("1", 1), ("2", 2), ("3", 0)]));

    let result = tally::publish_tally(&fixture.ledger, ELECTION, &outcome).unwrap();
    assert_eq!(result.total_votes, 3);
    assert_eq!(
        fixture.ledger.get_election(ELECTION).unwrap().status,
        ElectionStatus::Completed
    );

    let report = tally::audit_tally(&fixture.ledger, &fixture.verification, ELECTION).unwrap();
    assert!(report.passed(), "{report:?}");
    assert_eq!(report.recorded_votes, 3);
}

#[test]
fn test_audit_detects_substituted_aggregate() {
    let fixture = active_election(2, LedgerConfig::default());
    fixture.vote("alice", 1, 2).unwrap();
    fixture.vote("bob", 2, 2).unwrap();
    fixture.ledger.close_election(ELECTION).unwrap();

    // decrypt an aggregate that leaves out bob's ballot
    let group = fixture.params.get_group();
    let alice_only = vec![fixture.ledger.get_all_votes(ELECTION).unwrap()[0]
        .encrypted_vote
        .clone()];
    let partial = tally::aggregate(&alice_only, 2, group).unwrap();
    let tally_shares = fixture.shares[..3]
        .iter()
        .map(|share| share.decrypt_aggregate(&partial, group))
        .collect::<Vec<_>>();
    let mut outcome = tally::decrypt_tally(
        &partial,
        &tally_shares,
        &fixture.params,
        &fixture.verification,
        100,
    )
    .unwrap();
    // pad the counts so the totals agree with the ledger
    outcome.vote_counts.insert("2".to_string(), 1);
    tally::publish_tally(&fixture.ledger, ELECTION, &outcome).unwrap();

    let report = tally::audit_tally(&fixture.ledger, &fixture.verification, ELECTION).unwrap();
    assert!(!report.aggregate_matches);
    assert!(!report.decryption_matches);
    assert!(!report.passed());
}

#[test]
fn test_store_tally_result_totals() {
    let fixture = active_election(3, LedgerConfig::default());
    for (i, choice) in std::iter::repeat(1)
        .take(100)
        .chain(std::iter::repeat(2).take(75))
        .chain(std::iter::repeat(3).take(50))
        .enumerate()
    {
        fixture.vote(&format!("voter-{i}"), choice, 3).unwrap();
    }
    fixture.ledger.close_election(ELECTION).unwrap();

    let result = fixture
        .ledger
        .store_tally_result(
            ELECTION,
            &counts(&[("1", 100), ("2", 75), ("3", 50)]),
            "aggregate-hash",
            "decryption-proof",
        )
        .unwrap();
    assert_eq!(result.total_votes, 225);
    assert_eq!(
        fixture.ledger.get_election(ELECTION).unwrap().status,
        ElectionStatus::Completed
    );
    let board = fixture.ledger.get_bulletin_board(ELECTION).unwrap();
    assert_eq!(board.entries.len(), 2 + 225 + 2);
    assert_eq!(
        board.entries.last().map(|e| e.entry_type),
        Some(EntryType::TallyCompleted)
    );
}

#[test]
fn test_closed_election_refuses_ballots() {
    let fixture = active_election(3, LedgerConfig::default());
    fixture.vote("alice", 1, 3).unwrap();
    fixture.ledger.close_election(ELECTION).unwrap();
    let root = fixture.ledger.get_bulletin_board(ELECTION).unwrap().merkle_root;

    assert!(matches!(
        fixture.vote("bob", 2, 3),
        Err(Error::InvalidStateTransition { .. })
    ));
    assert_eq!(fixture.ledger.get_all_votes(ELECTION).unwrap().len(), 1);
    assert_eq!(
        fixture.ledger.get_bulletin_board(ELECTION).unwrap().merkle_root,
        root
    );
}

#[test]
fn test_bulletin_root_grows_with_the_board() {
    let fixture = active_election(2, LedgerConfig::default());
    let mut roots = vec![fixture.ledger.get_bulletin_board(ELECTION).unwrap().merkle_root];
    for voter in ["alice", "bob", "carol"] {
        fixture.vote(voter, 1, 2).unwrap();
        let board = fixture.ledger.get_bulletin_board(ELECTION).unwrap();
        assert_eq!(board.merkle_root, bulletin::merkle_root(&board.entries));
        roots.push(board.merkle_root);
    }
    assert!(roots.iter().all(Option::is_some));
    for (i, a) in roots.iter().enumerate() {
        for b in roots[i + 1..].iter() {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_out_of_group_ballot_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let fixture = active_election(2, LedgerConfig::default());
    let ballot: cipher::EncryptedBallot = serde_json::from_str(
        r#"{"ciphertexts":[{"c1":"0","c2":"1"},{"c1":"1","c2":"1"}],"randomnessCommitment":""}"#,
    )?;
    let nullifier = derive_nullifier(&VoterSecret::new("mallory"), ELECTION);
    assert!(matches!(
        fixture
            .ledger
            .cast_vote(ELECTION, &ballot, &nullifier, "e", "v"),
        Err(Error::InvalidGroupElement(_))
    ));
    assert!(fixture.ledger.get_all_votes(ELECTION)?.is_empty());
    Ok(())
}
