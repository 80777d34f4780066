//! A sample election procedure: deal trustee keys, register voters, cast encrypted ballots,
//! tally with a quorum of trustees and audit the published result.
use anyhow::{bail, Context, Result};
use ballot_ledger::{
    arithmetics::Group,
    cipher,
    config::LedgerConfig,
    eligibility::{self, MembershipStatement, VoterSecret, VoterTree},
    ledger::{records::ElectionRequest, Ledger},
    proofs::external::{
        check_submission, EligibilityInputs, EligibilityVerifier, Submission, ValidityInputs,
        ValidityVerifier,
    },
    tally, threshold, TEST_GROUP_BITS,
};
use chrono::{Duration, Utc};
use clap::Parser;
use log::{info, warn, LevelFilter};
use rand::Rng;
use std::path::PathBuf;

const ELECTION_ID: &str = "demo-election";

#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON ledger configuration; defaults apply to every field it leaves out
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    voters: usize,

    #[arg(long, default_value_t = 3)]
    candidates: usize,

    /// Bit length of a freshly generated group
    #[arg(long, default_value_t = TEST_GROUP_BITS)]
    bits: usize,

    /// Use the 1536-bit RFC 3526 group instead of generating one
    #[arg(long, default_value_t = false)]
    standard_group: bool,

    /// Check that the group modulus is a safe prime before using it
    #[arg(long, default_value_t = false)]
    verify_group: bool,

    /// Repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, refines the level chosen with -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .context("installing the logger")?;
    return Ok(());
}

/// Checks membership openly: the "proof" is the membership statement itself. This reveals the
/// voter's leaf, so it only stands in for a zero-knowledge verifier in this demo.
struct OpenMembershipVerifier;

impl EligibilityVerifier for OpenMembershipVerifier {
    fn verify_eligibility(&self, inputs: &EligibilityInputs, proof: &[u8]) -> bool {
        serde_json::from_slice::<MembershipStatement>(proof).is_ok_and(|statement| {
            statement.merkle_root == inputs.merkle_root && statement.verify()
        })
    }
}

/// Accepts every validity proof. Demo only.
struct TrustingValidityVerifier;

impl ValidityVerifier for TrustingValidityVerifier {
    fn verify_validity(&self, _inputs: &ValidityInputs, _proof: &[u8]) -> bool {
        true
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;
    let config = match &args.config {
        Some(path) => LedgerConfig::from_path(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    let group = if args.standard_group {
        Group::rfc3526_1536()
    } else {
        Group::generate(args.bits)?
    };
    if args.verify_group && !group.verify_primality()? {
        bail!("the group modulus is not a safe prime");
    }

    // Trustees receive their key shares and check them against the public commitments
    let (params, verification, shares) =
        threshold::deal(&group, config.threshold, config.total_shares)?;
    for share in shares.iter() {
        if !share.is_consistent(&verification, &group) {
            bail!("trustee {} received an inconsistent share", share.get_index());
        }
    }

    // Registration: every voter publishes a commitment, the tree root goes on the ledger
    let mut tree = VoterTree::new(config.merkle_depth)?;
    let mut voters = vec![];
    for i in 0..args.voters {
        let secret = VoterSecret::generate();
        let index = tree.add_leaf(eligibility::commit_voter(&format!("voter-{i}"), &secret))?;
        voters.push((index, secret));
    }

    let ledger = Ledger::in_memory(config.clone())?;
    let now = Utc::now();
    ledger.create_election(ElectionRequest {
        id: ELECTION_ID.into(),
        title: "Sample election".into(),
        voter_merkle_root: tree.root(),
        public_key: params.clone(),
        num_candidates: args.candidates,
        start_time: now - Duration::minutes(1),
        end_time: now + Duration::hours(1),
    })?;
    let election = ledger.activate_election(ELECTION_ID)?;
    warn!("ballot validity proofs are not checked in this demo");

    let mut expected = vec![0u64; args.candidates];
    let mut rng = rand::thread_rng();
    for (index, secret) in voters.iter() {
        let choice = rng.gen_range(1..=args.candidates);
        let (ballot, _nonces) = cipher::encrypt_ballot(choice, args.candidates, &params)?;
        let submission = Submission {
            ballot,
            nullifier: eligibility::derive_nullifier(secret, ELECTION_ID),
            eligibility_proof: serde_json::to_vec(&tree.path(*index)?)?,
            validity_proof: vec![],
        };
        let digests = check_submission(
            &submission,
            &election,
            &OpenMembershipVerifier,
            &TrustingValidityVerifier,
        )?;
        let receipt = ledger.cast_vote(
            ELECTION_ID,
            &submission.ballot,
            &submission.nullifier,
            &digests.eligibility,
            &digests.validity,
        )?;
        if !ledger.verify_receipt(ELECTION_ID, &receipt)? {
            bail!("receipt {} does not verify", receipt.verification_code);
        }
        expected[choice - 1] += 1;
    }

    // Voting a second time is refused
    if let Some((_, secret)) = voters.first() {
        let (ballot, _) = cipher::encrypt_ballot(1, args.candidates, &params)?;
        let nullifier = eligibility::derive_nullifier(secret, ELECTION_ID);
        if ledger.cast_vote(ELECTION_ID, &ballot, &nullifier, "", "").is_ok() {
            bail!("a duplicate vote was accepted");
        }
    }

    ledger.close_election(ELECTION_ID)?;
    ledger.begin_tally(ELECTION_ID)?;

    // A quorum of trustees decrypts the aggregate
    let aggregate = tally::aggregate_election(&ledger, ELECTION_ID)?;
    let tally_shares = shares
        .iter()
        .take(config.threshold)
        .map(|share| share.decrypt_aggregate(&aggregate, &group))
        .collect::<Vec<_>>();
    let outcome = tally::decrypt_tally(
        &aggregate,
        &tally_shares,
        &params,
        &verification,
        config.max_tally,
    )?;
    for (slot, count) in expected.iter().enumerate() {
        if outcome.vote_counts.get(&(slot + 1).to_string()) != Some(count) {
            bail!("the final tally is incorrect!");
        }
    }
    let result = tally::publish_tally(&ledger, ELECTION_ID, &outcome)?;

    let report = tally::audit_tally(&ledger, &verification, ELECTION_ID)?;
    if !report.passed() {
        bail!("the published tally failed its audit: {report:?}");
    }
    let board = ledger.get_bulletin_board(ELECTION_ID)?;
    info!("bulletin board holds {} entries", board.entries.len());

    println!("{}", serde_json::to_string_pretty(&result.vote_counts)?);
    println!(
        "bulletin root: {}",
        board.merkle_root.unwrap_or_default()
    );
    println!("The election is a success!");
    return Ok(());
}
