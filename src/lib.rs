//! Libraries for recording and tallying encrypted votes
use num_bigint::BigUint;

/// Use the same big integer type everywhere. Group elements and exponents are unbounded and every
/// operation reduces by an explicit modulus.
pub type BigInt = BigUint;

/// Number of bits of the groups generated for tests and demos
pub const TEST_GROUP_BITS: usize = 64;

pub mod arithmetics;
pub mod cipher;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod hash;
pub mod keys;
pub mod ledger;
pub mod proofs;
pub mod serialize;
pub mod tally;
pub mod threshold;

pub use error::{Error, Result};
