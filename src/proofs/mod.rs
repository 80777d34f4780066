//! Proofs. Decryption proofs are produced and checked here; eligibility and ballot validity
//! proofs come from an external proving system and are only consumed through [external].

pub mod dleq;
pub mod external;
