//! Ledger configuration. Every field has a default, so a configuration file only needs to name
//! the values it overrides.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Length of every digest in the crate, in bytes
const DIGEST_BYTES: usize = 32;

/// Largest accepted `max_tally`. The discrete log keeps a table of about sqrt(max_tally)
/// entries, so this bounds it to a million.
pub const MAX_TALLY_LIMIT: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    /// Number of trustees needed to decrypt (k)
    pub threshold: usize,
    /// Number of trustees holding a key share (n)
    pub total_shares: usize,
    /// Bytes of H(txId || ballotHash) kept in a receipt's verification code
    pub verification_code_bytes: usize,
    pub max_commit_retries: usize,
    /// Largest count the tally will search for when solving the discrete log
    pub max_tally: u64,
    pub merkle_depth: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            total_shares: 5,
            verification_code_bytes: 8,
            max_commit_retries: 16,
            max_tally: 10_000_000,
            merkle_depth: 20,
        }
    }
}

impl LedgerConfig {
    /// Read and validate a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        return Ok(config);
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 || self.threshold > self.total_shares {
            return Err(Error::InvalidConfig(format!(
                "threshold {} of {} shares",
                self.threshold, self.total_shares
            )));
        }
        if self.verification_code_bytes == 0 || self.verification_code_bytes > DIGEST_BYTES {
            return Err(Error::InvalidConfig(format!(
                "verification code of {} bytes",
                self.verification_code_bytes
            )));
        }
        if self.max_tally > MAX_TALLY_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "tally bound {} exceeds {MAX_TALLY_LIMIT}",
                self.max_tally
            )));
        }
        if self.max_commit_retries == 0 {
            return Err(Error::InvalidConfig("no commit attempts allowed".into()));
        }
        if self.merkle_depth == 0 || self.merkle_depth > 32 {
            return Err(Error::InvalidConfig(format!(
                "voter tree depth {}",
                self.merkle_depth
            )));
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.threshold, config.total_shares), (3, 5));
        let parsed: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_override() {
        let parsed: LedgerConfig =
            serde_json::from_str(r#"{"threshold": 2, "verificationCodeBytes": 4}"#).unwrap();
        assert_eq!(parsed.threshold, 2);
        assert_eq!(parsed.verification_code_bytes, 4);
        assert_eq!(parsed.total_shares, 5);
    }

    #[test]
    fn test_validate() {
        let bad = [
            LedgerConfig {
                threshold: 0,
                ..Default::default()
            },
            LedgerConfig {
                threshold: 6,
                ..Default::default()
            },
            LedgerConfig {
                verification_code_bytes: 33,
                ..Default::default()
            },
            LedgerConfig {
                max_commit_retries: 0,
                ..Default::default()
            },
            LedgerConfig {
                merkle_depth: 33,
                ..Default::default()
            },
            LedgerConfig {
                max_tally: MAX_TALLY_LIMIT + 1,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
        let largest = LedgerConfig {
            max_tally: MAX_TALLY_LIMIT,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_from_path() {
        let path = std::env::temp_dir().join(format!("ledger-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"maxTally": 1000}"#).unwrap();
        let config = LedgerConfig::from_path(&path).unwrap();
        assert_eq!(config.max_tally, 1000);

        fs::write(&path, r#"{"threshold": 9}"#).unwrap();
        assert!(LedgerConfig::from_path(&path).is_err());
        fs::remove_file(&path).unwrap();
        assert!(matches!(LedgerConfig::from_path(&path), Err(Error::Io(_))));
    }
}
