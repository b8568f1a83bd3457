//! Environment-driven configuration. Loading config itself sits outside
//! the cryptographic core, but every binary built on top of this crate
//! needs somewhere to read it from, in the style of the rest of this
//! crate's ambient stack.
use std::path::PathBuf;

use ethers_core::types::Address;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consensus {
    Qbft,
    Raft,
}

impl Consensus {
    /// Exposed per the protocol's constant table; no arithmetic in this
    /// crate currently depends on it.
    pub fn multiplier(&self) -> u64 {
        match self {
            Self::Qbft => 1,
            Self::Raft => 1_000_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),

    #[error("environment variable {0} has an invalid value: {1}")]
    InvalidVar(&'static str, String),
}

pub struct Config {
    pub data_dir: PathBuf,
    pub erc20_address: Address,
    pub zsc_address: Address,
    pub chain_id: u64,
    pub admin_signer: String,
    pub authority_signer: String,
    pub eth_url: String,
    pub epoch_length_secs: u64,
    pub consensus: Consensus,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join("zether")
            });

        let erc20_address = required_var("ERC20_ADDRESS")?
            .parse()
            .map_err(|_| ConfigError::InvalidVar("ERC20_ADDRESS", "not a valid address".to_string()))?;
        let zsc_address = required_var("ZSC_ADDRESS")?
            .parse()
            .map_err(|_| ConfigError::InvalidVar("ZSC_ADDRESS", "not a valid address".to_string()))?;
        let chain_id = required_var("CHAIN_ID")?
            .parse()
            .map_err(|_| ConfigError::InvalidVar("CHAIN_ID", "not a valid integer".to_string()))?;
        let admin_signer = required_var("ADMIN_SIGNER")?;
        let authority_signer = required_var("AUTHORITY_SIGNER")?;
        let eth_url = required_var("ETH_URL")?;

        let epoch_length_secs = std::env::var("ZSC_EPOCH_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6);

        let consensus = match std::env::var("CONSENSUS").ok().as_deref() {
            Some("raft") => Consensus::Raft,
            _ => Consensus::Qbft,
        };

        Ok(Self {
            data_dir,
            erc20_address,
            zsc_address,
            chain_id,
            admin_signer,
            authority_signer,
            eth_url,
            epoch_length_secs,
            consensus,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_multiplier_matches_the_protocol_constant_table() {
        assert_eq!(Consensus::Qbft.multiplier(), 1);
        assert_eq!(Consensus::Raft.multiplier(), 1_000_000_000);
    }
}
