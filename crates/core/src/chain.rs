//! The narrow seam onto the (out-of-scope) JSON-RPC transport. The
//! coordinator and orchestrator are built against `ChainClient`; a real
//! `eth_*`-speaking implementation is not part of this crate.
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};

use crate::error::ChainError;
use crate::group::PublicKeyHex;

#[derive(Debug, Clone)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub status: bool,
    pub contract_address: Option<Address>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_transaction_count(&self, address: Address) -> Result<U256, ChainError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError>;

    async fn get_transaction_receipt(&self, tx: H256) -> Result<Option<Receipt>, ChainError>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    async fn simulate_accounts(
        &self,
        ys: &[PublicKeyHex],
        epoch: u64,
    ) -> Result<Vec<crate::group::EncryptedBalance>, ChainError>;
}

/// Decode a standard `Error(string)` revert payload
/// (selector `0x08c379a0`) for diagnostic logging.
pub fn decode_revert_message(data: &Bytes) -> Option<String> {
    const SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
    if data.len() < 4 || data[..4] != SELECTOR {
        return None;
    }
    ethers_core::abi::decode(&[ethers_core::abi::ParamType::String], &data[4..])
        .ok()?
        .into_iter()
        .next()?
        .into_string()
}

/// Placeholder `ChainClient` for binaries that have not yet wired up a
/// real JSON-RPC transport. Every method fails; it exists so `main.rs`
/// has something concrete to construct while the transport itself
/// (out of scope for this crate) is supplied by the embedding
/// application.
pub struct UnimplementedChainClient;

#[async_trait]
impl ChainClient for UnimplementedChainClient {
    async fn get_transaction_count(&self, _address: Address) -> Result<U256, ChainError> {
        Err(ChainError::NonceFetchFailed("no JSON-RPC transport configured".to_string()))
    }

    async fn send_raw_transaction(&self, _raw: Bytes) -> Result<H256, ChainError> {
        Err(ChainError::SendFailed("no JSON-RPC transport configured".to_string()))
    }

    async fn get_transaction_receipt(&self, _tx: H256) -> Result<Option<Receipt>, ChainError> {
        Err(ChainError::ReceiptFailed("no JSON-RPC transport configured".to_string()))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ChainError> {
        Err(ChainError::CallFailed("no JSON-RPC transport configured".to_string()))
    }

    async fn simulate_accounts(
        &self,
        _ys: &[PublicKeyHex],
        _epoch: u64,
    ) -> Result<Vec<crate::group::EncryptedBalance>, ChainError> {
        Err(ChainError::CallFailed("no JSON-RPC transport configured".to_string()))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    /// A deterministic in-memory stand-in for a real RPC transport, used
    /// by the coordinator and orchestrator test suites.
    pub struct MockChainClient {
        pub nonce: Mutex<U256>,
        pub receipts: Mutex<Vec<Receipt>>,
        pub balances: Vec<crate::group::EncryptedBalance>,
    }

    impl MockChainClient {
        pub fn new() -> Self {
            Self {
                nonce: Mutex::new(U256::zero()),
                receipts: Mutex::new(Vec::new()),
                balances: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChainClient for MockChainClient {
        async fn get_transaction_count(&self, _address: Address) -> Result<U256, ChainError> {
            Ok(*self.nonce.lock().unwrap())
        }

        async fn send_raw_transaction(&self, _raw: Bytes) -> Result<H256, ChainError> {
            let mut nonce = self.nonce.lock().unwrap();
            *nonce += U256::one();
            Ok(H256::random())
        }

        async fn get_transaction_receipt(&self, tx: H256) -> Result<Option<Receipt>, ChainError> {
            Ok(Some(Receipt {
                transaction_hash: tx,
                status: true,
                contract_address: None,
            }))
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ChainError> {
            Ok(Bytes::default())
        }

        async fn simulate_accounts(
            &self,
            _ys: &[PublicKeyHex],
            _epoch: u64,
        ) -> Result<Vec<crate::group::EncryptedBalance>, ChainError> {
            Ok(self.balances.clone())
        }
    }
}
