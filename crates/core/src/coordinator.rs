//! Epoch-aligned submission coordinator: decides whether to wait for the
//! next epoch, fetches nonces, builds and signs transactions, and
//! diagnoses reverts.
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ethers_core::types::{Address, Bytes};
use tracing::{debug, warn};

use crate::chain::{ChainClient, Receipt, decode_revert_message};
use crate::error::ChainError;
use crate::wallet::{SigningKeyManager, TxRequest};

const DEFAULT_GAS: u64 = 6_700_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    pub gas: Option<u64>,
}

pub enum SignerRef<'a> {
    OneTime { address: &'a str },
    Admin,
    Authority { address: &'a str },
}

pub struct SubmissionCoordinator {
    chain: Arc<dyn ChainClient>,
    epoch_length_secs: u64,
    chain_id: u64,
}

impl SubmissionCoordinator {
    pub fn new(chain: Arc<dyn ChainClient>, epoch_length_secs: u64, chain_id: u64) -> Self {
        Self {
            chain,
            epoch_length_secs,
            chain_id,
        }
    }

    pub fn epoch_at(&self, unix_seconds: u64) -> u64 {
        unix_seconds / self.epoch_length_secs
    }

    fn now_unix_seconds() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_secs()
    }

    /// Compute the wait-until-next-epoch window and the estimated proving
    /// time; sleep if the estimate would run past the epoch boundary.
    pub async fn epoch_gate(&self, anon_set_size: usize) {
        let now = Self::now_unix_seconds();
        let length = self.epoch_length_secs;
        let next_boundary = now.div_ceil(length) * length;
        let wait_ms = (next_boundary - now) * 1000;

        let n = anon_set_size.max(1) as f64;
        let estimate_ms = (n * n.log2() * 20.0 + 5200.0).ceil() as u64 + 20;

        if estimate_ms > wait_ms {
            debug!(wait_ms, estimate_ms, "sleeping until the next epoch boundary");
            tokio::time::sleep(std::time::Duration::from_millis(wait_ms)).await;
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch_at(Self::now_unix_seconds())
    }

    /// Fetch a nonce, sign, submit, and await the receipt; on revert,
    /// best-effort decode the `Error(string)` reason for diagnostics.
    pub async fn send_transaction(
        &self,
        signing: &SigningKeyManager,
        signer: SignerRef<'_>,
        to: Address,
        data: Bytes,
        options: SendOptions,
    ) -> Result<Receipt, ChainError> {
        let (signer_address, is_admin, from) = match signer {
            SignerRef::OneTime { address } => {
                let from: Address = address.parse().unwrap_or_else(|_| Address::zero());
                (address.to_string(), false, from)
            }
            SignerRef::Admin => {
                let from = signing.admin_address();
                (format!("{from:?}"), true, from)
            }
            SignerRef::Authority { address } => {
                let from: Address = address.parse().unwrap_or_else(|_| Address::zero());
                (address.to_string(), false, from)
            }
        };

        let nonce = self
            .chain
            .get_transaction_count(from)
            .await
            .map_err(|e| ChainError::NonceFetchFailed(e.to_string()))?;

        let tx = TxRequest {
            to,
            data,
            value: ethers_core::types::U256::zero(),
            nonce: nonce.as_u64(),
            gas_price: 0,
            gas: options.gas.unwrap_or(DEFAULT_GAS),
            chain_id: self.chain_id,
        };

        let raw = signing
            .sign(&signer_address, &tx, is_admin)
            .await
            .map_err(|e| ChainError::SendFailed(e.to_string()))?;

        let tx_hash = self
            .chain
            .send_raw_transaction(raw)
            .await
            .map_err(|e| ChainError::SendFailed(e.to_string()))?;

        let receipt = self
            .chain
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainError::ReceiptFailed(e.to_string()))?
            .ok_or_else(|| ChainError::ReceiptFailed("receipt never appeared".to_string()))?;

        if !receipt.status {
            let replay = self.chain.call(to, Bytes::default()).await;
            let reason = replay
                .ok()
                .and_then(|data| decode_revert_message(&data))
                .unwrap_or_else(|| "unknown revert reason".to_string());
            warn!(%reason, "transaction reverted");
            return Err(ChainError::Reverted(reason));
        }

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_at_floors_to_the_epoch_length() {
        let coordinator = SubmissionCoordinator::new(
            Arc::new(crate::chain::mock::MockChainClient::new()),
            6,
            1337,
        );
        assert_eq!(coordinator.epoch_at(0), 0);
        assert_eq!(coordinator.epoch_at(5), 0);
        assert_eq!(coordinator.epoch_at(6), 1);
        assert_eq!(coordinator.epoch_at(13), 2);
    }
}
