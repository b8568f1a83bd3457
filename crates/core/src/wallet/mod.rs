//! One-time-signer HD wallet plus the signing-key manager that composes
//! it with the admin/authority static signers.
pub mod hd;
mod keysdb;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ethers_core::types::{Address, Bytes, TransactionRequest, U256};
use ethers_signers::{LocalWallet, Signer};

use crate::error::WalletError;

pub use hd::DerivedAccount;
pub use keysdb::KeysDb;

const ONETIME_WALLET_NAME: &str = "onetime-use-signers";

#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas: u64,
    pub chain_id: u64,
}

pub struct SigningKeyManager {
    data_dir: PathBuf,
    onetime_wallet: hd::HdWallet,
    keys_db: KeysDb,
    admin_signer: LocalWallet,
    authority_signer: LocalWallet,
    chain_id: u64,
}

impl SigningKeyManager {
    pub async fn init(
        data_dir: impl Into<PathBuf>,
        admin_private_key: &str,
        authority_private_key: &str,
        chain_id: u64,
    ) -> Result<Self, WalletError> {
        let data_dir = data_dir.into();
        let onetime_wallet = hd::HdWallet::init(&data_dir, ONETIME_WALLET_NAME).await?;
        let keys_db = KeysDb::open(&data_dir.join("keysdb"))?;
        let admin_signer = admin_private_key
            .parse::<LocalWallet>()
            .map_err(WalletError::Bip39)?;
        let authority_signer = authority_private_key
            .parse::<LocalWallet>()
            .map_err(WalletError::Bip39)?;

        Ok(Self {
            data_dir,
            onetime_wallet,
            keys_db,
            admin_signer,
            authority_signer,
            chain_id,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn admin_address(&self) -> Address {
        self.admin_signer.address()
    }

    /// Mint a fresh one-time signer: derive the next HD index and persist
    /// `address -> privateKey` in the KeysDB in one transaction.
    pub fn new_account(&self) -> Result<DerivedAccount, WalletError> {
        self.keys_db.derive_next(&self.onetime_wallet, ONETIME_WALLET_NAME)
    }

    fn resolve_signer(&self, address: &str, is_admin_signer: bool) -> Result<LocalWallet, WalletError> {
        if is_admin_signer {
            return Ok(self.admin_signer.clone());
        }
        if address.eq_ignore_ascii_case(&format!("{:?}", self.authority_signer.address())) {
            return Ok(self.authority_signer.clone());
        }
        let private_key = self
            .keys_db
            .get_private_key(address)?
            .ok_or_else(|| WalletError::SignerNotFound(address.to_string()))?;
        private_key.parse::<LocalWallet>().map_err(WalletError::Bip39)
    }

    /// Sign an already-built transaction request with a named signer.
    pub async fn sign(
        &self,
        address: &str,
        tx: &TxRequest,
        is_admin_signer: bool,
    ) -> Result<Bytes, WalletError> {
        let signer = self
            .resolve_signer(address, is_admin_signer)?
            .with_chain_id(tx.chain_id);

        let request = TransactionRequest::new()
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value)
            .nonce(tx.nonce)
            .gas_price(tx.gas_price)
            .gas(tx.gas)
            .chain_id(tx.chain_id);

        let typed_tx: ethers_core::types::transaction::eip2718::TypedTransaction = request.into();
        let signature = signer
            .sign_transaction(&typed_tx)
            .await
            .map_err(|e| WalletError::InvalidField(e.to_string()))?;
        Ok(typed_tx.rlp_signed(&signature))
    }

    /// Validate and sign a loosely-typed JSON transaction payload, the
    /// shape callers outside this crate hand in.
    pub async fn sign_json(
        &self,
        address: &str,
        payload: Option<&serde_json::Value>,
        is_admin_signer: bool,
    ) -> Result<Bytes, WalletError> {
        let payload = payload.ok_or(WalletError::MissingParameter("payload"))?;
        let obj = payload
            .as_object()
            .ok_or(WalletError::PayloadNotAnObject)?;

        let nonce = match obj.get("nonce") {
            Some(serde_json::Value::String(s)) => parse_nonce_hex(s)?,
            Some(serde_json::Value::Number(n)) => {
                n.as_u64().ok_or_else(|| WalletError::InvalidNonceHex(n.to_string()))?
            }
            _ => 0,
        };
        let gas_price = obj
            .get("gasPrice")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let gas = obj.get("gasLimit").and_then(|v| v.as_u64()).unwrap_or(6_700_000);
        let chain_id = obj.get("chainId").and_then(|v| v.as_u64()).unwrap_or(self.chain_id);

        let to = obj
            .get("to")
            .and_then(|v| v.as_str())
            .ok_or(WalletError::MissingParameter("to"))?;
        let to = Address::from_str(to).map_err(|e| WalletError::InvalidField(e.to_string()))?;

        let data = obj.get("data").and_then(|v| v.as_str()).unwrap_or("0x");
        let data = Bytes::from(
            hex::decode(data.trim_start_matches("0x"))
                .map_err(|e| WalletError::InvalidField(e.to_string()))?,
        );

        let value = obj
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or("0x0");
        let value = U256::from_str(value).map_err(|e| WalletError::InvalidField(e.to_string()))?;

        let tx = TxRequest {
            to,
            data,
            value,
            nonce,
            gas_price,
            gas,
            chain_id,
        };
        self.sign(address, &tx, is_admin_signer).await
    }
}

fn parse_nonce_hex(s: &str) -> Result<u64, WalletError> {
    let stripped = s
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::InvalidNonceHex(s.to_string()))?;
    u64::from_str_radix(stripped, 16).map_err(|_| WalletError::InvalidNonceHex(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager(dir: &Path) -> SigningKeyManager {
        let admin_key = hex::encode([0x11u8; 32]);
        let authority_key = hex::encode([0x22u8; 32]);
        SigningKeyManager::init(dir, &admin_key, &authority_key, 1337)
            .await
            .expect("init")
    }

    #[tokio::test]
    async fn sign_json_rejects_missing_payload() {
        let dir = std::env::temp_dir().join(format!("signing-key-manager-{}", std::process::id()));
        let manager = manager(&dir).await;
        let result = manager.sign_json("0x0", None, true).await;
        assert!(matches!(result, Err(WalletError::MissingParameter("payload"))));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn sign_json_rejects_non_object_payload() {
        let dir = std::env::temp_dir().join(format!("signing-key-manager-obj-{}", std::process::id()));
        let manager = manager(&dir).await;
        let payload = serde_json::json!(["not", "an", "object"]);
        let result = manager.sign_json("0x0", Some(&payload), true).await;
        assert!(matches!(result, Err(WalletError::PayloadNotAnObject)));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn sign_json_rejects_malformed_nonce_hex() {
        let dir = std::env::temp_dir().join(format!("signing-key-manager-nonce-{}", std::process::id()));
        let manager = manager(&dir).await;
        let payload = serde_json::json!({
            "to": "0x28AAd11F640BeB79e89EF87bcEe470c55C6B847",
            "nonce": "not-hex",
        });
        let result = manager.sign_json("0x0", Some(&payload), true).await;
        assert!(matches!(result, Err(WalletError::InvalidNonceHex(_))));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn sign_json_with_admin_signer_succeeds() {
        let dir = std::env::temp_dir().join(format!("signing-key-manager-ok-{}", std::process::id()));
        let manager = manager(&dir).await;
        let payload = serde_json::json!({
            "to": "0x28AAd11F640BeB79e89EF87bcEe470c55C6B847",
            "nonce": "0x0",
            "gasPrice": 0,
            "gasLimit": 100000,
            "chainId": 1337,
        });
        let raw = manager
            .sign_json("0x0", Some(&payload), true)
            .await
            .expect("sign");
        assert!(!raw.is_empty());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
