//! Embedded key-value store backing the HD wallet: `address -> privateKey`
//! plus a per-wallet monotonic derivation counter, kept consistent by a
//! single sled transaction.
use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::error::WalletError;
use crate::wallet::hd::{DerivedAccount, HdWallet};

pub struct KeysDb {
    db: sled::Db,
}

fn counter_key(wallet_name: &str) -> Vec<u8> {
    format!("docs-count-{wallet_name}").into_bytes()
}

fn address_key(address: &str) -> Vec<u8> {
    format!("addr:{}", address.to_lowercase()).into_bytes()
}

impl KeysDb {
    pub fn open(path: &Path) -> Result<Self, WalletError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Read-derive-write in one transaction: fetch the wallet's counter
    /// (default 0), derive at that index, persist `address -> privateKey`
    /// and bump the counter, all atomically.
    pub fn derive_next(
        &self,
        wallet: &HdWallet,
        wallet_name: &str,
    ) -> Result<DerivedAccount, WalletError> {
        let counter_key = counter_key(wallet_name);

        let result: Result<DerivedAccount, TransactionError<WalletError>> =
            self.db.transaction(|tx| {
                let current = tx
                    .get(&counter_key)
                    .map_err(ConflictableTransactionError::Storage)?
                    .map(|v| u32::from_be_bytes(v.as_ref().try_into().unwrap_or([0; 4])))
                    .unwrap_or(0);

                let account = wallet.get_account(current).map_err(|e| {
                    ConflictableTransactionError::Abort(e)
                })?;

                tx.insert(address_key(&account.address), account.private_key.as_bytes())
                    .map_err(ConflictableTransactionError::Storage)?;
                tx.insert(counter_key.as_slice(), &(current + 1).to_be_bytes())
                    .map_err(ConflictableTransactionError::Storage)?;

                Ok(account)
            });

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => WalletError::Sled(e),
        })
    }

    pub fn get_private_key(&self, address: &str) -> Result<Option<String>, WalletError> {
        let value = self.db.get(address_key(address))?;
        Ok(value.map(|v| String::from_utf8_lossy(&v).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_next_is_strictly_monotonic_across_calls() {
        let dir = std::env::temp_dir().join(format!("keysdb-test-{}", std::process::id()));
        let db = KeysDb::open(&dir).expect("open");

        let rt = tokio::runtime::Runtime::new().unwrap();
        let wallet = rt
            .block_on(HdWallet::init(&dir, "onetime-use-signers"))
            .expect("init wallet");

        let a0 = db.derive_next(&wallet, "onetime-use-signers").expect("derive 0");
        let a1 = db.derive_next(&wallet, "onetime-use-signers").expect("derive 1");
        assert_ne!(a0.address, a1.address);

        let stored = db.get_private_key(&a0.address).expect("lookup").expect("present");
        assert_eq!(stored, a0.private_key);

        std::fs::remove_dir_all(&dir).ok();
    }
}
