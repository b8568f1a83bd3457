//! BIP-39/BIP-44 HD wallet used to mint fresh one-time signers. Mirrors
//! the derivation path `m/44'/60'/0'/0/<index>` used by every standard
//! Ethereum wallet.
use std::path::{Path, PathBuf};

use ethers_core::utils::to_checksum;
use ethers_signers::{LocalWallet, MnemonicBuilder, Signer, coins_bip39::English};

use crate::error::WalletError;

const SECRET_STORE_SUBDIR: &str = "hdwallet-secret-store";

pub struct DerivedAccount {
    pub address: String,
    pub private_key: String,
}

pub struct HdWallet {
    phrase: String,
}

impl HdWallet {
    /// Load `<name>.wallet` under `<data_dir>/hdwallet-secret-store`,
    /// generating a fresh mnemonic on first use.
    pub async fn init(data_dir: &Path, name: &str) -> Result<Self, WalletError> {
        let dir = data_dir.join(SECRET_STORE_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;
        let path = Self::wallet_path(data_dir, name);

        if tokio::fs::try_exists(&path).await? {
            let phrase = tokio::fs::read_to_string(&path).await?;
            return Ok(Self {
                phrase: phrase.trim().to_string(),
            });
        }

        let (_wallet, phrase) = MnemonicBuilder::<English>::default()
            .build_random(&mut rand::thread_rng())
            .map_err(WalletError::Bip39)?;
        tokio::fs::write(&path, &phrase).await?;
        Ok(Self { phrase })
    }

    fn wallet_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(SECRET_STORE_SUBDIR).join(format!("{name}.wallet"))
    }

    /// Derive `m/44'/60'/0'/0/<index>`.
    pub fn get_account(&self, index: u32) -> Result<DerivedAccount, WalletError> {
        let path = format!("m/44'/60'/0'/0/{index}");
        let wallet: LocalWallet = MnemonicBuilder::<English>::default()
            .phrase(self.phrase.as_str())
            .derivation_path(&path)
            .map_err(WalletError::Bip39)?
            .build()
            .map_err(WalletError::Bip39)?;

        let address = to_checksum(&wallet.address(), None);
        let private_key = hex::encode(wallet.signer().to_bytes());
        Ok(DerivedAccount {
            address,
            private_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_a_wallet_file_and_subsequent_init_reuses_it() {
        let dir = std::env::temp_dir().join(format!("hdwallet-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let wallet = HdWallet::init(&dir, "onetime-use-signers").await.expect("init");
        let account0 = wallet.get_account(0).expect("derive index 0");

        let wallet2 = HdWallet::init(&dir, "onetime-use-signers").await.expect("re-init");
        let account0_again = wallet2.get_account(0).expect("derive index 0 again");

        assert_eq!(account0.address, account0_again.address);
        assert_eq!(account0.private_key, account0_again.private_key);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn different_indices_derive_different_accounts() {
        let dir = std::env::temp_dir().join(format!("hdwallet-test-idx-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let wallet = HdWallet::init(&dir, "onetime-use-signers").await.expect("init");
        let a0 = wallet.get_account(0).expect("derive 0");
        let a1 = wallet.get_account(1).expect("derive 1");
        assert_ne!(a0.address, a1.address);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
