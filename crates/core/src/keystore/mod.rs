//! Shielded keystore: per-account encrypted key files plus the
//! address-to-shielded-key mapping, all serialised behind a single
//! process-wide read-modify-write gate.
mod mapping;

use std::path::{Path, PathBuf};

use curve25519_dalek::scalar::Scalar;
use rand::RngCore;
use tokio::sync::Mutex;

use crate::error::KeystoreError;
use crate::group::{PublicKeyHex, ShieldedAccount};

pub use mapping::MappingEntry;

const KEYSTORE_SUBDIR: &str = "shielded-keystore";
const MAPPING_FILE: &str = "eth-shield-account-mapping.json";
const KEYSTORE_VERSION: u32 = 1;
const KEYSTORE_KDF: &str = "scrypt";

pub struct ShieldedKeystore {
    data_dir: PathBuf,
    gate: Mutex<()>,
}

impl ShieldedKeystore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            gate: Mutex::new(()),
        }
    }

    fn keystore_dir(&self) -> PathBuf {
        self.data_dir.join(KEYSTORE_SUBDIR)
    }

    fn mapping_path(&self) -> PathBuf {
        self.data_dir.join(MAPPING_FILE)
    }

    fn serialized_id(pk: &PublicKeyHex) -> String {
        format!("{},{}", pk.0[0], pk.0[1])
    }

    fn parse_serialized_id(name: &str) -> Option<PublicKeyHex> {
        let (_, id) = name.rsplit_once('-')?;
        let (hi, lo) = id.split_once(',')?;
        Some(PublicKeyHex([hi.to_string(), lo.to_string()]))
    }

    /// Generate a new shielded account, encrypt it under a fresh random
    /// password, and append the mapping entry under the RW gate.
    pub async fn create_account(&self, eth_addr: &str) -> Result<PublicKeyHex, KeystoreError> {
        let account = ShieldedAccount::generate();
        let pk = account.public_hex();

        let dir = self.keystore_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let password = random_password_hex();
        let filename = format!(
            "UTC--{}-{}",
            chrono::Utc::now().to_rfc3339(),
            Self::serialized_id(&pk)
        );

        let secret_bytes = account.secret().to_bytes().to_vec();
        let dir_clone = dir.clone();
        let filename_clone = filename.clone();
        let password_clone = password.clone();
        tokio::task::spawn_blocking(move || {
            eth_keystore::encrypt_key(
                &dir_clone,
                &mut rand::thread_rng(),
                secret_bytes,
                password_clone,
                Some(&filename_clone),
            )
        })
        .await
        .expect("keystore encryption task panicked")?;

        tokio::fs::write(dir.join(format!("{filename}.password")), &password).await?;
        rewrite_keystore_header(&dir.join(&filename), &pk).await?;

        let guard = self.gate.lock().await;
        let mapping_path = self.mapping_path();
        let mut entries = mapping::load(&mapping_path).await?;
        entries.push(MappingEntry {
            eth_account: eth_addr.to_string(),
            shielded_account: pk.clone(),
        });
        mapping::save(&mapping_path, &entries).await?;
        drop(guard);

        Ok(pk)
    }

    pub async fn find_shielded_account(
        &self,
        eth_addr: &str,
    ) -> Result<Option<PublicKeyHex>, KeystoreError> {
        let guard = self.gate.lock().await;
        let entries = mapping::load(&self.mapping_path()).await?;
        drop(guard);
        Ok(mapping::find(&entries, eth_addr).map(|e| e.shielded_account.clone()))
    }

    pub async fn get_accounts(&self) -> Result<Vec<(usize, MappingEntry)>, KeystoreError> {
        let guard = self.gate.lock().await;
        let entries = mapping::load(&self.mapping_path()).await?;
        drop(guard);
        Ok(entries.into_iter().enumerate().collect())
    }

    pub async fn load_account_by_public_key(
        &self,
        pk: &PublicKeyHex,
    ) -> Result<ShieldedAccount, KeystoreError> {
        let dir = self.keystore_dir();
        let wanted = Self::serialized_id(pk);
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".password") {
                continue;
            }
            if name.ends_with(&wanted) {
                return self.load_account(&entry.path()).await;
            }
        }
        Err(KeystoreError::AccountNotFound(wanted))
    }

    pub async fn load_account(&self, path: &Path) -> Result<ShieldedAccount, KeystoreError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| KeystoreError::MalformedFilename(path.display().to_string()))?;
        Self::parse_serialized_id(filename)
            .ok_or_else(|| KeystoreError::MalformedFilename(filename.to_string()))?;

        validate_keystore_header(path).await?;

        let password_path = path.with_extension("password");
        let password = tokio::fs::read_to_string(&password_path).await?;

        let path_owned = path.to_path_buf();
        let secret_bytes = tokio::task::spawn_blocking(move || {
            eth_keystore::decrypt_key(&path_owned, password)
        })
        .await
        .expect("keystore decryption task panicked")?;

        let mut buf = [0u8; 32];
        if secret_bytes.len() == 32 {
            buf.copy_from_slice(&secret_bytes);
        } else {
            return Err(KeystoreError::MalformedFilename(
                "decrypted secret is not 32 bytes".to_string(),
            ));
        }
        let x = Scalar::from_bytes_mod_order(buf);
        Ok(ShieldedAccount::from_secret(x))
    }
}

fn random_password_hex() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `eth_keystore::encrypt_key` writes the generic Web3 Secret Storage
/// record (`version: 3`, no `address` field). Rewrite it in place to the
/// `version: 1` / `address: [hex, hex]` shape this keystore's records use,
/// keeping the `crypto` object (and therefore the scrypt/AES-128-CTR/MAC
/// material `encrypt_key` produced) untouched.
async fn rewrite_keystore_header(path: &Path, pk: &PublicKeyHex) -> Result<(), KeystoreError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut doc: serde_json::Value = serde_json::from_str(&raw)?;
    let obj = doc.as_object_mut().ok_or_else(|| {
        KeystoreError::MalformedFilename(format!("{}: keystore body is not an object", path.display()))
    })?;
    obj.insert("version".to_string(), serde_json::json!(KEYSTORE_VERSION));
    obj.insert("address".to_string(), serde_json::json!([pk.0[0], pk.0[1]]));
    tokio::fs::write(path, serde_json::to_vec_pretty(&doc)?).await?;
    Ok(())
}

/// Reject a keystore record whose `version` or `crypto.kdf` does not match
/// the format this keystore writes, before attempting to decrypt it.
async fn validate_keystore_header(path: &Path) -> Result<(), KeystoreError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;

    let version = doc.get("version").and_then(|v| v.as_u64());
    if version != Some(KEYSTORE_VERSION as u64) {
        return Err(KeystoreError::UnsupportedVersion(version.unwrap_or(0) as u32));
    }

    let kdf = doc
        .get("crypto")
        .and_then(|c| c.get("kdf"))
        .and_then(|k| k.as_str());
    if kdf != Some(KEYSTORE_KDF) {
        return Err(KeystoreError::UnsupportedKdf(
            kdf.unwrap_or("<missing>").to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shielded-keystore-test-{label}-{}", std::process::id()));
        dir
    }

    #[test]
    fn parse_serialized_id_ignores_dashes_in_the_rfc3339_timestamp() {
        let pk = PublicKeyHex(["0xaaaa".to_string(), "0xbbbb".to_string()]);
        let filename = format!("UTC--{}-{}", chrono::Utc::now().to_rfc3339(), ShieldedKeystore::serialized_id(&pk));
        let parsed = ShieldedKeystore::parse_serialized_id(&filename).expect("parse");
        assert_eq!(parsed, pk);
    }

    #[tokio::test]
    async fn create_and_load_round_trips_the_same_secret() {
        let dir = temp_dir("roundtrip");
        let keystore = ShieldedKeystore::new(&dir);

        let pk = keystore
            .create_account("0x28AAd11F640BeB79e89EF87bcEe470c55C6B847")
            .await
            .expect("create account");

        let loaded = keystore
            .load_account_by_public_key(&pk)
            .await
            .expect("load account");
        assert_eq!(loaded.public_hex(), pk);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn created_keystore_record_carries_version_1_and_the_address_pair() {
        let dir = temp_dir("header");
        let keystore = ShieldedKeystore::new(&dir);
        let pk = keystore
            .create_account("0x28AAd11F640BeB79e89EF87bcEe470c55C6B847")
            .await
            .expect("create account");

        let wanted = ShieldedKeystore::serialized_id(&pk);
        let mut read_dir = tokio::fs::read_dir(keystore.keystore_dir()).await.unwrap();
        let mut path = None;
        while let Some(entry) = read_dir.next_entry().await.unwrap() {
            let name = entry.file_name();
            let name = name.to_string_lossy().to_string();
            if !name.ends_with(".password") && name.ends_with(&wanted) {
                path = Some(entry.path());
            }
        }
        let path = path.expect("keystore file written");
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["address"][0], pk.0[0]);
        assert_eq!(doc["address"][1], pk.0[1]);
        assert_eq!(doc["crypto"]["kdf"], "scrypt");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn load_account_rejects_an_unsupported_version() {
        let dir = temp_dir("bad-version");
        let keystore = ShieldedKeystore::new(&dir);
        let pk = keystore
            .create_account("0x28AAd11F640BeB79e89EF87bcEe470c55C6B847")
            .await
            .expect("create account");

        let wanted = ShieldedKeystore::serialized_id(&pk);
        let mut read_dir = tokio::fs::read_dir(keystore.keystore_dir()).await.unwrap();
        let mut path = None;
        while let Some(entry) = read_dir.next_entry().await.unwrap() {
            let name = entry.file_name();
            let name = name.to_string_lossy().to_string();
            if !name.ends_with(".password") && name.ends_with(&wanted) {
                path = Some(entry.path());
            }
        }
        let path = path.expect("keystore file written");
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        doc["version"] = serde_json::json!(3);
        tokio::fs::write(&path, serde_json::to_vec(&doc).unwrap()).await.unwrap();

        let result = keystore.load_account_by_public_key(&pk).await;
        assert!(matches!(result, Err(KeystoreError::UnsupportedVersion(3))));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn find_shielded_account_reflects_the_mapping_file() {
        let dir = temp_dir("mapping");
        let keystore = ShieldedKeystore::new(&dir);
        let eth_addr = "0x0000000000000000000000000000000000dEaD";

        assert!(keystore
            .find_shielded_account(eth_addr)
            .await
            .expect("find")
            .is_none());

        let pk = keystore.create_account(eth_addr).await.expect("create");
        let found = keystore
            .find_shielded_account(eth_addr)
            .await
            .expect("find")
            .expect("should now be present");
        assert_eq!(found, pk);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn concurrent_create_account_calls_all_land_in_the_mapping_file() {
        let dir = temp_dir("concurrent");
        let keystore = std::sync::Arc::new(ShieldedKeystore::new(&dir));

        let mut handles = Vec::new();
        for i in 0..5 {
            let keystore = keystore.clone();
            handles.push(tokio::spawn(async move {
                keystore
                    .create_account(&format!("0x000000000000000000000000000000000000{i:02x}"))
                    .await
                    .expect("create account")
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        let accounts = keystore.get_accounts().await.expect("get accounts");
        assert_eq!(accounts.len(), 5);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
