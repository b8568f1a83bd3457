//! The address-to-shielded-key mapping file: an append-only JSON array
//! living at `<data_dir>/eth-shield-account-mapping.json`.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KeystoreError;
use crate::group::PublicKeyHex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntry {
    #[serde(rename = "ethAccount")]
    pub eth_account: String,
    #[serde(rename = "shieldedAccount")]
    pub shielded_account: PublicKeyHex,
}

pub async fn load(path: &Path) -> Result<Vec<MappingEntry>, KeystoreError> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    let raw = tokio::fs::read_to_string(path).await?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

pub async fn save(path: &Path, entries: &[MappingEntry]) -> Result<(), KeystoreError> {
    let raw = serde_json::to_string_pretty(entries)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, raw).await?;
    Ok(())
}

pub fn find<'a>(entries: &'a [MappingEntry], eth_account: &str) -> Option<&'a MappingEntry> {
    entries
        .iter()
        .find(|e| e.eth_account.eq_ignore_ascii_case(eth_account))
}
