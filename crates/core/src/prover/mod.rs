//! Prover: wraps a loaded shielded key, builds the TRANSFER/BURN
//! statement and witness, and delegates the actual proof computation to
//! an external collaborator behind the `TransferProver`/`BurnProver`
//! traits below.
mod burn;
mod transfer;

use std::sync::Arc;

use curve25519_dalek::ristretto::RistrettoPoint;

use crate::error::ProverError;
use crate::group::{EncryptedBalance, PublicKeyHex, ShieldedAccount};

pub use burn::{BurnArgs, BurnStatement, BurnWitness};
pub use transfer::{TransferArgs, TransferStatement, TransferWitness};

pub trait TransferProver: Send + Sync {
    fn prove(
        &self,
        statement: &TransferStatement,
        witness: &TransferWitness,
    ) -> Result<Vec<u8>, ProverError>;
}

pub trait BurnProver: Send + Sync {
    fn prove(&self, statement: &BurnStatement, witness: &BurnWitness) -> Result<Vec<u8>, ProverError>;
}

/// Returns a fixed placeholder proof. Stands in for the real
/// Σ-protocol/range-proof library, which is an external collaborator.
pub struct NullProver;

impl TransferProver for NullProver {
    fn prove(
        &self,
        _statement: &TransferStatement,
        _witness: &TransferWitness,
    ) -> Result<Vec<u8>, ProverError> {
        Ok(vec![0u8; 32])
    }
}

impl BurnProver for NullProver {
    fn prove(&self, _statement: &BurnStatement, _witness: &BurnWitness) -> Result<Vec<u8>, ProverError> {
        Ok(vec![0u8; 32])
    }
}

pub struct TransferProofOutput {
    pub proof: Vec<u8>,
    pub l: Vec<PublicKeyHex>,
    pub r: PublicKeyHex,
    pub u: PublicKeyHex,
}

pub struct BurnProofOutput {
    pub proof: Vec<u8>,
    pub u: PublicKeyHex,
}

pub struct Prover {
    account: ShieldedAccount,
    transfer_prover: Arc<dyn TransferProver>,
    burn_prover: Arc<dyn BurnProver>,
}

impl Prover {
    pub fn new(
        account: ShieldedAccount,
        transfer_prover: Arc<dyn TransferProver>,
        burn_prover: Arc<dyn BurnProver>,
    ) -> Self {
        Self {
            account,
            transfer_prover,
            burn_prover,
        }
    }

    pub fn decrypt(&self, ct: &EncryptedBalance) -> Result<RistrettoPoint, ProverError> {
        ct.decrypt(self.account.secret())
            .map_err(ProverError::MalformedCiphertext)
    }

    pub fn generate_transfer_proof(
        &self,
        args: TransferArgs,
    ) -> Result<TransferProofOutput, ProverError> {
        transfer::generate(&self.account, args, self.transfer_prover.as_ref())
    }

    pub fn generate_burn_proof(&self, args: BurnArgs) -> Result<BurnProofOutput, ProverError> {
        burn::generate(&self.account, args, self.burn_prover.as_ref())
    }
}

/// Tagged payload mirroring the two proof kinds this crate supports.
/// External callers hand in untyped `{ "type": ..., "args": ... }` JSON;
/// `from_json` surfaces the missing/unknown-type errors the orchestrator
/// needs before deserialising into the strongly-typed variants.
pub enum ProofPayload {
    Transfer(TransferArgs),
    Burn(BurnArgs),
}

impl ProofPayload {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ProverError> {
        let proof_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(ProverError::ProofTypeNull)?;
        let args = value.get("args").cloned().unwrap_or(serde_json::Value::Null);
        match proof_type {
            "TRANSFER" => Ok(Self::Transfer(
                serde_json::from_value(args)
                    .map_err(|e| ProverError::MalformedCiphertext(e.to_string()))?,
            )),
            "BURN" => Ok(Self::Burn(
                serde_json::from_value(args)
                    .map_err(|e| ProverError::MalformedCiphertext(e.to_string()))?,
            )),
            other => Err(ProverError::UnknownProofType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_rejects_missing_type() {
        let value = serde_json::json!({ "args": {} });
        let result = ProofPayload::from_json(value);
        assert!(matches!(result, Err(ProverError::ProofTypeNull)));
    }

    #[test]
    fn from_json_rejects_unknown_type() {
        let value = serde_json::json!({ "type": "MINT", "args": {} });
        let result = ProofPayload::from_json(value);
        assert!(matches!(result, Err(ProverError::UnknownProofType(ref t)) if t == "MINT"));
    }
}
