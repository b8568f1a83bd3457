use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::error::ProverError;
use crate::group::{EncryptedBalance, PublicKeyHex, ShieldedAccount};

use super::{BurnProofOutput, BurnProver};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnArgs {
    pub burn_account: PublicKeyHex,
    pub burn_account_state: EncryptedBalance,
    pub value: u64,
    pub balance_after_transfer: u64,
    pub epoch: u64,
    pub sender: String,
}

pub struct BurnStatement {
    pub cn: EncryptedBalance,
    pub y: PublicKeyHex,
    pub sender: String,
    pub epoch: u64,
}

pub struct BurnWitness {
    pub sk: Scalar,
    pub b_diff: u64,
}

pub(super) fn generate(
    account: &ShieldedAccount,
    args: BurnArgs,
    prover: &dyn BurnProver,
) -> Result<BurnProofOutput, ProverError> {
    let cn = args
        .burn_account_state
        .sub_plain(args.value)
        .map_err(ProverError::MalformedCiphertext)?;

    let statement = BurnStatement {
        cn,
        y: args.burn_account,
        sender: args.sender,
        epoch: args.epoch,
    };
    let witness = BurnWitness {
        sk: *account.secret(),
        b_diff: args.balance_after_transfer,
    };

    let proof = prover.prove(&statement, &witness)?;
    let u = PublicKeyHex::from_point(&account.epoch_tag(args.epoch));

    Ok(BurnProofOutput { proof, u })
}
