use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::error::ProverError;
use crate::group::{EncryptedBalance, PublicKeyHex, ShieldedAccount, generator};

use super::{TransferProofOutput, TransferProver};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferArgs {
    pub anon_set: Vec<PublicKeyHex>,
    pub anon_set_states: Vec<EncryptedBalance>,
    pub value: u64,
    pub index: [usize; 2],
    pub randomness: Scalar,
    pub balance_after_transfer: u64,
    pub epoch: u64,
}

pub struct TransferStatement {
    pub cn: Vec<EncryptedBalance>,
    pub c: Vec<EncryptedBalance>,
    pub y: Vec<PublicKeyHex>,
    pub epoch: u64,
}

pub struct TransferWitness {
    pub sk: Scalar,
    pub r: Scalar,
    pub b_transfer: u64,
    pub b_diff: u64,
    pub index: [usize; 2],
}

pub(super) fn generate(
    account: &ShieldedAccount,
    args: TransferArgs,
    prover: &dyn TransferProver,
) -> Result<TransferProofOutput, ProverError> {
    let n = args.anon_set.len();
    if n == 0 || n != args.anon_set_states.len() {
        return Err(ProverError::MissingField("anonSetStates"));
    }
    let [sender_idx, receiver_idx] = args.index;
    if sender_idx >= n || receiver_idx >= n {
        return Err(ProverError::MissingField("index"));
    }

    let r_point = generator() * args.randomness;
    let r_hex = PublicKeyHex::from_point(&r_point);

    let mut c = Vec::with_capacity(n);
    let mut cn = Vec::with_capacity(n);
    let mut l = Vec::with_capacity(n);
    for i in 0..n {
        let amount: i64 = if i == receiver_idx {
            args.value as i64
        } else if i == sender_idx {
            -(args.value as i64)
        } else {
            0
        };
        let y_i = args.anon_set[i]
            .to_point()
            .map_err(ProverError::MalformedCiphertext)?;
        let c_i = EncryptedBalance::encrypt_signed(&y_i, amount, &args.randomness);
        let cn_i = args.anon_set_states[i]
            .add(&c_i)
            .map_err(ProverError::MalformedCiphertext)?;
        l.push(c_i.c_l.clone());
        c.push(c_i);
        cn.push(cn_i);
    }

    let statement = TransferStatement {
        cn,
        c,
        y: args.anon_set,
        epoch: args.epoch,
    };
    let witness = TransferWitness {
        sk: *account.secret(),
        r: args.randomness,
        b_transfer: args.value,
        b_diff: args.balance_after_transfer,
        index: args.index,
    };

    let proof = prover.prove(&statement, &witness)?;
    let u = PublicKeyHex::from_point(&account.epoch_tag(args.epoch));

    Ok(TransferProofOutput {
        proof,
        l,
        r: r_hex,
        u,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn anon_set(n: usize) -> Vec<crate::group::ShieldedAccount> {
        (0..n).map(|_| ShieldedAccount::generate()).collect()
    }

    #[test]
    fn generate_transfer_proof_produces_one_left_component_per_slot() {
        let accounts = anon_set(4);
        let sender = &accounts[0];
        let anon_set: Vec<_> = accounts.iter().map(|a| a.public_hex()).collect();
        let anon_set_states: Vec<_> = accounts
            .iter()
            .map(|a| EncryptedBalance::encrypt(a.public(), 100, &Scalar::random(&mut OsRng)))
            .collect();

        let args = TransferArgs {
            anon_set,
            anon_set_states,
            value: 10,
            index: [0, 1],
            randomness: Scalar::random(&mut OsRng),
            balance_after_transfer: 90,
            epoch: 42,
        };

        let output = generate(sender, args, &super::super::NullProver).expect("generate proof");
        assert_eq!(output.l.len(), 4);
    }

    #[test]
    fn rejects_mismatched_anon_set_and_state_lengths() {
        let accounts = anon_set(4);
        let anon_set: Vec<_> = accounts.iter().map(|a| a.public_hex()).collect();
        let args = TransferArgs {
            anon_set,
            anon_set_states: vec![],
            value: 10,
            index: [0, 1],
            randomness: Scalar::random(&mut OsRng),
            balance_after_transfer: 90,
            epoch: 42,
        };
        let result = generate(&accounts[0], args, &super::super::NullProver);
        assert!(result.is_err());
    }
}
