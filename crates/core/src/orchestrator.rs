//! Trade orchestrator: composes the keystore, cache, prover, shuffler,
//! signing-key manager and submission coordinator into the top-level
//! register / fund / balance / transfer / withdraw flows.
use std::sync::Arc;

use ethers_core::abi::Token;
use ethers_core::types::{Address, Bytes, U256};
use sha3::{Digest, Keccak256};
use tokio::sync::Mutex;

use crate::cache::BalanceCache;
use crate::chain::{ChainClient, Receipt};
use crate::coordinator::{SendOptions, SignerRef, SubmissionCoordinator};
use crate::error::{KeystoreError, OrchestratorError};
use crate::group::{PublicKeyHex, generator};
use crate::keystore::ShieldedKeystore;
use crate::prover::{BurnArgs, BurnProver, Prover, TransferArgs, TransferProver};
use crate::shuffler;
use crate::wallet::SigningKeyManager;

pub struct TradeOrchestrator {
    keystore: Arc<ShieldedKeystore>,
    cache: Mutex<BalanceCache>,
    signing: Arc<SigningKeyManager>,
    coordinator: SubmissionCoordinator,
    chain: Arc<dyn ChainClient>,
    transfer_prover: Arc<dyn TransferProver>,
    burn_prover: Arc<dyn BurnProver>,
    zsc_address: Address,
    erc20_address: Address,
    b_max: u64,
}

fn encode_call(signature: &str, tokens: &[Token]) -> Bytes {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    let selector = &hasher.finalize()[..4];
    let mut data = selector.to_vec();
    data.extend(ethers_core::abi::encode(tokens));
    Bytes::from(data)
}

impl TradeOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keystore: Arc<ShieldedKeystore>,
        signing: Arc<SigningKeyManager>,
        coordinator: SubmissionCoordinator,
        chain: Arc<dyn ChainClient>,
        transfer_prover: Arc<dyn TransferProver>,
        burn_prover: Arc<dyn BurnProver>,
        zsc_address: Address,
        erc20_address: Address,
        b_max: u64,
    ) -> Self {
        Self {
            keystore,
            cache: Mutex::new(BalanceCache::new(b_max)),
            signing,
            coordinator,
            chain,
            transfer_prover,
            burn_prover,
            zsc_address,
            erc20_address,
            b_max,
        }
    }

    async fn require_shielded_account(&self, eth_addr: &str) -> Result<PublicKeyHex, OrchestratorError> {
        self.keystore
            .find_shielded_account(eth_addr)
            .await?
            .ok_or_else(|| OrchestratorError::NoShieldedAccount(eth_addr.to_string()))
    }

    pub async fn register(&self, eth_addr: &str) -> Result<Receipt, OrchestratorError> {
        let pk = self.require_shielded_account(eth_addr).await?;
        let account = self.keystore.load_account_by_public_key(&pk).await?;
        let (c, s) = account.prove_knowledge(self.zsc_address.as_bytes());

        let one_time = self.signing.new_account()?;
        let data = encode_call(
            "register(bytes32,bytes32,bytes32,bytes32,bytes32)",
            &[
                Token::FixedBytes(hex::decode(pk.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::FixedBytes(hex::decode(pk.0[1].trim_start_matches("0x")).unwrap_or_default()),
                Token::FixedBytes(c.to_bytes().to_vec()),
                Token::FixedBytes(s.to_bytes().to_vec()),
                Token::FixedBytes(vec![0u8; 32]),
            ],
        );

        let receipt = self
            .coordinator
            .send_transaction(
                &self.signing,
                SignerRef::OneTime {
                    address: &one_time.address,
                },
                self.zsc_address,
                data,
                SendOptions::default(),
            )
            .await?;
        Ok(receipt)
    }

    pub async fn fund(&self, eth_addr: &str, amount: u64) -> Result<Receipt, OrchestratorError> {
        let pk = self.require_shielded_account(eth_addr).await?;

        let approve_data = encode_call(
            "approve(address,uint256)",
            &[
                Token::Address(self.zsc_address),
                Token::Uint(U256::from(amount)),
            ],
        );
        self.coordinator
            .send_transaction(
                &self.signing,
                SignerRef::Admin,
                self.erc20_address,
                approve_data,
                SendOptions::default(),
            )
            .await?;

        let fund_data = encode_call(
            "fund(bytes32,bytes32,uint256)",
            &[
                Token::FixedBytes(hex::decode(pk.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::FixedBytes(hex::decode(pk.0[1].trim_start_matches("0x")).unwrap_or_default()),
                Token::Uint(U256::from(amount)),
            ],
        );
        let receipt = self
            .coordinator
            .send_transaction(
                &self.signing,
                SignerRef::Admin,
                self.zsc_address,
                fund_data,
                SendOptions::default(),
            )
            .await?;
        Ok(receipt)
    }

    pub async fn balance(&self, serialized_y: &PublicKeyHex) -> Result<u64, OrchestratorError> {
        let account = self.keystore.load_account_by_public_key(serialized_y).await?;
        let epoch = self.coordinator.current_epoch();

        let states = self
            .chain
            .simulate_accounts(std::slice::from_ref(serialized_y), epoch + 1)
            .await?;
        let state = states
            .first()
            .ok_or_else(|| KeystoreError::AccountNotFound(serialized_y.0[0].clone()))?;

        let point = state.decrypt(account.secret()).map_err(|e| {
            OrchestratorError::from(crate::error::ProverError::MalformedCiphertext(e))
        })?;

        let b_max = self.b_max;
        let mut cache = self.cache.lock().await;
        let value = cache.get(&point, |p| cache_resolve(p, b_max))?;
        Ok(value)
    }

    pub async fn transfer(
        &self,
        from_y: &PublicKeyHex,
        to_y: &PublicKeyHex,
        value: u64,
        decoys: &[PublicKeyHex],
    ) -> Result<Receipt, OrchestratorError> {
        let sender_account = self.keystore.load_account_by_public_key(from_y).await?;

        let mut anon_set_keys = decoys.to_vec();
        anon_set_keys.push(from_y.clone());
        anon_set_keys.push(to_y.clone());

        let points: Result<Vec<_>, _> = anon_set_keys.iter().map(|k| k.to_point()).collect();
        let points = points.map_err(crate::error::ProverError::MalformedCiphertext)?;
        let sender_point = from_y.to_point().map_err(crate::error::ProverError::MalformedCiphertext)?;
        let receiver_point = to_y.to_point().map_err(crate::error::ProverError::MalformedCiphertext)?;

        self.coordinator.epoch_gate(points.len()).await;
        let epoch = self.coordinator.current_epoch();

        let mut rng = rand::thread_rng();
        let shuffle_result = shuffler::shuffle(&points, &sender_point, &receiver_point, &mut rng)?;
        let shuffled_keys: Vec<PublicKeyHex> = shuffle_result
            .shuffled
            .iter()
            .map(PublicKeyHex::from_point)
            .collect();

        let anon_set_states = self.chain.simulate_accounts(&shuffled_keys, epoch).await?;
        let sender_state = &anon_set_states[shuffle_result.sender_index];

        let decrypted = sender_state
            .decrypt(sender_account.secret())
            .map_err(crate::error::ProverError::MalformedCiphertext)?;
        let b_max = self.b_max;
        let current_balance = {
            let mut cache = self.cache.lock().await;
            cache.get(&decrypted, |p| cache_resolve(p, b_max))?
        };
        if current_balance < value {
            return Err(OrchestratorError::InsufficientBalance {
                have: current_balance,
                requested: value,
            });
        }

        let prover = Prover::new(sender_account, self.transfer_prover.clone(), self.burn_prover.clone());
        let proof_output = prover.generate_transfer_proof(TransferArgs {
            anon_set: shuffled_keys,
            anon_set_states,
            value,
            index: [shuffle_result.sender_index, shuffle_result.receiver_index],
            randomness: curve25519_dalek::scalar::Scalar::random(&mut rand_core::OsRng),
            balance_after_transfer: current_balance - value,
            epoch,
        })?;

        let one_time = self.signing.new_account()?;
        let data = encode_call(
            "transfer(bytes32[],bytes32,bytes32,bytes,address)",
            &[
                Token::Array(
                    proof_output
                        .l
                        .iter()
                        .flat_map(|k| {
                            [
                                hex::decode(k.0[0].trim_start_matches("0x")).unwrap_or_default(),
                                hex::decode(k.0[1].trim_start_matches("0x")).unwrap_or_default(),
                            ]
                        })
                        .map(Token::FixedBytes)
                        .collect(),
                ),
                Token::FixedBytes(hex::decode(proof_output.r.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::FixedBytes(hex::decode(proof_output.u.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::Bytes(proof_output.proof),
                Token::Address(Address::zero()),
            ],
        );

        let receipt = self
            .coordinator
            .send_transaction(
                &self.signing,
                SignerRef::OneTime {
                    address: &one_time.address,
                },
                self.zsc_address,
                data,
                SendOptions::default(),
            )
            .await?;
        Ok(receipt)
    }

    pub async fn withdraw(&self, eth_addr: &str, amount: u64) -> Result<Receipt, OrchestratorError> {
        let pk = self.require_shielded_account(eth_addr).await?;
        let account = self.keystore.load_account_by_public_key(&pk).await?;

        self.coordinator.epoch_gate(1).await;
        let epoch = self.coordinator.current_epoch();

        let states = self.chain.simulate_accounts(std::slice::from_ref(&pk), epoch).await?;
        let state = states
            .first()
            .ok_or_else(|| KeystoreError::AccountNotFound(pk.0[0].clone()))?;

        let decrypted = state
            .decrypt(account.secret())
            .map_err(crate::error::ProverError::MalformedCiphertext)?;
        let b_max = self.b_max;
        let current_balance = {
            let mut cache = self.cache.lock().await;
            cache.get(&decrypted, |p| cache_resolve(p, b_max))?
        };
        if current_balance < amount {
            return Err(OrchestratorError::InsufficientBalance {
                have: current_balance,
                requested: amount,
            });
        }

        let prover = Prover::new(account, self.transfer_prover.clone(), self.burn_prover.clone());
        let proof_output = prover.generate_burn_proof(BurnArgs {
            burn_account: pk.clone(),
            burn_account_state: state.clone(),
            value: amount,
            balance_after_transfer: current_balance - amount,
            epoch,
            sender: eth_addr.to_string(),
        })?;

        let data = encode_call(
            "burn(bytes32,bytes32,uint256,bytes32,bytes)",
            &[
                Token::FixedBytes(hex::decode(pk.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::FixedBytes(hex::decode(pk.0[1].trim_start_matches("0x")).unwrap_or_default()),
                Token::Uint(U256::from(amount)),
                Token::FixedBytes(hex::decode(proof_output.u.0[0].trim_start_matches("0x")).unwrap_or_default()),
                Token::Bytes(proof_output.proof),
            ],
        );

        let receipt = self
            .coordinator
            .send_transaction(
                &self.signing,
                SignerRef::Authority { address: eth_addr },
                self.zsc_address,
                data,
                SendOptions::default(),
            )
            .await?;
        Ok(receipt)
    }
}

fn cache_resolve(point: &curve25519_dalek::ristretto::RistrettoPoint, b_max: u64) -> Result<u64, crate::error::CacheError> {
    use curve25519_dalek::traits::Identity;
    let mut acc = curve25519_dalek::ristretto::RistrettoPoint::identity();
    let g = generator();
    for b in 0..b_max {
        if acc == *point {
            return Ok(b);
        }
        acc += g;
    }
    Err(crate::error::CacheError::CannotInvert(b_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::NullProver;
    use curve25519_dalek::scalar::Scalar;
    use rand_core::OsRng;

    async fn orchestrator(dir: &std::path::Path) -> (TradeOrchestrator, Arc<ShieldedKeystore>) {
        let keystore = Arc::new(ShieldedKeystore::new(dir));
        let admin_key = hex::encode([0x11u8; 32]);
        let authority_key = hex::encode([0x22u8; 32]);
        let signing = Arc::new(
            SigningKeyManager::init(dir, &admin_key, &authority_key, 1337)
                .await
                .expect("init signing"),
        );
        let chain: Arc<dyn ChainClient> = Arc::new(crate::chain::mock::MockChainClient::new());
        let coordinator = SubmissionCoordinator::new(chain.clone(), 6, 1337);
        let orchestrator = TradeOrchestrator::new(
            keystore.clone(),
            signing,
            coordinator,
            chain,
            Arc::new(NullProver),
            Arc::new(NullProver),
            Address::zero(),
            Address::zero(),
            1_000,
        );
        (orchestrator, keystore)
    }

    #[tokio::test]
    async fn balance_rejects_unknown_account() {
        let dir = std::env::temp_dir().join(format!("orchestrator-test-{}", std::process::id()));
        let (orchestrator, _keystore) = orchestrator(&dir).await;
        let bogus = PublicKeyHex([
            "0x00000000000000000000000000000000".to_string(),
            "0x00000000000000000000000000000000".to_string(),
        ]);
        let result = orchestrator.balance(&bogus).await;
        assert!(result.is_err());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn register_fails_with_not_found_when_no_shielded_account_is_mapped() {
        let dir = std::env::temp_dir().join(format!("orchestrator-register-{}", std::process::id()));
        let (orchestrator, _keystore) = orchestrator(&dir).await;
        let result = orchestrator.register("0x0000000000000000000000000000000000dEaD").await;
        assert!(matches!(result, Err(OrchestratorError::NoShieldedAccount(_))));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[test]
    fn cache_resolve_recovers_a_known_small_balance() {
        let b = 7u64;
        let point = generator() * Scalar::from(b);
        assert_eq!(cache_resolve(&point, 1_000).expect("resolve"), b);
        let _ = OsRng;
    }
}
