//! Integration tests exercising the orchestrator against a mock chain.
use std::sync::Arc;

use ethers_core::types::Address;
use zsc_client_core::chain::mock::MockChainClient;
use zsc_client_core::coordinator::SubmissionCoordinator;
use zsc_client_core::group::EncryptedBalance;
use zsc_client_core::keystore::ShieldedKeystore;
use zsc_client_core::orchestrator::TradeOrchestrator;
use zsc_client_core::prover::NullProver;
use zsc_client_core::wallet::SigningKeyManager;

async fn build(
    dir: &std::path::Path,
    balances: Vec<EncryptedBalance>,
) -> (TradeOrchestrator, Arc<ShieldedKeystore>) {
    let keystore = Arc::new(ShieldedKeystore::new(dir));
    let admin_key = hex::encode([0x33u8; 32]);
    let authority_key = hex::encode([0x44u8; 32]);
    let signing = Arc::new(
        SigningKeyManager::init(dir, &admin_key, &authority_key, 1337)
            .await
            .expect("init signing"),
    );

    let mut mock = MockChainClient::new();
    mock.balances = balances;
    let chain: Arc<dyn zsc_client_core::chain::ChainClient> = Arc::new(mock);
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
async fn balance_decrypts_the_simulated_account_state() {
    let dir = std::env::temp_dir().join(format!("zsc-orchestrator-balance-{}", std::process::id()));

    let keystore_probe = ShieldedKeystore::new(&dir);
    let pk = keystore_probe
        .create_account("0x28AAd11F640BeB79e89EF87bcEe470c55C6B847")
        .await
        .expect("create account");
    let account = keystore_probe
        .load_account_by_public_key(&pk)
        .await
        .expect("load account");

    let r = curve25519_dalek::scalar::Scalar::random(&mut rand_core::OsRng);
    let ct = EncryptedBalance::encrypt(account.public(), 250, &r);

    let (orchestrator, _keystore) = build(&dir, vec![ct]).await;
    let balance = orchestrator.balance(&pk).await.expect("balance");
    assert_eq!(balance, 250);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn fund_fails_when_the_address_has_no_shielded_account() {
    let dir = std::env::temp_dir().join(format!("zsc-orchestrator-fund-{}", std::process::id()));
    let (orchestrator, _keystore) = build(&dir, vec![]).await;

    let result = orchestrator
        .fund("0x0000000000000000000000000000000000dEaD", 100)
        .await;
    assert!(result.is_err());

    tokio::fs::remove_dir_all(&dir).await.ok();
}
