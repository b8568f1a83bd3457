use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zsc_client_core::chain::UnimplementedChainClient;
use zsc_client_core::config::Config;
use zsc_client_core::coordinator::SubmissionCoordinator;
use zsc_client_core::keystore::ShieldedKeystore;
use zsc_client_core::orchestrator::TradeOrchestrator;
use zsc_client_core::prover::NullProver;
use zsc_client_core::wallet::SigningKeyManager;

const B_MAX: u64 = 1 << 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(data_dir = %config.data_dir.display(), "loaded configuration");

    let keystore = Arc::new(ShieldedKeystore::new(&config.data_dir));
    let signing = Arc::new(
        SigningKeyManager::init(
            &config.data_dir,
            &config.admin_signer,
            &config.authority_signer,
            config.chain_id,
        )
        .await?,
    );

    // The JSON-RPC transport is out of scope for this crate; an embedding
    // application supplies a real `ChainClient` here.
    let chain: Arc<dyn zsc_client_core::chain::ChainClient> = Arc::new(UnimplementedChainClient);
    let coordinator =
        SubmissionCoordinator::new(chain.clone(), config.epoch_length_secs, config.chain_id);

    let _orchestrator = TradeOrchestrator::new(
        keystore,
        signing,
        coordinator,
        chain,
        Arc::new(NullProver),
        Arc::new(NullProver),
        config.zsc_address,
        config.erc20_address,
        B_MAX,
    );

    tracing::info!("orchestrator ready; supply a ChainClient and proof-system implementation to go further");
    Ok(())
}
