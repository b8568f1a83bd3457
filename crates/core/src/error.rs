//! Error taxonomy shared across the keystore, prover, cache, wallet,
//! coordinator and orchestrator layers.
use thiserror::Error;

/// Coarse classification used by the orchestrator to decide how an error
/// should be surfaced to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InsufficientBalance,
    CryptoFailure,
    RpcFailure,
    StorageFailure,
    Internal,
}

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("unsupported keystore version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported key-derivation scheme {0}")]
    UnsupportedKdf(String),

    #[error("mac mismatch: wrong password or corrupted keystore file")]
    MacMismatch,

    #[error("keystore file not found for public key {0}")]
    AccountNotFound(String),

    #[error("no shielded account mapped for address {0}")]
    MappingNotFound(String),

    #[error("malformed keystore filename: {0}")]
    MalformedFilename(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    EthKeystore(#[from] eth_keystore::KeystoreError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache seed file not found: {0}")]
    FileNotFound(String),

    #[error("cache seed file is not well-formed: {0}")]
    FileNotWellFormed(String),

    #[error("balance {0} exceeds the discrete-log search bound")]
    CannotInvert(u64),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("proof type missing from payload")]
    ProofTypeNull,

    #[error("unknown proof type {0}")]
    UnknownProofType(String),

    #[error("missing field {0} in proof payload")]
    MissingField(&'static str),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),
}

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("anonymity set size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("anonymity set must contain at least 2 entries, got {0}")]
    TooSmall(usize),

    #[error("sender or receiver key not present in the anonymity set")]
    EndpointNotInSet,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid derivation index {0}")]
    InvalidIndex(u32),

    #[error("signer not found for address {0}")]
    SignerNotFound(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("transaction payload is not an object")]
    PayloadNotAnObject,

    #[error("invalid nonce hex: {0}")]
    InvalidNonceHex(String),

    #[error("invalid transaction field {0}")]
    InvalidField(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bip39(#[from] ethers_signers::WalletError),

    #[error(transparent)]
    Sled(#[from] sled::Error),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("nonce fetch failed: {0}")]
    NonceFetchFailed(String),

    #[error("transaction submission failed: {0}")]
    SendFailed(String),

    #[error("receipt retrieval failed: {0}")]
    ReceiptFailed(String),

    #[error("call failed: {0}")]
    CallFailed(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("ethereum address {0} does not have a shielded account")]
    NoShieldedAccount(String),

    #[error("insufficient balance: have {have}, requested {requested}")]
    InsufficientBalance { have: u64, requested: u64 },

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Prover(#[from] ProverError),

    #[error(transparent)]
    Shuffle(#[from] ShuffleError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoShieldedAccount(_) => ErrorKind::NotFound,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Keystore(KeystoreError::AccountNotFound(_) | KeystoreError::MappingNotFound(_)) => {
                ErrorKind::NotFound
            }
            Self::Keystore(KeystoreError::Io(_) | KeystoreError::Json(_)) => ErrorKind::StorageFailure,
            Self::Keystore(_) => ErrorKind::CryptoFailure,
            Self::Cache(CacheError::FileNotFound(_) | CacheError::FileNotWellFormed(_)) => {
                ErrorKind::InvalidInput
            }
            Self::Cache(_) => ErrorKind::CryptoFailure,
            Self::Prover(_) => ErrorKind::CryptoFailure,
            Self::Shuffle(_) => ErrorKind::InvalidInput,
            Self::Wallet(WalletError::SignerNotFound(_)) => ErrorKind::NotFound,
            Self::Wallet(
                WalletError::InvalidIndex(_)
                | WalletError::MissingParameter(_)
                | WalletError::PayloadNotAnObject
                | WalletError::InvalidNonceHex(_),
            ) => ErrorKind::InvalidInput,
            Self::Wallet(_) => ErrorKind::StorageFailure,
            Self::Chain(_) => ErrorKind::RpcFailure,
        }
    }
}
