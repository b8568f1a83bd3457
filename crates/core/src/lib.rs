pub mod cache;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod group;
pub mod keystore;
pub mod orchestrator;
pub mod prover;
pub mod shuffler;
pub mod wallet;
