//! Orchestrator adapters.

pub mod token_verifier;
pub mod transport_publisher;

pub use token_verifier::StaticTokenVerifier;
pub use transport_publisher::TransportPublisher;
