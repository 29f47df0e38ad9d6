//! Signature engines and key stores for Licensor.
//!
//! A key store of type `LKS` holds two kinds of entries, addressed by alias:
//! - private key entries: a sealed private key plus its certificate
//! - trusted certificate entries: a certificate only
//!
//! Vendors keep a store with the private key entry. Consumer applications
//! ship a store with the trusted certificate, which is all they need to
//! verify license keys.
//!
//! # Algorithms
//!
//! - `Ed25519` (default)
//! - `SHA256withECDSA` over secp256k1

mod certificate;
mod error;
mod keystore;
mod signing;

pub use certificate::Certificate;
pub use error::{KeyStoreError, KeyStoreResult};
pub use keystore::{Entry, KeyStore, STORE_TYPE};
pub use signing::{
    ED25519, KeyPair, PrivateKey, PublicKey, SHA256_WITH_ECDSA, SignatureAlgorithm, SigningEngine,
    VerifyingEngine,
};
