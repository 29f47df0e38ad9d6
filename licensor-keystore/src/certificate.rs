//! Self-signed certificates binding a subject to a public key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::signing::{PrivateKey, PublicKey, SignatureAlgorithm, SigningEngine};

/// A public key certificate.
///
/// `algorithm` is the signature algorithm of the certificate's own
/// signature, which is also the algorithm of the certified key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject: String,
    pub algorithm: String,
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
    pub signature: String,
}

impl Certificate {
    /// Creates a certificate for the key's public half, signed by the key
    /// itself.
    pub fn self_signed(
        subject: impl Into<String>,
        key: &PrivateKey,
        issued_at: DateTime<Utc>,
    ) -> KeyStoreResult<Self> {
        let mut cert = Self {
            subject: subject.into(),
            algorithm: key.algorithm().name().to_string(),
            public_key: STANDARD.encode(key.public_key().to_bytes()),
            issued_at,
            signature: String::new(),
        };
        let engine = SigningEngine::new(key.algorithm(), key.clone())?;
        cert.signature = STANDARD.encode(engine.sign(&cert.to_be_signed()));
        Ok(cert)
    }

    /// Parses the signature algorithm.
    pub fn signature_algorithm(&self) -> KeyStoreResult<SignatureAlgorithm> {
        SignatureAlgorithm::from_name(&self.algorithm)
    }

    /// Decodes the certified public key.
    pub fn public_key(&self) -> KeyStoreResult<PublicKey> {
        let bytes = STANDARD.decode(&self.public_key)?;
        PublicKey::from_bytes(self.signature_algorithm()?, &bytes)
    }

    /// Checks the self-signature.
    pub fn verify(&self) -> KeyStoreResult<()> {
        let key = self.public_key()?;
        let signature = STANDARD.decode(&self.signature)?;
        if key.verify(&self.to_be_signed(), &signature) {
            Ok(())
        } else {
            Err(KeyStoreError::InvalidCertificate(format!(
                "bad signature for subject {}",
                self.subject
            )))
        }
    }

    fn to_be_signed(&self) -> Vec<u8> {
        format!(
            "{}\n{}\n{}\n{}",
            self.subject,
            self.algorithm,
            self.public_key,
            self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
        .into_bytes()
    }
}
