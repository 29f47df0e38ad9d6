//! The tamper evident repository record.
//!
//! A [`Repository`] binds the encoded form of an object to a signature and
//! the name of the signature algorithm. [`RepositoryController`] signs an
//! object into a record and verifies a record back into the object's bytes.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use licensor_keystore::{SigningEngine, VerifyingEngine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::charset::content_transfer_charset;
use crate::codec::{Codec, Decoder};
use crate::error::{LicenseError, LicenseResult};

/// The signed wire record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub algorithm: String,
    /// The encoded object as charset text, or base64 for binary codecs.
    pub artifact: String,
    /// Base64 encoded signature.
    pub signature: String,
}

/// Signs into and verifies a [`Repository`] using a codec.
pub struct RepositoryController {
    codec: Arc<dyn Codec>,
    model: Repository,
}

impl RepositoryController {
    pub fn new(codec: Arc<dyn Codec>, model: Repository) -> Self {
        Self { codec, model }
    }

    #[must_use]
    pub fn model(&self) -> &Repository {
        &self.model
    }

    pub fn into_model(self) -> Repository {
        self.model
    }

    /// Encodes and signs `artifact`, replacing the record's content.
    ///
    /// The returned decoder replays the encoded bytes.
    pub fn sign(&mut self, engine: &SigningEngine, artifact: &Value) -> LicenseResult<Decoder> {
        let bytes = self.codec.encode(artifact)?;
        let signature = engine.sign(&bytes);
        let text = match content_transfer_charset(self.codec.as_ref())? {
            Some(charset) => {
                let text = charset.decode(&bytes)?;
                if charset.encode(&text)? != bytes {
                    return Err(LicenseError::Charset(format!(
                        "encoded artifact does not survive a round trip through {charset}"
                    )));
                }
                text
            }
            None => STANDARD.encode(&bytes),
        };
        self.model = Repository {
            algorithm: engine.algorithm().to_string(),
            artifact: text,
            signature: STANDARD.encode(signature),
        };
        debug!(algorithm = engine.algorithm(), len = bytes.len(), "Signed artifact");
        Ok(Decoder::new(self.codec.clone(), bytes))
    }

    /// Checks the record's signature and returns a decoder for the artifact.
    ///
    /// Fails with [`LicenseError::AlgorithmMismatch`] before touching the
    /// signature if the engine uses another algorithm than the record, and
    /// with [`LicenseError::RepositoryIntegrity`] if the artifact or the
    /// signature have been altered.
    pub fn verify(&self, engine: &VerifyingEngine) -> LicenseResult<Decoder> {
        if !engine.algorithm().eq_ignore_ascii_case(&self.model.algorithm) {
            return Err(LicenseError::AlgorithmMismatch {
                expected: engine.algorithm().to_string(),
                actual: self.model.algorithm.clone(),
            });
        }
        let bytes = match content_transfer_charset(self.codec.as_ref())? {
            Some(charset) => charset
                .encode(&self.model.artifact)
                .map_err(|_| LicenseError::RepositoryIntegrity)?,
            None => STANDARD
                .decode(&self.model.artifact)
                .map_err(|_| LicenseError::RepositoryIntegrity)?,
        };
        let signature = STANDARD
            .decode(&self.model.signature)
            .map_err(|_| LicenseError::RepositoryIntegrity)?;
        if !engine.verify(&bytes, &signature) {
            return Err(LicenseError::RepositoryIntegrity);
        }
        Ok(Decoder::new(self.codec.clone(), bytes))
    }
}
