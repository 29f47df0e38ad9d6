//! Property-based tests for the repository record.
//!
//! These tests verify properties that must always hold:
//! - Flipping any bit of the artifact or the signature is detected as an
//!   integrity failure
//! - Text artifacts survive storage in the negotiated charset
//! - Binary artifacts survive base64 armor

mod common;

use std::sync::Arc;

use common::{BinaryCodec, Utf16JsonCodec};
use licensor_keystore::{KeyPair, SignatureAlgorithm, SigningEngine, VerifyingEngine};
use licensor_license::{
    Codec, ErrorKind, JsonCodec, License, Repository, RepositoryController,
};
use proptest::prelude::*;
use serde_json::Value;

// =============================================================================
// HELPERS
// =============================================================================

fn engines() -> (SigningEngine, VerifyingEngine) {
    let pair = KeyPair::generate(SignatureAlgorithm::Ed25519);
    (
        SigningEngine::new(SignatureAlgorithm::Ed25519, pair.private_key).unwrap(),
        VerifyingEngine::new(SignatureAlgorithm::Ed25519, pair.public_key).unwrap(),
    )
}

fn signed(codec: Arc<dyn Codec>, value: &Value) -> (Repository, VerifyingEngine) {
    let (signer, verifier) = engines();
    let mut controller = RepositoryController::new(codec, Repository::default());
    controller.sign(&signer, value).unwrap();
    (controller.into_model(), verifier)
}

fn acme() -> Value {
    serde_json::to_value(License {
        subject: Some("Acme 1".into()),
        holder: Some("CN=Alice".into()),
        consumer_amount: 3,
        ..Default::default()
    })
    .unwrap()
}

/// Flips one bit below the high bit, so ASCII text stays ASCII.
fn flip(text: &str, index: usize, bit: u8) -> String {
    let mut bytes = text.as_bytes().to_vec();
    let i = index % bytes.len();
    bytes[i] ^= 1 << bit;
    String::from_utf8(bytes).unwrap()
}

// =============================================================================
// TAMPER PROPERTIES
// =============================================================================

mod tamper_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn flipped_artifact_bit_is_integrity_failure(index in any::<usize>(), bit in 0u8..7) {
            let (mut model, verifier) = signed(Arc::new(JsonCodec), &acme());
            model.artifact = flip(&model.artifact, index, bit);
            let controller = RepositoryController::new(Arc::new(JsonCodec), model);
            let err = controller.verify(&verifier).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Integrity);
        }

        #[test]
        fn flipped_signature_bit_is_integrity_failure(index in any::<usize>(), bit in 0u8..7) {
            let (mut model, verifier) = signed(Arc::new(JsonCodec), &acme());
            model.signature = flip(&model.signature, index, bit);
            let controller = RepositoryController::new(Arc::new(JsonCodec), model);
            let err = controller.verify(&verifier).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Integrity);
        }
    }
}

// =============================================================================
// CHARSET PROPERTIES
// =============================================================================

mod charset_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn utf16_artifact_is_lossless(text in any::<String>()) {
            let value = Value::String(text);
            let (model, verifier) = signed(Arc::new(Utf16JsonCodec), &value);
            let controller = RepositoryController::new(Arc::new(Utf16JsonCodec), model);
            let decoded: Value = controller.verify(&verifier).unwrap().decode().unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn binary_artifact_is_lossless(text in any::<String>()) {
            let value = Value::String(text);
            let (model, verifier) = signed(Arc::new(BinaryCodec), &value);
            prop_assert!(model.artifact.is_ascii());
            let controller = RepositoryController::new(Arc::new(BinaryCodec), model);
            let decoded: Value = controller.verify(&verifier).unwrap().decode().unwrap();
            prop_assert_eq!(decoded, value);
        }
    }
}
