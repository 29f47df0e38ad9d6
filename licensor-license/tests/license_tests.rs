mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{
    ALIAS, BinaryCodec, LICENSE_PASSWORD, STORE_PASSWORD, SUBJECT, Utf16JsonCodec, protection,
    setup, setup_with, t0,
};
use licensor_crypto::{AES_256_GCM, CryptoError, PermissivePasswordPolicy};
use licensor_keystore::SignatureAlgorithm;
use licensor_license::{
    ConsumerLicenseManager, ErrorKind, FileStore, Format, License, LicenseError, MemoryStore,
    Source, Store, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn acme() -> License {
    License {
        not_after: Some(t0() + Duration::days(30)),
        info: Some("Pro edition".into()),
        extra: Some(json!({"features": ["export", "sync"]})),
        ..Default::default()
    }
}

// ── Round trip ─────────────────────────────────────────────────

#[test]
fn generated_key_installs_and_loads() {
    let setup = setup();
    let generator = setup.vendor().generate_key_from(&acme()).unwrap();

    let issued = generator.license();
    assert_eq!(issued.subject.as_deref(), Some(SUBJECT));
    assert_eq!(issued.issuer.as_deref(), Some("CN=Acme 1"));
    assert_eq!(issued.holder.as_deref(), Some("CN=unknown"));
    assert_eq!(issued.issued, Some(t0()));
    assert_eq!(issued.consumer_amount, 1);

    let store = Arc::new(MemoryStore::new());
    let consumer = setup.consumer(store.clone());
    consumer.install(&generator.to_bytes()).unwrap();

    assert_eq!(&consumer.load().unwrap(), issued);
    assert_eq!(&consumer.view().unwrap(), issued);
    consumer.verify().unwrap();
    assert_eq!(store.content().unwrap(), generator.to_bytes());
}

#[test]
fn template_is_not_modified() {
    let setup = setup();
    let template = acme();
    setup.vendor().generate_key_from(&template).unwrap();
    assert_eq!(template, acme());
}

#[test]
fn each_key_uses_fresh_cipher_parameters() {
    let setup = setup();
    let vendor = setup.vendor();
    let first = vendor.generate_key_from(&acme()).unwrap().to_bytes();
    let second = vendor.generate_key_from(&acme()).unwrap().to_bytes();
    assert_ne!(first, second);
}

#[test]
fn ecdsa_keys_round_trip() {
    let mut setup = setup();
    setup.keys = common::key_stores(SignatureAlgorithm::EcdsaSecp256k1);
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));
    consumer.install(&key).unwrap();
    consumer.verify().unwrap();
}

#[test]
fn aes_gcm_round_trip() {
    let setup = setup_with(|b| b.encryption_algorithm(AES_256_GCM));
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));
    consumer.install(&key).unwrap();
}

#[test]
fn legacy_format_round_trip() {
    let setup = setup_with(|b| b.format(Format::Legacy));
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));
    consumer.install(&key).unwrap();
    assert_eq!(consumer.load().unwrap().info.as_deref(), Some("Pro edition"));
}

#[test]
fn current_format_cannot_read_legacy_keys() {
    let legacy = setup_with(|b| b.format(Format::Legacy));
    let key = legacy.vendor().generate_key_from(&acme()).unwrap().to_bytes();

    let mut current = setup();
    current.keys = legacy.keys;
    let consumer = current.consumer(Arc::new(MemoryStore::new()));
    assert!(consumer.install(&key).is_err());
}

// ── Scenario ───────────────────────────────────────────────────

#[test]
fn acme_license_expires_after_thirty_days() {
    let setup = setup_with(|b| b.cache_period(std::time::Duration::ZERO));
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));

    setup.clock.set(t0() + Duration::days(1));
    consumer.install(&key).unwrap();
    consumer.verify().unwrap();

    setup.clock.set(t0() + Duration::days(31));
    let err = consumer.verify().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert!(matches!(
        err.cause(),
        LicenseError::Validation(ValidationError::Expired { .. })
    ));
    assert_eq!(err.message(), "The license key has expired.");

    // Viewing still works for presentation.
    assert_eq!(consumer.view().unwrap().subject.as_deref(), Some(SUBJECT));
}

#[test]
fn corrupt_key_never_succeeds() {
    let setup = setup();
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let header = 30..42;
    let indices = [0, 1, 2, 10, key.len() / 2, key.len() - 1]
        .into_iter()
        .chain(header);
    for index in indices {
        let mut corrupt = key.clone();
        corrupt[index] ^= 0x01;
        let consumer = setup.consumer(Arc::new(MemoryStore::new()));
        let err = consumer.install(&corrupt).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::Integrity | ErrorKind::Io),
            "byte {index}: {:?}",
            err.kind()
        );
    }
}

#[test]
fn corrupt_key_derivation_header_is_format_error() {
    let setup = setup();
    let key = setup
        .vendor()
        .generate_key_from(&License::default())
        .unwrap()
        .to_bytes();
    for memory_cost in [0u32, 4] {
        let mut corrupt = key.clone();
        corrupt[30..34].copy_from_slice(&memory_cost.to_be_bytes());
        let consumer = setup.consumer(Arc::new(MemoryStore::new()));
        let err = consumer.install(&corrupt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io, "memory cost {memory_cost}");
        assert!(matches!(
            err.cause(),
            LicenseError::Crypto(CryptoError::InvalidParameters(_))
        ));
    }
}

#[test]
fn expired_key_cannot_be_generated() {
    let setup = setup();
    let license = License {
        not_after: Some(t0() - Duration::days(1)),
        ..Default::default()
    };
    let err = setup.vendor().generate_key_from(&license).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
}

// ── Install and uninstall ──────────────────────────────────────

#[test]
fn failed_install_writes_nothing() {
    let setup = setup();
    let store = Arc::new(MemoryStore::new());
    let consumer = setup.consumer(store.clone());

    assert!(consumer.install(&b"garbage".to_vec()).is_err());
    assert!(!store.exists().unwrap());

    let foreign = setup_with(|b| b.subject("Other Product"));
    let key = foreign.vendor().generate_key_from(&License::default()).unwrap();
    assert!(consumer.install(&key.to_bytes()).is_err());
    assert!(!store.exists().unwrap());
}

#[test]
fn install_rejects_license_for_other_subject() {
    let setup = setup();
    let mut other = setup_with(|b| b.subject("Acme 2"));
    // Share the key pair so that only the subject differs.
    other.keys = common::KeyStores {
        private: setup.keys.private.clone(),
        public: setup.keys.public.clone(),
    };
    let key = other.vendor().generate_key_from(&License::default()).unwrap();

    let err = setup
        .consumer(Arc::new(MemoryStore::new()))
        .install(&key.to_bytes())
        .unwrap_err();
    assert!(matches!(
        err.cause(),
        LicenseError::Validation(ValidationError::InvalidSubject { .. })
    ));
}

#[test]
fn install_from_other_vendor_is_integrity_failure() {
    let setup = setup();
    let mut impostor = common::setup();
    impostor.keys = common::key_stores(SignatureAlgorithm::Ed25519);
    let key = impostor.vendor().generate_key_from(&acme()).unwrap();

    let err = setup
        .consumer(Arc::new(MemoryStore::new()))
        .install(&key.to_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(
        err.message(),
        "The license key has been tampered with or is corrupt."
    );
}

#[test]
fn uninstall_deletes_key() {
    let setup = setup();
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let store = Arc::new(MemoryStore::new());
    let consumer = setup.consumer(store.clone());
    consumer.install(&key).unwrap();

    consumer.uninstall().unwrap();
    assert!(!store.exists().unwrap());
    assert_eq!(consumer.load().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(consumer.uninstall().unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn uninstall_refuses_unauthentic_key() {
    let setup = setup();
    let store = Arc::new(MemoryStore::with_content(b"not a license key".to_vec()));
    let consumer = setup.consumer(store.clone());
    assert!(consumer.uninstall().is_err());
    assert!(store.exists().unwrap());
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup();
    let generator = setup.vendor().generate_key_from(&acme()).unwrap();
    let key_file = FileStore::new(dir.path().join("acme.key"));
    generator.save_to(&key_file).unwrap();

    let installed = Arc::new(FileStore::new(dir.path().join("installed").join("acme.lic")));
    let consumer = setup.consumer(installed.clone());
    consumer.install(&key_file).unwrap();
    assert!(installed.exists().unwrap());
    assert_eq!(&consumer.load().unwrap(), generator.license());
}

// ── Charsets ───────────────────────────────────────────────────

#[test]
fn utf16_codec_round_trips_non_ascii() {
    let setup = setup_with(|b| b.codec(Arc::new(Utf16JsonCodec)));
    let license = License {
        holder: Some("CN=Jürgen Müller 日本".into()),
        info: Some("😀 emoji".into()),
        ..acme()
    };
    let key = setup.vendor().generate_key_from(&license).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));
    consumer.install(&key).unwrap();
    let loaded = consumer.load().unwrap();
    assert_eq!(loaded.holder, license.holder);
    assert_eq!(loaded.info, license.info);
}

#[test]
fn binary_codec_round_trips_through_base64() {
    let setup = setup_with(|b| b.codec(Arc::new(BinaryCodec)));
    let license = License {
        holder: Some("CN=Ærøskøbing".into()),
        ..acme()
    };
    let key = setup.vendor().generate_key_from(&license).unwrap().to_bytes();
    let consumer = setup.consumer(Arc::new(MemoryStore::new()));
    consumer.install(&key).unwrap();
    assert_eq!(consumer.load().unwrap().holder, license.holder);
}

// ── Configuration ──────────────────────────────────────────────

#[test]
fn wrong_license_password_fails() {
    let setup = setup();
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let consumer = setup
        .context
        .consumer()
        .authentication(Arc::new(setup.consumer_notary()))
        .encryption_protection(protection("license2"))
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();
    let err = consumer.install(&key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn weak_license_password_is_rejected_on_generation() {
    let setup = setup();
    let vendor = setup
        .context
        .vendor()
        .authentication(Arc::new(setup.vendor_notary()))
        .encryption_protection(protection("weak"))
        .build()
        .unwrap();
    let err = vendor.generate_key_from(&acme()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert_eq!(err.message(), "The password is too weak.");
}

#[test]
fn permissive_policy_accepts_weak_password() {
    let setup = setup_with(|b| b.password_policy(Arc::new(PermissivePasswordPolicy)));
    let vendor = setup
        .context
        .vendor()
        .authentication(Arc::new(setup.vendor_notary()))
        .encryption_protection(protection("weak"))
        .build()
        .unwrap();
    assert!(vendor.generate_key_from(&acme()).is_ok());
}

#[test]
fn consumer_key_store_cannot_sign() {
    let setup = setup();
    let vendor = setup
        .context
        .vendor()
        .authentication(Arc::new(setup.consumer_notary()))
        .encryption_protection(protection(LICENSE_PASSWORD))
        .build()
        .unwrap();
    let err = vendor.generate_key_from(&acme()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err.cause(), LicenseError::NoPrivateKey(alias) if alias == ALIAS));
}

#[test]
fn unknown_alias_is_no_such_entry() {
    let setup = setup();
    let notary = setup
        .context
        .notary()
        .alias("nobody")
        .source(setup.keys.public.clone())
        .store_protection(protection(STORE_PASSWORD))
        .build()
        .unwrap();
    let consumer = setup
        .context
        .consumer()
        .authentication(Arc::new(notary))
        .encryption_protection(protection(LICENSE_PASSWORD))
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let err = consumer.install(&key).unwrap_err();
    assert!(matches!(err.cause(), LicenseError::NoSuchEntry(_)));
}

#[test]
fn pinned_algorithm_mismatch_is_configuration_error() {
    let setup = setup();
    let key = setup.vendor().generate_key_from(&acme()).unwrap().to_bytes();
    let notary = setup
        .context
        .notary()
        .alias(ALIAS)
        .algorithm("SHA256withECDSA")
        .source(setup.keys.public.clone())
        .store_protection(protection(STORE_PASSWORD))
        .build()
        .unwrap();
    let consumer = setup
        .context
        .consumer()
        .authentication(Arc::new(notary))
        .encryption_protection(protection(LICENSE_PASSWORD))
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();
    let err = consumer.install(&key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn missing_key_store_source_is_configuration_error() {
    let setup = setup();
    let notary = setup
        .context
        .notary()
        .alias(ALIAS)
        .source(Arc::new(MemoryStore::new()))
        .store_protection(protection(STORE_PASSWORD))
        .build()
        .unwrap();
    let err = notary.keystore().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn builders_require_their_parts() {
    let setup = setup();
    assert!(setup.context.vendor().build().is_err());
    assert!(
        setup
            .context
            .vendor()
            .authentication(Arc::new(setup.vendor_notary()))
            .build()
            .is_err()
    );
    assert!(setup.context.consumer().build().is_err());
    assert!(setup.context.notary().build().is_err());
    assert!(setup.context.notary().alias(ALIAS).build().is_err());
}
