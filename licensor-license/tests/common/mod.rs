//! Shared fixtures for license manager tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use licensor_crypto::{KdfParams, Password, StaticPasswordProtection};
use licensor_keystore::{Certificate, KeyPair, KeyStore, SignatureAlgorithm};
use licensor_license::{
    BasicConsumerLicenseManager, Charset, Clock, Codec, Format, LicenseManagementContext,
    LicenseResult, MemoryStore, Notary, Source, Store, VendorLicenseManager,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

pub const SUBJECT: &str = "Acme 1";
pub const ALIAS: &str = "acme";
pub const STORE_PASSWORD: &str = "storepass1";
pub const KEY_PASSWORD: &str = "keypass1";
pub const LICENSE_PASSWORD: &str = "license1";

/// 2030-01-01T00:00:00Z, the reference time of most tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

pub fn protection(secret: &str) -> Arc<StaticPasswordProtection> {
    Arc::new(StaticPasswordProtection::new(secret))
}

/// Routes manager logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}

// ── Clock ──────────────────────────────────────────────────────

/// A clock which only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Stores ─────────────────────────────────────────────────────

/// Counts how often its content gets read.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Source for CountingStore {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.content()
    }
}

impl Store for CountingStore {
    fn set_content(&self, content: &[u8]) -> LicenseResult<()> {
        self.inner.set_content(content)
    }

    fn delete(&self) -> LicenseResult<()> {
        self.inner.delete()
    }

    fn exists(&self) -> LicenseResult<bool> {
        self.inner.exists()
    }
}

// ── Codecs ─────────────────────────────────────────────────────

/// JSON text in UTF-16.
pub struct Utf16JsonCodec;

impl Codec for Utf16JsonCodec {
    fn content_type(&self) -> &str {
        "application/json; charset=UTF-16"
    }

    fn content_transfer_encoding(&self) -> &str {
        "8bit"
    }

    fn encode(&self, value: &Value) -> LicenseResult<Vec<u8>> {
        Charset::Utf16.encode(&serde_json::to_string(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<Value> {
        Ok(serde_json::from_str(&Charset::Utf16.decode(bytes)?)?)
    }
}

/// JSON scrambled into bytes which are not valid text in any charset.
pub struct BinaryCodec;

const SCRAMBLE: u8 = 0xa5;

impl Codec for BinaryCodec {
    fn content_type(&self) -> &str {
        "application/x-licensor-binary"
    }

    fn content_transfer_encoding(&self) -> &str {
        "binary"
    }

    fn encode(&self, value: &Value) -> LicenseResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?
            .into_iter()
            .map(|b| b ^ SCRAMBLE)
            .collect())
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<Value> {
        let plain: Vec<u8> = bytes.iter().map(|b| b ^ SCRAMBLE).collect();
        Ok(serde_json::from_slice(&plain)?)
    }
}

// ── Key stores ─────────────────────────────────────────────────

/// The vendor's private key store and the public key store shipped to
/// consumers, both serialized.
pub struct KeyStores {
    pub private: Arc<MemoryStore>,
    pub public: Arc<MemoryStore>,
}

pub fn key_stores(algorithm: SignatureAlgorithm) -> KeyStores {
    let pair = KeyPair::generate(algorithm);
    let certificate = Certificate::self_signed("CN=Acme Vendor", &pair.private_key, t0()).unwrap();

    let mut private = KeyStore::empty().with_kdf(KdfParams::fast());
    private
        .set_key_entry(
            ALIAS,
            &pair.private_key,
            certificate.clone(),
            &Password::from(KEY_PASSWORD),
        )
        .unwrap();

    let mut public = KeyStore::empty();
    public.set_certificate_entry(ALIAS, certificate).unwrap();

    let password = Password::from(STORE_PASSWORD);
    KeyStores {
        private: Arc::new(MemoryStore::with_content(private.to_bytes(&password).unwrap())),
        public: Arc::new(MemoryStore::with_content(public.to_bytes(&password).unwrap())),
    }
}

// ── Managers ───────────────────────────────────────────────────

pub struct Setup {
    pub clock: Arc<ManualClock>,
    pub keys: KeyStores,
    pub context: LicenseManagementContext,
}

pub fn setup() -> Setup {
    setup_with(|builder| builder)
}

/// Builds a context with fast key derivation, a manual clock at [`t0`] and
/// whatever `customize` adds.
pub fn setup_with(
    customize: impl FnOnce(
        licensor_license::LicenseManagementContextBuilder,
    ) -> licensor_license::LicenseManagementContextBuilder,
) -> Setup {
    init_tracing();
    let clock = ManualClock::new(t0());
    let builder = LicenseManagementContext::builder()
        .subject(SUBJECT)
        .format(Format::Current)
        .kdf(KdfParams::fast())
        .clock(clock.clone());
    Setup {
        clock,
        keys: key_stores(SignatureAlgorithm::Ed25519),
        context: customize(builder).build().unwrap(),
    }
}

impl Setup {
    pub fn vendor_notary(&self) -> Notary {
        self.context
            .notary()
            .alias(ALIAS)
            .source(self.keys.private.clone())
            .store_protection(protection(STORE_PASSWORD))
            .key_protection(protection(KEY_PASSWORD))
            .build()
            .unwrap()
    }

    pub fn consumer_notary(&self) -> Notary {
        self.context
            .notary()
            .alias(ALIAS)
            .source(self.keys.public.clone())
            .store_protection(protection(STORE_PASSWORD))
            .build()
            .unwrap()
    }

    pub fn vendor(&self) -> VendorLicenseManager {
        self.context
            .vendor()
            .authentication(Arc::new(self.vendor_notary()))
            .encryption_protection(protection(LICENSE_PASSWORD))
            .build()
            .unwrap()
    }

    pub fn consumer(&self, store: Arc<dyn Store>) -> BasicConsumerLicenseManager {
        self.context
            .consumer()
            .authentication(Arc::new(self.consumer_notary()))
            .encryption_protection(protection(LICENSE_PASSWORD))
            .store(store)
            .build()
            .unwrap()
    }
}

pub fn cache_period(period: Duration) -> Setup {
    setup_with(|builder| builder.cache_period(period))
}
