use licensor_crypto::{
    CryptoError, DerivedKey, KdfParams, MAX_MEMORY_COST, Password, Salt, derive_key,
    derive_key_material,
};

fn test_params() -> KdfParams {
    KdfParams::fast()
}

fn pw(s: &str) -> Password {
    Password::from(s)
}

// ── derive_key ───────────────────────────────────────────────────

#[test]
fn derive_key_produces_consistent_results() {
    let salt = Salt::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    let params = test_params();
    let key1 = derive_key(&pw("test_password_123"), &salt, &params).unwrap();
    let key2 = derive_key(&pw("test_password_123"), &salt, &params).unwrap();
    assert_eq!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn different_passwords_produce_different_keys() {
    let salt = Salt::from_bytes([1; 16]);
    let params = test_params();
    let key1 = derive_key(&pw("password1"), &salt, &params).unwrap();
    let key2 = derive_key(&pw("password2"), &salt, &params).unwrap();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn different_salts_produce_different_keys() {
    let params = test_params();
    let salt1 = Salt::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    let salt2 = Salt::from_bytes([16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
    let key1 = derive_key(&pw("same_password"), &salt1, &params).unwrap();
    let key2 = derive_key(&pw("same_password"), &salt2, &params).unwrap();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn derive_key_different_params_produce_different_keys() {
    let salt = Salt::from_bytes([1; 16]);
    let params2 = KdfParams {
        memory_cost: 2048,
        ..test_params()
    };
    let key1 = derive_key(&pw("same_password"), &salt, &test_params()).unwrap();
    let key2 = derive_key(&pw("same_password"), &salt, &params2).unwrap();
    assert_ne!(key1.as_bytes(), key2.as_bytes());
}

#[test]
fn derive_key_unicode_password() {
    let salt = Salt::from_bytes([9; 16]);
    let key = derive_key(&pw("p\u{00e4}ssw\u{00f6}rd\u{1f600}"), &salt, &test_params()).unwrap();
    assert_eq!(key.as_bytes().len(), 32);
}

#[test]
fn derive_key_matches_material_of_same_length() {
    let salt = Salt::from_bytes([3; 16]);
    let key = derive_key(&pw("material1"), &salt, &test_params()).unwrap();
    let mut material = [0u8; 32];
    derive_key_material(&pw("material1"), salt.as_bytes(), &test_params(), &mut material).unwrap();
    assert_eq!(key.as_bytes(), &material);
}

#[test]
fn derive_key_material_accepts_short_salt() {
    let mut out = [0u8; 44];
    derive_key_material(&pw("legacy123"), &[0xce; 8], &test_params(), &mut out).unwrap();
    assert!(out.iter().any(|&b| b != 0));
}

#[test]
fn derive_key_invalid_params_zero_time_cost() {
    let salt = Salt::from_bytes([1; 16]);
    let bad = KdfParams {
        time_cost: 0,
        ..test_params()
    };
    assert!(derive_key(&pw("pw"), &salt, &bad).is_err());
}

#[test]
fn derive_key_invalid_params_zero_parallelism() {
    let salt = Salt::from_bytes([1; 16]);
    let bad = KdfParams {
        parallelism: 0,
        ..test_params()
    };
    assert!(derive_key(&pw("pw"), &salt, &bad).is_err());
}

// ── DerivedKey ───────────────────────────────────────────────────

#[test]
fn derived_key_from_bytes_roundtrip() {
    let bytes = [42u8; 32];
    let key = DerivedKey::from_bytes(bytes);
    assert_eq!(*key.as_bytes(), bytes);
}

#[test]
fn key_debug_does_not_leak_bytes() {
    let key = DerivedKey::from_bytes([0xab; 32]);
    let debug = format!("{:?}", key);
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains(&format!("{:?}", key.as_bytes())));
}

// ── Salt ─────────────────────────────────────────────────────────

#[test]
fn salt_random_produces_unique() {
    assert_ne!(Salt::random(), Salt::random());
}

#[test]
fn salt_from_bytes_roundtrip() {
    let bytes = [7u8; 16];
    assert_eq!(*Salt::from_bytes(bytes).as_bytes(), bytes);
}

// ── KdfParams ────────────────────────────────────────────────────

#[test]
fn kdf_params_default() {
    let params = KdfParams::default();
    assert_eq!(params.memory_cost, 19 * 1024);
    assert_eq!(params.time_cost, 2);
    assert_eq!(params.parallelism, 1);
    assert!(params.check_bounds().is_ok());
}

#[test]
fn kdf_params_fast_values() {
    let p = KdfParams::fast();
    assert_eq!(p.memory_cost, 1024);
    assert_eq!(p.time_cost, 1);
    assert_eq!(p.parallelism, 1);
}

#[test]
fn check_bounds_rejects_excessive_memory() {
    let p = KdfParams {
        memory_cost: MAX_MEMORY_COST + 1,
        ..test_params()
    };
    assert!(p.check_bounds().is_err());
}

#[test]
fn check_bounds_rejects_memory_below_lane_minimum() {
    let p = KdfParams {
        memory_cost: 8 * 2 - 1,
        time_cost: 1,
        parallelism: 2,
    };
    assert!(matches!(p.check_bounds(), Err(CryptoError::InvalidParameters(_))));
    let p = KdfParams {
        memory_cost: 8 * 2,
        ..p
    };
    assert!(p.check_bounds().is_ok());
}

#[test]
fn check_bounds_rejects_zero_time_cost() {
    let p = KdfParams {
        time_cost: 0,
        ..test_params()
    };
    assert!(p.check_bounds().is_err());
}
