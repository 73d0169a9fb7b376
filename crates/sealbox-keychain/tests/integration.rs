//! Integration tests for the sealbox-keychain crate.
//!
//! These drive the public API end to end: encrypted round trips over a real
//! preference store, namespace binding, the legacy import and its abort
//! path, the self-test gate and the factory's backend selection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use sealbox_keychain::encoding;
use sealbox_keychain::marker::is_encrypted_content;
use sealbox_keychain::{
    AeadCipher, AesGcmCipher, EncryptedKeychain, FactoryMode, FileKeyProvider, Keychain,
    KeychainConfig, KeychainError, KeychainFactory, LegacyKeychain, MemoryKeyProvider, Result,
    SymmetricKey, VERSION, VERSION_KEY, verify_keystore_encryption,
};
use sealbox_prefs::{PrefValue, PreferenceStore};

// ═══════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════

/// AES-GCM that fails the `fail_on`-th seal (1-based) and every seal after.
struct FailingCipher {
    seals: AtomicUsize,
    fail_on: usize,
}

impl FailingCipher {
    fn new(fail_on: usize) -> Self {
        Self {
            seals: AtomicUsize::new(0),
            fail_on,
        }
    }
}

impl AeadCipher for FailingCipher {
    fn seal(&self, plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
        let n = self.seals.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.fail_on {
            return Err(KeychainError::SealFailed {
                reason: format!("injected failure on seal #{n}"),
            });
        }
        AesGcmCipher.seal(plaintext, key, aad)
    }

    fn open(&self, envelope: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
        AesGcmCipher.open(envelope, key, aad)
    }
}

fn encrypted(store: &PreferenceStore, id: &str, provider: &Arc<MemoryKeyProvider>) -> EncryptedKeychain {
    EncryptedKeychain::new(store, id, provider.clone()).unwrap()
}

fn seed_mixed_legacy(store: &PreferenceStore, id: &str) {
    store
        .namespace(id)
        .unwrap()
        .edit()
        .put_text("pub", &encoding::encode_wrapped(&[0x00, 0xFF]))
        .put_text("name", "bob")
        .put_int("count", 7)
        .apply()
        .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Encrypted keychain
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn basic_round_trip_is_ciphertext_at_rest() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "main", &provider);

    keychain.put_text("user", "alice").unwrap();
    assert_eq!(keychain.get_text("user").unwrap().as_deref(), Some("alice"));

    let raw = store.namespace("main").unwrap().get_text("user").unwrap().unwrap();
    assert!(!raw.contains("alice"));
    let envelope = encoding::decode_stored(&raw).unwrap();
    assert!(envelope.len() >= 28);
    assert!(!envelope.windows(5).any(|w| w == b"alice"));
}

#[test]
fn round_trip_various_payloads() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "payloads", &provider);

    let payloads: Vec<Vec<u8>> = vec![
        vec![0],
        vec![0xFF; 3],
        (0..=255).collect(),
        vec![0x42; 64 * 1024],
        "ünïcødé ✓".as_bytes().to_vec(),
    ];
    for (i, payload) in payloads.iter().enumerate() {
        let key = format!("k{i}");
        keychain.put_bytes(&key, payload).unwrap();
        assert_eq!(keychain.get_bytes(&key).unwrap().as_ref(), Some(payload));
    }
}

#[test]
fn empty_payload_round_trips() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "empty", &provider);

    keychain.put_bytes("nothing", &[]).unwrap();
    assert_eq!(keychain.get_bytes("nothing").unwrap(), Some(Vec::new()));
    assert!(keychain.contains("nothing").unwrap());

    // nonce and tag only
    let raw = store.namespace("empty").unwrap().get_text("nothing").unwrap().unwrap();
    assert_eq!(encoding::decode_stored(&raw).unwrap().len(), 28);
}

#[test]
fn plaintext_never_stored() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "secret", &provider);

    let secret = b"correct horse battery staple";
    keychain.put_bytes("pw", secret).unwrap();

    let raw = store.namespace("secret").unwrap().get_text("pw").unwrap().unwrap();
    let stored = encoding::decode_stored(&raw).unwrap();
    assert!(!stored.windows(secret.len()).any(|w| w == secret));
    assert!(!raw.contains(&encoding::encode(secret)));
}

#[test]
fn envelope_copied_across_namespaces_is_absent() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let a = encrypted(&store, "A", &provider);
    let b = encrypted(&store, "B", &provider);

    a.put_bytes("k", &[0x01, 0x02]).unwrap();
    let raw = a.preferences().get_text("k").unwrap().unwrap();
    b.preferences().edit().put_text("k", &raw).apply().unwrap();

    assert_eq!(b.get_bytes("k").unwrap(), None);
    assert!(!b.contains("k").unwrap());
    assert_eq!(a.get_bytes("k").unwrap(), Some(vec![0x01, 0x02]));
}

#[test]
fn reserved_key_guard_leaves_store_untouched() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "guarded", &provider);
    keychain.remove_all().unwrap();
    keychain.put_text("user", "alice").unwrap();
    let before = keychain.preferences().get_all().unwrap();

    assert!(matches!(
        keychain.put_text(VERSION_KEY, "x"),
        Err(KeychainError::ReservedKey { .. })
    ));
    assert!(keychain.put_bytes(VERSION_KEY, b"x").is_err());
    assert!(keychain.remove(VERSION_KEY).is_err());
    assert!(keychain.get_bytes(VERSION_KEY).is_err());
    assert!(keychain.contains(VERSION_KEY).is_err());

    assert_eq!(keychain.preferences().get_all().unwrap(), before);
    assert!(is_encrypted_content(keychain.preferences()).unwrap());
}

#[test]
fn remove_all_leaves_only_marker() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "wipe", &provider);
    for key in ["a", "b", "c"] {
        keychain.put_text(key, key).unwrap();
    }

    keychain.remove_all().unwrap();

    let all = keychain.preferences().get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get(VERSION_KEY), Some(&PrefValue::Int(VERSION)));
    assert!(keychain.keys().unwrap().is_empty());
}

#[test]
fn failed_write_keeps_prior_value() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "atomic", &provider);
    keychain.put_bytes("k", b"old").unwrap();

    provider.set_available(false);
    keychain.put_bytes("k", b"new").unwrap();
    provider.set_available(true);

    assert_eq!(keychain.get_bytes("k").unwrap(), Some(b"old".to_vec()));
}

#[test]
fn failed_seal_keeps_prior_value() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "atomic", &provider).with_cipher(Arc::new(FailingCipher::new(2)));

    keychain.put_bytes("k", b"old").unwrap();
    keychain.put_bytes("k", b"new").unwrap();
    assert_eq!(keychain.get_bytes("k").unwrap(), Some(b"old".to_vec()));
}

#[test]
fn absent_keys_never_fail() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "absent", &provider);

    assert_eq!(keychain.get_bytes("never").unwrap(), None);
    assert_eq!(keychain.get_text("never").unwrap(), None);

    keychain.put_text("gone", "x").unwrap();
    keychain.remove("gone").unwrap();
    keychain.remove("gone").unwrap();
    assert_eq!(keychain.get_bytes("gone").unwrap(), None);
}

#[test]
fn garbage_in_store_reads_as_absent() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "garbage", &provider);

    keychain
        .preferences()
        .edit()
        .put_text("not_b64", "%%%")
        .put_text("short", &encoding::encode(&[1, 2, 3]))
        .put_int("int", 5)
        .apply()
        .unwrap();

    for key in ["not_b64", "short", "int"] {
        assert_eq!(keychain.get_bytes(key).unwrap(), None, "{key}");
    }
}

#[test]
fn wrong_key_reads_as_absent() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let writer = Arc::new(MemoryKeyProvider::with_key([1u8; 32]));
    let reader = Arc::new(MemoryKeyProvider::with_key([2u8; 32]));

    encrypted(&store, "ns", &writer).put_text("k", "v").unwrap();
    assert_eq!(encrypted(&store, "ns", &reader).get_text("k").unwrap(), None);
}

#[test]
fn concurrent_writers_on_one_namespace() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let factory = Arc::new(KeychainFactory::new(store, Arc::new(MemoryKeyProvider::new())));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || {
                let keychain = factory.keychain("shared").unwrap();
                for i in 0..25 {
                    let key = format!("t{t}-{i}");
                    keychain.put_text(&key, &key).unwrap();
                    assert_eq!(keychain.get_text(&key).unwrap().as_deref(), Some(key.as_str()));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(factory.keychain("shared").unwrap().keys().unwrap().len(), 100);
}

// ═══════════════════════════════════════════════════════════════════════
//  Legacy import
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn mixed_legacy_import() {
    let store = PreferenceStore::open_in_memory().unwrap();
    seed_mixed_legacy(&store, "legacy");
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "legacy", &provider);

    let report = keychain.import_from_preferences().unwrap();
    assert_eq!(report.imported, vec!["name", "pub"]);
    assert_eq!(report.dropped, vec![("count".to_string(), "int")]);

    assert_eq!(keychain.get_bytes("pub").unwrap(), Some(vec![0x00, 0xFF]));
    assert_eq!(keychain.get_text("name").unwrap().as_deref(), Some("bob"));
    assert!(!keychain.contains("count").unwrap());
    assert!(!keychain.preferences().contains("count").unwrap());
    assert!(is_encrypted_content(keychain.preferences()).unwrap());
}

#[test]
fn import_abort_restores_snapshot() {
    let store = PreferenceStore::open_in_memory().unwrap();
    seed_mixed_legacy(&store, "legacy");
    let before = store.namespace("legacy").unwrap().get_all().unwrap();

    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain =
        encrypted(&store, "legacy", &provider).with_cipher(Arc::new(FailingCipher::new(2)));

    let err = keychain.import_from_preferences().unwrap_err();
    assert!(matches!(err, KeychainError::SealFailed { .. }));

    let prefs = store.namespace("legacy").unwrap();
    assert_eq!(prefs.get_all().unwrap(), before);
    assert!(!is_encrypted_content(&prefs).unwrap());
}

#[test]
fn import_classifies_base64_and_plain_text() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "classify", &provider);

    let long_blob: Vec<u8> = (0..120).collect();
    let snapshot = BTreeMap::from([
        ("wrapped".to_string(), encoding::encode_wrapped(&long_blob).into()),
        ("padded".to_string(), "AP8=".into()),
        ("unpadded".to_string(), "AP8".into()),
        ("email".to_string(), "alice@example.com".into()),
    ]);
    let report = keychain.import_legacy(&snapshot).unwrap();

    assert_eq!(report.decoded_base64, vec!["padded", "wrapped"]);
    assert_eq!(keychain.get_bytes("wrapped").unwrap(), Some(long_blob));
    assert_eq!(keychain.get_bytes("padded").unwrap(), Some(vec![0x00, 0xFF]));
    assert_eq!(keychain.get_text("unpadded").unwrap().as_deref(), Some("AP8"));
    assert_eq!(keychain.get_text("email").unwrap().as_deref(), Some("alice@example.com"));
}

#[test]
fn legacy_keychain_contents_survive_import() {
    let store = PreferenceStore::open_in_memory().unwrap();
    let legacy = LegacyKeychain::new(&store, "moved").unwrap();
    legacy.put_text("user", "carol").unwrap();
    legacy.put_bytes("blob", &[9u8; 100]).unwrap();

    let provider = Arc::new(MemoryKeyProvider::new());
    let keychain = encrypted(&store, "moved", &provider);
    keychain.import_from_preferences().unwrap();

    assert_eq!(keychain.get_text("user").unwrap().as_deref(), Some("carol"));
    assert_eq!(keychain.get_bytes("blob").unwrap(), Some(vec![9u8; 100]));
}

// ═══════════════════════════════════════════════════════════════════════
//  Self-test
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn self_test_tracks_round_trips() {
    let provider = MemoryKeyProvider::new();
    assert!(verify_keystore_encryption(&provider, &AesGcmCipher));
    // First seal (empty payload) fails.
    assert!(!verify_keystore_encryption(&provider, &FailingCipher::new(1)));
    // Second seal (non-empty payload) fails.
    assert!(!verify_keystore_encryption(&provider, &FailingCipher::new(2)));

    provider.set_available(false);
    assert!(!verify_keystore_encryption(&provider, &AesGcmCipher));
}

// ═══════════════════════════════════════════════════════════════════════
//  Factory
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn factory_imports_on_first_access() {
    let store = PreferenceStore::open_in_memory().unwrap();
    seed_mixed_legacy(&store, "boot");
    let factory = KeychainFactory::new(store.clone(), Arc::new(MemoryKeyProvider::new()));

    let keychain = factory.keychain("boot").unwrap();
    assert!(keychain.is_encrypted());
    assert_eq!(keychain.get_text("name").unwrap().as_deref(), Some("bob"));
    assert!(is_encrypted_content(&store.namespace("boot").unwrap()).unwrap());
}

#[test]
fn factory_falls_back_when_import_fails() {
    let store = PreferenceStore::open_in_memory().unwrap();
    seed_mixed_legacy(&store, "boot");
    // Self-test uses seals 1 and 2; the import fails on its first seal.
    let factory = KeychainFactory::new(store.clone(), Arc::new(MemoryKeyProvider::new()))
        .with_cipher(Arc::new(FailingCipher::new(3)));

    let keychain = factory.keychain("boot").unwrap();
    assert!(!keychain.is_encrypted());
    assert_eq!(keychain.get_text("name").unwrap().as_deref(), Some("bob"));
    assert!(!is_encrypted_content(&store.namespace("boot").unwrap()).unwrap());
}

#[cfg(not(target_os = "macos"))]
#[test]
fn factory_from_config_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let config = KeychainConfig::default()
        .with_data_dir(dir.path().join("state"))
        .with_mode(FactoryMode::Automatic);

    {
        let factory = KeychainFactory::from_config(&config).unwrap();
        factory.keychain("persist").unwrap().put_text("token", "abc").unwrap();
    }

    let factory = KeychainFactory::from_config(&config).unwrap();
    let keychain = factory.keychain("persist").unwrap();
    assert!(keychain.is_encrypted());
    assert_eq!(keychain.get_text("token").unwrap().as_deref(), Some("abc"));
}

#[test]
fn file_provider_key_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = PreferenceStore::open(dir.path().join("prefs.db")).unwrap();
    let key_file = FileKeyProvider::default_path(dir.path());

    let first = EncryptedKeychain::new(&store, "disk", Arc::new(FileKeyProvider::new(&key_file))).unwrap();
    first.put_bytes("k", b"persisted").unwrap();

    let second = EncryptedKeychain::new(&store, "disk", Arc::new(FileKeyProvider::new(&key_file))).unwrap();
    assert_eq!(second.get_bytes("k").unwrap(), Some(b"persisted".to_vec()));
}
