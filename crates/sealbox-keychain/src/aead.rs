//! AES-256-GCM sealing and opening using the `ring` crate.
//!
//! Every value stored by the encrypted keychain is a *sealed envelope*:
//!
//! ```text
//! [12 bytes: random nonce][ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The associated data passed to [`seal`] and [`open`] is authenticated but
//! not stored; the keychain uses its namespace identifier, so an envelope
//! copied into another namespace fails to open.
//!
//! # Security Notes
//!
//! - Nonces are generated randomly for each seal. With a 96-bit nonce the
//!   collision probability stays negligible for up to ~2^32 seals under the
//!   same key.
//! - Key bytes live inside [`SymmetricKey`] and are zeroized on drop.

use ring::aead::{
    self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey,
};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeychainError, Result};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the GCM authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Smallest possible envelope: nonce and tag around an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN_BYTES + TAG_LEN;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Key handle
// ---------------------------------------------------------------------------

/// Opaque handle to a 256-bit symmetric key.
///
/// The raw bytes are only reachable from inside this crate; callers obtain
/// a handle from a [`SymmetricKeyProvider`](crate::provider::SymmetricKeyProvider)
/// and pass it straight back to [`seal`] / [`open`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Wrap raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::KeyProvider`] if `bytes` is not exactly
    /// [`KEY_LEN`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeychainError::KeyProvider {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, bytes.len()),
        })?;
        Ok(Self(array))
    }

    /// Generate a fresh random key from the system CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| KeychainError::KeyProvider {
                reason: "failed to generate random key".into(),
            })?;
        let key = Self(bytes);
        bytes.zeroize();
        Ok(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors, so each
/// bound key is used for a single operation.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Seal `plaintext` under `key`, authenticating `aad`.
///
/// Returns `nonce ‖ ciphertext ‖ tag`. An empty plaintext is valid and
/// yields a [`MIN_ENVELOPE_LEN`]-byte envelope.
///
/// # Errors
///
/// Returns [`KeychainError::SealFailed`] if nonce generation or the
/// primitive fails.
pub fn seal(plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| KeychainError::SealFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes()).map_err(|_| {
        KeychainError::SealFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce)));

    let mut envelope = Vec::with_capacity(MIN_ENVELOPE_LEN + plaintext.len());
    envelope.extend_from_slice(&nonce);
    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut in_out)
        .map_err(|_| KeychainError::SealFailed {
            reason: "seal_in_place failed".into(),
        })?;
    envelope.extend_from_slice(&in_out);

    tracing::trace!(
        plaintext_len = plaintext.len(),
        envelope_len = envelope.len(),
        "sealed value"
    );

    Ok(envelope)
}

/// Open an envelope produced by [`seal`] with the same `key` and `aad`.
///
/// # Errors
///
/// Returns [`KeychainError::OpenFailed`] if the envelope is truncated, the
/// tag does not verify, or `aad` differs from the one used to seal.
pub fn open(envelope: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(KeychainError::OpenFailed {
            reason: format!(
                "envelope is {} bytes, need at least {}",
                envelope.len(),
                MIN_ENVELOPE_LEN
            ),
        });
    }

    let (nonce_bytes, sealed) = envelope.split_at(NONCE_LEN_BYTES);
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    nonce.copy_from_slice(nonce_bytes);

    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes()).map_err(|_| {
        KeychainError::OpenFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(nonce)));

    let mut in_out = sealed.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::from(aad), &mut in_out)
        .map_err(|_| KeychainError::OpenFailed {
            reason: "authentication failed".into(),
        })?
        .to_vec();
    in_out.zeroize();

    Ok(plaintext)
}

// ---------------------------------------------------------------------------
// Cipher seam
// ---------------------------------------------------------------------------

/// The AEAD primitive as seen by the keychain, self-test and import.
///
/// Production code uses [`AesGcmCipher`]; the trait exists so the primitive
/// can be swapped for instrumented implementations.
pub trait AeadCipher: Send + Sync {
    /// Seal `plaintext`; see [`seal`].
    fn seal(&self, plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>>;

    /// Open `envelope`; see [`open`].
    fn open(&self, envelope: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256-GCM via `ring`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AeadCipher for AesGcmCipher {
    fn seal(&self, plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
        seal(plaintext, key, aad)
    }

    fn open(&self, envelope: &[u8], key: &SymmetricKey, aad: &[u8]) -> Result<Vec<u8>> {
        open(envelope, key, aad)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
