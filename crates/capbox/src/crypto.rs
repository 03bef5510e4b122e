//! cryptographic primitives for capbox
//!
//! - hkdf-sha256 fans the container secret into per-record subkeys
//! - xchacha20poly1305 for authenticated encryption of names and values
//! - siv-style synthetic nonces make name encryption deterministic

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// size of the symmetric container secret
pub const SECRET_KEY_LEN: usize = 32;

/// size of each derived subkey
pub const SUBKEY_LEN: usize = 32;

/// xchacha20poly1305 nonce size
pub const NONCE_LEN: usize = 24;

/// poly1305 tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// 32-byte symmetric container secret, zeroized on drop
///
/// shared by the write and read levels; holding it is what "read
/// capability" means
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// draw a fresh secret from the system csprng
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn from_bytes(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// per-record subkeys fanned out from the container secret
///
/// recomputed on every operation, never persisted
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SubKeys {
    /// seeds the synthetic nonces for deterministic name encryption
    pub name_siv_key: [u8; SUBKEY_LEN],
    /// symmetric key for name ciphertexts
    pub name_key: [u8; SUBKEY_LEN],
    /// symmetric key for value ciphertexts
    pub value_key: [u8; SUBKEY_LEN],
}

/// derive the three subkeys from the container secret
///
/// hkdf-sha256 with no salt; 96 bytes of output split in fixed order
pub fn kdf(secret_key: &SecretKey) -> Result<SubKeys> {
    let hk = Hkdf::<Sha256>::new(None, secret_key.as_bytes());
    let mut okm = [0u8; SUBKEY_LEN * 3];
    hk.expand(&[], &mut okm).map_err(|_| Error::KdfFailed)?;

    let mut keys = SubKeys {
        name_siv_key: [0u8; SUBKEY_LEN],
        name_key: [0u8; SUBKEY_LEN],
        value_key: [0u8; SUBKEY_LEN],
    };
    keys.name_siv_key.copy_from_slice(&okm[..SUBKEY_LEN]);
    keys.name_key.copy_from_slice(&okm[SUBKEY_LEN..SUBKEY_LEN * 2]);
    keys.value_key.copy_from_slice(&okm[SUBKEY_LEN * 2..]);
    okm.zeroize();

    Ok(keys)
}

/// encrypt a record name deterministically (siv construction)
///
/// the nonce is synthesized from the name itself, keyed by name_siv_key,
/// so equal names always produce identical ciphertexts under one secret.
/// a storage backend can index records by this ciphertext; equality
/// between names is the only thing it learns
pub fn encrypt_name(secret_key: &SecretKey, name: &[u8]) -> Result<Vec<u8>> {
    let keys = kdf(secret_key)?;

    // hkdf as the siv prg: name is the ikm, name_siv_key the salt
    let hk = Hkdf::<Sha256>::new(Some(&keys.name_siv_key), name);
    let mut nonce = [0u8; NONCE_LEN];
    hk.expand(&[], &mut nonce).map_err(|_| Error::KdfFailed)?;

    seal(&keys.name_key, &nonce, name)
}

/// decrypt a siv-encrypted name
pub fn decrypt_name(secret_key: &SecretKey, encrypted_name: &[u8]) -> Result<Vec<u8>> {
    let keys = kdf(secret_key)?;
    open(&keys.name_key, encrypted_name)
}

/// encrypt a record value with a fresh random nonce
pub fn encrypt_value(secret_key: &SecretKey, value: &[u8]) -> Result<Vec<u8>> {
    let keys = kdf(secret_key)?;
    let nonce: [u8; NONCE_LEN] = random_bytes();
    seal(&keys.value_key, &nonce, value)
}

/// decrypt a value
pub fn decrypt_value(secret_key: &SecretKey, encrypted_value: &[u8]) -> Result<Vec<u8>> {
    let keys = kdf(secret_key)?;
    open(&keys.value_key, encrypted_value)
}

/// generate random bytes from the system csprng
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// encrypt under the given subkey and return `nonce ‖ ciphertext‖tag`
fn seal(key: &[u8; SUBKEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// split `nonce ‖ ciphertext‖tag` and open under the given subkey
fn open(key: &[u8; SUBKEY_LEN], message: &[u8]) -> Result<Vec<u8>> {
    if message.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    let (nonce, ciphertext) = message.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionFailed)
}
