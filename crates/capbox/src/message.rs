//! encrypted name/value records and the signed wire format
//!
//! wire layout of one record:
//!
//! ```text
//! signature(64) ‖ u16be len ‖ encrypted name ‖ u16be len ‖ encrypted value ‖ u64be timestamp
//! ```
//!
//! the signature covers everything after itself. on the way in the
//! signature is always checked before any ciphertext is touched

use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signature, Signer, Verifier, SIGNATURE_LENGTH};
use tracing::debug;

use crate::capability::Capability;
use crate::crypto::{self, NONCE_LEN, TAG_LEN};
use crate::{Error, Result};

/// maximum length of a record name in bytes
pub const MAX_NAME_LEN: usize = 256;

/// maximum length of a record value in bytes; the encrypted value has to
/// fit behind a u16 length prefix
pub const MAX_VALUE_LEN: usize = u16::MAX as usize - (NONCE_LEN + TAG_LEN);

/// one plaintext name/value record
///
/// immutable value object; build it, encrypt it, forget it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    name: Vec<u8>,
    value: Vec<u8>,
    timestamp: u64,
}

impl Message {
    /// build a record with an explicit timestamp (unix seconds)
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// build a record stamped with the current time
    pub fn now(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        Self::new(name, value, timestamp)
    }

    /// human-meaningful record identifier
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// record payload
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// write time in unix seconds; informational only, this is not
    /// replay protection
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// encrypt and sign this record for storage or transport
    ///
    /// needs a write capability: the name and value encrypt under the
    /// container secret and the packed body is signed with the ed25519
    /// signing key
    pub fn encrypt(&self, capability: &Capability) -> Result<Vec<u8>> {
        if self.name.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong(self.name.len()));
        }
        if self.value.len() > MAX_VALUE_LEN {
            return Err(Error::ValueTooLong(self.value.len()));
        }
        let signing_key = capability.signing_key()?;
        let secret_key = capability.secret_key()?;

        let encrypted_name = crypto::encrypt_name(secret_key, &self.name)?;
        let encrypted_value = crypto::encrypt_value(secret_key, &self.value)?;

        let body = pack(&encrypted_name, &encrypted_value, self.timestamp);
        let signature = signing_key.sign(&body);

        let mut out = Vec::with_capacity(SIGNATURE_LENGTH + body.len());
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(&body);

        debug!(
            id = %capability.id(),
            name_len = self.name.len(),
            value_len = self.value.len(),
            "encrypted record"
        );
        Ok(out)
    }

    /// verify, unpack and decrypt a record
    ///
    /// needs at least a read capability. the signature check runs first
    /// and nothing is decrypted from an unauthenticated body
    pub fn decrypt(capability: &Capability, encrypted_message: &[u8]) -> Result<Message> {
        let secret_key = capability.secret_key()?;

        let (encrypted_name, encrypted_value, timestamp) =
            unpack(capability, encrypted_message)?;

        let name = crypto::decrypt_name(secret_key, encrypted_name)?;
        let value = crypto::decrypt_value(secret_key, encrypted_value)?;

        debug!(
            id = %capability.id(),
            name_len = name.len(),
            value_len = value.len(),
            "decrypted record"
        );
        Ok(Message {
            name,
            value,
            timestamp,
        })
    }

    /// check a record's signature without decrypting anything
    ///
    /// works at every level including verify-only, which is exactly what
    /// a verifycap is for: attesting authenticity without disclosure
    pub fn verify(capability: &Capability, encrypted_message: &[u8]) -> Result<()> {
        let (signature, body) = split_signature(encrypted_message)?;
        capability
            .verify_key()
            .verify(body, &signature)
            .map_err(|_| Error::SignatureMismatch)
    }

    /// compute the storage lookup key for a plaintext name
    ///
    /// deterministic: byte-identical to the encrypted name embedded in
    /// any record this capability set writes for the same name, so a
    /// caller can look a record up without building a message
    pub fn encrypted_name(capability: &Capability, name: &[u8]) -> Result<Vec<u8>> {
        crypto::encrypt_name(capability.secret_key()?, name)
    }
}

/// pack the signed portion of the wire format
fn pack(encrypted_name: &[u8], encrypted_value: &[u8], timestamp: u64) -> Vec<u8> {
    let mut body =
        Vec::with_capacity(2 + encrypted_name.len() + 2 + encrypted_value.len() + 8);
    body.extend_from_slice(&(encrypted_name.len() as u16).to_be_bytes());
    body.extend_from_slice(encrypted_name);
    body.extend_from_slice(&(encrypted_value.len() as u16).to_be_bytes());
    body.extend_from_slice(encrypted_value);
    body.extend_from_slice(&timestamp.to_be_bytes());
    body
}

/// verify a record, then split its body into the two ciphertexts and
/// the timestamp
fn unpack<'a>(
    capability: &Capability,
    encrypted_message: &'a [u8],
) -> Result<(&'a [u8], &'a [u8], u64)> {
    Message::verify(capability, encrypted_message)?;

    let body = &encrypted_message[SIGNATURE_LENGTH..];
    let (encrypted_name, rest) = take_prefixed(body)?;
    let (encrypted_value, rest) = take_prefixed(rest)?;
    let timestamp: [u8; 8] = rest.try_into().map_err(|_| Error::MalformedMessage)?;

    Ok((encrypted_name, encrypted_value, u64::from_be_bytes(timestamp)))
}

/// split the fixed-width signature prefix from the signed body
fn split_signature(encrypted_message: &[u8]) -> Result<(Signature, &[u8])> {
    if encrypted_message.len() < SIGNATURE_LENGTH {
        return Err(Error::MalformedMessage);
    }
    let (sig, body) = encrypted_message.split_at(SIGNATURE_LENGTH);
    let signature = Signature::from_slice(sig).map_err(|_| Error::MalformedMessage)?;
    Ok((signature, body))
}

/// read one u16be length-prefixed field
fn take_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < 2 {
        return Err(Error::MalformedMessage);
    }
    let (len, rest) = bytes.split_at(2);
    let len = u16::from_be_bytes([len[0], len[1]]) as usize;
    if rest.len() < len {
        return Err(Error::MalformedMessage);
    }
    Ok(rest.split_at(len))
}
