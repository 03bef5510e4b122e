//! capabilities grant graduated access to one container's records
//!
//! a capability owns key material for one container at one level: write
//! (sign + decrypt + verify), read (decrypt + verify) or verify only.
//! levels only ever degrade, and the weaker variant simply cannot hold
//! the stronger key material.
//!
//! the persisted form is the token `"<id>:<r|rw|v>@<base32(keys)>"`,
//! produced by `Display` and consumed by `parse`

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

use crate::crypto::{SecretKey, SECRET_KEY_LEN};
use crate::{Error, Result};

/// access level, totally ordered: verify < read < write
///
/// holding a higher level implies every operation of the lower ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// attest record authenticity without seeing contents
    Verify,
    /// decrypt and verify
    Read,
    /// sign new records, decrypt and verify
    Write,
}

impl Level {
    /// token spelling of this level
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Write => "rw",
            Level::Read => "r",
            Level::Verify => "v",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rw" => Ok(Level::Write),
            "r" => Ok(Level::Read),
            "v" => Ok(Level::Verify),
            other => Err(Error::InvalidToken(format!(
                "invalid capability level: {other}"
            ))),
        }
    }
}

/// capability to one container's records
///
/// the variant is the level, and each variant holds exactly the key
/// material legal for it. the id is an opaque label shared by all levels;
/// it is never authenticated and must not be treated as a security
/// boundary
#[derive(Clone)]
pub enum Capability {
    /// full access: ed25519 signing key plus the container secret
    Write {
        id: String,
        signing_key: SigningKey,
        secret_key: SecretKey,
    },
    /// can decrypt and verify but never sign
    Read {
        id: String,
        verify_key: VerifyingKey,
        secret_key: SecretKey,
    },
    /// can only attest authenticity
    Verify { id: String, verify_key: VerifyingKey },
}

impl Capability {
    /// generate a brand new write capability
    ///
    /// the signing key and the container secret are drawn independently
    /// from the system csprng. the id is copied verbatim, unauthenticated
    pub fn generate(id: impl Into<String>) -> Self {
        let id = id.into();
        let signing_key = SigningKey::generate(&mut OsRng);
        let secret_key = SecretKey::generate();

        debug!(id = %id, "generated write capability");
        Capability::Write {
            id,
            signing_key,
            secret_key,
        }
    }

    /// parse a capability token; exact inverse of `to_string`
    pub fn parse(token: &str) -> Result<Self> {
        token.parse()
    }

    /// opaque container label
    pub fn id(&self) -> &str {
        match self {
            Capability::Write { id, .. }
            | Capability::Read { id, .. }
            | Capability::Verify { id, .. } => id,
        }
    }

    /// access level of this capability
    pub fn level(&self) -> Level {
        match self {
            Capability::Write { .. } => Level::Write,
            Capability::Read { .. } => Level::Read,
            Capability::Verify { .. } => Level::Verify,
        }
    }

    /// public verification key, present at every level
    pub fn verify_key(&self) -> VerifyingKey {
        match self {
            Capability::Write { signing_key, .. } => signing_key.verifying_key(),
            Capability::Read { verify_key, .. } | Capability::Verify { verify_key, .. } => {
                *verify_key
            }
        }
    }

    /// private signing key; only a write capability holds one
    pub fn signing_key(&self) -> Result<&SigningKey> {
        match self {
            Capability::Write { signing_key, .. } => Ok(signing_key),
            _ => Err(Error::NoWriteCapability),
        }
    }

    /// symmetric container secret; absent at verify level
    pub fn secret_key(&self) -> Result<&SecretKey> {
        match self {
            Capability::Write { secret_key, .. } | Capability::Read { secret_key, .. } => {
                Ok(secret_key)
            }
            Capability::Verify { .. } => Err(Error::NoReadCapability),
        }
    }

    /// produce a strictly weaker capability for delegation
    ///
    /// a one-way walk down the lattice; there is no upgrade operation.
    /// degrading to read requires holding the container secret
    pub fn degrade(&self, level: Level) -> Result<Capability> {
        match level {
            Level::Read => Ok(Capability::Read {
                id: self.id().to_owned(),
                verify_key: self.verify_key(),
                secret_key: self.secret_key()?.clone(),
            }),
            Level::Verify => Ok(Capability::Verify {
                id: self.id().to_owned(),
                verify_key: self.verify_key(),
            }),
            Level::Write => Err(Error::CannotDegrade(Level::Write)),
        }
    }

    /// can this capability write records?
    pub fn is_writecap(&self) -> bool {
        self.level() >= Level::Write
    }

    /// can this capability read record contents?
    pub fn is_readcap(&self) -> bool {
        self.level() >= Level::Read
    }

    /// can this capability verify record authenticity?
    pub fn is_verifycap(&self) -> bool {
        self.level() >= Level::Verify
    }

    /// reassemble a capability from its declared level and packed keys
    fn from_keys(id: &str, level: Level, keys: &[u8]) -> Result<Self> {
        match level {
            Level::Write => {
                let (secret, seed) = split_keys(keys)?;
                Ok(Capability::Write {
                    id: id.to_owned(),
                    signing_key: SigningKey::from_bytes(&seed),
                    secret_key: SecretKey::from_bytes(secret),
                })
            }
            Level::Read => {
                let (secret, public) = split_keys(keys)?;
                Ok(Capability::Read {
                    id: id.to_owned(),
                    verify_key: parse_verify_key(&public)?,
                    secret_key: SecretKey::from_bytes(secret),
                })
            }
            Level::Verify => {
                let public: [u8; PUBLIC_KEY_LENGTH] = keys
                    .try_into()
                    .map_err(|_| Error::InvalidToken("bad key material length".into()))?;
                Ok(Capability::Verify {
                    id: id.to_owned(),
                    verify_key: parse_verify_key(&public)?,
                })
            }
        }
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        let (id, rest) = token
            .split_once(':')
            .ok_or_else(|| Error::InvalidToken("missing ':' separator".into()))?;
        let (level, keys32) = rest
            .split_once('@')
            .ok_or_else(|| Error::InvalidToken("missing '@' separator".into()))?;

        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidToken(format!("invalid container id: {id:?}")));
        }

        let level: Level = level.parse()?;
        let mut keys = BASE32_NOPAD
            .decode(keys32.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidToken("malformed base32 key material".into()))?;

        let capability = Capability::from_keys(id, level, &keys);
        keys.zeroize();
        capability
    }
}

impl fmt::Display for Capability {
    /// serialize to the token form `<id>:<level>@<base32>`
    ///
    /// base32 is rfc 4648, lower-cased, padding stripped
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::with_capacity(SECRET_KEY_LEN + PUBLIC_KEY_LENGTH);
        match self {
            Capability::Write {
                signing_key,
                secret_key,
                ..
            } => {
                keys.extend_from_slice(secret_key.as_bytes());
                keys.extend_from_slice(signing_key.as_bytes());
            }
            Capability::Read {
                verify_key,
                secret_key,
                ..
            } => {
                keys.extend_from_slice(secret_key.as_bytes());
                keys.extend_from_slice(verify_key.as_bytes());
            }
            Capability::Verify { verify_key, .. } => {
                keys.extend_from_slice(verify_key.as_bytes());
            }
        }

        let keys32 = BASE32_NOPAD.encode(&keys).to_ascii_lowercase();
        keys.zeroize();
        write!(f, "{}:{}@{}", self.id(), self.level(), keys32)
    }
}

impl fmt::Debug for Capability {
    /// key material is deliberately elided; only `Display` emits the token
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({}:{}@..)", self.id(), self.level())
    }
}

/// split `secret_key(32) ‖ key_material(32)` for the r and rw levels
fn split_keys(keys: &[u8]) -> Result<([u8; SECRET_KEY_LEN], [u8; 32])> {
    if keys.len() != SECRET_KEY_LEN + 32 {
        return Err(Error::InvalidToken("bad key material length".into()));
    }

    let mut secret = [0u8; SECRET_KEY_LEN];
    let mut material = [0u8; 32];
    secret.copy_from_slice(&keys[..SECRET_KEY_LEN]);
    material.copy_from_slice(&keys[SECRET_KEY_LEN..]);
    Ok((secret, material))
}

fn parse_verify_key(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes).map_err(|_| Error::InvalidToken("invalid verify key".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_writecap() {
        let cap = Capability::generate("vault1");
        assert_eq!(cap.level(), Level::Write);
        assert!(cap.is_writecap());
        assert!(cap.is_readcap());
        assert!(cap.is_verifycap());
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Write > Level::Read);
        assert!(Level::Read > Level::Verify);
    }

    #[test]
    fn test_token_roundtrip_all_levels() {
        let cap = Capability::generate("vault1");

        for level in [Level::Read, Level::Verify] {
            let token = cap.degrade(level).unwrap().to_string();
            let parsed = Capability::parse(&token).unwrap();
            assert_eq!(parsed.to_string(), token);
            assert_eq!(parsed.level(), level);
            assert_eq!(parsed.id(), "vault1");
        }

        let token = cap.to_string();
        let parsed = Capability::parse(&token).unwrap();
        assert_eq!(parsed.to_string(), token);
        assert_eq!(parsed.level(), Level::Write);
    }

    #[test]
    fn test_token_shape() {
        let cap = Capability::generate("my_vault-2");
        let token = cap.to_string();
        assert!(token.starts_with("my_vault-2:rw@"));
        assert!(!token.contains('='));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "vault1",
            "vault1:rw",
            "vault1:x@aaaa",
            ":rw@aaaa",
            "bad id:rw@aaaa",
            "vault1:rw@not!base32!",
            // valid base32 but wrong payload length for the level
            "vault1:rw@mfrggzdf",
            "vault1:v@mfrggzdf",
        ] {
            assert!(
                matches!(Capability::parse(bad), Err(Error::InvalidToken(_))),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn test_degrade_to_read_keeps_secret() {
        let cap = Capability::generate("vault1");
        let readcap = cap.degrade(Level::Read).unwrap();

        assert_eq!(readcap.level(), Level::Read);
        assert!(readcap.signing_key().is_err());
        assert_eq!(
            readcap.secret_key().unwrap().as_bytes(),
            cap.secret_key().unwrap().as_bytes()
        );
        assert_eq!(readcap.verify_key(), cap.verify_key());
    }

    #[test]
    fn test_degrade_to_verify_drops_secrets() {
        let cap = Capability::generate("vault1");
        let verifycap = cap.degrade(Level::Verify).unwrap();

        assert_eq!(verifycap.level(), Level::Verify);
        assert!(verifycap.signing_key().is_err());
        assert!(verifycap.secret_key().is_err());
        assert!(!verifycap.is_readcap());
        assert!(verifycap.is_verifycap());
    }

    #[test]
    fn test_degrade_is_idempotent_in_shape() {
        let cap = Capability::generate("vault1");
        let v1 = cap.degrade(Level::Verify).unwrap();
        let v2 = v1.degrade(Level::Verify).unwrap();
        assert_eq!(v1.to_string(), v2.to_string());
    }

    #[test]
    fn test_degrade_never_upgrades() {
        let cap = Capability::generate("vault1");
        assert!(matches!(
            cap.degrade(Level::Write),
            Err(Error::CannotDegrade(Level::Write))
        ));

        let verifycap = cap.degrade(Level::Verify).unwrap();
        assert!(matches!(
            verifycap.degrade(Level::Read),
            Err(Error::NoReadCapability)
        ));
    }

    #[test]
    fn test_accessor_gating() {
        let cap = Capability::generate("vault1");
        assert!(cap.signing_key().is_ok());
        assert!(cap.secret_key().is_ok());

        let readcap = cap.degrade(Level::Read).unwrap();
        assert!(matches!(readcap.signing_key(), Err(Error::NoWriteCapability)));
        assert!(readcap.secret_key().is_ok());

        let verifycap = cap.degrade(Level::Verify).unwrap();
        assert!(matches!(verifycap.secret_key(), Err(Error::NoReadCapability)));
    }

    #[test]
    fn test_debug_elides_keys() {
        let cap = Capability::generate("vault1");
        let debug = format!("{cap:?}");
        assert_eq!(debug, "Capability(vault1:rw@..)");
    }
}
