//! # capbox
//!
//! capability-based encrypted object store, protocol layer only.
//!
//! callers hold unforgeable tokens (capabilities) granting graduated
//! access to a named container of encrypted name/value records. transport
//! and storage live elsewhere and only ever see opaque byte strings: the
//! capability token, the encrypted record, and the encrypted name used as
//! a lookup key.
//!
//! ## architecture
//!
//! ```text
//!   ┌─────────────────────┐
//!   │  writecap (rw)      │  ed25519 signing key + container secret
//!   └──────────┬──────────┘
//!      degrade │
//!   ┌──────────▼──────────┐
//!   │  readcap (r)        │  verify key + container secret
//!   └──────────┬──────────┘
//!      degrade │
//!   ┌──────────▼──────────┐
//!   │  verifycap (v)      │  verify key only
//!   └─────────────────────┘
//!
//!   container secret ──hkdf──► name_siv_key / name_key / value_key
//!
//!   record = signature(64) ‖ len ‖ enc_name ‖ len ‖ enc_value ‖ timestamp
//! ```
//!
//! ## security properties
//!
//! - names encrypt deterministically (siv construction) so a store can
//!   index records without seeing plaintext; equality between names is
//!   the only leak
//! - values encrypt with fresh random nonces
//! - every record is signed and verification runs before any decryption
//! - degrading is one-way; the weaker capability cannot hold the
//!   stronger key material
//! - container ids are opaque labels, never authenticated
//! - no replay protection: timestamps are informational
//!
//! ## usage
//!
//! ```rust,ignore
//! use capbox::{Capability, Level, Message};
//!
//! let cap = Capability::generate("vault1");
//! let record = Message::now("foo", "hello world").encrypt(&cap)?;
//!
//! // hand out read access without write access
//! let readcap = cap.degrade(Level::Read)?;
//! let message = Message::decrypt(&readcap, &record)?;
//! assert_eq!(message.value(), b"hello world");
//!
//! // a verifycap attests authenticity without disclosure
//! let verifycap = readcap.degrade(Level::Verify)?;
//! Message::verify(&verifycap, &record)?;
//! ```

pub mod capability;
pub mod crypto;
pub mod error;
pub mod message;

pub use capability::{Capability, Level};
pub use crypto::SecretKey;
pub use error::{Error, Result};
pub use message::Message;
