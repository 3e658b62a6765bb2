//! Cryptography for the entitlement server.
//!
//! Two concerns live here:
//! - **Activation payloads**: JSON sealed with AES-256-GCM under a key
//!   derived from the SN itself (`SHA-256(sn)`), so only a client that knows
//!   the SN can open the blob it receives.
//! - **Interop tokens**: short-lived `header.claims.signature` tokens signed
//!   with HMAC-SHA256, used by partner services to confirm that an SN holder
//!   owns a given email address.

mod cipher;
mod error;
mod key;
mod token;

pub use cipher::{
    EncryptedData, NONCE_SIZE, TAG_SIZE, decrypt, encrypt, open_json, seal_json,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, PayloadKey};
pub use token::{INTEROP_PURPOSE, InteropClaims, TOKEN_TTL_SECS, TokenSigner};
