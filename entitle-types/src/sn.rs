//! Serial numbers.
//!
//! An SN is sixteen characters from `[A-Z0-9]`, presented in four dash
//! separated groups (`ABCD-EFGH-JKLM-NPQR`). Clients type them by hand, so
//! lookups always go through [`Sn::normalize`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters an SN is drawn from.
pub const SN_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of dash separated groups.
pub const SN_GROUPS: usize = 4;

/// Characters per group.
pub const SN_GROUP_LEN: usize = 4;

/// A license serial number, stored in its canonical (normalized) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sn(String);

impl Sn {
    /// Normalizes client input: whitespace is stripped and letters upper-cased.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect(),
        )
    }

    /// Generates a fresh random SN from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let mut out = String::with_capacity(SN_GROUPS * (SN_GROUP_LEN + 1));
        for group in 0..SN_GROUPS {
            if group > 0 {
                out.push('-');
            }
            for _ in 0..SN_GROUP_LEN {
                let idx = rng.gen_range(0..SN_ALPHABET.len());
                out.push(SN_ALPHABET[idx] as char);
            }
        }
        Self(out)
    }

    /// Wraps a value read back from storage without re-normalizing it.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns true when the value has the generated `XXXX-XXXX-XXXX-XXXX` shape.
    #[must_use]
    pub fn is_canonical_format(&self) -> bool {
        let groups: Vec<&str> = self.0.split('-').collect();
        groups.len() == SN_GROUPS
            && groups.iter().all(|g| {
                g.len() == SN_GROUP_LEN && g.bytes().all(|b| SN_ALPHABET.contains(&b))
            })
    }

    /// Returns true if normalization left nothing behind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Sn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
