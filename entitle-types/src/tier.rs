//! Trust tiers, binding kinds and provider families.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust classification of a license, taken from its organizational group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Trial or unclassified inventory. Daily refresh.
    #[default]
    Low,
    /// Paid / official inventory. Monthly refresh.
    High,
    /// Permanently free tier: no expiry enforcement, no provider credentials.
    PermanentFree,
    /// Open-source tier: same treatment as permanent-free.
    OpenSource,
}

impl TrustTier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::PermanentFree => "permanent_free",
            Self::OpenSource => "open_source",
        }
    }

    /// Resolves a stored tier name; anything unknown falls back to [`TrustTier::Low`].
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Returns true for the permanent-free and open-source tiers.
    #[must_use]
    pub fn is_free(&self) -> bool {
        matches!(self, Self::PermanentFree | Self::OpenSource)
    }

    /// Returns true if activation must reject licenses past their expiry.
    #[must_use]
    pub fn enforces_expiry(&self) -> bool {
        !self.is_free()
    }

    /// Days a client may cache its activation before refreshing.
    #[must_use]
    pub fn refresh_interval_days(&self) -> u32 {
        match self {
            Self::PermanentFree | Self::OpenSource => 365,
            Self::High => 30,
            Self::Low => 1,
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            "permanent_free" => Ok(Self::PermanentFree),
            "open_source" => Ok(Self::OpenSource),
            other => Err(Error::UnknownVariant {
                kind: "trust tier",
                value: other.to_string(),
            }),
        }
    }
}

/// The pool a binding was issued from. One binding per (email, product, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Commercial,
    Free,
    Oss,
}

impl BindingKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commercial => "commercial",
            Self::Free => "free",
            Self::Oss => "oss",
        }
    }

    /// Prefix of the built-in organizational group that backs this pool.
    /// Commercial inventory has no built-in group.
    #[must_use]
    pub fn group_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Commercial => None,
            Self::Free => Some("free_"),
            Self::Oss => Some("oss_"),
        }
    }

    /// Trust tier given to licenses minted for this pool.
    #[must_use]
    pub fn tier(&self) -> TrustTier {
        match self {
            Self::Commercial => TrustTier::Low,
            Self::Free => TrustTier::PermanentFree,
            Self::Oss => TrustTier::OpenSource,
        }
    }

    /// Id of the built-in organizational group for a product.
    #[must_use]
    pub fn group_id(&self, product_id: i64) -> Option<String> {
        self.group_prefix().map(|p| format!("{p}{product_id}"))
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commercial" => Ok(Self::Commercial),
            "free" => Ok(Self::Free),
            "oss" => Ok(Self::Oss),
            other => Err(Error::UnknownVariant {
                kind: "binding kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Backend credential families a license can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    Llm,
    Search,
}

impl ProviderFamily {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(Self::Llm),
            "search" => Ok(Self::Search),
            other => Err(Error::UnknownVariant {
                kind: "provider family",
                value: other.to_string(),
            }),
        }
    }
}
