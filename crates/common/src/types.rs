//! Core domain types shared across Aurum services.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for price locks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId(pub Uuid);

impl LockId {
    /// Create a new random LockId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a LockId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for price alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub Uuid);

impl AlertId {
    /// Create a new random AlertId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user owning a lock or alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Countries the storefront operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    /// India
    IN,
    /// United Arab Emirates
    AE,
    /// United Kingdom
    UK,
}

impl Country {
    /// All supported countries in fixed declaration order.
    ///
    /// Iteration order is relied upon by the scheduler and by the price
    /// table computation, so it must stay stable.
    pub const ALL: [Country; 3] = [Country::IN, Country::AE, Country::UK];

    /// Display currency for this country
    pub fn currency(&self) -> Currency {
        match self {
            Country::IN => Currency::INR,
            Country::AE => Currency::AED,
            Country::UK => Currency::GBP,
        }
    }

    /// Parse from an ISO-style code (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IN" => Some(Country::IN),
            "AE" => Some(Country::AE),
            "UK" | "GB" => Some(Country::UK),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Country::IN => "IN",
            Country::AE => "AE",
            Country::UK => "UK",
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Country {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown country: {}", s))
    }
}

/// Currencies in play: three display currencies plus the USD spot reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    USD,
    INR,
    AED,
    GBP,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::INR => "INR",
            Currency::AED => "AED",
            Currency::GBP => "GBP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "INR" => Some(Currency::INR),
            "AED" => Some(Currency::AED),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Gold purity grades
///
/// The multiplier converts a 24K-equivalent price-per-gram to the price of a
/// lower-purity alloy. The table is a fixed industry constant, not config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purity {
    #[serde(rename = "24K")]
    K24,
    #[serde(rename = "22K")]
    K22,
    #[serde(rename = "18K")]
    K18,
    #[serde(rename = "14K")]
    K14,
    #[serde(rename = "10K")]
    K10,
}

impl Purity {
    /// All supported purities in fixed declaration order (highest first).
    pub const ALL: [Purity; 5] = [
        Purity::K24,
        Purity::K22,
        Purity::K18,
        Purity::K14,
        Purity::K10,
    ];

    /// Fractional factor applied to the 24K price
    pub fn multiplier(&self) -> f64 {
        match self {
            Purity::K24 => 1.0,
            Purity::K22 => 0.9167,
            Purity::K18 => 0.75,
            Purity::K14 => 0.5833,
            Purity::K10 => 0.417,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Purity::K24 => "24K",
            Purity::K22 => "22K",
            Purity::K18 => "18K",
            Purity::K14 => "14K",
            Purity::K10 => "10K",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "24K" | "24" => Some(Purity::K24),
            "22K" | "22" => Some(Purity::K22),
            "18K" | "18" => Some(Purity::K18),
            "14K" | "14" => Some(Purity::K14),
            "10K" | "10" => Some(Purity::K10),
            _ => None,
        }
    }
}

impl std::fmt::Display for Purity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Purity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown purity: {}", s))
    }
}
