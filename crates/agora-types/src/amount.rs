//! USDC amounts in integer minor units
//!
//! All prices and budgets travel as integer minor units (USDC has 6
//! decimals). Integer arithmetic keeps budget comparisons exact; the
//! human-readable decimal string exists only for display and for the
//! x402 challenge body.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Number of decimals in the USDC mint
pub const USDC_DECIMALS: u32 = 6;

/// Minor units per whole USDC
pub const USDC_MULTIPLIER: u64 = 1_000_000;

/// A USDC amount in minor units.
///
/// Serializes as a plain integer on the wire.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UsdcAmount(pub u64);

impl UsdcAmount {
    pub const ZERO: UsdcAmount = UsdcAmount(0);

    /// Create from minor units
    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Create from a human-readable value (e.g. 0.00012)
    ///
    /// Rounds to the nearest minor unit.
    pub fn from_human(human: f64) -> Self {
        Self((human * USDC_MULTIPLIER as f64).round().max(0.0) as u64)
    }

    /// Raw minor units
    pub fn minor(&self) -> u64 {
        self.0
    }

    /// Human-readable value as a float (display only, lossy)
    pub fn to_human(&self) -> f64 {
        self.0 as f64 / USDC_MULTIPLIER as f64
    }

    /// Exact human-readable decimal string, trailing zeros trimmed
    /// (e.g. 120 minor units -> "0.00012")
    pub fn to_human_string(&self) -> String {
        let whole = self.0 / USDC_MULTIPLIER;
        let frac = self.0 % USDC_MULTIPLIER;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:06}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl Add for UsdcAmount {
    type Output = UsdcAmount;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Sub for UsdcAmount {
    type Output = UsdcAmount;

    fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for UsdcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} USDC", self.to_human_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_string_trims_trailing_zeros() {
        assert_eq!(UsdcAmount::from_minor(120).to_human_string(), "0.00012");
        assert_eq!(UsdcAmount::from_minor(1_500_000).to_human_string(), "1.5");
        assert_eq!(UsdcAmount::from_minor(2_000_000).to_human_string(), "2");
        assert_eq!(UsdcAmount::from_minor(0).to_human_string(), "0");
    }

    #[test]
    fn test_from_human_rounds() {
        assert_eq!(UsdcAmount::from_human(0.00012), UsdcAmount(120));
        assert_eq!(UsdcAmount::from_human(1.5), UsdcAmount(1_500_000));
    }

    #[test]
    fn test_wire_format_is_plain_integer() {
        let json = serde_json::to_string(&UsdcAmount(150)).unwrap();
        assert_eq!(json, "150");
        let back: UsdcAmount = serde_json::from_str("150").unwrap();
        assert_eq!(back, UsdcAmount(150));
    }

    #[test]
    fn test_ordering() {
        assert!(UsdcAmount(100) < UsdcAmount(200));
        assert_eq!(
            UsdcAmount(100).checked_sub(UsdcAmount(200)),
            None
        );
    }
}
