//! # Units and Result Values
//!
//! Analysis values carry their SI unit alongside the number. Computation is
//! done in full double precision; rounding happens only when a value is
//! presented, and the number of decimals depends on the kind of quantity:
//! lengths keep 3 decimals, forces, moments and pressures keep 2.
//!
//! ## Example
//!
//! ```rust
//! use slab_core::units::{ResultValue, Unit};
//!
//! let moment = ResultValue::new(705.4321, Unit::KilonewtonMetre);
//! assert_eq!(moment.rounded(), 705.43);
//! assert_eq!(moment.display(), "705.43 kN·m");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Units
// ============================================================================

/// SI units used by the analysis modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "m")]
    Metre,
    #[serde(rename = "mm")]
    Millimetre,
    #[serde(rename = "m²")]
    SquareMetre,
    #[serde(rename = "mm²")]
    SquareMillimetre,
    #[serde(rename = "kN")]
    Kilonewton,
    #[serde(rename = "kN/m")]
    KilonewtonPerMetre,
    #[serde(rename = "kN·m")]
    KilonewtonMetre,
    #[serde(rename = "kN/m²")]
    KilonewtonPerSquareMetre,
    #[serde(rename = "N/mm²")]
    NewtonPerSquareMillimetre,
    #[serde(rename = "m³/s")]
    CubicMetrePerSecond,
    #[serde(rename = "m/s")]
    MetrePerSecond,
    #[serde(rename = "deg")]
    Degree,
    /// Dimensionless (factors of safety, coefficients, ratios)
    #[serde(rename = "-")]
    Ratio,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Metre => "m",
            Unit::Millimetre => "mm",
            Unit::SquareMetre => "m²",
            Unit::SquareMillimetre => "mm²",
            Unit::Kilonewton => "kN",
            Unit::KilonewtonPerMetre => "kN/m",
            Unit::KilonewtonMetre => "kN·m",
            Unit::KilonewtonPerSquareMetre => "kN/m²",
            Unit::NewtonPerSquareMillimetre => "N/mm²",
            Unit::CubicMetrePerSecond => "m³/s",
            Unit::MetrePerSecond => "m/s",
            Unit::Degree => "deg",
            Unit::Ratio => "-",
        }
    }

    /// Decimals kept when presenting a value of this unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Unit::Kilonewton
            | Unit::KilonewtonPerMetre
            | Unit::KilonewtonMetre
            | Unit::KilonewtonPerSquareMetre
            | Unit::NewtonPerSquareMillimetre
            | Unit::SquareMillimetre
            | Unit::Degree => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// Result Values
// ============================================================================

/// A computed quantity with its unit. `value` is never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultValue {
    pub value: f64,
    pub unit: Unit,
}

impl ResultValue {
    pub fn new(value: f64, unit: Unit) -> Self {
        ResultValue { value, unit }
    }

    /// Value rounded to the unit's presentation precision.
    pub fn rounded(&self) -> f64 {
        let factor = 10f64.powi(self.unit.decimals() as i32);
        (self.value * factor).round() / factor
    }

    pub fn display(&self) -> String {
        let decimals = self.unit.decimals() as usize;
        match self.unit {
            Unit::Ratio => format!("{:.*}", decimals, self.value),
            _ => format!("{:.*} {}", decimals, self.value, self.unit),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
