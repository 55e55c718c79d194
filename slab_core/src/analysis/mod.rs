//! # Analysis Modules
//!
//! The four design disciplines. Each follows the same pattern:
//!
//! - `*Input` - typed inputs built from a [`ParameterSet`] with defaults applied
//! - `validate()` - rejects physically impossible configurations
//! - `compute(params, context) -> DesignResult<AnalysisResult>` - pure calculation
//!
//! Modules never read each other's outputs. A failed threshold is a result
//! (`passed = false` plus a warning), never an error.
//!
//! ## Example
//!
//! ```rust
//! use slab_core::category::Category;
//! use slab_core::context::ProjectContext;
//! use slab_core::parameters::ParameterSet;
//!
//! let params = ParameterSet::new(Category::Hydraulic)
//!     .with_number("discharge", 1000.0)
//!     .with_number("hfl", 101.0)
//!     .with_number("silt_factor", 1.5)
//!     .with_number("bridge_opening", 150.0);
//!
//! let result = Category::Hydraulic.compute(&params, &ProjectContext::default()).unwrap();
//! assert!(result.passed);
//! println!("Afflux: {}", result.values["afflux"]);
//! ```

pub mod abutment;
pub mod cross_section;
pub mod hydraulic;
pub mod stability;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::context::ProjectContext;
use crate::errors::{DesignError, DesignResult};
use crate::parameters::ParameterSet;
use crate::units::{ResultValue, Unit};

pub use abutment::{AbutmentInput, AbutmentType};
pub use cross_section::{CrossSectionInput, LiveLoadClass};
pub use hydraulic::HydraulicInput;
pub use stability::StabilityInput;

/// Whether a check's actual value must stay above or below its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Minimum,
    Maximum,
}

/// One threshold comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub name: String,
    pub actual: f64,
    pub limit: f64,
    pub kind: CheckKind,
    pub passed: bool,
    /// A failed fatal check fails the whole design
    pub fatal: bool,
}

impl ThresholdCheck {
    /// `actual >= limit`
    pub fn minimum(name: impl Into<String>, actual: f64, limit: f64, fatal: bool) -> Self {
        ThresholdCheck {
            name: name.into(),
            actual,
            limit,
            kind: CheckKind::Minimum,
            passed: actual >= limit,
            fatal,
        }
    }

    /// `actual <= limit`
    pub fn maximum(name: impl Into<String>, actual: f64, limit: f64, fatal: bool) -> Self {
        ThresholdCheck {
            name: name.into(),
            actual,
            limit,
            kind: CheckKind::Maximum,
            passed: actual <= limit,
            fatal,
        }
    }

    fn warning(&self) -> String {
        let (relation, bound) = match self.kind {
            CheckKind::Minimum => ("below", "minimum"),
            CheckKind::Maximum => ("above", "maximum"),
        };
        format!(
            "{}: {:.3} is {relation} the {bound} of {:.3}",
            self.name, self.actual, self.limit
        )
    }
}

/// Output of one analysis module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: Category,
    pub values: BTreeMap<String, ResultValue>,
    pub warnings: Vec<String>,
    /// Conjunction of all checks
    pub passed: bool,
    pub checks: Vec<ThresholdCheck>,
}

impl AnalysisResult {
    pub fn new(category: Category) -> Self {
        AnalysisResult {
            category,
            values: BTreeMap::new(),
            warnings: Vec::new(),
            passed: true,
            checks: Vec::new(),
        }
    }

    /// Record a computed value.
    pub fn value(&mut self, name: &str, value: f64, unit: Unit) {
        self.values.insert(name.to_string(), ResultValue::new(value, unit));
    }

    /// Record a check; a failure adds a warning and clears `passed`.
    pub fn check(&mut self, check: ThresholdCheck) {
        if !check.passed {
            self.warnings.push(check.warning());
            self.passed = false;
        }
        self.checks.push(check);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).map(|v| v.value)
    }

    pub fn has_fatal_failure(&self) -> bool {
        self.checks.iter().any(|c| c.fatal && !c.passed)
    }
}

/// Fields a category's module cannot compute without.
pub fn required_fields(category: Category) -> &'static [&'static str] {
    match category {
        Category::Stability => stability::REQUIRED_FIELDS,
        Category::Hydraulic => hydraulic::REQUIRED_FIELDS,
        Category::CrossSection => cross_section::REQUIRED_FIELDS,
        Category::Abutment => abutment::REQUIRED_FIELDS,
    }
}

impl Category {
    /// Run this category's analysis module.
    pub fn compute(&self, params: &ParameterSet, ctx: &ProjectContext) -> DesignResult<AnalysisResult> {
        match self {
            Category::Stability => stability::compute(params, ctx),
            Category::Hydraulic => hydraulic::compute(params, ctx),
            Category::CrossSection => cross_section::compute(params, ctx),
            Category::Abutment => abutment::compute(params, ctx),
        }
    }
}

fn ensure_category(expected: Category, params: &ParameterSet) -> DesignResult<()> {
    if params.category != expected {
        return Err(DesignError::domain_value(
            expected.label(),
            "category",
            params.category.label(),
            format!("{} module given a {} parameter set", expected, params.category),
        ));
    }
    Ok(())
}

fn require_positive(module: Category, field: &str, value: f64) -> DesignResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DesignError::domain_value(
            module.label(),
            field,
            value.to_string(),
            "Must be positive",
        ));
    }
    Ok(())
}

fn require_non_negative(module: Category, field: &str, value: f64) -> DesignResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DesignError::domain_value(
            module.label(),
            field,
            value.to_string(),
            "Must not be negative",
        ));
    }
    Ok(())
}

fn require_friction_angle(module: Category, value: f64) -> DesignResult<()> {
    if !(0.0..90.0).contains(&value) {
        return Err(DesignError::domain_value(
            module.label(),
            "friction_angle",
            value.to_string(),
            "Friction angle must be in [0, 90) degrees",
        ));
    }
    Ok(())
}

/// Rankine active pressure coefficient.
fn rankine_ka(friction_angle_deg: f64) -> f64 {
    let s = friction_angle_deg.to_radians().sin();
    (1.0 - s) / (1.0 + s)
}

/// Rankine passive pressure coefficient.
fn rankine_kp(friction_angle_deg: f64) -> f64 {
    1.0 / rankine_ka(friction_angle_deg)
}

/// Base pressure under a footing of length `b` carrying `v` per unit width
/// at eccentricity `e` from the centre. Returns (max, min).
fn base_pressure(v: f64, b: f64, e: f64) -> (f64, f64) {
    let e = e.abs();
    if e <= b / 6.0 || e >= b / 2.0 {
        (v / b * (1.0 + 6.0 * e / b), v / b * (1.0 - 6.0 * e / b))
    } else {
        (2.0 * v / (3.0 * (b / 2.0 - e)), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failure_adds_warning() {
        let mut result = AnalysisResult::new(Category::Stability);
        result.check(ThresholdCheck::minimum("Sliding", 1.8, 1.5, true));
        assert!(result.passed);
        assert!(result.warnings.is_empty());

        result.check(ThresholdCheck::maximum("Middle third", 1.3, 1.2, false));
        assert!(!result.passed);
        assert!(!result.has_fatal_failure());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Middle third"));
    }

    #[test]
    fn test_rankine_coefficients() {
        assert!((rankine_ka(30.0) - 1.0 / 3.0).abs() < 1e-12);
        assert!((rankine_kp(30.0) - 3.0).abs() < 1e-9);
        assert_eq!(rankine_ka(0.0), 1.0);
    }

    #[test]
    fn test_base_pressure_regimes() {
        let (max, min) = base_pressure(600.0, 6.0, 0.0);
        assert_eq!((max, min), (100.0, 100.0));

        let (max, min) = base_pressure(600.0, 6.0, 1.5);
        assert!((max - 2.0 * 600.0 / (3.0 * 1.5)).abs() < 1e-9);
        assert_eq!(min, 0.0);
    }

    #[test]
    fn test_module_rejects_wrong_category() {
        let params = ParameterSet::new(Category::Hydraulic);
        let err = Category::Stability.compute(&params, &ProjectContext::default()).unwrap_err();
        assert_eq!(err.error_code(), "DOMAIN_VALUE_ERROR");
    }

    #[test]
    fn test_required_fields_declared() {
        for category in Category::ALL {
            assert!(!required_fields(category).is_empty());
        }
    }
}
