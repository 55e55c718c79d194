//! # Hydraulic Analysis
//!
//! Lacey regime quantities, afflux at the bridge and design scour.
//!
//! Afflux is the largest of three estimates:
//! - Molesworth: `(V²/17.88 + 0.0152) * ((A/a)² - 1)`
//! - Energy: velocity head gained through the opening
//! - Empirical: `0.006 * (Q/L)^1.33`

use serde::{Deserialize, Serialize};

use super::{ensure_category, require_positive, AnalysisResult, ThresholdCheck};
use crate::category::Category;
use crate::context::ProjectContext;
use crate::errors::{DesignError, DesignResult};
use crate::parameters::{ParamValue, ParameterSet};
use crate::units::Unit;

pub const REQUIRED_FIELDS: &[&str] = &["discharge", "hfl", "silt_factor", "bridge_opening"];

const MODULE: Category = Category::Hydraulic;
const G: f64 = 9.81;
const MIN_WATERWAY_RATIO: f64 = 0.8;
const SCOUR_FACTOR: f64 = 1.5;

/// Hydraulic inputs with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicInput {
    /// Design discharge (m³/s)
    pub discharge: f64,
    /// High flood level (m, reduced level)
    pub hfl: f64,
    pub silt_factor: f64,
    /// Linear waterway provided (m)
    pub bridge_opening: f64,
    pub allowable_afflux: f64,
    pub design_velocity: f64,
    /// Bed slope as a fraction, if given ("1 in 975")
    pub bed_slope: Option<f64>,
}

impl HydraulicInput {
    pub fn from_parameters(params: &ParameterSet) -> DesignResult<Self> {
        let bed_slope = match params.get("bed_slope") {
            None => None,
            Some(ParamValue::Number(n)) => Some(*n),
            Some(ParamValue::Text(text)) => Some(parse_bed_slope(text).ok_or_else(|| {
                DesignError::domain_value(MODULE.label(), "bed_slope", text.clone(), "Expected a slope like '1 in 975'")
            })?),
            Some(other) => {
                return Err(DesignError::type_mismatch(MODULE, "bed_slope", "text", other.type_name()))
            }
        };
        Ok(HydraulicInput {
            discharge: params.number("discharge")?,
            hfl: params.number("hfl")?,
            silt_factor: params.number("silt_factor")?,
            bridge_opening: params.number("bridge_opening")?,
            allowable_afflux: params.number_or("allowable_afflux", 0.3)?,
            design_velocity: params.number_or("design_velocity", 3.0)?,
            bed_slope,
        })
    }

    pub fn validate(&self) -> DesignResult<()> {
        require_positive(MODULE, "discharge", self.discharge)?;
        require_positive(MODULE, "silt_factor", self.silt_factor)?;
        require_positive(MODULE, "bridge_opening", self.bridge_opening)?;
        require_positive(MODULE, "allowable_afflux", self.allowable_afflux)?;
        require_positive(MODULE, "design_velocity", self.design_velocity)?;
        if !self.hfl.is_finite() {
            return Err(DesignError::domain_value(MODULE.label(), "hfl", self.hfl.to_string(), "Must be finite"));
        }
        if let Some(slope) = self.bed_slope {
            require_positive(MODULE, "bed_slope", slope)?;
        }
        Ok(())
    }
}

/// `"1 in 975"` -> 1/975. Plain numbers are taken as the fraction itself.
pub fn parse_bed_slope(text: &str) -> Option<f64> {
    let lower = text.trim().to_ascii_lowercase();
    let value = match lower.split_once("in") {
        Some((rise, run)) => rise.trim().parse::<f64>().ok()? / run.trim().parse::<f64>().ok()?,
        None => lower.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

pub fn compute(params: &ParameterSet, ctx: &ProjectContext) -> DesignResult<AnalysisResult> {
    ensure_category(MODULE, params)?;
    ctx.validate(MODULE.label())?;
    let input = HydraulicInput::from_parameters(params)?;
    input.validate()?;

    let q = input.discharge;
    let f = input.silt_factor;

    // Lacey regime
    let regime_width = 4.75 * q.sqrt();
    let regime_depth = 0.473 * (q / f).cbrt();
    let regime_velocity = ((f * regime_depth).sqrt() / 1.35).min(1.17 * f.sqrt());
    let regime_slope = f.powf(5.0 / 3.0) / (3340.0 * q.powf(1.0 / 6.0));
    let regime_area = regime_width * regime_depth;

    // Afflux
    let approach_velocity = q / regime_area;
    let opening_area = input.bridge_opening * regime_depth;
    let bridge_velocity = q / opening_area;
    let area_ratio = regime_area / opening_area;
    let molesworth = (approach_velocity.powi(2) / 17.88 + 0.0152) * (area_ratio.powi(2) - 1.0);
    let energy = ((bridge_velocity.powi(2) - approach_velocity.powi(2)) / (2.0 * G)).max(0.0);
    let empirical = 0.006 * (q / input.bridge_opening).powf(1.33);
    let afflux = molesworth.max(energy).max(empirical);
    let waterway_ratio = input.bridge_opening / regime_width;

    // Scour
    let discharge_intensity = q / input.bridge_opening;
    let lacey_scour = 1.34 * (discharge_intensity.powi(2) / f).cbrt();
    let design_scour = lacey_scour.max(regime_depth);
    let foundation_level = input.hfl - SCOUR_FACTOR * design_scour;

    let mut result = AnalysisResult::new(MODULE);
    result.value("regime_width", regime_width, Unit::Metre);
    result.value("regime_depth", regime_depth, Unit::Metre);
    result.value("regime_velocity", regime_velocity, Unit::MetrePerSecond);
    result.value("regime_slope", regime_slope, Unit::Ratio);
    result.value("regime_area", regime_area, Unit::SquareMetre);
    result.value("approach_velocity", approach_velocity, Unit::MetrePerSecond);
    result.value("bridge_velocity", bridge_velocity, Unit::MetrePerSecond);
    result.value("molesworth_afflux", molesworth, Unit::Metre);
    result.value("energy_afflux", energy, Unit::Metre);
    result.value("empirical_afflux", empirical, Unit::Metre);
    result.value("afflux", afflux, Unit::Metre);
    result.value("waterway_ratio", waterway_ratio, Unit::Ratio);
    result.value("lacey_scour_depth", lacey_scour, Unit::Metre);
    result.value("design_scour_depth", design_scour, Unit::Metre);
    result.value("foundation_level", foundation_level, Unit::Metre);
    if let Some(slope) = input.bed_slope {
        result.value("bed_slope", slope, Unit::Ratio);
    }

    result.check(ThresholdCheck::maximum("Afflux", afflux, input.allowable_afflux, true));
    result.check(ThresholdCheck::minimum(
        "Waterway ratio",
        waterway_ratio,
        MIN_WATERWAY_RATIO,
        false,
    ));
    result.check(ThresholdCheck::maximum(
        "Bridge velocity",
        bridge_velocity,
        input.design_velocity,
        false,
    ));

    tracing::debug!(afflux, waterway_ratio, foundation_level, "Hydraulics computed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(opening: f64) -> ParameterSet {
        ParameterSet::new(Category::Hydraulic)
            .with_number("discharge", 1000.0)
            .with_number("hfl", 101.0)
            .with_number("silt_factor", 1.5)
            .with_number("bridge_opening", opening)
    }

    #[test]
    fn test_adequate_waterway_passes() {
        let result = compute(&params(150.0), &ProjectContext::default()).unwrap();
        assert!(result.passed, "warnings: {:?}", result.warnings);
        assert!((result.get("regime_width").unwrap() - 150.208).abs() < 1e-3);
        assert!((result.get("regime_depth").unwrap() - 4.132).abs() < 1e-3);
        assert!((result.get("afflux").unwrap() - result.get("empirical_afflux").unwrap()).abs() < 1e-12);
        assert!((result.get("foundation_level").unwrap() - 94.78).abs() < 0.01);
    }

    #[test]
    fn test_constricted_opening_fails_afflux() {
        let result = compute(&params(60.0), &ProjectContext::default()).unwrap();
        assert!(!result.passed);
        assert!(result.has_fatal_failure());
        assert!(result.warnings.iter().any(|w| w.starts_with("Afflux")));
        assert!(result.warnings.iter().any(|w| w.starts_with("Waterway ratio")));
    }

    #[test]
    fn test_bed_slope_parsing() {
        assert!((parse_bed_slope("1 in 975").unwrap() - 1.0 / 975.0).abs() < 1e-15);
        assert_eq!(parse_bed_slope("0.002"), Some(0.002));
        assert_eq!(parse_bed_slope("steep"), None);

        let p = params(150.0).with_text("bed_slope", "1 in 1000");
        let result = compute(&p, &ProjectContext::default()).unwrap();
        assert_eq!(result.get("bed_slope"), Some(0.001));

        let bad = params(150.0).with_text("bed_slope", "flat-ish");
        assert!(compute(&bad, &ProjectContext::default()).is_err());
    }

    #[test]
    fn test_zero_discharge_rejected() {
        let p = params(150.0).with_number("discharge", 0.0);
        let err = compute(&p, &ProjectContext::default()).unwrap_err();
        assert!(err.to_string().contains("discharge"));
    }
}
