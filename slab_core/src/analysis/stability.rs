//! # Substructure Stability
//!
//! Gravity block stability per metre run: overturning about the toe, sliding
//! on the base, bearing pressure and the position of the resultant.
//!
//! ## Assumptions
//!
//! - Rankine active thrust from the retained soil plus a uniform surcharge
//! - Passive resistance mobilised over the buried third of the height
//! - Pseudo-static seismic inertia `kh * W` acting at mid-height
//! - Self weight acts at the centre of the base

use serde::{Deserialize, Serialize};

use super::{
    base_pressure, ensure_category, rankine_ka, rankine_kp, require_friction_angle, require_non_negative,
    require_positive, AnalysisResult, ThresholdCheck,
};
use crate::category::Category;
use crate::context::ProjectContext;
use crate::errors::DesignResult;
use crate::parameters::ParameterSet;
use crate::units::Unit;

pub const REQUIRED_FIELDS: &[&str] = &["structure_height", "structure_width", "bearing_capacity"];

const MODULE: Category = Category::Stability;

/// Stability inputs with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityInput {
    /// Height of the structure (m)
    pub height_m: f64,
    /// Base width (m)
    pub width_m: f64,
    /// Safe bearing capacity (kN/m²)
    pub bearing_capacity_kpa: f64,
    /// kN/m³
    pub concrete_density: f64,
    /// kN/m³
    pub soil_density: f64,
    pub friction_angle_deg: f64,
    /// kN/m²
    pub cohesion_kpa: f64,
    /// kN/m²
    pub surcharge_kpa: f64,
    pub seismic_coefficient: f64,
    pub required_fs_sliding: f64,
    pub required_fs_overturning: f64,
}

impl StabilityInput {
    pub fn from_parameters(params: &ParameterSet) -> DesignResult<Self> {
        Ok(StabilityInput {
            height_m: params.number("structure_height")?,
            width_m: params.number("structure_width")?,
            bearing_capacity_kpa: params.number("bearing_capacity")?,
            concrete_density: params.number_or("concrete_density", 24.0)?,
            soil_density: params.number_or("soil_density", 18.0)?,
            friction_angle_deg: params.number_or("friction_angle", 30.0)?,
            cohesion_kpa: params.number_or("cohesion", 15.0)?,
            surcharge_kpa: params.number_or("surcharge", 10.0)?,
            seismic_coefficient: params.number_or("seismic_coefficient", 0.1)?,
            required_fs_sliding: params.number_or("required_fs_sliding", 1.5)?,
            required_fs_overturning: params.number_or("required_fs_overturning", 2.0)?,
        })
    }

    pub fn validate(&self) -> DesignResult<()> {
        require_positive(MODULE, "structure_height", self.height_m)?;
        require_positive(MODULE, "structure_width", self.width_m)?;
        require_positive(MODULE, "bearing_capacity", self.bearing_capacity_kpa)?;
        require_positive(MODULE, "concrete_density", self.concrete_density)?;
        require_positive(MODULE, "soil_density", self.soil_density)?;
        require_friction_angle(MODULE, self.friction_angle_deg)?;
        require_non_negative(MODULE, "cohesion", self.cohesion_kpa)?;
        require_non_negative(MODULE, "surcharge", self.surcharge_kpa)?;
        require_non_negative(MODULE, "seismic_coefficient", self.seismic_coefficient)?;
        require_positive(MODULE, "required_fs_sliding", self.required_fs_sliding)?;
        require_positive(MODULE, "required_fs_overturning", self.required_fs_overturning)?;
        Ok(())
    }
}

pub fn compute(params: &ParameterSet, ctx: &ProjectContext) -> DesignResult<AnalysisResult> {
    ensure_category(MODULE, params)?;
    ctx.validate(MODULE.label())?;
    let input = StabilityInput::from_parameters(params)?;
    input.validate()?;

    let h = input.height_m;
    let b = input.width_m;
    let phi = input.friction_angle_deg;

    let self_weight = h * b * input.concrete_density;

    let ka = rankine_ka(phi);
    let kp = rankine_kp(phi);
    let soil_thrust = 0.5 * ka * input.soil_density * h * h;
    let surcharge_thrust = ka * input.surcharge_kpa * h;
    let active_thrust = soil_thrust + surcharge_thrust;
    let thrust_height = (soil_thrust * h / 3.0 + surcharge_thrust * h / 2.0) / active_thrust;

    let buried = h / 3.0;
    let passive_resistance = 0.5 * kp * input.soil_density * buried * buried;
    let seismic_force = input.seismic_coefficient * self_weight;

    let overturning_moment = active_thrust * thrust_height + seismic_force * h / 2.0;
    let resisting_moment = self_weight * b / 2.0;
    let fs_overturning = resisting_moment / overturning_moment;

    let sliding_resistance = self_weight * phi.to_radians().tan() + input.cohesion_kpa * b + passive_resistance;
    let sliding_force = active_thrust + seismic_force;
    let fs_sliding = sliding_resistance / sliding_force;

    let eccentricity = overturning_moment / self_weight;
    let (max_pressure, min_pressure) = base_pressure(self_weight, b, eccentricity);

    let mut result = AnalysisResult::new(MODULE);
    result.value("self_weight", self_weight, Unit::KilonewtonPerMetre);
    result.value("ka", ka, Unit::Ratio);
    result.value("kp", kp, Unit::Ratio);
    result.value("active_thrust", active_thrust, Unit::KilonewtonPerMetre);
    result.value("thrust_height", thrust_height, Unit::Metre);
    result.value("passive_resistance", passive_resistance, Unit::KilonewtonPerMetre);
    result.value("seismic_force", seismic_force, Unit::KilonewtonPerMetre);
    result.value("overturning_moment", overturning_moment, Unit::KilonewtonMetre);
    result.value("resisting_moment", resisting_moment, Unit::KilonewtonMetre);
    result.value("fs_overturning", fs_overturning, Unit::Ratio);
    result.value("sliding_resistance", sliding_resistance, Unit::KilonewtonPerMetre);
    result.value("fs_sliding", fs_sliding, Unit::Ratio);
    result.value("eccentricity", eccentricity, Unit::Metre);
    result.value("max_bearing_pressure", max_pressure, Unit::KilonewtonPerSquareMetre);
    result.value("min_bearing_pressure", min_pressure, Unit::KilonewtonPerSquareMetre);

    result.check(ThresholdCheck::minimum(
        "Overturning",
        fs_overturning,
        input.required_fs_overturning,
        true,
    ));
    result.check(ThresholdCheck::minimum("Sliding", fs_sliding, input.required_fs_sliding, true));
    result.check(ThresholdCheck::maximum("Resultant within base", eccentricity, b / 2.0, true));
    result.check(ThresholdCheck::maximum(
        "Bearing pressure",
        max_pressure,
        input.bearing_capacity_kpa,
        true,
    ));
    result.check(ThresholdCheck::maximum("Middle third", eccentricity, b / 6.0, false));

    tracing::debug!(fs_overturning, fs_sliding, max_pressure, "Stability computed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(height: f64, width: f64) -> ParameterSet {
        ParameterSet::new(Category::Stability)
            .with_number("structure_height", height)
            .with_number("structure_width", width)
            .with_number("bearing_capacity", 450.0)
    }

    #[test]
    fn test_default_block_passes() {
        let result = compute(&params(6.5, 7.0), &ProjectContext::default()).unwrap();
        assert!(result.passed, "warnings: {:?}", result.warnings);
        assert!(result.warnings.is_empty());
        assert!((result.get("self_weight").unwrap() - 1092.0).abs() < 1e-9);
        assert!((result.get("fs_overturning").unwrap() - 5.46).abs() < 0.01);
        assert!((result.get("fs_sliding").unwrap() - 3.347).abs() < 0.01);
        assert!((result.get("max_bearing_pressure").unwrap() - 241.71).abs() < 0.05);
        assert_eq!(result.checks.len(), 5);
    }

    #[test]
    fn test_narrow_block_fails_but_is_a_result() {
        let p = params(6.5, 3.0).with_number("cohesion", 0.0);
        let result = compute(&p, &ProjectContext::default()).unwrap();
        assert!(!result.passed);
        assert!(result.has_fatal_failure());
        assert!(result.warnings.iter().any(|w| w.starts_with("Overturning")));
        let sliding = result.checks.iter().find(|c| c.name == "Sliding").unwrap();
        assert!(sliding.passed);
    }

    #[test]
    fn test_skew_out_of_range_is_domain_error() {
        let ctx = ProjectContext {
            skew_angle: 95.0,
            ..Default::default()
        };
        let err = compute(&params(6.5, 7.0), &ctx).unwrap_err();
        assert_eq!(err.error_code(), "DOMAIN_VALUE_ERROR");
        assert!(err.to_string().contains("skewAngle"));
        assert!(err.to_string().starts_with("Stability"));
    }

    #[test]
    fn test_zero_height_rejected() {
        let err = compute(&params(0.0, 7.0), &ProjectContext::default()).unwrap_err();
        assert!(err.to_string().contains("structure_height"));
    }

    #[test]
    fn test_missing_required_field() {
        let p = ParameterSet::new(Category::Stability).with_number("structure_height", 6.5);
        assert_eq!(
            compute(&p, &ProjectContext::default()).unwrap_err().error_code(),
            "MISSING_FIELD"
        );
    }

    #[test]
    fn test_idempotent() {
        let p = params(6.5, 7.0);
        let ctx = ProjectContext::default();
        let a = compute(&p, &ctx).unwrap();
        let b = compute(&p, &ctx).unwrap();
        assert_eq!(a, b);
    }
}
