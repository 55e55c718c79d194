//! # Abutment Design
//!
//! Proportions an abutment from its height and type, then checks it as a
//! rigid block over the full abutment width (the deck width): overturning
//! about the toe, sliding, base pressure and the resultant's position.
//!
//! ## Loads
//!
//! - Stem, base slab and wing walls at 25 kN/m³
//! - Backfill and surcharge over the heel
//! - Superstructure dead and live reactions at the stem
//! - Rankine active thrust, surcharge thrust, braking at deck level
//! - Seismic `kh * (structure + active thrust)` at mid-height

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    base_pressure, ensure_category, rankine_ka, require_friction_angle, require_non_negative, require_positive,
    AnalysisResult, ThresholdCheck,
};
use crate::category::Category;
use crate::context::ProjectContext;
use crate::errors::{DesignError, DesignResult};
use crate::parameters::ParameterSet;
use crate::units::Unit;

pub const REQUIRED_FIELDS: &[&str] = &["height", "bearing_capacity"];

const MODULE: Category = Category::Abutment;

const CONCRETE_DENSITY: f64 = 25.0;
const DECK_LIVE_LOAD: f64 = 5.0;
const BRAKING_FRACTION: f64 = 0.2;
const REQUIRED_FS_OVERTURNING: f64 = 2.0;
const REQUIRED_FS_SLIDING: f64 = 1.5;

/// Abutment form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbutmentType {
    #[serde(rename = "Type-1 Battered Faces")]
    Battered,
    #[serde(rename = "Type-2 Cantilever")]
    Cantilever,
    #[serde(rename = "Type-3 Counterfort")]
    Counterfort,
}

impl AbutmentType {
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        if lower.contains("type-1") || lower.contains("type 1") || lower.contains("batter") {
            Some(AbutmentType::Battered)
        } else if lower.contains("type-2") || lower.contains("type 2") || lower.contains("cantilever") {
            Some(AbutmentType::Cantilever)
        } else if lower.contains("type-3") || lower.contains("type 3") || lower.contains("counterfort") {
            Some(AbutmentType::Counterfort)
        } else {
            None
        }
    }
}

impl fmt::Display for AbutmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbutmentType::Battered => "Type-1 Battered Faces",
            AbutmentType::Cantilever => "Type-2 Cantilever",
            AbutmentType::Counterfort => "Type-3 Counterfort",
        })
    }
}

/// Proportioned abutment dimensions (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbutmentGeometry {
    pub height: f64,
    pub stem_top: f64,
    pub stem_base: f64,
    pub base_length: f64,
    pub toe_length: f64,
    /// Clear heel behind the stem
    pub heel_length: f64,
    pub wing_length: f64,
    pub wing_thickness: f64,
}

impl AbutmentGeometry {
    /// Standard proportions for the type, with an optional base length override.
    pub fn proportion(kind: AbutmentType, height: f64, base_length: Option<f64>) -> Self {
        let h = height;
        let (stem_top, stem_base, default_base, toe_ratio, wing_length) = match kind {
            AbutmentType::Battered => ((h / 15.0).max(0.3), (h / 8.0).max(0.6), (0.7 * h).max(4.0), 0.4, 0.8 * h),
            AbutmentType::Cantilever => ((h / 20.0).max(0.25), (h / 10.0).max(0.5), (0.8 * h).max(4.5), 0.3, 0.75 * h),
            AbutmentType::Counterfort => ((h / 25.0).max(0.2), (h / 12.0).max(0.4), (0.85 * h).max(5.0), 0.25, 0.9 * h),
        };
        let wing_thickness = match kind {
            AbutmentType::Battered => stem_top.max(0.3),
            AbutmentType::Cantilever => stem_top,
            AbutmentType::Counterfort => 0.8 * stem_base,
        };
        let base_length = base_length.unwrap_or(default_base);
        let toe_length = toe_ratio * base_length;
        AbutmentGeometry {
            height,
            stem_top,
            stem_base,
            base_length,
            toe_length,
            heel_length: base_length - toe_length - stem_base,
            wing_length,
            wing_thickness,
        }
    }
}

/// Abutment inputs with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbutmentInput {
    pub height_m: f64,
    pub bearing_capacity_kpa: f64,
    pub abutment_type: AbutmentType,
    pub soil_density: f64,
    pub friction_angle_deg: f64,
    pub surcharge_kpa: f64,
    pub seismic_coefficient: f64,
    pub base_friction: f64,
    pub cohesion_kpa: f64,
    pub base_length_m: Option<f64>,
    /// Superstructure slab thickness for the dead reaction
    pub slab_thickness_m: f64,
}

impl AbutmentInput {
    pub fn from_parameters(params: &ParameterSet) -> DesignResult<Self> {
        let type_text = params.text_or("abutment_type", "Type-1 Battered Faces");
        let abutment_type = AbutmentType::parse(&type_text).ok_or_else(|| {
            DesignError::domain_value(
                MODULE.label(),
                "abutment_type",
                type_text.clone(),
                "Expected Type-1 Battered Faces, Type-2 Cantilever or Type-3 Counterfort",
            )
        })?;
        Ok(AbutmentInput {
            height_m: params.number("height")?,
            bearing_capacity_kpa: params.number("bearing_capacity")?,
            abutment_type,
            soil_density: params.number_or("soil_density", 18.0)?,
            friction_angle_deg: params.number_or("friction_angle", 30.0)?,
            surcharge_kpa: params.number_or("surcharge", 10.0)?,
            seismic_coefficient: params.number_or("seismic_coefficient", 0.1)?,
            base_friction: params.number_or("base_friction", 0.5)?,
            cohesion_kpa: params.number_or("cohesion", 15.0)?,
            base_length_m: params.optional_number("base_length")?,
            slab_thickness_m: params.number_or("slab_thickness", 0.5)?,
        })
    }

    pub fn validate(&self) -> DesignResult<()> {
        require_positive(MODULE, "height", self.height_m)?;
        require_positive(MODULE, "bearing_capacity", self.bearing_capacity_kpa)?;
        require_positive(MODULE, "soil_density", self.soil_density)?;
        require_friction_angle(MODULE, self.friction_angle_deg)?;
        require_non_negative(MODULE, "surcharge", self.surcharge_kpa)?;
        require_non_negative(MODULE, "seismic_coefficient", self.seismic_coefficient)?;
        require_non_negative(MODULE, "base_friction", self.base_friction)?;
        require_non_negative(MODULE, "cohesion", self.cohesion_kpa)?;
        require_non_negative(MODULE, "slab_thickness", self.slab_thickness_m)?;
        if let Some(base) = self.base_length_m {
            require_positive(MODULE, "base_length", base)?;
        }
        Ok(())
    }
}

pub fn compute(params: &ParameterSet, ctx: &ProjectContext) -> DesignResult<AnalysisResult> {
    ensure_category(MODULE, params)?;
    ctx.validate(MODULE.label())?;
    let input = AbutmentInput::from_parameters(params)?;
    input.validate()?;

    let geo = AbutmentGeometry::proportion(input.abutment_type, input.height_m, input.base_length_m);
    if geo.heel_length < 0.0 {
        return Err(DesignError::domain_value(
            MODULE.label(),
            "base_length",
            geo.base_length.to_string(),
            "Base is shorter than toe plus stem",
        ));
    }

    let h = geo.height;
    let w = ctx.width;
    let b = geo.base_length;
    let stem_x = geo.toe_length + geo.stem_base / 2.0;
    let heel_x = geo.toe_length + geo.stem_base + geo.heel_length / 2.0;

    // Vertical loads and their lever arms about the toe
    let stem = 0.5 * (geo.stem_top + geo.stem_base) * h * w * CONCRETE_DENSITY;
    let base_slab = b * w * geo.stem_base * CONCRETE_DENSITY;
    let wings = 2.0 * geo.wing_length * h * geo.wing_thickness * CONCRETE_DENSITY;
    let structure = stem + base_slab + wings;
    let backfill = input.soil_density * geo.heel_length * (h - geo.stem_base).max(0.0) * w;
    let surcharge_vertical = input.surcharge_kpa * geo.heel_length * w;
    let dead_reaction = CONCRETE_DENSITY * input.slab_thickness_m * w * ctx.effective_span / 2.0;
    let live_reaction = DECK_LIVE_LOAD * w * ctx.effective_span / 2.0;
    let bridge_reaction = dead_reaction + live_reaction;
    let vertical = structure + backfill + surcharge_vertical + bridge_reaction;

    let resisting_moment = (stem + wings + bridge_reaction) * stem_x
        + base_slab * b / 2.0
        + (backfill + surcharge_vertical) * heel_x;

    // Horizontal loads and their heights above the base
    let ka = rankine_ka(input.friction_angle_deg);
    let earth_thrust = 0.5 * ka * input.soil_density * h * h * w;
    let surcharge_thrust = ka * input.surcharge_kpa * h * w;
    let seismic = input.seismic_coefficient * (structure + earth_thrust);
    let braking = BRAKING_FRACTION * live_reaction;
    let horizontal = earth_thrust + surcharge_thrust + seismic + braking;

    let overturning_moment = earth_thrust * h / 3.0 + surcharge_thrust * h / 2.0 + seismic * h / 2.0 + braking * h;

    let fs_overturning = resisting_moment / overturning_moment;
    let sliding_resistance = input.base_friction * vertical + input.cohesion_kpa * b * w;
    let fs_sliding = sliding_resistance / horizontal;

    let eccentricity = b / 2.0 - (resisting_moment - overturning_moment) / vertical;
    let (max_pressure, min_pressure) = base_pressure(vertical / w, b, eccentricity);

    let mut result = AnalysisResult::new(MODULE);
    result.value("stem_top", geo.stem_top, Unit::Metre);
    result.value("stem_base", geo.stem_base, Unit::Metre);
    result.value("base_length", b, Unit::Metre);
    result.value("toe_length", geo.toe_length, Unit::Metre);
    result.value("heel_length", geo.heel_length, Unit::Metre);
    result.value("wing_length", geo.wing_length, Unit::Metre);
    result.value("wing_thickness", geo.wing_thickness, Unit::Metre);
    result.value("structure_weight", structure, Unit::Kilonewton);
    result.value("bridge_reaction", bridge_reaction, Unit::Kilonewton);
    result.value("total_vertical", vertical, Unit::Kilonewton);
    result.value("total_horizontal", horizontal, Unit::Kilonewton);
    result.value("ka", ka, Unit::Ratio);
    result.value("overturning_moment", overturning_moment, Unit::KilonewtonMetre);
    result.value("resisting_moment", resisting_moment, Unit::KilonewtonMetre);
    result.value("fs_overturning", fs_overturning, Unit::Ratio);
    result.value("fs_sliding", fs_sliding, Unit::Ratio);
    result.value("eccentricity", eccentricity, Unit::Metre);
    result.value("max_bearing_pressure", max_pressure, Unit::KilonewtonPerSquareMetre);
    result.value("min_bearing_pressure", min_pressure, Unit::KilonewtonPerSquareMetre);

    result.check(ThresholdCheck::minimum(
        "Overturning",
        fs_overturning,
        REQUIRED_FS_OVERTURNING,
        true,
    ));
    result.check(ThresholdCheck::minimum("Sliding", fs_sliding, REQUIRED_FS_SLIDING, true));
    result.check(ThresholdCheck::maximum(
        "Bearing pressure",
        max_pressure,
        input.bearing_capacity_kpa,
        true,
    ));
    result.check(ThresholdCheck::maximum("Middle third", eccentricity.abs(), b / 6.0, false));

    tracing::debug!(
        abutment_type = %input.abutment_type,
        fs_overturning,
        fs_sliding,
        max_pressure,
        "Abutment computed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet::new(Category::Abutment)
            .with_number("height", 6.5)
            .with_number("bearing_capacity", 450.0)
    }

    #[test]
    fn test_battered_proportions() {
        let geo = AbutmentGeometry::proportion(AbutmentType::Battered, 6.5, None);
        assert!((geo.stem_top - 6.5 / 15.0).abs() < 1e-12);
        assert!((geo.stem_base - 0.8125).abs() < 1e-12);
        assert!((geo.base_length - 4.55).abs() < 1e-12);
        assert!((geo.toe_length + geo.stem_base + geo.heel_length - geo.base_length).abs() < 1e-12);
    }

    #[test]
    fn test_default_abutment_passes() {
        let result = compute(&params(), &ProjectContext::default()).unwrap();
        assert!(result.passed, "warnings: {:?}", result.warnings);
        assert!((result.get("fs_overturning").unwrap() - 3.168).abs() < 0.01);
        assert!((result.get("fs_sliding").unwrap() - 1.888).abs() < 0.01);
        assert!((result.get("max_bearing_pressure").unwrap() - 203.46).abs() < 0.1);
    }

    #[test]
    fn test_types_and_override() {
        let ctx = ProjectContext::default();
        for kind in ["Type-2 Cantilever", "Type-3 Counterfort"] {
            let result = compute(&params().with_text("abutment_type", kind), &ctx).unwrap();
            assert!(result.passed, "{kind}: {:?}", result.warnings);
        }
        let long = compute(&params().with_number("base_length", 7.5), &ctx).unwrap();
        assert_eq!(long.get("base_length"), Some(7.5));
        assert!(long.get("eccentricity").unwrap() < 0.0);
        assert!(long.passed);
    }

    #[test]
    fn test_short_base_rejected() {
        let err = compute(&params().with_number("base_length", 1.0), &ProjectContext::default()).unwrap_err();
        assert!(err.to_string().contains("base_length"));
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(AbutmentType::parse("type 2"), Some(AbutmentType::Cantilever));
        let err = compute(&params().with_text("abutment_type", "Arch"), &ProjectContext::default()).unwrap_err();
        assert_eq!(err.error_code(), "DOMAIN_VALUE_ERROR");
    }

    #[test]
    fn test_weak_soil_fails_bearing() {
        let p = params().with_number("bearing_capacity", 150.0);
        let result = compute(&p, &ProjectContext::default()).unwrap();
        assert!(!result.passed);
        assert!(result.warnings.iter().any(|w| w.starts_with("Bearing pressure")));
    }
}
