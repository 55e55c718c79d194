//! # Deck Slab Cross-Section
//!
//! Limit-state design of a one-metre strip of solid deck slab, simply
//! supported along the skew span.
//!
//! ## Assumptions
//!
//! - Dead load: slab self weight, wearing coat spread over the deck width,
//!   crash barriers, footpath live load and railing averaged over the width
//! - Live load: equivalent uniform intensity per IRC class times `(1 + impact)`
//! - Ultimate load `1.35 D + 1.75 L`
//! - Effective depth = thickness - 50 mm cover
//! - Deflection under service load with a cracked stiffness of `0.4 Ig`

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ensure_category, require_non_negative, require_positive, AnalysisResult, ThresholdCheck};
use crate::category::Category;
use crate::context::ProjectContext;
use crate::errors::{DesignError, DesignResult};
use crate::parameters::ParameterSet;
use crate::units::Unit;

pub const REQUIRED_FIELDS: &[&str] = &["slab_thickness", "carriageway_width"];

const MODULE: Category = Category::CrossSection;

const CONCRETE_DENSITY: f64 = 25.0;
const WEARING_COAT_DENSITY: f64 = 22.0;
const CRASH_BARRIER_LOAD: f64 = 3.0;
const FOOTPATH_LIVE_LOAD: f64 = 1.5;
const RAILING_LOAD: f64 = 1.5;
const COVER_M: f64 = 0.05;
const STRIP_MM: f64 = 1000.0;
const MIN_STEEL_RATIO: f64 = 0.0012;
const DEFLECTION_LIMIT: f64 = 250.0;
const SERVICEABILITY_LIMIT: f64 = 350.0;

/// IRC live load class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveLoadClass {
    #[serde(rename = "Class A")]
    ClassA,
    #[serde(rename = "Class AA")]
    ClassAA,
    #[serde(rename = "Class 70R")]
    Class70R,
    #[serde(rename = "Class A + 70R")]
    ClassAPlus70R,
}

impl LiveLoadClass {
    pub fn parse(text: &str) -> Option<Self> {
        let key: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        match key.trim_start_matches("CLASS") {
            "A" => Some(LiveLoadClass::ClassA),
            "AA" => Some(LiveLoadClass::ClassAA),
            "70R" => Some(LiveLoadClass::Class70R),
            "A+70R" => Some(LiveLoadClass::ClassAPlus70R),
            _ => None,
        }
    }

    /// Equivalent uniform intensity on the strip (kN/m²), before impact.
    pub fn intensity(&self) -> f64 {
        match self {
            LiveLoadClass::ClassA => 5.0,
            LiveLoadClass::ClassAA => 8.0,
            LiveLoadClass::Class70R | LiveLoadClass::ClassAPlus70R => 10.0,
        }
    }
}

impl fmt::Display for LiveLoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LiveLoadClass::ClassA => "Class A",
            LiveLoadClass::ClassAA => "Class AA",
            LiveLoadClass::Class70R => "Class 70R",
            LiveLoadClass::ClassAPlus70R => "Class A + 70R",
        })
    }
}

/// Cross-section inputs with defaults applied. Widths are per side where
/// a deck has two (footpath, barrier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionInput {
    pub slab_thickness_m: f64,
    pub carriageway_width_m: f64,
    pub footpath_width_m: f64,
    pub crash_barrier_width_m: f64,
    pub wearing_coat_m: f64,
    pub live_load_class: LiveLoadClass,
    pub impact_factor: f64,
}

impl CrossSectionInput {
    pub fn from_parameters(params: &ParameterSet) -> DesignResult<Self> {
        let class_text = params.text_or("live_load_class", "Class A");
        let live_load_class = LiveLoadClass::parse(&class_text).ok_or_else(|| {
            DesignError::domain_value(
                MODULE.label(),
                "live_load_class",
                class_text.clone(),
                "Expected Class A, Class AA, Class 70R or Class A + 70R",
            )
        })?;
        Ok(CrossSectionInput {
            slab_thickness_m: params.number("slab_thickness")?,
            carriageway_width_m: params.number("carriageway_width")?,
            footpath_width_m: params.number_or("footpath_width", 0.0)?,
            crash_barrier_width_m: params.number_or("crash_barrier_width", 0.5)?,
            wearing_coat_m: params.number_or("wearing_coat", 0.075)?,
            live_load_class,
            impact_factor: params.number_or("impact_factor", 0.25)?,
        })
    }

    pub fn validate(&self) -> DesignResult<()> {
        require_positive(MODULE, "slab_thickness", self.slab_thickness_m)?;
        if self.slab_thickness_m <= COVER_M {
            return Err(DesignError::domain_value(
                MODULE.label(),
                "slab_thickness",
                self.slab_thickness_m.to_string(),
                "Slab must be thicker than the 50 mm cover",
            ));
        }
        require_positive(MODULE, "carriageway_width", self.carriageway_width_m)?;
        require_non_negative(MODULE, "footpath_width", self.footpath_width_m)?;
        require_non_negative(MODULE, "crash_barrier_width", self.crash_barrier_width_m)?;
        require_non_negative(MODULE, "wearing_coat", self.wearing_coat_m)?;
        require_non_negative(MODULE, "impact_factor", self.impact_factor)?;
        Ok(())
    }

    pub fn total_width_m(&self) -> f64 {
        self.carriageway_width_m + 2.0 * self.footpath_width_m + 2.0 * self.crash_barrier_width_m
    }

    /// Dead load on the one-metre strip (kN/m).
    pub fn dead_load(&self) -> f64 {
        let total = self.total_width_m();
        let slab = self.slab_thickness_m * CONCRETE_DENSITY;
        let wearing = self.wearing_coat_m * WEARING_COAT_DENSITY * self.carriageway_width_m / total;
        let mut line_loads = 0.0;
        if self.crash_barrier_width_m > 0.0 {
            line_loads += 2.0 * CRASH_BARRIER_LOAD;
        }
        if self.footpath_width_m > 0.0 {
            line_loads += 2.0 * self.footpath_width_m * FOOTPATH_LIVE_LOAD + RAILING_LOAD;
        }
        slab + wearing + line_loads / total
    }

    /// Live load including impact (kN/m).
    pub fn live_load(&self) -> f64 {
        self.live_load_class.intensity() * (1.0 + self.impact_factor)
    }
}

/// Limiting neutral axis depth ratio for the steel grade.
fn xu_max_ratio(fy: f64) -> f64 {
    if fy <= 250.0 {
        0.53
    } else if fy <= 415.0 {
        0.48
    } else {
        0.46
    }
}

pub fn compute(params: &ParameterSet, ctx: &ProjectContext) -> DesignResult<AnalysisResult> {
    ensure_category(MODULE, params)?;
    ctx.validate(MODULE.label())?;
    let input = CrossSectionInput::from_parameters(params)?;
    input.validate()?;
    let fck = ctx.concrete_fck()?;
    let fy = ctx.steel_fy()?;

    let span = ctx.skew_span();
    let dead = input.dead_load();
    let live = input.live_load();
    let ultimate = 1.35 * dead + 1.75 * live;
    let moment = ultimate * span * span / 8.0;
    let shear = ultimate * span / 2.0;

    let depth_mm = input.slab_thickness_m * 1000.0;
    let d = (input.slab_thickness_m - COVER_M) * 1000.0;
    let xu = xu_max_ratio(fy) * d;
    let moment_capacity = 0.36 * fck * STRIP_MM * xu * (d - 0.42 * xu) / 1e6;

    let steel_required = moment * 1e6 / (0.87 * fy * 0.9 * d);
    let steel_minimum = MIN_STEEL_RATIO * STRIP_MM * depth_mm;
    let steel_provided = steel_required.max(steel_minimum);

    let shear_stress = shear * 1e3 / (STRIP_MM * d);
    let shear_capacity = 0.62 * fck.sqrt();

    let service = dead + live;
    let span_mm = span * 1000.0;
    let ec = 5000.0 * fck.sqrt();
    let gross_inertia = STRIP_MM * depth_mm.powi(3) / 12.0;
    let deflection = 5.0 * service * span_mm.powi(4) / (384.0 * ec * 0.4 * gross_inertia);

    let mut result = AnalysisResult::new(MODULE);
    result.value("design_span", span, Unit::Metre);
    result.value("total_width", input.total_width_m(), Unit::Metre);
    result.value("dead_load", dead, Unit::KilonewtonPerMetre);
    result.value("live_load", live, Unit::KilonewtonPerMetre);
    result.value("ultimate_load", ultimate, Unit::KilonewtonPerMetre);
    result.value("design_moment", moment, Unit::KilonewtonMetre);
    result.value("design_shear", shear, Unit::Kilonewton);
    result.value("effective_depth", d, Unit::Millimetre);
    result.value("moment_capacity", moment_capacity, Unit::KilonewtonMetre);
    result.value("steel_required", steel_required, Unit::SquareMillimetre);
    result.value("steel_provided", steel_provided, Unit::SquareMillimetre);
    result.value("shear_stress", shear_stress, Unit::NewtonPerSquareMillimetre);
    result.value("shear_capacity", shear_capacity, Unit::NewtonPerSquareMillimetre);
    result.value("deflection", deflection, Unit::Millimetre);

    result.check(ThresholdCheck::maximum("Flexure", moment, moment_capacity, true));
    result.check(ThresholdCheck::maximum("Shear", shear_stress, shear_capacity, false));
    result.check(ThresholdCheck::maximum(
        "Deflection",
        deflection,
        span_mm / DEFLECTION_LIMIT,
        true,
    ));
    result.check(ThresholdCheck::maximum(
        "Serviceability deflection",
        deflection,
        span_mm / SERVICEABILITY_LIMIT,
        false,
    ));

    tracing::debug!(moment, moment_capacity, deflection, "Cross-section computed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet::new(Category::CrossSection)
            .with_number("slab_thickness", 0.75)
            .with_number("carriageway_width", 7.5)
            .with_number("footpath_width", 1.0)
            .with_number("crash_barrier_width", 0.5)
    }

    #[test]
    fn test_standard_deck_passes() {
        let result = compute(&params(), &ProjectContext::default()).unwrap();
        assert!(result.passed, "warnings: {:?}", result.warnings);
        assert!((result.get("dead_load").unwrap() - 20.9286).abs() < 1e-3);
        assert!((result.get("design_moment").unwrap() - 705.4).abs() < 0.5);
        assert!((result.get("moment_capacity").unwrap() - 1690.1).abs() < 0.5);
        assert!((result.get("deflection").unwrap() - 20.87).abs() < 0.1);
    }

    #[test]
    fn test_skew_lengthens_span() {
        let ctx = ProjectContext {
            skew_angle: 30.0,
            ..Default::default()
        };
        let square = compute(&params(), &ProjectContext::default()).unwrap();
        let skewed = compute(&params(), &ctx).unwrap();
        assert!(skewed.get("design_span").unwrap() > 13.85);
        assert!(skewed.get("design_moment").unwrap() > square.get("design_moment").unwrap());
    }

    #[test]
    fn test_thin_slab_fails_deflection() {
        let p = params().with_number("slab_thickness", 0.35);
        let result = compute(&p, &ProjectContext::default()).unwrap();
        assert!(!result.passed);
        assert!(result.has_fatal_failure());
    }

    #[test]
    fn test_live_load_classes() {
        assert_eq!(LiveLoadClass::parse("Class AA"), Some(LiveLoadClass::ClassAA));
        assert_eq!(LiveLoadClass::parse("class a + 70r"), Some(LiveLoadClass::ClassAPlus70R));
        assert_eq!(LiveLoadClass::parse("70R"), Some(LiveLoadClass::Class70R));
        assert_eq!(LiveLoadClass::parse("HS20"), None);

        let heavy = compute(&params().with_text("live_load_class", "Class 70R"), &ProjectContext::default()).unwrap();
        assert!((heavy.get("live_load").unwrap() - 12.5).abs() < 1e-12);

        let unknown = params().with_text("live_load_class", "HS20");
        assert_eq!(
            compute(&unknown, &ProjectContext::default()).unwrap_err().error_code(),
            "DOMAIN_VALUE_ERROR"
        );
    }

    #[test]
    fn test_cover_exceeds_thickness() {
        let p = params().with_number("slab_thickness", 0.04);
        assert!(compute(&p, &ProjectContext::default()).is_err());
    }
}
