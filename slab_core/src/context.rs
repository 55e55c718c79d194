//! # Project Context
//!
//! Run-wide inputs supplied once and read by every analysis module: bridge
//! identity, the geometry shared across disciplines, and material grades.
//!
//! ## Example
//!
//! ```rust
//! use slab_core::context::ProjectContext;
//!
//! let ctx = ProjectContext {
//!     bridge_name: "Bundan River Bridge".to_string(),
//!     effective_span: 15.0,
//!     ..ProjectContext::default()
//! };
//! assert!(ctx.validate("context").is_ok());
//! assert_eq!(ctx.concrete_fck().unwrap(), 25.0);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DesignError, DesignResult};

/// Read-only description of the bridge being designed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectContext {
    pub bridge_name: String,
    pub location: String,
    /// Bridge type, also the output folder name (e.g. "High Level Bridge")
    pub bridge_type: String,
    /// Effective span in metres
    pub effective_span: f64,
    /// Overall deck width in metres
    pub width: f64,
    pub number_of_spans: u32,
    /// Skew angle in degrees, [0, 90)
    pub skew_angle: f64,
    /// Governing standard (e.g. "IRC-6")
    pub design_code: String,
    /// Concrete grade (e.g. "M25")
    pub concrete_grade: String,
    /// Reinforcement grade (e.g. "Fe415")
    pub steel_grade: String,
    /// Design life in years
    pub design_life: u32,
}

impl Default for ProjectContext {
    fn default() -> Self {
        ProjectContext {
            bridge_name: String::new(),
            location: String::new(),
            bridge_type: "High Level Bridge".to_string(),
            effective_span: 12.0,
            width: 8.5,
            number_of_spans: 3,
            skew_angle: 0.0,
            design_code: "IRC-6".to_string(),
            concrete_grade: "M25".to_string(),
            steel_grade: "Fe415".to_string(),
            design_life: 100,
        }
    }
}

impl ProjectContext {
    /// Reject physically impossible shared geometry.
    ///
    /// `module` names who is asking, so the error points at the right place.
    pub fn validate(&self, module: &str) -> DesignResult<()> {
        if !self.effective_span.is_finite() || self.effective_span <= 0.0 {
            return Err(DesignError::domain_value(
                module,
                SharedField::EffectiveSpan.display_name(),
                self.effective_span.to_string(),
                "Span must be positive",
            ));
        }
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(DesignError::domain_value(
                module,
                SharedField::Width.display_name(),
                self.width.to_string(),
                "Width must be positive",
            ));
        }
        if self.number_of_spans == 0 {
            return Err(DesignError::domain_value(
                module,
                SharedField::NumberOfSpans.display_name(),
                "0",
                "At least one span is required",
            ));
        }
        if !(0.0..90.0).contains(&self.skew_angle) {
            return Err(DesignError::domain_value(
                module,
                SharedField::SkewAngle.display_name(),
                self.skew_angle.to_string(),
                "Skew angle must be in [0, 90) degrees",
            ));
        }
        Ok(())
    }

    /// Characteristic concrete strength in N/mm^2 from the grade (`M25` -> 25).
    pub fn concrete_fck(&self) -> DesignResult<f64> {
        parse_grade(&self.concrete_grade, "M", "concreteGrade")
    }

    /// Reinforcement yield strength in N/mm^2 from the grade (`Fe415` -> 415).
    pub fn steel_fy(&self) -> DesignResult<f64> {
        parse_grade(&self.steel_grade, "Fe", "steelGrade")
    }

    /// Effective span measured along the skew, in metres.
    pub fn skew_span(&self) -> f64 {
        self.effective_span / self.skew_angle.to_radians().cos()
    }
}

fn parse_grade(grade: &str, prefix: &str, field: &str) -> DesignResult<f64> {
    let trimmed = grade.trim();
    let rest = match trimmed.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &trimmed[prefix.len()..],
        _ => trimmed,
    };
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits
        .parse::<f64>()
        .ok()
        .filter(|v| *v > 0.0)
        .ok_or_else(|| {
            DesignError::domain_value("context", field, grade, format!("Expected a grade like {prefix}25"))
        })
}

/// Context fields that must agree across every parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SharedField {
    EffectiveSpan,
    Width,
    NumberOfSpans,
    SkewAngle,
}

impl SharedField {
    pub const ALL: [SharedField; 4] = [
        SharedField::EffectiveSpan,
        SharedField::Width,
        SharedField::NumberOfSpans,
        SharedField::SkewAngle,
    ];

    /// Field name inside a parameter set
    pub fn param_name(&self) -> &'static str {
        match self {
            SharedField::EffectiveSpan => "effective_span",
            SharedField::Width => "width",
            SharedField::NumberOfSpans => "number_of_spans",
            SharedField::SkewAngle => "skew_angle",
        }
    }

    /// Name used in error reports
    pub fn display_name(&self) -> &'static str {
        match self {
            SharedField::EffectiveSpan => "effectiveSpan",
            SharedField::Width => "width",
            SharedField::NumberOfSpans => "numberOfSpans",
            SharedField::SkewAngle => "skewAngle",
        }
    }

    pub fn value(&self, ctx: &ProjectContext) -> f64 {
        match self {
            SharedField::EffectiveSpan => ctx.effective_span,
            SharedField::Width => ctx.width,
            SharedField::NumberOfSpans => ctx.number_of_spans as f64,
            SharedField::SkewAngle => ctx.skew_angle,
        }
    }
}

impl fmt::Display for SharedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
