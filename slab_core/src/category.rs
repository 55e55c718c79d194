//! Analysis categories and their fixed execution order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four analysis disciplines that make up a design run.
///
/// # Example
/// ```
/// use slab_core::category::Category;
///
/// assert_eq!(Category::ALL[0], Category::Stability);
/// assert_eq!(Category::CrossSection.key(), "cross_section");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Overturning, sliding and bearing checks of the substructure
    Stability,
    /// Regime, afflux and scour
    Hydraulic,
    /// Deck slab strip design
    CrossSection,
    /// Abutment geometry and stability
    Abutment,
}

impl Category {
    /// All categories in execution (and report) order.
    pub const ALL: [Category; 4] = [
        Category::Stability,
        Category::Hydraulic,
        Category::CrossSection,
        Category::Abutment,
    ];

    /// Snake-case key used in config files and serialized maps.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Stability => "stability",
            Category::Hydraulic => "hydraulic",
            Category::CrossSection => "cross_section",
            Category::Abutment => "abutment",
        }
    }

    /// Parse a config key (`stability`, `cross_section`, `cross-section`, ...).
    pub fn from_key(key: &str) -> Option<Category> {
        match key.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stability" => Some(Category::Stability),
            "hydraulic" | "hydraulics" => Some(Category::Hydraulic),
            "cross_section" | "crosssection" => Some(Category::CrossSection),
            "abutment" => Some(Category::Abutment),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Stability => "Stability",
            Category::Hydraulic => "Hydraulic",
            Category::CrossSection => "Cross-Section",
            Category::Abutment => "Abutment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
