//! # Field Specifications
//!
//! A field spec tells the resolver where a category's parameters live in a
//! workbook and what type each one must have. Specs are TOML:
//!
//! ```toml
//! category = "hydraulic"
//! sheet = "Hydraulic Analysis"   # optional, defaults to the first sheet
//!
//! [[fields]]
//! name = "discharge"
//! kind = "number"
//! required = true
//! label = '(?i)^design discharge'   # value is right of the caption
//!
//! [[fields]]
//! name = "hfl"
//! kind = "number"
//! cell = "B7"                        # or an exact coordinate
//! ```
//!
//! Built-in specs for every category ship with the crate and can be replaced
//! through [`crate::config::DesignConfig`].

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::cell::CellCoord;
use crate::errors::{DesignError, DesignResult};

const STABILITY_SPEC: &str = include_str!("../specs/stability.toml");
const HYDRAULIC_SPEC: &str = include_str!("../specs/hydraulic.toml");
const CROSS_SECTION_SPEC: &str = include_str!("../specs/cross_section.toml");
const LIVE_LOAD_SPEC: &str = include_str!("../specs/live_load.toml");
const ABUTMENT_SPEC: &str = include_str!("../specs/abutment.toml");

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    Boolean,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::Number => "number",
            FieldKind::Text => "text",
            FieldKind::Boolean => "boolean",
        })
    }
}

/// Where a field's value is found.
#[derive(Debug, Clone)]
pub enum FieldSource {
    /// An exact coordinate
    Cell(CellCoord),
    /// First text cell matching the pattern; the value is the nearest
    /// populated cell to its right
    Label(Regex),
}

/// One entry of a field spec.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub source: FieldSource,
}

/// Field table for one category.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub category: Category,
    /// Sheet to read; the first populated sheet when absent
    pub sheet: Option<String>,
    pub fields: Vec<FieldDef>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    category: String,
    sheet: Option<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    kind: FieldKind,
    #[serde(default)]
    required: bool,
    cell: Option<String>,
    label: Option<String>,
}

fn invalid(reason: impl Into<String>) -> DesignError {
    DesignError::InvalidFieldSpec {
        reason: reason.into(),
    }
}

impl FieldSpec {
    /// Parse and validate a TOML field spec.
    pub fn from_toml(source: &str) -> DesignResult<Self> {
        let raw: RawSpec = toml::from_str(source).map_err(|e| invalid(e.to_string()))?;
        let category = Category::from_key(&raw.category)
            .ok_or_else(|| invalid(format!("unknown category '{}'", raw.category)))?;

        let mut fields: Vec<FieldDef> = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            let name = field.name.trim().to_string();
            if name.is_empty() {
                return Err(invalid("field with empty name"));
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(invalid(format!("field '{name}' declared twice")));
            }
            let source = match (field.cell, field.label) {
                (Some(cell), None) => FieldSource::Cell(
                    cell.parse()
                        .map_err(|e: String| invalid(format!("field '{name}': {e}")))?,
                ),
                (None, Some(pattern)) => FieldSource::Label(
                    Regex::new(&pattern)
                        .map_err(|e| invalid(format!("field '{name}': bad label pattern: {e}")))?,
                ),
                _ => {
                    return Err(invalid(format!(
                        "field '{name}' needs exactly one of `cell` or `label`"
                    )))
                }
            };
            fields.push(FieldDef {
                name,
                kind: field.kind,
                required: field.required,
                source,
            });
        }

        Ok(FieldSpec {
            category,
            sheet: raw.sheet,
            fields,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> DesignResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;
        Self::from_toml(&text)
    }

    /// Built-in spec for a category.
    pub fn builtin(category: Category) -> DesignResult<Self> {
        let source = match category {
            Category::Stability => STABILITY_SPEC,
            Category::Hydraulic => HYDRAULIC_SPEC,
            Category::CrossSection => CROSS_SECTION_SPEC,
            Category::Abutment => ABUTMENT_SPEC,
        };
        Self::from_toml(source)
    }

    /// Built-in spec for the live-load workbook (merged into cross-section).
    pub fn live_load() -> DesignResult<Self> {
        Self::from_toml(LIVE_LOAD_SPEC)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}
