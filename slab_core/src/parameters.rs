//! Typed parameter sets produced by the resolver and consumed by the
//! analysis modules.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::cell::RawCell;
use crate::errors::{DesignError, DesignResult};

/// A resolved parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Number(_) => "number",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Text(_) => "text",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Named parameters for one category, with the cells they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub category: Category,
    pub fields: BTreeMap<String, ParamValue>,
    /// Source cell of each field that was read from a workbook
    pub source_cells: BTreeMap<String, RawCell>,
}

impl ParameterSet {
    pub fn new(category: Category) -> Self {
        ParameterSet {
            category,
            fields: BTreeMap::new(),
            source_cells: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue, source: Option<RawCell>) {
        let name = name.into();
        if let Some(cell) = source {
            self.source_cells.insert(name.clone(), cell);
        }
        self.fields.insert(name, value);
    }

    /// Builder-style numeric insert, handy for hand-made sets.
    pub fn with_number(mut self, name: &str, value: f64) -> Self {
        self.insert(name, ParamValue::Number(value), None);
        self
    }

    /// Builder-style text insert.
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.insert(name, ParamValue::Text(value.to_string()), None);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// A required number.
    pub fn number(&self, name: &str) -> DesignResult<f64> {
        match self.fields.get(name) {
            None => Err(DesignError::MissingField {
                category: self.category,
                fields: vec![name.to_string()],
            }),
            Some(value) => self.expect_number(name, value),
        }
    }

    /// An optional number with a default.
    pub fn number_or(&self, name: &str, default: f64) -> DesignResult<f64> {
        match self.fields.get(name) {
            None => Ok(default),
            Some(value) => self.expect_number(name, value),
        }
    }

    /// A number if present.
    pub fn optional_number(&self, name: &str) -> DesignResult<Option<f64>> {
        self.fields
            .get(name)
            .map(|value| self.expect_number(name, value))
            .transpose()
    }

    /// Text form of a field, or the default.
    pub fn text_or(&self, name: &str, default: &str) -> String {
        self.fields
            .get(name)
            .map(ToString::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    fn expect_number(&self, name: &str, value: &ParamValue) -> DesignResult<f64> {
        value.as_number().ok_or_else(|| {
            DesignError::type_mismatch(self.category, name, "number", value.type_name())
        })
    }

    /// Fold a supplementary set into this one.
    ///
    /// Fields present in both must agree; a disagreement is reported as an
    /// inconsistent context naming both sources.
    pub fn merge(&mut self, other: ParameterSet) -> DesignResult<()> {
        for (name, value) in &other.fields {
            if let Some(existing) = self.fields.get(name) {
                if existing != value {
                    return Err(DesignError::InconsistentContext {
                        field: name.clone(),
                        expected: existing.to_string(),
                        per_module: BTreeMap::from([(
                            format!("{} (supplement)", other.category),
                            value.to_string(),
                        )]),
                    });
                }
            }
        }
        let ParameterSet {
            fields,
            mut source_cells,
            ..
        } = other;
        for (name, value) in fields {
            let source = source_cells.remove(&name);
            if !self.fields.contains_key(&name) {
                self.insert(name, value, source);
            }
        }
        Ok(())
    }
}
