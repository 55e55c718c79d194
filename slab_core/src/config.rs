//! # Run Configuration
//!
//! Optional TOML file controlling where artifacts go, how modules execute
//! and which field specs replace the built-in ones:
//!
//! ```toml
//! output_root = "outputs"
//! execution = "parallel"
//!
//! [field_specs]
//! hydraulic = "specs/district_hydraulic.toml"
//! live_load = "specs/live_load_70r.toml"
//! ```
//!
//! Relative spec paths are resolved against the config file's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::collaborators::ReportFormat;
use crate::coordinator::ExecutionMode;
use crate::errors::{DesignError, DesignResult};
use crate::field_spec::FieldSpec;

/// Key of the live-load spec override in `field_specs`.
pub const LIVE_LOAD_KEY: &str = "live_load";

/// Settings for a design run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignConfig {
    /// Root of the `{date}/{folder}/` artifact tree
    pub output_root: PathBuf,
    pub execution: ExecutionMode,
    /// Artifact formats to write for each completed run
    pub formats: Vec<ReportFormat>,
    /// Field spec overrides keyed by category key or `live_load`
    pub field_specs: BTreeMap<String, PathBuf>,
}

impl Default for DesignConfig {
    fn default() -> Self {
        DesignConfig {
            output_root: PathBuf::from("outputs"),
            execution: ExecutionMode::Sequential,
            formats: vec![ReportFormat::Json],
            field_specs: BTreeMap::new(),
        }
    }
}

impl DesignConfig {
    pub fn from_toml(source: &str) -> DesignResult<Self> {
        let config: DesignConfig = toml::from_str(source).map_err(|e| DesignError::serialization(e.to_string()))?;
        for key in config.field_specs.keys() {
            if key != LIVE_LOAD_KEY && Category::from_key(key).is_none() {
                return Err(DesignError::InvalidFieldSpec {
                    reason: format!("unknown field spec key '{key}'"),
                });
            }
        }
        Ok(config)
    }

    /// Load from disk, resolving relative paths against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> DesignResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;
        let mut config = Self::from_toml(&text)?;

        if let Some(base) = path.parent() {
            if config.output_root.is_relative() {
                config.output_root = base.join(&config.output_root);
            }
            for spec_path in config.field_specs.values_mut() {
                if spec_path.is_relative() {
                    *spec_path = base.join(&*spec_path);
                }
            }
        }
        Ok(config)
    }

    /// Field spec for a category: the override if configured, else the built-in.
    pub fn field_spec(&self, category: Category) -> DesignResult<FieldSpec> {
        let configured = self
            .field_specs
            .iter()
            .find(|(key, _)| Category::from_key(key) == Some(category))
            .map(|(_, path)| path);

        let spec = match configured {
            Some(path) => FieldSpec::from_file(path)?,
            None => FieldSpec::builtin(category)?,
        };
        if spec.category != category {
            return Err(DesignError::InvalidFieldSpec {
                reason: format!("spec for {} declares category {}", category, spec.category),
            });
        }
        Ok(spec)
    }

    /// Field spec for the live-load workbook.
    pub fn live_load_spec(&self) -> DesignResult<FieldSpec> {
        match self.field_specs.get(LIVE_LOAD_KEY) {
            Some(path) => FieldSpec::from_file(path),
            None => FieldSpec::live_load(),
        }
    }
}
