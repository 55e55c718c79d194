//! # slab_core - Bridge Slab Design Pipeline
//!
//! `slab_core` turns engineering-calculation spreadsheets into one
//! consolidated bridge design record. All inputs and outputs are
//! JSON-serializable so a record can be stored, diffed or handed to a report
//! renderer unchanged.
//!
//! ## Pipeline
//!
//! 1. [`extractor`] reads workbook bytes into cells, keeping formula text as
//!    provenance next to the cached value
//! 2. [`resolver`] maps cells to typed [`parameters::ParameterSet`]s using a
//!    TOML [`field_spec`] per category
//! 3. [`coordinator`] checks shared geometry, runs the four [`analysis`]
//!    modules in fixed order and assembles a [`coordinator::DesignRecord`]
//! 4. [`output`] hands out a unique `{date}/{bridge type}/{serial}` path for
//!    every artifact written
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use slab_core::{Category, MasterCoordinator, ParameterSet, ProjectContext};
//!
//! let mut sets = BTreeMap::new();
//! sets.insert(Category::Stability, ParameterSet::new(Category::Stability)
//!     .with_number("structure_height", 6.5)
//!     .with_number("structure_width", 7.0)
//!     .with_number("bearing_capacity", 450.0));
//! sets.insert(Category::Hydraulic, ParameterSet::new(Category::Hydraulic)
//!     .with_number("discharge", 1000.0)
//!     .with_number("hfl", 101.0)
//!     .with_number("silt_factor", 1.5)
//!     .with_number("bridge_opening", 150.0));
//! sets.insert(Category::CrossSection, ParameterSet::new(Category::CrossSection)
//!     .with_number("slab_thickness", 0.75)
//!     .with_number("carriageway_width", 7.5));
//! sets.insert(Category::Abutment, ParameterSet::new(Category::Abutment)
//!     .with_number("height", 6.5)
//!     .with_number("bearing_capacity", 450.0));
//!
//! let record = MasterCoordinator::default()
//!     .run(ProjectContext::default(), sets)
//!     .unwrap();
//! println!("{}", serde_json::to_string_pretty(&record).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`cell`] - Coordinates, values and raw cells
//! - [`formula`] - Static formula analysis and workbook audit
//! - [`context`] - Project-wide inputs shared by all modules
//! - [`units`] - Units attached to result values
//! - [`errors`] - Structured error types
//! - [`file_io`] - Atomic writes, directory locks, context loading
//! - [`config`] - Run configuration
//! - [`collaborators`] - Report renderer and validator seams

pub mod analysis;
pub mod category;
pub mod cell;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod errors;
pub mod extractor;
pub mod field_spec;
pub mod file_io;
pub mod formula;
pub mod output;
pub mod parameters;
pub mod resolver;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use analysis::AnalysisResult;
pub use category::Category;
pub use cell::{CellCoord, CellValue, RawCell};
pub use collaborators::{DesignValidator, JsonRenderer, ReportFormat, ReportRenderer, ValidationOutcome};
pub use config::DesignConfig;
pub use context::ProjectContext;
pub use coordinator::{DesignRecord, ExecutionMode, MasterCoordinator, OverallStatus};
pub use errors::{DesignError, DesignResult};
pub use extractor::{ExtractedWorkbook, FormulaExtractor};
pub use field_spec::FieldSpec;
pub use output::{OutputPathAllocator, OutputSlot};
pub use parameters::{ParamValue, ParameterSet};
