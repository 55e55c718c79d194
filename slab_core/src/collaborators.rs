//! # External Collaborators
//!
//! Seams for the parts of a design run that live outside this crate:
//!
//! - [`ReportRenderer`] turns a [`DesignRecord`] into artifact bytes. The
//!   built-in [`JsonRenderer`] writes pretty JSON; HTML, PDF and DOCX
//!   renderers plug in behind the same trait.
//! - [`DesignValidator`] reviews a finished result (for example an external
//!   reviewer service). It is advisory: a record is complete without it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::context::ProjectContext;
use crate::coordinator::DesignRecord;
use crate::errors::{DesignError, DesignResult};

/// Artifact formats a renderer may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
    Pdf,
    Docx,
}

impl ReportFormat {
    pub fn default_extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_extension())
    }
}

/// Renders a design record into the bytes of one artifact.
pub trait ReportRenderer {
    fn render(&self, record: &DesignRecord, format: ReportFormat) -> DesignResult<Vec<u8>>;

    /// File extension (without the dot) for artifacts of `format`.
    fn extension(&self, format: ReportFormat) -> &str {
        format.default_extension()
    }

    fn supports(&self, _format: ReportFormat) -> bool {
        true
    }
}

/// Fail unless `renderer` can produce every one of `formats`.
pub fn check_formats(renderer: &dyn ReportRenderer, formats: &[ReportFormat]) -> DesignResult<()> {
    let unsupported: Vec<String> = formats
        .iter()
        .filter(|f| !renderer.supports(**f))
        .map(|f| f.to_string())
        .collect();
    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(DesignError::serialization(format!(
            "no renderer for {} output",
            unsupported.join(", ")
        )))
    }
}

/// Pretty-printed JSON of the whole record.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, record: &DesignRecord, format: ReportFormat) -> DesignResult<Vec<u8>> {
        if !self.supports(format) {
            return Err(DesignError::serialization(format!(
                "JsonRenderer cannot produce {format} output"
            )));
        }
        serde_json::to_vec_pretty(record).map_err(|e| DesignError::serialization(e.to_string()))
    }

    fn supports(&self, format: ReportFormat) -> bool {
        format == ReportFormat::Json
    }
}

/// What an external review of one result came back with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Feedback(String),
    Unavailable,
    TimedOut,
}

/// Reviews one analysis result in the context of the project.
pub trait DesignValidator {
    fn validate(&self, result: &AnalysisResult, context: &ProjectContext) -> ValidationOutcome;
}
