//! # Formula Extraction
//!
//! Reads a spreadsheet container from bytes and returns every populated cell
//! with its cached value and its formula text. Formulas are never evaluated
//! here; the value is whatever the authoring tool last stored in the file.
//!
//! Any format calamine auto-detects is accepted (xlsx, xlsm, xlsb, xls, ods).
//!
//! ## Example
//!
//! ```rust,no_run
//! use slab_core::extractor::FormulaExtractor;
//!
//! let bytes = std::fs::read("stability.xlsx").unwrap();
//! let workbook = FormulaExtractor::new().extract(&bytes).unwrap();
//! for (sheet, cells) in &workbook.sheets {
//!     println!("{sheet}: {} cells", cells.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};

use crate::cell::{CellCoord, CellValue, RawCell, SheetCells};
use crate::errors::{DesignError, DesignResult};

/// Optional capability for formula cells that carry no cached value.
///
/// The extractor only consults it for such cells; everything else comes
/// straight from the file.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, sheet: &str, coord: CellCoord, formula: &str) -> Option<CellValue>;
}

/// All populated cells of a workbook, keyed by sheet name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedWorkbook {
    /// Sheet names in workbook order
    pub sheet_order: Vec<String>,
    pub sheets: BTreeMap<String, SheetCells>,
}

impl ExtractedWorkbook {
    /// Cells of one sheet. Missing and empty sheets are errors.
    pub fn sheet(&self, name: &str) -> DesignResult<&SheetCells> {
        let cells = self.sheets.get(name).ok_or_else(|| DesignError::SheetNotFound {
            sheet: name.to_string(),
            available: self.sheet_names(),
        })?;
        if cells.is_empty() {
            return Err(DesignError::EmptyWorksheet {
                sheet: name.to_string(),
            });
        }
        Ok(cells)
    }

    /// The first sheet in workbook order that has at least one cell.
    pub fn first_populated(&self) -> Option<(&str, &SheetCells)> {
        self.sheet_order
            .iter()
            .filter_map(|name| self.sheets.get(name).map(|cells| (name.as_str(), cells)))
            .find(|(_, cells)| !cells.is_empty())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        if self.sheet_order.is_empty() {
            self.sheets.keys().cloned().collect()
        } else {
            self.sheet_order.clone()
        }
    }

    pub fn formula_count(&self) -> usize {
        self.sheets
            .values()
            .flat_map(|cells| cells.values())
            .filter(|c| c.has_formula())
            .count()
    }
}

/// Spreadsheet reader. Stateless apart from the optional evaluator.
#[derive(Default)]
pub struct FormulaExtractor {
    evaluator: Option<Box<dyn Evaluator>>,
}

impl FormulaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(evaluator: Box<dyn Evaluator>) -> Self {
        FormulaExtractor {
            evaluator: Some(evaluator),
        }
    }

    /// Extract every sheet of the workbook.
    pub fn extract(&self, bytes: &[u8]) -> DesignResult<ExtractedWorkbook> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| DesignError::unreadable(e.to_string()))?;

        let sheet_order = workbook.sheet_names().to_owned();
        let mut sheets = BTreeMap::new();

        for sheet_name in &sheet_order {
            let range = workbook
                .worksheet_range(sheet_name)
                .map_err(|e| DesignError::unreadable(format!("sheet '{sheet_name}': {e}")))?;

            let mut values: BTreeMap<CellCoord, CellValue> = BTreeMap::new();
            let (row0, col0) = range.start().unwrap_or((0, 0));
            for (row, col, data) in range.used_cells() {
                if let Some(value) = convert_value(data) {
                    values.insert(CellCoord::new(row0 + row as u32, col0 + col as u32), value);
                }
            }

            let mut formulas: BTreeMap<CellCoord, String> = BTreeMap::new();
            match workbook.worksheet_formula(sheet_name) {
                Ok(formula_range) => {
                    let (frow0, fcol0) = formula_range.start().unwrap_or((0, 0));
                    for (row, col, formula) in formula_range.used_cells() {
                        if !formula.trim().is_empty() {
                            formulas.insert(
                                CellCoord::new(frow0 + row as u32, fcol0 + col as u32),
                                formula.clone(),
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(sheet = %sheet_name, error = %e, "Formulas unavailable, keeping values only");
                }
            }

            let cells = self.merge(sheet_name, values, formulas);
            tracing::debug!(sheet = %sheet_name, cells = cells.len(), "Extracted sheet");
            sheets.insert(sheet_name.clone(), cells);
        }

        let extracted = ExtractedWorkbook { sheet_order, sheets };
        tracing::info!(
            sheets = extracted.sheets.len(),
            formulas = extracted.formula_count(),
            "Extracted workbook"
        );
        Ok(extracted)
    }

    /// Extract and return a single sheet.
    pub fn extract_sheet(&self, bytes: &[u8], sheet: &str) -> DesignResult<SheetCells> {
        let workbook = self.extract(bytes)?;
        workbook.sheet(sheet).cloned()
    }

    fn merge(
        &self,
        sheet: &str,
        mut values: BTreeMap<CellCoord, CellValue>,
        formulas: BTreeMap<CellCoord, String>,
    ) -> SheetCells {
        let mut cells = SheetCells::new();
        for (coord, formula) in formulas {
            let mut value = values.remove(&coord);
            if value.is_none() {
                if let Some(evaluator) = &self.evaluator {
                    value = evaluator.evaluate(sheet, coord, &formula);
                }
            }
            cells.insert(coord, RawCell::new(coord, value, Some(formula)));
        }
        for (coord, value) in values {
            cells.insert(coord, RawCell::new(coord, Some(value), None));
        }
        cells
    }
}

fn convert_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Error(e.to_string())),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
    }
}
