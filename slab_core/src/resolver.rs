//! # Parameter Resolution
//!
//! Maps extracted cells to the named parameters a category's analysis needs.
//! Resolution either yields a complete [`ParameterSet`] or reports every
//! problem it found at once, so one round trip to the spreadsheet fixes them
//! all.
//!
//! Problems are reported as:
//! - `MissingField` when required fields are absent and nothing else is wrong
//! - `TypeMismatch` when exactly one present field has the wrong type
//! - `InvalidParameters` for any other combination, missing fields first

use crate::analysis;
use crate::category::Category;
use crate::cell::{CellCoord, CellValue, RawCell, SheetCells};
use crate::errors::{DesignError, DesignResult};
use crate::extractor::{ExtractedWorkbook, FormulaExtractor};
use crate::field_spec::{FieldKind, FieldSource, FieldSpec};
use crate::parameters::{ParamValue, ParameterSet};

/// Resolve a category's parameters from one sheet's cells.
pub fn resolve(category: Category, cells: &SheetCells, spec: &FieldSpec) -> DesignResult<ParameterSet> {
    if spec.category != category {
        return Err(DesignError::InvalidFieldSpec {
            reason: format!("spec for {} used to resolve {}", spec.category, category),
        });
    }

    let module_required = analysis::required_fields(category);
    let mut set = ParameterSet::new(category);
    let mut missing: Vec<String> = Vec::new();
    let mut mismatches: Vec<DesignError> = Vec::new();

    for field in &spec.fields {
        let required = field.required || module_required.contains(&field.name.as_str());
        let Some(cell) = locate(cells, &field.source) else {
            if required {
                missing.push(field.name.clone());
            }
            continue;
        };
        match coerce(cell, field.kind) {
            Ok(value) => set.insert(field.name.clone(), value, Some(cell.clone())),
            Err(got) => mismatches.push(DesignError::type_mismatch(
                category,
                field.name.clone(),
                field.kind.to_string(),
                format!("{got} at {}", cell.coord),
            )),
        }
    }

    for name in module_required {
        if spec.field(name).is_none() {
            missing.push((*name).to_string());
        }
    }

    if !missing.is_empty() || !mismatches.is_empty() {
        tracing::warn!(
            category = %category,
            missing = ?missing,
            mismatches = mismatches.len(),
            "Unresolved parameters"
        );
    }

    match (missing.is_empty(), mismatches.len()) {
        (true, 0) => {
            tracing::debug!(category = %category, fields = set.fields.len(), "Resolved parameters");
            Ok(set)
        }
        (false, 0) => Err(DesignError::MissingField {
            category,
            fields: missing,
        }),
        (true, 1) => Err(mismatches.remove(0)),
        _ => {
            let mut errors = Vec::with_capacity(mismatches.len() + 1);
            if !missing.is_empty() {
                errors.push(DesignError::MissingField {
                    category,
                    fields: missing,
                });
            }
            errors.extend(mismatches);
            Err(DesignError::InvalidParameters { category, errors })
        }
    }
}

/// Resolve against the spec's sheet, or the first populated sheet.
pub fn resolve_workbook(
    category: Category,
    workbook: &ExtractedWorkbook,
    spec: &FieldSpec,
) -> DesignResult<ParameterSet> {
    let cells = match &spec.sheet {
        Some(name) => workbook.sheet(name)?,
        None => {
            let (name, cells) = workbook.first_populated().ok_or_else(|| DesignError::EmptyWorksheet {
                sheet: workbook
                    .sheet_names()
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "<none>".to_string()),
            })?;
            tracing::debug!(category = %category, sheet = name, "Resolving from first populated sheet");
            cells
        }
    };
    resolve(category, cells, spec)
}

/// Extract a workbook from bytes and resolve it in one step.
pub fn resolve_bytes(
    category: Category,
    extractor: &FormulaExtractor,
    bytes: &[u8],
    spec: &FieldSpec,
) -> DesignResult<ParameterSet> {
    let workbook = extractor.extract(bytes)?;
    resolve_workbook(category, &workbook, spec)
}

fn locate<'a>(cells: &'a SheetCells, source: &FieldSource) -> Option<&'a RawCell> {
    match source {
        FieldSource::Cell(coord) => cells.get(coord).filter(|c| c.is_populated()),
        FieldSource::Label(pattern) => {
            let label = cells.values().find(|c| {
                c.formula.is_none()
                    && c.value
                        .as_ref()
                        .and_then(CellValue::as_text)
                        .map(|text| pattern.is_match(text))
                        .unwrap_or(false)
            })?;
            let row = label.coord.row;
            cells
                .range(label.coord.right()..CellCoord::new(row + 1, 0))
                .map(|(_, cell)| cell)
                .find(|c| c.is_populated())
        }
    }
}

/// Coerce a cell to the declared kind, or describe what was found instead.
fn coerce(cell: &RawCell, kind: FieldKind) -> Result<ParamValue, String> {
    let Some(value) = &cell.value else {
        return Err(match &cell.formula {
            Some(formula) => format!("formula {formula} with no cached value"),
            None => "empty cell".to_string(),
        });
    };
    if let CellValue::Error(code) = value {
        return Err(format!("error {code}"));
    }

    match kind {
        FieldKind::Number => match value {
            CellValue::Number(n) => Ok(ParamValue::Number(*n)),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ParamValue::Number)
                .ok_or_else(|| format!("text {value}")),
            _ => Err(value.type_name().to_string()),
        },
        FieldKind::Text => Ok(ParamValue::Text(match value {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Error(e) => e.clone(),
        })),
        FieldKind::Boolean => match value {
            CellValue::Bool(b) => Ok(ParamValue::Bool(*b)),
            CellValue::Number(n) if *n == 0.0 => Ok(ParamValue::Bool(false)),
            CellValue::Number(n) if *n == 1.0 => Ok(ParamValue::Bool(true)),
            CellValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "y" | "true" => Ok(ParamValue::Bool(true)),
                "no" | "n" | "false" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("text {value}")),
            },
            _ => Err(format!("{} {value}", value.type_name())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[(&str, CellValue)]) -> SheetCells {
        let mut cells = SheetCells::new();
        for (i, (label, value)) in rows.iter().enumerate() {
            let a = CellCoord::new(i as u32 + 5, 0);
            let b = a.right();
            cells.insert(a, RawCell::new(a, Some(CellValue::Text(label.to_string())), None));
            cells.insert(b, RawCell::new(b, Some(value.clone()), None));
        }
        cells
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    #[test]
    fn test_resolve_by_label() {
        let cells = sheet(&[
            ("Structure Height", num(6.5)),
            ("Structure Width", num(7.0)),
            ("Bearing Capacity", CellValue::Text(" 450 ".into())),
        ]);
        let spec = FieldSpec::builtin(Category::Stability).unwrap();
        let set = resolve(Category::Stability, &cells, &spec).unwrap();
        assert_eq!(set.number("structure_height").unwrap(), 6.5);
        assert_eq!(set.number("bearing_capacity").unwrap(), 450.0);
        assert_eq!(set.source_cells["structure_width"].coord.to_string(), "B7");
    }

    #[test]
    fn test_all_missing_fields_reported() {
        let cells = sheet(&[("Design Discharge", num(1000.0))]);
        let spec = FieldSpec::builtin(Category::Hydraulic).unwrap();
        match resolve(Category::Hydraulic, &cells, &spec).unwrap_err() {
            DesignError::MissingField { category, fields } => {
                assert_eq!(category, Category::Hydraulic);
                assert_eq!(fields, vec!["hfl", "silt_factor", "bridge_opening"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_single_mismatch() {
        let cells = sheet(&[
            ("Total Height", CellValue::Text("tall".into())),
            ("Bearing Capacity", num(300.0)),
        ]);
        let spec = FieldSpec::builtin(Category::Abutment).unwrap();
        match resolve(Category::Abutment, &cells, &spec).unwrap_err() {
            DesignError::TypeMismatch { field, expected, got, .. } => {
                assert_eq!(field, "height");
                assert_eq!(expected, "number");
                assert!(got.contains("tall"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_combined_problems() {
        let mut cells = sheet(&[("Structure Height", CellValue::Bool(true))]);
        let b7 = CellCoord::new(6, 1);
        let a7 = CellCoord::new(6, 0);
        cells.insert(a7, RawCell::new(a7, Some(CellValue::Text("Structure Width".into())), None));
        cells.insert(b7, RawCell::new(b7, None, Some("=B6*2".into())));

        let spec = FieldSpec::builtin(Category::Stability).unwrap();
        match resolve(Category::Stability, &cells, &spec).unwrap_err() {
            DesignError::InvalidParameters { errors, .. } => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors[0].error_code(), "MISSING_FIELD");
                assert_eq!(errors[1].error_code(), "TYPE_MISMATCH");
                assert!(errors[2].to_string().contains("no cached value"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_module_required_fields_enforced() {
        let spec = FieldSpec::from_toml(
            "category = \"hydraulic\"\n[[fields]]\nname = \"discharge\"\nkind = \"number\"\ncell = \"B6\"\n",
        )
        .unwrap();
        let cells = sheet(&[("Design Discharge", num(1000.0))]);
        match resolve(Category::Hydraulic, &cells, &spec).unwrap_err() {
            DesignError::MissingField { fields, .. } => {
                assert_eq!(fields, vec!["hfl", "silt_factor", "bridge_opening"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_boolean_coercion() {
        let cell = |v: CellValue| RawCell::new(CellCoord::new(0, 0), Some(v), None);
        assert_eq!(coerce(&cell(CellValue::Text("Yes".into())), FieldKind::Boolean), Ok(ParamValue::Bool(true)));
        assert_eq!(coerce(&cell(num(0.0)), FieldKind::Boolean), Ok(ParamValue::Bool(false)));
        assert!(coerce(&cell(num(2.0)), FieldKind::Boolean).is_err());
        assert_eq!(coerce(&cell(num(25.0)), FieldKind::Text), Ok(ParamValue::Text("25".into())));
        assert!(coerce(&cell(CellValue::Error("#REF!".into())), FieldKind::Text).is_err());
    }

    #[test]
    fn test_wrong_spec_category() {
        let spec = FieldSpec::builtin(Category::Abutment).unwrap();
        let err = resolve(Category::Stability, &SheetCells::new(), &spec).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FIELD_SPEC");
    }
}
