//! # Formula Analysis
//!
//! Static inspection of formula text. Formulas are provenance, not
//! instructions: nothing here evaluates them. The analysis answers the
//! questions a reviewer asks of a calculation sheet: what does this cell
//! depend on, which functions does it use, which sheets feed which, and are
//! there references to blank cells or cycles.
//!
//! ```rust
//! use slab_core::formula::{FormulaAnalysis, FormulaKind};
//!
//! let analysis = FormulaAnalysis::of("=SQRT(B4*B5)+Loads!C7");
//! assert_eq!(analysis.functions, vec!["SQRT".to_string()]);
//! assert_eq!(analysis.kind, FormulaKind::Function);
//! assert_eq!(analysis.references.len(), 3);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::CellCoord;
use crate::extractor::ExtractedWorkbook;

static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*""#).expect("string literal pattern"));

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:'(?P<qsheet>[^']+)'|(?P<sheet>[A-Za-z_][A-Za-z0-9_.]*))!)?(?P<start>\$?[A-Za-z]{1,3}\$?[0-9]+)(?::(?P<end>\$?[A-Za-z]{1,3}\$?[0-9]+))?(?P<call>\s*\()?",
    )
    .expect("reference pattern")
});

static FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z][A-Za-z0-9.]*)\s*\(").expect("function pattern"));

const OPERATORS: &[char] = &['+', '-', '*', '/', '^', '<', '>', '=', '&'];

/// A reference to a cell or range, optionally on another sheet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub start: CellCoord,
    pub end: Option<CellCoord>,
}

impl CellReference {
    pub fn is_range(&self) -> bool {
        self.end.is_some()
    }
}

/// Coarse classification used for audit summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    Simple,
    Function,
    ComplexReference,
    ComplexArithmetic,
}

/// Everything we can learn from a formula without evaluating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaAnalysis {
    pub formula: String,
    /// References in order of appearance (duplicates kept)
    pub references: Vec<CellReference>,
    /// Function names, uppercased, sorted and deduplicated
    pub functions: Vec<String>,
    /// Distinct operator characters
    pub operators: Vec<char>,
    pub kind: FormulaKind,
    pub complexity: u32,
}

impl FormulaAnalysis {
    pub fn of(formula: &str) -> Self {
        let body = formula.trim().trim_start_matches('=');
        let stripped = STRING_LITERAL.replace_all(body, "\"\"");

        let mut references = Vec::new();
        for caps in REFERENCE.captures_iter(&stripped) {
            let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
            // A match glued to a preceding identifier is part of a name, not a reference.
            let glued = stripped[..whole]
                .chars()
                .next_back()
                .map(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                .unwrap_or(false);
            if glued || caps.name("call").is_some() {
                continue;
            }
            let sheet = caps
                .name("qsheet")
                .or_else(|| caps.name("sheet"))
                .map(|m| m.as_str().to_string());
            let Some(start) = caps.name("start").and_then(|m| m.as_str().parse().ok()) else {
                continue;
            };
            let end = caps.name("end").and_then(|m| m.as_str().parse().ok());
            references.push(CellReference { sheet, start, end });
        }

        let functions: Vec<String> = FUNCTION
            .captures_iter(&stripped)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let operators: Vec<char> = stripped
            .chars()
            .filter(|c| OPERATORS.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let cells = references.iter().filter(|r| !r.is_range()).count() as u32;
        let ranges = references.iter().filter(|r| r.is_range()).count() as u32;

        let kind = if !functions.is_empty() {
            FormulaKind::Function
        } else if cells > 5 || ranges > 0 {
            FormulaKind::ComplexReference
        } else if operators.len() > 3 {
            FormulaKind::ComplexArithmetic
        } else {
            FormulaKind::Simple
        };
        let complexity = cells + ranges * 2 + functions.len() as u32 * 3 + operators.len() as u32;

        FormulaAnalysis {
            formula: formula.to_string(),
            references,
            functions,
            operators,
            kind,
            complexity,
        }
    }

    /// Names of other sheets this formula reads from.
    pub fn referenced_sheets(&self) -> BTreeSet<&str> {
        self.references
            .iter()
            .filter_map(|r| r.sheet.as_deref())
            .collect()
    }
}

/// A formula that points at a cell nobody populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingReference {
    pub sheet: String,
    pub cell: CellCoord,
    pub formula: String,
    /// Missing targets as `Sheet!A1`
    pub missing: Vec<String>,
}

/// Workbook-level formula integrity report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookAudit {
    pub total_formulas: usize,
    /// sheet -> other sheets it reads from
    pub sheet_dependencies: BTreeMap<String, Vec<String>>,
    pub dangling_references: Vec<DanglingReference>,
    /// Each cycle as `Sheet!A1` nodes, first node repeated at the end
    pub circular_references: Vec<Vec<String>>,
}

type Node = (String, CellCoord);

impl WorkbookAudit {
    pub fn of(workbook: &ExtractedWorkbook) -> Self {
        let mut audit = WorkbookAudit::default();
        let mut graph: BTreeMap<Node, Vec<Node>> = BTreeMap::new();

        for (sheet_name, cells) in &workbook.sheets {
            let mut depends_on = BTreeSet::new();
            for cell in cells.values() {
                let Some(formula) = &cell.formula else { continue };
                audit.total_formulas += 1;
                let analysis = FormulaAnalysis::of(formula);

                let mut missing = Vec::new();
                let mut edges = Vec::new();
                for reference in analysis.references.iter().filter(|r| !r.is_range()) {
                    let target_sheet = match &reference.sheet {
                        Some(named) => canonical_sheet(workbook, named).to_string(),
                        None => sheet_name.clone(),
                    };
                    if target_sheet != *sheet_name {
                        depends_on.insert(target_sheet.clone());
                    }
                    let populated = workbook
                        .sheets
                        .get(&target_sheet)
                        .and_then(|s| s.get(&reference.start))
                        .map(|c| c.is_populated())
                        .unwrap_or(false);
                    if !populated {
                        missing.push(format!("{}!{}", target_sheet, reference.start));
                    }
                    edges.push((target_sheet, reference.start));
                }
                for reference in analysis.references.iter().filter(|r| r.is_range()) {
                    if let Some(named) = &reference.sheet {
                        let other = canonical_sheet(workbook, named);
                        if other != sheet_name {
                            depends_on.insert(other.to_string());
                        }
                    }
                }

                if !missing.is_empty() {
                    audit.dangling_references.push(DanglingReference {
                        sheet: sheet_name.clone(),
                        cell: cell.coord,
                        formula: formula.clone(),
                        missing,
                    });
                }
                graph.insert((sheet_name.clone(), cell.coord), edges);
            }
            if !depends_on.is_empty() {
                audit
                    .sheet_dependencies
                    .insert(sheet_name.clone(), depends_on.into_iter().collect());
            }
        }

        audit.circular_references = find_cycles(&graph);
        audit
    }

    pub fn is_clean(&self) -> bool {
        self.dangling_references.is_empty() && self.circular_references.is_empty()
    }
}

/// Sheet names in references match case-insensitively, as in the spreadsheet
/// itself. Unknown names are returned unchanged.
fn canonical_sheet<'a>(workbook: &'a ExtractedWorkbook, name: &'a str) -> &'a str {
    if workbook.sheets.contains_key(name) {
        return name;
    }
    workbook
        .sheets
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .map(String::as_str)
        .unwrap_or(name)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search with an explicit stack; chains of any length are safe.
/// Each frame is a node on the current path and the index of its next edge.
fn find_cycles(graph: &BTreeMap<Node, Vec<Node>>) -> Vec<Vec<String>> {
    let mut marks: BTreeMap<&Node, Mark> = graph.keys().map(|k| (k, Mark::Unvisited)).collect();
    let mut cycles = Vec::new();
    let mut stack: Vec<(&Node, usize)> = Vec::new();

    for start in graph.keys() {
        if marks.get(start).copied() != Some(Mark::Unvisited) {
            continue;
        }
        marks.insert(start, Mark::InProgress);
        stack.push((start, 0));

        while let Some(&(node, edge)) = stack.last() {
            let Some(next) = graph.get(node).and_then(|edges| edges.get(edge)) else {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            };
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            // Targets without formulas are leaves.
            let Some((key, _)) = graph.get_key_value(next) else { continue };
            match marks.get(key).copied().unwrap_or(Mark::Done) {
                Mark::Unvisited => {
                    marks.insert(key, Mark::InProgress);
                    stack.push((key, 0));
                }
                Mark::InProgress => {
                    if let Some(pos) = stack.iter().position(|(n, _)| *n == key) {
                        let mut cycle: Vec<String> =
                            stack[pos..].iter().map(|((s, c), _)| format!("{s}!{c}")).collect();
                        cycle.push(format!("{}!{}", key.0, key.1));
                        cycles.push(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
    }
    cycles
}
