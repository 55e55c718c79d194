//! # Cells
//!
//! The immutable unit of extraction: a [`RawCell`] carries the cached value a
//! spreadsheet stored for a cell together with its formula text, verbatim.
//!
//! Coordinates are zero-based internally and A1-formatted on the wire:
//!
//! ```rust
//! use slab_core::cell::CellCoord;
//!
//! let coord: CellCoord = "B3".parse().unwrap();
//! assert_eq!((coord.row, coord.col), (2, 1));
//! assert_eq!(coord.to_string(), "B3");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Populated cells of one sheet, ordered row-major.
pub type SheetCells = BTreeMap<CellCoord, RawCell>;

/// Zero-based cell coordinate. Ordering is row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        CellCoord { row, col }
    }

    /// Column letters for a zero-based column index (0 -> A, 26 -> AA).
    pub fn column_letters(col: u32) -> String {
        let mut n = col + 1;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = ((n - 1) % 26) as u8;
            letters.push((b'A' + rem) as char);
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }

    /// The coordinate immediately to the right.
    pub fn right(&self) -> CellCoord {
        CellCoord::new(self.row, self.col + 1)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellCoord::column_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellCoord {
    type Err = String;

    /// Parse A1 notation. `$` anchors are accepted and ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("'{s}' is not an A1 coordinate"))?;
        let (letters, digits) = cleaned.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("'{s}' is not an A1 coordinate"));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| format!("column in '{s}' is out of range"))?;
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| format!("'{s}' is not an A1 coordinate"))?;
        if row == 0 {
            return Err(format!("'{s}': rows start at 1"));
        }
        Ok(CellCoord::new(row - 1, col - 1))
    }
}

impl From<CellCoord> for String {
    fn from(coord: CellCoord) -> Self {
        coord.to_string()
    }
}

impl TryFrom<String> for CellCoord {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A scalar cell value as cached by the authoring tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Spreadsheet error such as `#DIV/0!`
    Error(String),
}

impl CellValue {
    /// Short type name used in mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Bool(_) => "boolean",
            CellValue::Error(_) => "error",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "\"{s}\""),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => f.write_str(e),
        }
    }
}

/// What a cell is doing in the calculation sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRole {
    /// Literal number or boolean typed by the engineer
    Input,
    /// Result of a formula
    Derived,
    /// Literal text, usually a caption for a neighbouring value
    Label,
    /// Cached spreadsheet error
    Error,
}

/// One extracted cell. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    pub coord: CellCoord,
    /// Last-evaluated value stored in the file (None if the cell holds a
    /// formula that was never calculated)
    pub value: Option<CellValue>,
    /// Formula text with a single leading `=`
    pub formula: Option<String>,
    pub role: CellRole,
}

impl RawCell {
    /// Build a cell and infer its role from value and formula.
    pub fn new(coord: CellCoord, value: Option<CellValue>, formula: Option<String>) -> Self {
        let formula = formula.map(|f| normalize_formula(&f)).filter(|f| !f.is_empty());
        let role = match (&value, &formula) {
            (Some(CellValue::Error(_)), _) => CellRole::Error,
            (_, Some(_)) => CellRole::Derived,
            (Some(CellValue::Text(_)), None) => CellRole::Label,
            _ => CellRole::Input,
        };
        RawCell {
            coord,
            value,
            formula,
            role,
        }
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// A cell is populated if it has a value or a formula.
    pub fn is_populated(&self) -> bool {
        self.value.is_some() || self.formula.is_some()
    }
}

/// Trim and ensure exactly one leading `=`.
pub fn normalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('=') {
        trimmed.to_owned()
    } else {
        format!("={trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let coord: CellCoord = "AA10".parse().unwrap();
        assert_eq!(coord, CellCoord::new(9, 26));
        assert_eq!(coord.to_string(), "AA10");
        assert_eq!("$C$4".parse::<CellCoord>().unwrap(), CellCoord::new(3, 2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<CellCoord>().is_err());
        assert!("12".parse::<CellCoord>().is_err());
        assert!("B0".parse::<CellCoord>().is_err());
        assert!("B-3".parse::<CellCoord>().is_err());
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(CellCoord::column_letters(0), "A");
        assert_eq!(CellCoord::column_letters(25), "Z");
        assert_eq!(CellCoord::column_letters(26), "AA");
        assert_eq!(CellCoord::column_letters(701), "ZZ");
        assert_eq!(CellCoord::column_letters(702), "AAA");
    }

    #[test]
    fn test_role_inference() {
        let c = CellCoord::new(0, 0);
        assert_eq!(RawCell::new(c, Some(CellValue::Number(1.0)), None).role, CellRole::Input);
        assert_eq!(
            RawCell::new(c, Some(CellValue::Number(2.0)), Some("A1*2".into())).role,
            CellRole::Derived
        );
        assert_eq!(RawCell::new(c, Some(CellValue::Text("Span".into())), None).role, CellRole::Label);
        assert_eq!(
            RawCell::new(c, Some(CellValue::Error("#DIV/0!".into())), Some("=1/0".into())).role,
            CellRole::Error
        );
    }

    #[test]
    fn test_formula_normalized() {
        let cell = RawCell::new(CellCoord::new(0, 1), None, Some(" SUM(A1:A3) ".into()));
        assert_eq!(cell.formula.as_deref(), Some("=SUM(A1:A3)"));
        assert!(cell.is_populated());
        assert_eq!(normalize_formula("=A1"), "=A1");
    }

    #[test]
    fn test_coord_serializes_as_a1() {
        let mut map = SheetCells::new();
        let coord = CellCoord::new(1, 1);
        map.insert(coord, RawCell::new(coord, Some(CellValue::Bool(true)), None));
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.starts_with("{\"B2\":"));
        let back: SheetCells = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
