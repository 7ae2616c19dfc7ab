use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(String),
}

/// Hashable identity of a cell, used for distinct counting and filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
    Date(String),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn key(&self) -> CellKey {
        match self {
            Self::Null => CellKey::Null,
            Self::Integer(value) => CellKey::Integer(*value),
            // -0.0 and 0.0 must collapse to one key.
            Self::Real(value) if *value == 0.0 => CellKey::Real(0.0_f64.to_bits()),
            Self::Real(value) => CellKey::Real(value.to_bits()),
            Self::Text(value) => CellKey::Text(value.clone()),
            Self::Date(value) => CellKey::Date(value.clone()),
        }
    }

    /// Numeric reading of the cell. Text is parsed because text-protocol
    /// drivers deliver decimals as strings.
    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Integer(value) => Some(Number::Integer(*value)),
            Self::Real(value) => Some(Number::Real(*value)),
            Self::Text(raw) => {
                let trimmed = raw.trim();
                if let Ok(value) = trimmed.parse::<i64>() {
                    Some(Number::Integer(value))
                } else {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|value| value.is_finite())
                        .map(Number::Real)
                }
            }
            Self::Null | Self::Date(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) | Self::Date(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("row {row} has {actual} cells but the result has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Ordered named columns with equal-length rows. Zero rows is a valid result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, ShapeError> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ShapeError::RowWidth {
                    row: index,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Rows whose cell in `column` renders exactly as `value`.
    #[must_use]
    pub fn filter_rows(&self, column: usize, value: &str) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.get(column)
                    .is_some_and(|cell| !cell.is_null() && cell.to_string() == value)
            })
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    #[must_use]
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect()
    }
}
