//! Scalar summaries over a [`TabularResult`].
//!
//! Every recipe names its input columns as an ordered list of aliases. The
//! first alias present in the result wins; when none is present the recipe's
//! fallback applies instead of failing the page. A column that is present but
//! holds no values yields `0`, never the fallback.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tabular::{CellKey, Number, TabularResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    #[default]
    Zero,
    RowCount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    RowCount,
    CountDistinct { columns: Vec<String> },
    DistinctPairs { left: Vec<String>, right: Vec<String> },
    Sum { columns: Vec<String> },
    CountWhere { columns: Vec<String>, equals: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricRecipe {
    pub label: String,
    #[serde(flatten)]
    pub kind: MetricKind,
    #[serde(default)]
    pub fallback: Fallback,
}

impl MetricRecipe {
    #[must_use]
    pub fn new(label: impl Into<String>, kind: MetricKind, fallback: Fallback) -> Self {
        Self {
            label: label.into(),
            kind,
            fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Count(u64),
    Integer(i64),
    Real(f64),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTile {
    pub label: String,
    pub value: ScalarValue,
}

#[must_use]
pub fn derive(result: &TabularResult, recipes: &[MetricRecipe]) -> Vec<MetricTile> {
    recipes
        .iter()
        .map(|recipe| MetricTile {
            label: recipe.label.clone(),
            value: compute(result, recipe),
        })
        .collect()
}

#[must_use]
pub fn compute(result: &TabularResult, recipe: &MetricRecipe) -> ScalarValue {
    let resolved = match &recipe.kind {
        MetricKind::RowCount => Some(count(result.row_count())),
        MetricKind::CountDistinct { columns } => {
            resolve_column(result, columns).map(|index| count_distinct(result, index))
        }
        MetricKind::DistinctPairs { left, right } => {
            match (resolve_column(result, left), resolve_column(result, right)) {
                (Some(left), Some(right)) => Some(distinct_pairs(result, left, right)),
                _ => None,
            }
        }
        MetricKind::Sum { columns } => resolve_column(result, columns)
            .map(|index| sum(result, index, &recipe.label)),
        MetricKind::CountWhere { columns, equals } => resolve_column(result, columns)
            .map(|index| count_where(result, index, equals)),
    };

    resolved.unwrap_or_else(|| match recipe.fallback {
        Fallback::Zero => ScalarValue::Count(0),
        Fallback::RowCount => count(result.row_count()),
    })
}

/// First alias present in the result, in declaration order.
#[must_use]
pub fn resolve_column(result: &TabularResult, aliases: &[String]) -> Option<usize> {
    aliases.iter().find_map(|alias| result.column_index(alias))
}

fn count(value: usize) -> ScalarValue {
    ScalarValue::Count(u64::try_from(value).unwrap_or(u64::MAX))
}

fn count_distinct(result: &TabularResult, index: usize) -> ScalarValue {
    let distinct = result
        .column_values(index)
        .filter(|cell| !cell.is_null())
        .map(crate::tabular::CellValue::key)
        .collect::<HashSet<_>>();
    count(distinct.len())
}

fn distinct_pairs(result: &TabularResult, left: usize, right: usize) -> ScalarValue {
    let pairs = result
        .rows()
        .iter()
        .map(|row| (row[left].key(), row[right].key()))
        .collect::<HashSet<(CellKey, CellKey)>>();
    count(pairs.len())
}

fn count_where(result: &TabularResult, index: usize, equals: &str) -> ScalarValue {
    let matching = result
        .column_values(index)
        .filter(|cell| !cell.is_null() && cell.to_string() == equals)
        .count();
    count(matching)
}

#[allow(clippy::cast_precision_loss)]
fn sum(result: &TabularResult, index: usize, label: &str) -> ScalarValue {
    let mut integer_total = 0_i64;
    let mut real_total = 0.0_f64;
    let mut saw_real = false;
    let mut skipped = 0_usize;

    for cell in result.column_values(index) {
        match cell.as_number() {
            Some(Number::Integer(value)) => {
                if let Some(total) = integer_total.checked_add(value) {
                    integer_total = total;
                } else {
                    saw_real = true;
                    real_total += value as f64;
                }
            }
            Some(Number::Real(value)) => {
                saw_real = true;
                real_total += value;
            }
            None if cell.is_null() => {}
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            metric = label,
            column = %result.columns()[index],
            skipped,
            "sum metric skipped non-numeric cells"
        );
    }

    if saw_real {
        ScalarValue::Real(real_total + integer_total as f64)
    } else {
        ScalarValue::Integer(integer_total)
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Recipes shown on the views and overview pages when the config names none.
#[must_use]
pub fn default_recipes() -> Vec<MetricRecipe> {
    vec![
        MetricRecipe::new("Rows", MetricKind::RowCount, Fallback::Zero),
        MetricRecipe::new(
            "Food listings",
            MetricKind::CountDistinct {
                columns: aliases(&["Food_ID"]),
            },
            Fallback::RowCount,
        ),
        MetricRecipe::new(
            "Unique providers",
            MetricKind::CountDistinct {
                columns: aliases(&["Provider_ID", "Provider_Name"]),
            },
            Fallback::Zero,
        ),
        MetricRecipe::new(
            "Unique receivers",
            MetricKind::CountDistinct {
                columns: aliases(&["Receiver_ID", "Receiver_Name"]),
            },
            Fallback::Zero,
        ),
        MetricRecipe::new(
            "Provider-receiver pairs",
            MetricKind::DistinctPairs {
                left: aliases(&["Provider_Name"]),
                right: aliases(&["Receiver_Name"]),
            },
            Fallback::Zero,
        ),
        MetricRecipe::new(
            "Total quantity",
            MetricKind::Sum {
                columns: aliases(&["Quantity"]),
            },
            Fallback::Zero,
        ),
        MetricRecipe::new(
            "Completed claims",
            MetricKind::CountWhere {
                columns: aliases(&["Status"]),
                equals: "Completed".to_string(),
            },
            Fallback::Zero,
        ),
    ]
}
