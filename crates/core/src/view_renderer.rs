use std::collections::BTreeSet;

use crate::metrics::{derive, MetricRecipe, MetricTile};
use crate::query_runner::FetchError;
use crate::tabular::TabularResult;

pub const ALL_OPTION: &str = "(All)";

/// Single-select over the distinct values of one categorical column.
/// `options[0]` is always [`ALL_OPTION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalFilter {
    pub column: String,
    pub options: Vec<String>,
    pub selected: usize,
}

impl CategoricalFilter {
    #[must_use]
    pub fn selected_value(&self) -> Option<&str> {
        if self.selected == 0 {
            return None;
        }
        self.options.get(self.selected).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub metrics: Vec<MetricTile>,
    pub filter: Option<CategoricalFilter>,
}

/// The three outcomes a page can show: rows, no rows, or a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedView {
    NoData {
        notice: String,
        metrics: Vec<MetricTile>,
    },
    Failed {
        cause: String,
    },
    Table(TableView),
}

impl RenderedView {
    #[must_use]
    pub fn headline(&self) -> String {
        match self {
            Self::NoData { notice, .. } => notice.clone(),
            Self::Failed { cause } => format!("query failed: {cause}"),
            Self::Table(table) => format!("Showing {} rows", table.rows.len()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &[MetricTile] {
        match self {
            Self::NoData { metrics, .. } => metrics,
            Self::Table(table) => &table.metrics,
            Self::Failed { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRenderer {
    filter_columns: Vec<String>,
}

impl ViewRenderer {
    #[must_use]
    pub fn new(filter_columns: Vec<String>) -> Self {
        Self { filter_columns }
    }

    /// Filter over the first preferred column the result exposes.
    #[must_use]
    pub fn filter_for(&self, result: &TabularResult) -> Option<CategoricalFilter> {
        let (column, index) = self
            .filter_columns
            .iter()
            .find_map(|name| result.column_index(name).map(|index| (name, index)))?;

        let values = result
            .column_values(index)
            .filter(|cell| !cell.is_null())
            .map(ToString::to_string)
            .collect::<BTreeSet<_>>();

        let mut options = Vec::with_capacity(values.len() + 1);
        options.push(ALL_OPTION.to_string());
        options.extend(values);

        Some(CategoricalFilter {
            column: column.clone(),
            options,
            selected: 0,
        })
    }

    /// The rows `render` would show for `selection`, with their typed cells.
    #[must_use]
    pub fn visible_rows(&self, result: &TabularResult, selection: Option<&str>) -> TabularResult {
        let Some(filter) = self.filter_for(result) else {
            return result.clone();
        };
        let Some(value) = selection.filter(|value| {
            *value != ALL_OPTION && filter.options.iter().any(|option| option == value)
        }) else {
            return result.clone();
        };
        match result.column_index(&filter.column) {
            Some(index) => result.filter_rows(index, value),
            None => result.clone(),
        }
    }

    /// `selection` names a filter option; unknown values fall back to
    /// [`ALL_OPTION`]. Filtering is applied to the stored result, never by
    /// re-querying.
    #[must_use]
    pub fn render(
        &self,
        outcome: Result<&TabularResult, &FetchError>,
        metrics: Option<&[MetricRecipe]>,
        selection: Option<&str>,
        no_data_notice: &str,
    ) -> RenderedView {
        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                return RenderedView::Failed {
                    cause: error.to_string(),
                }
            }
        };

        if result.is_empty() {
            return RenderedView::NoData {
                notice: no_data_notice.to_string(),
                metrics: metrics.map_or_else(Vec::new, |recipes| derive(result, recipes)),
            };
        }

        let mut filter = self.filter_for(result);
        let mut visible = None;
        if let (Some(filter), Some(wanted)) = (filter.as_mut(), selection) {
            if let Some(position) = filter.options.iter().position(|option| option == wanted) {
                filter.selected = position;
            }
            if let (Some(value), Some(index)) =
                (filter.selected_value(), result.column_index(&filter.column))
            {
                visible = Some(result.filter_rows(index, value));
            }
        }
        let visible = visible.as_ref().unwrap_or(result);

        RenderedView::Table(TableView {
            columns: visible.columns().to_vec(),
            rows: visible.display_rows(),
            metrics: metrics.map_or_else(Vec::new, |recipes| derive(visible, recipes)),
            filter,
        })
    }
}
