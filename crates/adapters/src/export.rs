use std::fs;
use std::path::Path;

use pantry_core::tabular::{CellValue, TabularResult};
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Writes `result` to `path` and returns the number of rows written.
pub fn export_result(
    path: &Path,
    result: &TabularResult,
    format: ExportFormat,
) -> Result<usize, ExportError> {
    let content = match format {
        ExportFormat::Csv => render_csv(result),
        ExportFormat::Json => render_json(result)?,
    };
    fs::write(path, content).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), rows = result.row_count(), "rows exported");
    Ok(result.row_count())
}

fn render_csv(result: &TabularResult) -> String {
    let mut content = String::new();
    content.push_str(
        &result
            .columns()
            .iter()
            .map(|header| csv_escape(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    content.push('\n');

    for row in result.display_rows() {
        content.push_str(
            &row.iter()
                .map(|value| csv_escape(value))
                .collect::<Vec<_>>()
                .join(","),
        );
        content.push('\n');
    }
    content
}

fn render_json(result: &TabularResult) -> Result<String, ExportError> {
    let records = result
        .rows()
        .iter()
        .map(|row| {
            let object = result
                .columns()
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), cell_to_json(cell)))
                .collect::<Map<_, _>>();
            Value::Object(object)
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_string_pretty(&records)?)
}

fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Integer(value) => json!(value),
        CellValue::Real(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
        CellValue::Text(value) | CellValue::Date(value) => json!(value),
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pantry_core::tabular::{CellValue, TabularResult};
    use tempfile::TempDir;

    use super::{export_result, ExportFormat};

    fn claims() -> TabularResult {
        TabularResult::new(
            vec!["Claim_ID".to_string(), "Status".to_string(), "Note".to_string()],
            vec![
                vec![
                    CellValue::Integer(1),
                    CellValue::Text("Completed".to_string()),
                    CellValue::Null,
                ],
                vec![
                    CellValue::Integer(2),
                    CellValue::Text("Pending".to_string()),
                    CellValue::Text("call \"back\", later".to_string()),
                ],
            ],
        )
        .expect("valid shape")
    }

    #[test]
    fn csv_has_header_blank_nulls_and_escaping() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("claims.csv");

        let written = export_result(&path, &claims(), ExportFormat::Csv).expect("csv export");
        assert_eq!(written, 2);
        let output = fs::read_to_string(path).expect("failed to read csv output");
        assert_eq!(
            output,
            "Claim_ID,Status,Note\n1,Completed,\n2,Pending,\"call \"\"back\"\", later\"\n"
        );
    }

    #[test]
    fn json_keeps_cell_types() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("claims.json");

        let written = export_result(&path, &claims(), ExportFormat::Json).expect("json export");
        assert_eq!(written, 2);
        let output = fs::read_to_string(path).expect("failed to read json output");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("invalid json");
        assert_eq!(parsed[0]["Claim_ID"], 1);
        assert_eq!(parsed[0]["Status"], "Completed");
        assert!(parsed[0]["Note"].is_null());
    }

    #[test]
    fn unwritable_path_is_reported() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("missing").join("claims.csv");

        let err = export_result(&path, &claims(), ExportFormat::Csv).expect_err("no parent dir");
        assert!(err.to_string().contains("failed to write export file"));
    }
}
