//! Tabular worksheet input
//!
//! A worksheet is a header row naming the columns followed by data rows.
//! Worksheets come from an `.xlsx` sheet or from a JSON document:
//!
//! ```json
//! { "id": "WS1", "title": "Persons", "columns": ["name", "worksOrg"],
//!   "rows": [["Alice", "ISI"]] }
//! ```

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use umya_spreadsheet::reader::xlsx;

/// One data row. Cells are keyed by column id in header order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetRow {
    /// Zero-based index among the data rows
    pub index: usize,
    pub cells: IndexMap<String, String>,
}

impl WorksheetRow {
    pub fn new(index: usize, cells: IndexMap<String, String>) -> Self {
        Self { index, cells }
    }

    /// Cell value; `None` when the row has no such column
    pub fn get(&self, column_id: &str) -> Option<&str> {
        self.cells.get(column_id).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: String,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<WorksheetRow>,
}

#[derive(Debug, Deserialize)]
struct WorksheetDocument {
    id: String,
    #[serde(default)]
    title: Option<String>,
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

impl Worksheet {
    /// Build a worksheet from a header and positional row values
    pub fn from_records(
        id: impl Into<String>,
        title: impl Into<String>,
        columns: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Self {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(index, values)| {
                let cells = columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<IndexMap<_, _>>();
                WorksheetRow::new(index, cells)
            })
            .collect();
        Self {
            id: id.into(),
            title: title.into(),
            columns,
            rows,
        }
    }

    /// Load a worksheet, choosing the reader from the file extension
    pub fn load(path: &Path, sheet_name: Option<&str>, worksheet_id: Option<&str>) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("xlsx") | Some("xlsm") => Self::from_xlsx(path, sheet_name, worksheet_id),
            Some("json") => {
                let mut worksheet = Self::from_json_path(path)?;
                if let Some(id) = worksheet_id {
                    worksheet.id = id.to_string();
                }
                Ok(worksheet)
            }
            other => bail!("unsupported worksheet format {:?} for {:?}", other, path),
        }
    }

    pub fn from_json_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read worksheet {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("failed to parse worksheet {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: WorksheetDocument = serde_json::from_str(json)?;
        let records = doc
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(json_cell_text).collect())
            .collect();
        let title = doc.title.unwrap_or_else(|| doc.id.clone());
        Ok(Self::from_records(doc.id, title, doc.columns, records))
    }

    /// Read one sheet of a workbook. Row 1 is the header; fully empty rows
    /// are skipped.
    pub fn from_xlsx(path: &Path, sheet_name: Option<&str>, worksheet_id: Option<&str>) -> Result<Self> {
        let book = xlsx::read(path).with_context(|| format!("failed to parse workbook {:?}", path))?;
        let sheet = match sheet_name {
            Some(name) => book
                .get_sheet_by_name(name)
                .ok_or_else(|| anyhow!("sheet {} not found in {:?}", name, path))?,
            None => book
                .get_sheet_collection()
                .first()
                .ok_or_else(|| anyhow!("workbook {:?} has no sheets", path))?,
        };

        let (max_col, max_row) = sheet.get_highest_column_and_row();
        let cell_text = |col: u32, row: u32| -> String {
            sheet
                .get_cell((col, row))
                .map(|cell| cell.get_value().trim().to_string())
                .unwrap_or_default()
        };

        let mut columns = Vec::with_capacity(max_col as usize);
        for col in 1..=max_col {
            let header = cell_text(col, 1);
            if header.is_empty() {
                bail!("column {} of sheet {} has no header", col, sheet.get_name());
            }
            if columns.contains(&header) {
                bail!("duplicate column header {} in sheet {}", header, sheet.get_name());
            }
            columns.push(header);
        }

        let mut records = Vec::new();
        for row in 2..=max_row {
            let values: Vec<String> = (1..=max_col).map(|col| cell_text(col, row)).collect();
            if values.iter().all(String::is_empty) {
                continue;
            }
            records.push(values);
        }

        let title = sheet.get_name().to_string();
        let id = worksheet_id.map(str::to_string).unwrap_or_else(|| title.clone());
        tracing::debug!(
            worksheet = %id,
            columns = columns.len(),
            rows = records.len(),
            "worksheet loaded from xlsx"
        );
        Ok(Self::from_records(id, title, columns, records))
    }
}

fn json_cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
