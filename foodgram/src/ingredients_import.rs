//! Ingredient catalogue import for the `load-ingredients` command.
//!
//! Two fixture formats are understood, chosen by file extension:
//!
//! - `.json`: `[{"name": "flour", "measurement_unit": "g"}, ...]`
//! - `.csv`: `flour,g` rows without a header
//!
//! Rows with a missing or blank field are skipped and reported rather than failing the import.
//! Loading inserts in batches and ignores (name, unit) pairs that already exist, so running the
//! import twice never duplicates the catalogue.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use serde_json::Value;
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::db::handlers::Ingredients;
use crate::db::models::ingredients::IngredientCreateDBRequest;

/// Rows inserted per statement
pub const BATCH_SIZE: usize = 500;

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based row (JSON array index or CSV record number)
    pub row: usize,
    pub reason: String,
}

/// Result of parsing a fixture file
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedIngredients {
    pub records: Vec<IngredientCreateDBRequest>,
    pub skipped: Vec<SkippedRow>,
}

impl ParsedIngredients {
    fn push(&mut self, row: usize, name: Option<&str>, unit: Option<&str>) {
        let name = name.map(str::trim).unwrap_or_default();
        let unit = unit.map(str::trim).unwrap_or_default();

        if name.is_empty() || unit.is_empty() {
            self.skipped.push(SkippedRow {
                row,
                reason: "missing name or measurement unit".to_string(),
            });
            return;
        }

        self.records.push(IngredientCreateDBRequest {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        });
    }
}

/// Supported fixture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            other => bail!("Unsupported file format '.{other}'. Only JSON and CSV are supported."),
        }
    }
}

/// Parse `[{"name", "measurement_unit"}]`. Anything but a top-level array is an error.
pub fn parse_json(reader: impl Read) -> anyhow::Result<ParsedIngredients> {
    let data: Value = serde_json::from_reader(reader).context("Failed to read JSON file")?;
    let Value::Array(items) = data else {
        bail!("JSON file must contain a list of ingredients");
    };

    let mut parsed = ParsedIngredients::default();
    for (index, item) in items.iter().enumerate() {
        let row = index + 1;
        match item {
            Value::Object(fields) => parsed.push(
                row,
                fields.get("name").and_then(Value::as_str),
                fields.get("measurement_unit").and_then(Value::as_str),
            ),
            _ => parsed.skipped.push(SkippedRow {
                row,
                reason: "not an object".to_string(),
            }),
        }
    }

    Ok(parsed)
}

/// Parse headerless `name,unit` rows
pub fn parse_csv(reader: impl Read) -> anyhow::Result<ParsedIngredients> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut parsed = ParsedIngredients::default();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        match record {
            Ok(record) => parsed.push(row, record.get(0), record.get(1)),
            Err(e) => parsed.skipped.push(SkippedRow {
                row,
                reason: e.to_string(),
            }),
        }
    }

    Ok(parsed)
}

/// Read and parse a fixture file, picking the parser from the extension
pub fn parse_file(path: &Path) -> anyhow::Result<ParsedIngredients> {
    let format = Format::from_path(path)?;
    let file = std::fs::File::open(path).with_context(|| format!("File not found: {}", path.display()))?;

    match format {
        Format::Json => parse_json(file),
        Format::Csv => parse_csv(file),
    }
}

/// Counts reported at the end of an import
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    /// Newly inserted rows
    pub loaded: u64,
    /// Invalid rows plus rows already present
    pub skipped: u64,
}

/// Insert parsed records in batches of [`BATCH_SIZE`]
pub async fn load(conn: &mut PgConnection, parsed: &ParsedIngredients) -> anyhow::Result<LoadSummary> {
    for skipped in &parsed.skipped {
        warn!("Row {}: skipped ({})", skipped.row, skipped.reason);
    }

    let mut repo = Ingredients::new(conn);
    let mut loaded = 0u64;
    for (number, batch) in parsed.records.chunks(BATCH_SIZE).enumerate() {
        let inserted = repo.insert_batch(batch).await?;
        info!("Batch {}: {} of {} rows inserted", number + 1, inserted, batch.len());
        loaded += inserted;
    }

    let already_present = parsed.records.len() as u64 - loaded;
    Ok(LoadSummary {
        loaded,
        skipped: parsed.skipped.len() as u64 + already_present,
    })
}
