// 🏗️ Metric Table Loader
// Flat keyed tables (one row per spatial unit) read from external sources.
// Zonal statistics are computed upstream; here we only read the numbers.

use crate::db::col;
use crate::error::{MbrciError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Spellings treated as a null cell (compared case-insensitively).
const NULL_SPELLINGS: [&str; 4] = ["na", "nan", "null", "<null>"];

/// Default key field shared by every input table.
pub const DEFAULT_KEY_FIELD: &str = "HUC_12";

// ============================================================================
// SOURCE KINDS
// ============================================================================

/// SourceKind - which upstream summary a table comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// HUC12 intersect with total acreage and mean flows (the join base)
    Huc,
    Sandbars,
    Refugia,
    Seif,
    Sinuosity,
    IntermittentConnectivity,
    PermanentConnectivity,
    IfOpenland,
    OpenlandNlcd,
    /// National Inventory of Dams point count
    Dams,
    SecondaryChannels,
}

impl SourceKind {
    /// Order in which auxiliary tables are joined onto the base.
    pub const JOIN_ORDER: [SourceKind; 11] = [
        SourceKind::Huc,
        SourceKind::Sandbars,
        SourceKind::Refugia,
        SourceKind::Seif,
        SourceKind::Sinuosity,
        SourceKind::IntermittentConnectivity,
        SourceKind::PermanentConnectivity,
        SourceKind::IfOpenland,
        SourceKind::OpenlandNlcd,
        SourceKind::Dams,
        SourceKind::SecondaryChannels,
    ];

    /// Configuration name (matches the serde spelling)
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Huc => "huc",
            SourceKind::Sandbars => "sandbars",
            SourceKind::Refugia => "refugia",
            SourceKind::Seif => "seif",
            SourceKind::Sinuosity => "sinuosity",
            SourceKind::IntermittentConnectivity => "intermittent_connectivity",
            SourceKind::PermanentConnectivity => "permanent_connectivity",
            SourceKind::IfOpenland => "if_openland",
            SourceKind::OpenlandNlcd => "openland_nlcd",
            SourceKind::Dams => "dams",
            SourceKind::SecondaryChannels => "secondary_channels",
        }
    }

    /// Field names as they appear in the upstream table
    pub fn source_fields(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Huc => &["ACRES", "MEAN_QA_MA", "MEAN_QE_MA"],
            SourceKind::Sandbars
            | SourceKind::Refugia
            | SourceKind::Seif
            | SourceKind::IfOpenland
            | SourceKind::OpenlandNlcd => &["COUNT"],
            SourceKind::Dams | SourceKind::SecondaryChannels => &["Point_Count"],
            SourceKind::Sinuosity => &["MEAN_sinuosity"],
            SourceKind::IntermittentConnectivity | SourceKind::PermanentConnectivity => {
                &["VARIETY"]
            }
        }
    }

    /// Column names after renaming, positionally matching `source_fields`
    pub fn output_columns(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Huc => &[col::TOTAL_AREA, col::MEAN_FLOW_A, col::MEAN_FLOW_B],
            SourceKind::Sandbars => &[col::SANDBAR_CELLS],
            SourceKind::Refugia => &[col::REFUGIA_CELLS],
            SourceKind::Seif => &[col::SEIF_CELLS],
            SourceKind::Sinuosity => &[col::MEAN_SINUOSITY],
            SourceKind::IntermittentConnectivity => &[col::INTERMITTENT_VARIETY],
            SourceKind::PermanentConnectivity => &[col::PERMANENT_VARIETY],
            SourceKind::IfOpenland => &[col::IF_OPENLAND_CELLS],
            SourceKind::OpenlandNlcd => &[col::OPENLAND_NLCD_CELLS],
            SourceKind::Dams => &[col::DAM_COUNT],
            SourceKind::SecondaryChannels => &[col::SECONDARY_CHANNELS],
        }
    }

    pub fn is_base(&self) -> bool {
        *self == SourceKind::Huc
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// METRIC TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub key: String,
    pub values: Vec<Option<f64>>,
}

/// A flat keyed table: unique string keys, numeric nullable columns.
/// Rows keep their source order.
#[derive(Debug, Clone)]
pub struct MetricTable {
    name: String,
    key_column: String,
    columns: Vec<String>,
    rows: Vec<MetricRow>,
    index: HashMap<String, usize>,
}

impl MetricTable {
    pub fn new(
        name: impl Into<String>,
        key_column: impl Into<String>,
        columns: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let key_column = key_column.into();

        for (i, column) in columns.iter().enumerate() {
            if *column == key_column || columns[..i].contains(column) {
                return Err(MbrciError::malformed(
                    &name,
                    format!("column {} appears more than once", column),
                ));
            }
        }

        Ok(MetricTable {
            name,
            key_column,
            columns,
            rows: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Append a row. Keys must be non-empty and unique.
    pub fn push_row(&mut self, key: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let key = key.into();

        if key.is_empty() {
            return Err(MbrciError::malformed(&self.name, "empty key"));
        }
        if values.len() != self.columns.len() {
            return Err(MbrciError::malformed(
                &self.name,
                format!(
                    "row {} has {} values, expected {}",
                    key,
                    values.len(),
                    self.columns.len()
                ),
            ));
        }
        if self.index.contains_key(&key) {
            return Err(MbrciError::DuplicateKey {
                table: self.name.clone(),
                key,
            });
        }

        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(MetricRow { key, values });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, key: &str) -> Option<&MetricRow> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    /// Value at (key, column); `None` for absent rows, absent columns and nulls.
    pub fn value(&self, key: &str, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.get(key)?.values[idx]
    }

    /// Borrowed view of each row with column lookup by name.
    pub fn views(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |row| RowView { table: self, row })
    }
}

/// One row of a `MetricTable`, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a MetricTable,
    row: &'a MetricRow,
}

impl<'a> RowView<'a> {
    pub fn key(&self) -> &'a str {
        &self.row.key
    }

    pub fn table_name(&self) -> &'a str {
        &self.table.name
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.table
            .column_index(column)
            .and_then(|idx| self.row.values[idx])
    }
}

// ============================================================================
// TABLE SOURCES
// ============================================================================

/// TableSource - anything that can produce a `MetricTable`
///
/// New tabular formats implement this trait; the pipeline only sees tables.
pub trait TableSource: Send + Sync {
    /// Read the table, renaming source fields to output columns
    fn load(&self) -> Result<MetricTable>;

    /// Which upstream summary this table holds
    fn kind(&self) -> SourceKind;
}

/// CSV export of a GIS attribute table
#[derive(Debug, Clone)]
pub struct CsvTableSource {
    kind: SourceKind,
    path: PathBuf,
    key_field: String,
    fields: Vec<String>,
}

impl CsvTableSource {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        CsvTableSource {
            kind,
            path: path.into(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            fields: kind.source_fields().iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Builder pattern: override the key field name
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Builder pattern: override source field names (positional)
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for CsvTableSource {
    fn load(&self) -> Result<MetricTable> {
        let rdr = csv::Reader::from_path(&self.path).map_err(|e| {
            MbrciError::malformed(
                self.kind.name(),
                format!("cannot open {}: {}", self.path.display(), e),
            )
        })?;

        let table = read_table(self.kind, rdr, &self.key_field, &self.fields)?;
        info!(
            source = self.kind.name(),
            path = %self.path.display(),
            rows = table.len(),
            "loaded metric table"
        );
        Ok(table)
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// Read a CSV table from any reader (files, in-memory fixtures)
pub fn read_csv_table<R: io::Read>(
    kind: SourceKind,
    reader: R,
    key_field: &str,
    fields: &[String],
) -> Result<MetricTable> {
    read_table(kind, csv::Reader::from_reader(reader), key_field, fields)
}

fn read_table<R: io::Read>(
    kind: SourceKind,
    mut rdr: csv::Reader<R>,
    key_field: &str,
    fields: &[String],
) -> Result<MetricTable> {
    let table_name = kind.name();
    let outputs = kind.output_columns();

    if fields.len() != outputs.len() {
        return Err(MbrciError::Config(format!(
            "source {} takes {} field(s), got {}",
            table_name,
            outputs.len(),
            fields.len()
        )));
    }

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MbrciError::MissingColumn {
                table: table_name.to_string(),
                column: name.to_string(),
            })
    };

    let key_idx = find(key_field)?;
    let field_idx = fields
        .iter()
        .map(|f| find(f))
        .collect::<Result<Vec<_>>>()?;

    let mut table = MetricTable::new(
        table_name,
        key_field,
        outputs.iter().map(|c| c.to_string()).collect(),
    )?;

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let key = record.get(key_idx).unwrap_or("").trim();
        if key.is_empty() {
            return Err(MbrciError::malformed(
                table_name,
                format!("empty {} on line {}", key_field, line),
            ));
        }

        let mut values = Vec::with_capacity(field_idx.len());
        for (&idx, column) in field_idx.iter().zip(outputs) {
            let raw = record.get(idx).unwrap_or("");
            let value = parse_cell(raw).ok_or_else(|| MbrciError::InvalidValue {
                table: table_name.to_string(),
                unit: key.to_string(),
                column: column.to_string(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }

        table.push_row(key, values)?;
    }

    debug!(source = table_name, rows = table.len(), "parsed table");
    Ok(table)
}

/// `Some(None)` for a null cell, `Some(Some(v))` for a finite number,
/// `None` when the cell is not a usable number.
fn parse_cell(raw: &str) -> Option<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || NULL_SPELLINGS
            .iter()
            .any(|n| trimmed.eq_ignore_ascii_case(n))
    {
        return Some(None);
    }

    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(Some(v)),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
