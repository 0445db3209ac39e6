use crate::error::{MbrciError, Result};
use crate::loader::RowView;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Column names of the joined/exported table.
pub mod col {
    pub const UNIT_ID: &str = "HUC_12";
    pub const TOTAL_AREA: &str = "ACRES";
    pub const MEAN_FLOW_A: &str = "MEAN_QA_MA";
    pub const MEAN_FLOW_B: &str = "MEAN_QE_MA";

    pub const SANDBAR_CELLS: &str = "Sandbar_CellCount";
    pub const REFUGIA_CELLS: &str = "refugia_CellCount";
    pub const SEIF_CELLS: &str = "SEIF_CellCount";
    pub const SECONDARY_CHANNELS: &str = "Secondary_Channel_Count";
    pub const MEAN_SINUOSITY: &str = "MEAN_sinuosity";
    pub const INTERMITTENT_VARIETY: &str = "Intermittent_Variety";
    pub const PERMANENT_VARIETY: &str = "Perm_Variety";
    pub const IF_OPENLAND_CELLS: &str = "IF_Openlands_Count";
    pub const OPENLAND_NLCD_CELLS: &str = "Openlands_Count";
    pub const DAM_COUNT: &str = "NID_Dam_Count";

    pub const SANDBAR_ACRES: &str = "sandbars_acres";
    pub const SANDBAR_HECTARES: &str = "sandbar_hectares";
    pub const REFUGIA_ACRES: &str = "refugia_acres";
    pub const SEIF_ACRES: &str = "SEIF_acres";
    pub const IF_OPENLAND_ACRES: &str = "Openland_acres";
    pub const OPENLAND_NLCD_ACRES: &str = "openland_nlcd_acres";

    pub const IF_OPEN_LAND_FRACTION: &str = "IF_Open_Land_Perc";
    pub const REFUGIA_FRACTION: &str = "refugia_perc";
    pub const SEIF_FRACTION: &str = "SEIF_perc";

    pub const SN2: &str = "SN2";
    pub const SN3: &str = "SN3";
    pub const SN4: &str = "SN4";
    pub const SN5: &str = "SN5";
    pub const MBRCI: &str = "MBRCI";
    pub const UNCLASSIFIED_REASON: &str = "Unclassified_Reason";
}

/// Largest count a record may hold (SQLite stores counts as i64)
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// One HUC12 spatial unit: raw metrics, derived areas/fractions and the
/// decision-tree outputs. Serialized column names match the exported table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    // ========================================================================
    // IDENTITY + BASE TABLE
    // ========================================================================
    #[serde(rename = "HUC_12")]
    pub unit_id: String,

    /// Total unit area in acres
    #[serde(rename = "ACRES")]
    pub total_area: f64,

    #[serde(rename = "MEAN_QA_MA")]
    pub mean_flow_a: Option<f64>,

    #[serde(rename = "MEAN_QE_MA")]
    pub mean_flow_b: Option<f64>,

    // ========================================================================
    // RAW METRICS (None = not measured for this unit)
    // ========================================================================
    #[serde(rename = "Sandbar_CellCount")]
    pub sandbar_cells: Option<u64>,

    #[serde(rename = "refugia_CellCount")]
    pub refugia_cells: Option<u64>,

    #[serde(rename = "SEIF_CellCount")]
    pub seif_cells: Option<u64>,

    #[serde(rename = "MEAN_sinuosity")]
    pub mean_sinuosity: Option<f64>,

    #[serde(rename = "Intermittent_Variety")]
    pub intermittent_variety: Option<u64>,

    #[serde(rename = "Perm_Variety")]
    pub permanent_variety: Option<u64>,

    #[serde(rename = "IF_Openlands_Count")]
    pub if_openland_cells: Option<u64>,

    #[serde(rename = "Openlands_Count")]
    pub openland_nlcd_cells: Option<u64>,

    #[serde(rename = "NID_Dam_Count")]
    pub dam_count: Option<u64>,

    #[serde(rename = "Secondary_Channel_Count")]
    pub secondary_channels: Option<u64>,

    // ========================================================================
    // NORMALIZED AREAS (acres, hectares)
    // ========================================================================
    #[serde(rename = "sandbars_acres", default)]
    pub sandbar_acres: Option<f64>,

    #[serde(rename = "sandbar_hectares", default)]
    pub sandbar_hectares: Option<f64>,

    #[serde(rename = "refugia_acres", default)]
    pub refugia_acres: Option<f64>,

    #[serde(rename = "SEIF_acres", default)]
    pub seif_acres: Option<f64>,

    #[serde(rename = "Openland_acres", default)]
    pub if_openland_acres: Option<f64>,

    #[serde(rename = "openland_nlcd_acres", default)]
    pub openland_nlcd_acres: Option<f64>,

    // ========================================================================
    // DERIVED FRACTIONS
    // ========================================================================
    #[serde(rename = "IF_Open_Land_Perc", default)]
    pub if_open_land_fraction: Option<f64>,

    #[serde(rename = "refugia_perc", default)]
    pub refugia_fraction: Option<f64>,

    #[serde(rename = "SEIF_perc", default)]
    pub seif_fraction: Option<f64>,

    // ========================================================================
    // DECISION TREE OUTPUT (None = undetermined)
    // ========================================================================
    #[serde(rename = "SN2", default)]
    pub sn2: Option<u8>,

    #[serde(rename = "SN3", default)]
    pub sn3: Option<u8>,

    #[serde(rename = "SN4", default)]
    pub sn4: Option<u8>,

    #[serde(rename = "SN5", default)]
    pub sn5: Option<u8>,

    #[serde(rename = "MBRCI", default)]
    pub mbrci: Option<u8>,

    /// Missing input columns, `;`-separated, when MBRCI is null
    #[serde(rename = "Unclassified_Reason", default)]
    pub unclassified_reason: Option<String>,
}

impl UnitRecord {
    /// A unit with only identity and area; every metric unmeasured.
    pub fn new(unit_id: impl Into<String>, total_area: f64) -> Self {
        UnitRecord {
            unit_id: unit_id.into(),
            total_area,
            mean_flow_a: None,
            mean_flow_b: None,
            sandbar_cells: None,
            refugia_cells: None,
            seif_cells: None,
            mean_sinuosity: None,
            intermittent_variety: None,
            permanent_variety: None,
            if_openland_cells: None,
            openland_nlcd_cells: None,
            dam_count: None,
            secondary_channels: None,
            sandbar_acres: None,
            sandbar_hectares: None,
            refugia_acres: None,
            seif_acres: None,
            if_openland_acres: None,
            openland_nlcd_acres: None,
            if_open_land_fraction: None,
            refugia_fraction: None,
            seif_fraction: None,
            sn2: None,
            sn3: None,
            sn4: None,
            sn5: None,
            mbrci: None,
            unclassified_reason: None,
        }
    }

    /// Build a record from one row of the joined table.
    ///
    /// ACRES must be present and non-negative; counts must be non-negative
    /// whole numbers. Anything else is an `InvalidValue` naming the unit.
    pub fn from_row(view: RowView<'_>) -> Result<Self> {
        let invalid = |column: &str, value: String| MbrciError::InvalidValue {
            table: view.table_name().to_string(),
            unit: view.key().to_string(),
            column: column.to_string(),
            value,
        };

        let total_area = match view.get(col::TOTAL_AREA) {
            Some(v) if v >= 0.0 => v,
            Some(v) => return Err(invalid(col::TOTAL_AREA, v.to_string())),
            None => return Err(invalid(col::TOTAL_AREA, String::new())),
        };

        let count = |column: &str| -> Result<Option<u64>> {
            match view.get(column) {
                None => Ok(None),
                Some(v) if v >= 0.0 && v.fract() == 0.0 && v < MAX_COUNT as f64 => {
                    Ok(Some(v as u64))
                }
                Some(v) => Err(invalid(column, v.to_string())),
            }
        };

        let mean_sinuosity = match view.get(col::MEAN_SINUOSITY) {
            Some(v) if v < 0.0 => return Err(invalid(col::MEAN_SINUOSITY, v.to_string())),
            other => other,
        };

        Ok(UnitRecord {
            mean_flow_a: view.get(col::MEAN_FLOW_A),
            mean_flow_b: view.get(col::MEAN_FLOW_B),
            sandbar_cells: count(col::SANDBAR_CELLS)?,
            refugia_cells: count(col::REFUGIA_CELLS)?,
            seif_cells: count(col::SEIF_CELLS)?,
            mean_sinuosity,
            intermittent_variety: count(col::INTERMITTENT_VARIETY)?,
            permanent_variety: count(col::PERMANENT_VARIETY)?,
            if_openland_cells: count(col::IF_OPENLAND_CELLS)?,
            openland_nlcd_cells: count(col::OPENLAND_NLCD_CELLS)?,
            dam_count: count(col::DAM_COUNT)?,
            secondary_channels: count(col::SECONDARY_CHANNELS)?,
            ..UnitRecord::new(view.key(), total_area)
        })
    }

    /// Check a record that did not come through `from_row` (a reloaded
    /// export). Floats must be finite, ACRES and sinuosity non-negative,
    /// counts within `MAX_COUNT`.
    pub fn validate(&self, table: &str) -> Result<()> {
        let invalid = |column: &str, value: String| MbrciError::InvalidValue {
            table: table.to_string(),
            unit: self.unit_id.clone(),
            column: column.to_string(),
            value,
        };

        if !(self.total_area.is_finite() && self.total_area >= 0.0) {
            return Err(invalid(col::TOTAL_AREA, self.total_area.to_string()));
        }
        if let Some(s) = self.mean_sinuosity.filter(|s| *s < 0.0) {
            return Err(invalid(col::MEAN_SINUOSITY, s.to_string()));
        }

        let floats = [
            (col::MEAN_FLOW_A, self.mean_flow_a),
            (col::MEAN_FLOW_B, self.mean_flow_b),
            (col::MEAN_SINUOSITY, self.mean_sinuosity),
            (col::SANDBAR_ACRES, self.sandbar_acres),
            (col::SANDBAR_HECTARES, self.sandbar_hectares),
            (col::REFUGIA_ACRES, self.refugia_acres),
            (col::SEIF_ACRES, self.seif_acres),
            (col::IF_OPENLAND_ACRES, self.if_openland_acres),
            (col::OPENLAND_NLCD_ACRES, self.openland_nlcd_acres),
            (col::IF_OPEN_LAND_FRACTION, self.if_open_land_fraction),
            (col::REFUGIA_FRACTION, self.refugia_fraction),
            (col::SEIF_FRACTION, self.seif_fraction),
        ];
        for (column, value) in floats {
            if let Some(v) = value.filter(|v| !v.is_finite()) {
                return Err(invalid(column, v.to_string()));
            }
        }

        let counts = [
            (col::SANDBAR_CELLS, self.sandbar_cells),
            (col::REFUGIA_CELLS, self.refugia_cells),
            (col::SEIF_CELLS, self.seif_cells),
            (col::INTERMITTENT_VARIETY, self.intermittent_variety),
            (col::PERMANENT_VARIETY, self.permanent_variety),
            (col::IF_OPENLAND_CELLS, self.if_openland_cells),
            (col::OPENLAND_NLCD_CELLS, self.openland_nlcd_cells),
            (col::DAM_COUNT, self.dam_count),
            (col::SECONDARY_CHANNELS, self.secondary_channels),
        ];
        for (column, value) in counts {
            if let Some(n) = value.filter(|n| *n > MAX_COUNT) {
                return Err(invalid(column, n.to_string()));
            }
        }

        Ok(())
    }

    /// Drop every decision-tree output so the unit can be re-classified.
    pub fn clear_classification(&mut self) {
        self.sn2 = None;
        self.sn3 = None;
        self.sn4 = None;
        self.sn5 = None;
        self.mbrci = None;
        self.unclassified_reason = None;
    }

    pub fn is_classified(&self) -> bool {
        self.mbrci.is_some()
    }
}

// ============================================================================
// CSV EXPORT / RELOAD
// ============================================================================

/// Load a previously exported record table. Unit ids must be unique and
/// every record must pass `UnitRecord::validate`.
pub fn load_csv(csv_path: &Path) -> Result<Vec<UnitRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;
    let table = csv_path.display().to_string();

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for result in rdr.deserialize() {
        let record: UnitRecord = result?;
        record.validate(&table)?;
        if !seen.insert(record.unit_id.clone()) {
            return Err(MbrciError::DuplicateKey {
                table,
                key: record.unit_id,
            });
        }
        records.push(record);
    }

    Ok(records)
}

pub fn write_csv(csv_path: &Path, records: &[UnitRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(csv_path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;

    info!(path = %csv_path.display(), rows = records.len(), "wrote record table");
    Ok(())
}

// ============================================================================
// RUN PROVENANCE
// ============================================================================

/// One classification run, stored next to its records
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// SHA-256 over the input files in join order
    pub input_fingerprint: String,
    pub unit_count: usize,
    pub classified_count: usize,
    pub unclassified_count: usize,
}

impl RunRecord {
    pub fn new(input_fingerprint: String, records: &[UnitRecord]) -> Self {
        let classified_count = records.iter().filter(|r| r.is_classified()).count();
        RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            input_fingerprint,
            unit_count: records.len(),
            classified_count,
            unclassified_count: records.len() - classified_count,
        }
    }
}

/// Hash file contents in the given order (path names are not hashed).
pub fn fingerprint_files<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        let bytes = fs::read(path.as_ref())?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// SQLITE EXPORT
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            input_fingerprint TEXT NOT NULL,
            unit_count INTEGER NOT NULL,
            classified_count INTEGER NOT NULL,
            unclassified_count INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS mbrci_units (
            run_id TEXT NOT NULL REFERENCES runs(run_id),
            HUC_12 TEXT NOT NULL,
            ACRES REAL NOT NULL,
            MEAN_QA_MA REAL,
            MEAN_QE_MA REAL,
            Sandbar_CellCount INTEGER,
            refugia_CellCount INTEGER,
            SEIF_CellCount INTEGER,
            MEAN_sinuosity REAL,
            Intermittent_Variety INTEGER,
            Perm_Variety INTEGER,
            IF_Openlands_Count INTEGER,
            Openlands_Count INTEGER,
            NID_Dam_Count INTEGER,
            Secondary_Channel_Count INTEGER,
            sandbars_acres REAL,
            sandbar_hectares REAL,
            refugia_acres REAL,
            SEIF_acres REAL,
            Openland_acres REAL,
            openland_nlcd_acres REAL,
            IF_Open_Land_Perc REAL,
            refugia_perc REAL,
            SEIF_perc REAL,
            SN2 INTEGER,
            SN3 INTEGER,
            SN4 INTEGER,
            SN5 INTEGER,
            MBRCI INTEGER,
            Unclassified_Reason TEXT,
            PRIMARY KEY (run_id, HUC_12)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_units_class ON mbrci_units(run_id, MBRCI)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at)",
        [],
    )?;

    Ok(())
}

pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO runs (run_id, started_at, input_fingerprint, unit_count,
                           classified_count, unclassified_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run.run_id,
            run.started_at.to_rfc3339(),
            run.input_fingerprint,
            run.unit_count as i64,
            run.classified_count as i64,
            run.unclassified_count as i64,
        ],
    )?;
    Ok(())
}

/// Store a run and all its records in one transaction.
pub fn insert_records(conn: &Connection, run: &RunRecord, records: &[UnitRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    insert_run(&tx, run)?;

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO mbrci_units (
                run_id, HUC_12, ACRES, MEAN_QA_MA, MEAN_QE_MA,
                Sandbar_CellCount, refugia_CellCount, SEIF_CellCount, MEAN_sinuosity,
                Intermittent_Variety, Perm_Variety, IF_Openlands_Count, Openlands_Count,
                NID_Dam_Count, Secondary_Channel_Count,
                sandbars_acres, sandbar_hectares, refugia_acres, SEIF_acres,
                Openland_acres, openland_nlcd_acres,
                IF_Open_Land_Perc, refugia_perc, SEIF_perc,
                SN2, SN3, SN4, SN5, MBRCI, Unclassified_Reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28,
                      ?29, ?30)",
        )?;

        for r in records {
            inserted += stmt.execute(params![
                run.run_id,
                r.unit_id,
                r.total_area,
                r.mean_flow_a,
                r.mean_flow_b,
                int(r, col::SANDBAR_CELLS, r.sandbar_cells)?,
                int(r, col::REFUGIA_CELLS, r.refugia_cells)?,
                int(r, col::SEIF_CELLS, r.seif_cells)?,
                r.mean_sinuosity,
                int(r, col::INTERMITTENT_VARIETY, r.intermittent_variety)?,
                int(r, col::PERMANENT_VARIETY, r.permanent_variety)?,
                int(r, col::IF_OPENLAND_CELLS, r.if_openland_cells)?,
                int(r, col::OPENLAND_NLCD_CELLS, r.openland_nlcd_cells)?,
                int(r, col::DAM_COUNT, r.dam_count)?,
                int(r, col::SECONDARY_CHANNELS, r.secondary_channels)?,
                r.sandbar_acres,
                r.sandbar_hectares,
                r.refugia_acres,
                r.seif_acres,
                r.if_openland_acres,
                r.openland_nlcd_acres,
                r.if_open_land_fraction,
                r.refugia_fraction,
                r.seif_fraction,
                r.sn2,
                r.sn3,
                r.sn4,
                r.sn5,
                r.mbrci,
                r.unclassified_reason,
            ])?;
        }
    }

    tx.commit()?;
    info!(run_id = %run.run_id, rows = inserted, "stored run in sqlite");
    Ok(inserted)
}

fn int(r: &UnitRecord, column: &str, v: Option<u64>) -> Result<Option<i64>> {
    v.map(|n| {
        i64::try_from(n).map_err(|_| MbrciError::InvalidValue {
            table: "mbrci_units".to_string(),
            unit: r.unit_id.clone(),
            column: column.to_string(),
            value: n.to_string(),
        })
    })
    .transpose()
}

fn uint(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let v: Option<i64> = row.get(idx)?;
    v.map(|n| u64::try_from(n).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, n)))
        .transpose()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<UnitRecord> {
    Ok(UnitRecord {
        unit_id: row.get(0)?,
        total_area: row.get(1)?,
        mean_flow_a: row.get(2)?,
        mean_flow_b: row.get(3)?,
        sandbar_cells: uint(row, 4)?,
        refugia_cells: uint(row, 5)?,
        seif_cells: uint(row, 6)?,
        mean_sinuosity: row.get(7)?,
        intermittent_variety: uint(row, 8)?,
        permanent_variety: uint(row, 9)?,
        if_openland_cells: uint(row, 10)?,
        openland_nlcd_cells: uint(row, 11)?,
        dam_count: uint(row, 12)?,
        secondary_channels: uint(row, 13)?,
        sandbar_acres: row.get(14)?,
        sandbar_hectares: row.get(15)?,
        refugia_acres: row.get(16)?,
        seif_acres: row.get(17)?,
        if_openland_acres: row.get(18)?,
        openland_nlcd_acres: row.get(19)?,
        if_open_land_fraction: row.get(20)?,
        refugia_fraction: row.get(21)?,
        seif_fraction: row.get(22)?,
        sn2: row.get(23)?,
        sn3: row.get(24)?,
        sn4: row.get(25)?,
        sn5: row.get(26)?,
        mbrci: row.get(27)?,
        unclassified_reason: row.get(28)?,
    })
}

pub fn get_records(conn: &Connection, run_id: &str) -> Result<Vec<UnitRecord>> {
    let mut stmt = conn.prepare(
        "SELECT HUC_12, ACRES, MEAN_QA_MA, MEAN_QE_MA,
                Sandbar_CellCount, refugia_CellCount, SEIF_CellCount, MEAN_sinuosity,
                Intermittent_Variety, Perm_Variety, IF_Openlands_Count, Openlands_Count,
                NID_Dam_Count, Secondary_Channel_Count,
                sandbars_acres, sandbar_hectares, refugia_acres, SEIF_acres,
                Openland_acres, openland_nlcd_acres,
                IF_Open_Land_Perc, refugia_perc, SEIF_perc,
                SN2, SN3, SN4, SN5, MBRCI, Unclassified_Reason
         FROM mbrci_units
         WHERE run_id = ?1
         ORDER BY rowid",
    )?;

    let records = stmt
        .query_map(params![run_id], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let started_at: String = row.get(1)?;
    let started_at = DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(RunRecord {
        run_id: row.get(0)?,
        started_at,
        input_fingerprint: row.get(2)?,
        unit_count: row.get::<_, i64>(3)? as usize,
        classified_count: row.get::<_, i64>(4)? as usize,
        unclassified_count: row.get::<_, i64>(5)? as usize,
    })
}

pub fn get_run(conn: &Connection, run_id: &str) -> Result<Option<RunRecord>> {
    let found = conn
        .query_row(
            "SELECT run_id, started_at, input_fingerprint, unit_count,
                    classified_count, unclassified_count
             FROM runs WHERE run_id = ?1",
            params![run_id],
            run_from_row,
        )
        .optional()?;
    Ok(found)
}

pub fn latest_run(conn: &Connection) -> Result<Option<RunRecord>> {
    let found = conn
        .query_row(
            "SELECT run_id, started_at, input_fingerprint, unit_count,
                    classified_count, unclassified_count
             FROM runs ORDER BY started_at DESC, rowid DESC LIMIT 1",
            [],
            run_from_row,
        )
        .optional()?;
    Ok(found)
}

/// Units per MBRCI class for a run; `None` is the unclassified group.
pub fn get_class_counts(conn: &Connection, run_id: &str) -> Result<Vec<(Option<u8>, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT MBRCI, COUNT(*) FROM mbrci_units
         WHERE run_id = ?1
         GROUP BY MBRCI
         ORDER BY MBRCI",
    )?;

    let counts = stmt
        .query_map(params![run_id], |row| {
            Ok((row.get::<_, Option<u8>>(0)?, row.get::<_, i64>(1)? as usize))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(counts)
}

pub fn verify_count(conn: &Connection, run_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM mbrci_units WHERE run_id = ?1",
        params![run_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================
