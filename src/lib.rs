// MBRCI - Core Library
// Mainstem Big River Condition Index: per-HUC12 decision-tree classification.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod config;
pub mod loader;         // Keyed metric tables + CSV sources
pub mod join;           // Left join onto the HUC base table
pub mod db;             // Unit records, CSV export, SQLite runs
pub mod normalize;      // Cell counts -> acres/hectares
pub mod derived;        // Area fractions
pub mod classifier;     // Split nodes SN2..SN5 -> class 1..32
pub mod data_quality;
pub mod report;         // Class histogram
pub mod pipeline;

// Re-export commonly used types
pub use error::{MbrciError, Result};
pub use config::{OutputConfig, PipelineConfig, SourceSpec};
pub use loader::{
    read_csv_table, CsvTableSource, MetricRow, MetricTable, RowView, SourceKind, TableSource,
};
pub use join::{left_join, JoinStats};
pub use db::{
    fingerprint_files, get_class_counts, get_records, get_run, insert_records, latest_run,
    load_csv, setup_database, verify_count, write_csv, RunRecord, UnitRecord,
};
pub use normalize::{normalize, CellSizes};
pub use derived::{derive_metrics, ratio};
pub use classifier::{
    classify_record, Classification, Classifier, MbrciClass, MissingPolicy, SplitNodes,
};
pub use data_quality::{BatchSummary, DataQualityEngine, QualityIssue, QualityReport, Severity};
pub use report::ClassHistogram;
pub use pipeline::{records_from_table, run_pipeline, Pipeline, PipelineOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
