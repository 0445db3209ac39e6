// 🔄 MBRCI Pipeline
// raw tables -> join -> records -> normalize -> derive -> classify
//
// Each stage takes the collection and hands back a new one; nothing is
// shared between units.

use crate::classifier::{Classifier, MissingPolicy};
use crate::config::PipelineConfig;
use crate::data_quality::{BatchSummary, DataQualityEngine, Severity};
use crate::db::UnitRecord;
use crate::derived::derive_metrics;
use crate::error::{MbrciError, Result};
use crate::join::{left_join, JoinStats};
use crate::loader::{MetricTable, SourceKind, TableSource};
use crate::normalize::{normalize, CellSizes};
use crate::report::ClassHistogram;
use tracing::{debug, info, warn};

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<UnitRecord>,
    pub quality: BatchSummary,
    pub histogram: ClassHistogram,
    /// Per auxiliary source, in join order
    pub join_stats: Vec<(SourceKind, JoinStats)>,
}

pub struct Pipeline {
    cell_sizes: CellSizes,
    classifier: Classifier,
    quality: DataQualityEngine,
    zero_fill: Vec<SourceKind>,
}

impl Pipeline {
    pub fn new(cell_sizes: CellSizes, policy: MissingPolicy) -> Self {
        Pipeline {
            cell_sizes,
            classifier: Classifier::new(policy),
            quality: DataQualityEngine::new(),
            zero_fill: Vec::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cell_sizes, config.missing_policy).with_zero_fill(config.zero_fill.clone())
    }

    /// Builder pattern: sources whose absent units count as zero
    pub fn with_zero_fill(mut self, kinds: Vec<SourceKind>) -> Self {
        self.zero_fill = kinds;
        self
    }

    /// Load every source, join, and classify.
    pub fn run<S: TableSource>(&self, sources: &[S]) -> Result<PipelineOutput> {
        let tables = sources
            .iter()
            .map(|s| Ok((s.kind(), s.load()?)))
            .collect::<Result<Vec<_>>>()?;

        let (joined, join_stats) = self.join_tables(tables)?;
        let records = records_from_table(&joined)?;
        info!(units = records.len(), "built unit records");

        let mut output = self.process(records)?;
        output.join_stats = join_stats;
        Ok(output)
    }

    /// Left-join the auxiliary tables onto the base, in the order given.
    /// The first table must be the HUC base and no other may be.
    pub fn join_tables(
        &self,
        tables: Vec<(SourceKind, MetricTable)>,
    ) -> Result<(MetricTable, Vec<(SourceKind, JoinStats)>)> {
        let mut iter = tables.into_iter();

        let mut joined = match iter.next() {
            Some((kind, table)) if kind.is_base() => table,
            Some((kind, _)) => {
                return Err(MbrciError::Config(format!(
                    "first table must be the huc base, got {}",
                    kind
                )))
            }
            None => return Err(MbrciError::Config("no input tables".to_string())),
        };

        if joined.is_empty() {
            warn!(source = %SourceKind::Huc, "base table has no units");
        }

        let mut stats = Vec::new();
        for (kind, table) in iter {
            if kind.is_base() {
                return Err(MbrciError::Config("huc base given twice".to_string()));
            }

            let fill = self.zero_fill.contains(&kind).then_some(0.0);
            let (next, s) = left_join(&joined, &table, fill)?;
            if s.unmatched > 0 {
                let policy = if fill.is_some() { "zero" } else { "missing" };
                info!(source = %kind, units = s.unmatched, policy, "units absent from source");
            }
            joined = next;
            stats.push((kind, s));
        }

        info!(units = joined.len(), columns = joined.columns().len(), "joined tables");
        Ok((joined, stats))
    }

    /// Normalize, derive and classify records that are already joined.
    pub fn process(&self, records: Vec<UnitRecord>) -> Result<PipelineOutput> {
        let records = normalize(records, &self.cell_sizes);
        let records = derive_metrics(records);

        let reports = self.quality.validate_batch(&records);
        for report in &reports {
            for issue in report.issues.iter().filter(|i| i.severity != Severity::Info) {
                warn!(
                    unit = %report.unit_id,
                    field = %issue.field,
                    severity = ?issue.severity,
                    "{}",
                    issue.issue
                );
            }
        }
        let quality = self.quality.batch_summary(&reports);
        info!("{}", quality.summary());

        let records = self.classifier.classify_batch(records)?;
        let histogram = ClassHistogram::from_records(&records);
        debug!("{}", histogram.summary());

        Ok(PipelineOutput {
            records,
            quality,
            histogram,
            join_stats: Vec::new(),
        })
    }
}

/// One record per joined row, in base-table order
pub fn records_from_table(joined: &MetricTable) -> Result<Vec<UnitRecord>> {
    joined.views().map(UnitRecord::from_row).collect()
}

/// Run the whole pipeline for a configuration
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput> {
    let sources = config.table_sources()?;
    Pipeline::from_config(config).run(&sources)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory table source
    struct StaticSource {
        kind: SourceKind,
        rows: Vec<(&'static str, Vec<Option<f64>>)>,
    }

    impl TableSource for StaticSource {
        fn load(&self) -> Result<MetricTable> {
            let mut table = MetricTable::new(
                self.kind.name(),
                "HUC_12",
                self.kind
                    .output_columns()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            )?;
            for (key, values) in &self.rows {
                table.push_row(*key, values.clone())?;
            }
            Ok(table)
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    fn source(kind: SourceKind, rows: &[(&'static str, f64)]) -> StaticSource {
        StaticSource {
            kind,
            rows: rows.iter().map(|(k, v)| (*k, vec![Some(*v)])).collect(),
        }
    }

    /// Unit "a" meets every threshold; "b" has no dam record; "c" meets none.
    fn sources() -> Vec<StaticSource> {
        vec![
            StaticSource {
                kind: SourceKind::Huc,
                rows: vec![
                    ("a", vec![Some(10_000.0), Some(120.0), Some(110.0)]),
                    ("b", vec![Some(10_000.0), None, None]),
                    ("c", vec![Some(10_000.0), None, None]),
                ],
            },
            // 9000 cells of 30 m = 2001.55 acres = 810 ha
            source(SourceKind::Sandbars, &[("a", 9000.0), ("b", 9000.0), ("c", 10.0)]),
            // 2000 cells of 33.58 m = 557 acres = 5.6%
            source(SourceKind::Refugia, &[("a", 2000.0), ("b", 2000.0), ("c", 0.0)]),
            // 8000 cells of 34.86 m = 2401 acres = 24%
            source(SourceKind::Seif, &[("a", 8000.0), ("b", 8000.0), ("c", 0.0)]),
            source(SourceKind::Sinuosity, &[("a", 1.2), ("b", 1.35), ("c", 1.05)]),
            source(SourceKind::IntermittentConnectivity, &[("a", 7.0), ("b", 7.0), ("c", 1.0)]),
            source(SourceKind::PermanentConnectivity, &[("a", 5.0), ("b", 5.0), ("c", 1.0)]),
            source(SourceKind::IfOpenland, &[("a", 80.0), ("b", 80.0), ("c", 0.0)]),
            source(SourceKind::OpenlandNlcd, &[("a", 1000.0), ("b", 1000.0), ("c", 1000.0)]),
            source(SourceKind::Dams, &[("a", 0.0), ("c", 3.0)]),
            source(SourceKind::SecondaryChannels, &[("a", 2.0), ("b", 4.0), ("c", 0.0)]),
        ]
    }

    #[test]
    fn test_full_run() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let output = pipeline.run(&sources()).unwrap();

        let ids: Vec<&str> = output.records.iter().map(|r| r.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let a = &output.records[0];
        assert_eq!((a.sn2, a.sn3, a.sn4, a.sn5), (Some(1), Some(0), Some(1), Some(3)));
        assert_eq!(a.mbrci, Some(24));

        let b = &output.records[1];
        assert_eq!(b.dam_count, None);
        assert_eq!(b.mbrci, None);
        assert_eq!(b.unclassified_reason.as_deref(), Some("NID_Dam_Count"));

        let c = &output.records[2];
        assert_eq!((c.sn2, c.sn3, c.sn4, c.sn5), (Some(0), Some(1), Some(0), Some(0)));
        assert_eq!(c.mbrci, Some(9));

        assert_eq!(output.histogram.classified(), 2);
        assert_eq!(output.histogram.unclassified(), 1);
        assert_eq!(output.join_stats.len(), 10);
        assert_eq!(output.join_stats[8].0, SourceKind::Dams);
        assert_eq!(output.join_stats[8].1.unmatched, 1);
        assert_eq!(output.quality.total_units, 3);
    }

    #[test]
    fn test_zero_fill_classifies_absent_dams() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate)
            .with_zero_fill(vec![SourceKind::Dams]);
        let output = pipeline.run(&sources()).unwrap();

        let b = &output.records[1];
        assert_eq!(b.dam_count, Some(0));
        assert_eq!(b.sn3, Some(0));
        // 1.35 sinuosity -> SN4 = 1
        assert_eq!(b.mbrci, Some(24));
        assert_eq!(output.histogram.unclassified(), 0);
    }

    #[test]
    fn test_reject_policy_aborts() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Reject);
        let err = pipeline.run(&sources()).unwrap_err();

        assert!(matches!(err, MbrciError::UnclassifiableUnit { ref unit, .. } if unit == "b"));
    }

    #[test]
    fn test_process_is_idempotent() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let first = pipeline.run(&sources()).unwrap();
        let second = pipeline.process(first.records.clone()).unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(first.histogram, second.histogram);
    }

    #[test]
    fn test_base_must_come_first() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let mut srcs = sources();
        srcs.swap(0, 1);

        assert!(matches!(pipeline.run(&srcs), Err(MbrciError::Config(_))));
    }

    #[test]
    fn test_missing_acres_is_fatal() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let mut srcs = sources();
        srcs[0].rows[2].1[0] = None;

        let err = pipeline.run(&srcs).unwrap_err();
        assert!(matches!(err, MbrciError::InvalidValue { ref unit, ref column, .. }
            if unit == "c" && column == "ACRES"));
    }

    #[test]
    fn test_empty_base_table_yields_no_units() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let mut srcs = sources();
        srcs[0].rows.clear();

        let output = pipeline.run(&srcs).unwrap();
        assert!(output.records.is_empty());
        assert_eq!(output.histogram.total(), 0);
        assert_eq!(output.join_stats[8].1.orphans, 2);
    }

    #[test]
    fn test_no_tables() {
        let pipeline = Pipeline::new(CellSizes::default(), MissingPolicy::Propagate);
        let none: Vec<StaticSource> = Vec::new();
        assert!(pipeline.run(&none).is_err());
    }
}
