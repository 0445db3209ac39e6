// ✅ Data Quality Engine
// Plausibility checks on joined + derived unit records.
//
// Findings are reported, never corrected: a flagged unit is still
// classified from the values it has.

use crate::db::{col, UnitRecord};
use serde::{Deserialize, Serialize};

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Value cannot be right (zero area)
    Warning,  // Value is physically implausible
    Info,     // Value is missing
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
}

impl QualityIssue {
    fn new(severity: Severity, field: &str, issue: String, recommendation: &str) -> Self {
        QualityIssue {
            severity,
            field: field.to_string(),
            issue,
            recommendation: recommendation.to_string(),
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub unit_id: String,
    pub issues: Vec<QualityIssue>,
    /// Classifier inputs present, out of nine
    pub inputs_present: usize,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} inputs, {} issue(s) ({} critical)",
            self.unit_id,
            self.inputs_present,
            CLASSIFIER_INPUTS,
            self.issues.len(),
            self.count(Severity::Critical)
        )
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    pub fn is_complete(&self) -> bool {
        self.inputs_present == CLASSIFIER_INPUTS
    }
}

const CLASSIFIER_INPUTS: usize = 9;

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    /// Fractions above this are flagged
    max_fraction: f64,
    /// Sinuosity below this is flagged (a channel cannot be shorter than its valley)
    min_sinuosity: f64,
}

impl DataQualityEngine {
    pub fn new() -> Self {
        DataQualityEngine {
            max_fraction: 1.0,
            min_sinuosity: 1.0,
        }
    }

    pub fn validate(&self, r: &UnitRecord) -> QualityReport {
        let mut issues = Vec::new();

        // Rule 1: unit area
        if r.total_area <= 0.0 {
            issues.push(QualityIssue::new(
                Severity::Critical,
                col::TOTAL_AREA,
                format!("Unit area is {}", r.total_area),
                "Check the HUC12 intersect; area fractions are undefined",
            ));
        }

        // Rule 2: fractions within [0, 1]
        let fractions = [
            (col::REFUGIA_FRACTION, r.refugia_fraction),
            (col::SEIF_FRACTION, r.seif_fraction),
            (col::IF_OPEN_LAND_FRACTION, r.if_open_land_fraction),
        ];
        for (field, value) in fractions {
            if let Some(v) = value.filter(|v| *v > self.max_fraction) {
                issues.push(QualityIssue::new(
                    Severity::Warning,
                    field,
                    format!("Fraction {:.3} exceeds {}", v, self.max_fraction),
                    "Check the cell size used for this raster",
                ));
            }
        }

        // Rule 3: sinuosity
        if let Some(s) = r.mean_sinuosity.filter(|s| *s < self.min_sinuosity) {
            issues.push(QualityIssue::new(
                Severity::Warning,
                col::MEAN_SINUOSITY,
                format!("Sinuosity {:.3} below {}", s, self.min_sinuosity),
                "Recompute sinuosity as channel length over valley length",
            ));
        }

        // Rule 4: missing classifier inputs
        let inputs = [
            (col::SANDBAR_HECTARES, r.sandbar_hectares.is_some()),
            (col::REFUGIA_FRACTION, r.refugia_fraction.is_some()),
            (col::SEIF_FRACTION, r.seif_fraction.is_some()),
            (col::SECONDARY_CHANNELS, r.secondary_channels.is_some()),
            (col::DAM_COUNT, r.dam_count.is_some()),
            (col::MEAN_SINUOSITY, r.mean_sinuosity.is_some()),
            (col::INTERMITTENT_VARIETY, r.intermittent_variety.is_some()),
            (col::PERMANENT_VARIETY, r.permanent_variety.is_some()),
            (col::IF_OPEN_LAND_FRACTION, r.if_open_land_fraction.is_some()),
        ];
        let mut inputs_present = 0;
        for (field, present) in inputs {
            if present {
                inputs_present += 1;
            } else {
                issues.push(QualityIssue::new(
                    Severity::Info,
                    field,
                    "Value is missing".to_string(),
                    "Confirm whether the unit was measured for this metric",
                ));
            }
        }

        QualityReport {
            unit_id: r.unit_id.clone(),
            issues,
            inputs_present,
        }
    }

    pub fn validate_batch(&self, records: &[UnitRecord]) -> Vec<QualityReport> {
        records.iter().map(|r| self.validate(r)).collect()
    }

    pub fn batch_summary(&self, reports: &[QualityReport]) -> BatchSummary {
        BatchSummary {
            total_units: reports.len(),
            complete_count: reports.iter().filter(|r| r.is_complete()).count(),
            critical_count: reports.iter().filter(|r| r.has_critical_issues()).count(),
            warning_count: reports
                .iter()
                .filter(|r| r.count(Severity::Warning) > 0)
                .count(),
            missing_values: reports.iter().map(|r| r.count(Severity::Info)).sum(),
        }
    }
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BATCH SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_units: usize,
    /// Units with all nine classifier inputs
    pub complete_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    /// Missing classifier inputs across all units
    pub missing_values: usize,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} units: {} complete, {} with warnings, {} critical, {} missing values",
            self.total_units,
            self.complete_count,
            self.warning_count,
            self.critical_count,
            self.missing_values
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
