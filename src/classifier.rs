// 🌳 MBRCI Decision Tree
// Four split nodes per unit, combined into one of 32 classes.
//
// Thresholds are taken literally from the field method, including the
// strictness of every comparison. Missing inputs are handled in
// three-valued logic: a node is decided whenever the present inputs already
// decide it, otherwise the unit is unclassified.

use crate::db::{col, UnitRecord};
use crate::error::{MbrciError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

// ============================================================================
// THRESHOLDS
// ============================================================================

pub const SANDBAR_HECTARES_MIN: f64 = 50.0;
pub const REFUGIA_FRACTION_MIN: f64 = 0.02;
pub const SEIF_FRACTION_MIN: f64 = 0.2;
pub const SECONDARY_CHANNELS_MIN: u64 = 2;

pub const SINUOSITY_MIN: f64 = 1.2;

pub const INTERMITTENT_VARIETY_MIN: u64 = 6;
pub const PERMANENT_VARIETY_MIN: u64 = 4;
pub const IF_OPEN_LAND_FRACTION_MIN: f64 = 0.07;

/// SN5 rule list: (intermittent, permanent, open land) -> score.
/// Scanned top-down, first match wins.
pub const SN5_RULES: [(bool, bool, bool, u8); 8] = [
    (true, true, true, 3),
    (true, true, false, 2),
    (false, true, true, 2),
    (true, false, true, 2),
    (true, false, false, 1),
    (false, true, false, 1),
    (false, false, true, 1),
    (false, false, false, 0),
];

// ============================================================================
// SPLIT NODES
// ============================================================================

/// SN2: sandbar/habitat complexity. 1 iff every metric meets its minimum.
pub fn sn2(
    sandbar_hectares: Option<f64>,
    refugia_fraction: Option<f64>,
    seif_fraction: Option<f64>,
    secondary_channels: Option<u64>,
) -> Option<u8> {
    let checks = [
        sandbar_hectares.map(|v| v >= SANDBAR_HECTARES_MIN),
        refugia_fraction.map(|v| v >= REFUGIA_FRACTION_MIN),
        seif_fraction.map(|v| v >= SEIF_FRACTION_MIN),
        secondary_channels.map(|v| v >= SECONDARY_CHANNELS_MIN),
    ];

    // Any present metric below its minimum decides the node
    if checks.contains(&Some(false)) {
        return Some(0);
    }
    if checks.iter().all(|c| *c == Some(true)) {
        Some(1)
    } else {
        None
    }
}

/// SN3: dam impact. 0 with no dams, 1 with any.
pub fn sn3(dam_count: Option<u64>) -> Option<u8> {
    dam_count.map(|n| if n == 0 { 0 } else { 1 })
}

/// SN4: sinuosity.
pub fn sn4(mean_sinuosity: Option<f64>) -> Option<u8> {
    mean_sinuosity.map(|s| if s >= SINUOSITY_MIN { 1 } else { 0 })
}

/// SN5: lateral connectivity and open land, scored 0..=3.
pub fn sn5(
    intermittent_variety: Option<u64>,
    permanent_variety: Option<u64>,
    if_open_land_fraction: Option<f64>,
) -> Option<u8> {
    let p1 = intermittent_variety? >= INTERMITTENT_VARIETY_MIN;
    let p2 = permanent_variety? >= PERMANENT_VARIETY_MIN;
    let p3 = if_open_land_fraction? >= IF_OPEN_LAND_FRACTION_MIN;
    Some(sn5_score(p1, p2, p3))
}

/// First matching row of `SN5_RULES`.
pub fn sn5_score(p1: bool, p2: bool, p3: bool) -> u8 {
    SN5_RULES
        .iter()
        .find(|(a, b, c, _)| (*a, *b, *c) == (p1, p2, p3))
        .map(|rule| rule.3)
        // the table covers all eight combinations
        .unwrap_or(0)
}

/// A fully decided set of split-node values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SplitNodes {
    sn2: u8,
    sn3: u8,
    sn4: u8,
    sn5: u8,
}

impl SplitNodes {
    /// `None` unless SN2..SN4 are 0/1 and SN5 is 0..=3.
    pub fn new(sn2: u8, sn3: u8, sn4: u8, sn5: u8) -> Option<Self> {
        if sn2 > 1 || sn3 > 1 || sn4 > 1 || sn5 > 3 {
            return None;
        }
        Some(SplitNodes { sn2, sn3, sn4, sn5 })
    }

    pub fn sn2(&self) -> u8 {
        self.sn2
    }

    pub fn sn3(&self) -> u8 {
        self.sn3
    }

    pub fn sn4(&self) -> u8 {
        self.sn4
    }

    pub fn sn5(&self) -> u8 {
        self.sn5
    }

    /// Combination lookup: SN2-major, SN5-minor enumeration from 1.
    pub fn class(&self) -> MbrciClass {
        MbrciClass(1 + 16 * self.sn2 + 8 * self.sn3 + 4 * self.sn4 + self.sn5)
    }
}

/// Final condition class, always within 1..=32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MbrciClass(u8);

impl TryFrom<u8> for MbrciClass {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        MbrciClass::new(value).ok_or_else(|| format!("class {} outside 1..=32", value))
    }
}

impl From<MbrciClass> for u8 {
    fn from(class: MbrciClass) -> u8 {
        class.0
    }
}

impl MbrciClass {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 32;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&value)
            .then_some(MbrciClass(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Inverse of the combination lookup.
    pub fn split_nodes(&self) -> SplitNodes {
        let i = self.0 - 1;
        SplitNodes {
            sn2: i / 16,
            sn3: (i / 8) % 2,
            sn4: (i / 4) % 2,
            sn5: i % 4,
        }
    }

    pub fn all() -> impl Iterator<Item = MbrciClass> {
        (Self::MIN..=Self::MAX).map(MbrciClass)
    }
}

impl fmt::Display for MbrciClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Outcome for one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Classified {
        nodes: SplitNodes,
        class: MbrciClass,
    },
    /// At least one node undetermined. Decided nodes are still reported.
    Unclassified {
        sn2: Option<u8>,
        sn3: Option<u8>,
        sn4: Option<u8>,
        sn5: Option<u8>,
        missing: Vec<&'static str>,
    },
}

impl Classification {
    pub fn class(&self) -> Option<MbrciClass> {
        match self {
            Classification::Classified { class, .. } => Some(*class),
            Classification::Unclassified { .. } => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.class().is_some()
    }
}

/// What to do with a unit that cannot be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Keep the unit with a null class and a reason
    #[default]
    Propagate,
    /// Abort the run on the first such unit
    Reject,
}

/// Evaluate all four split nodes for a record. Existing SN/MBRCI values on
/// the record are ignored.
pub fn classify_record(r: &UnitRecord) -> Classification {
    let n2 = sn2(
        r.sandbar_hectares,
        r.refugia_fraction,
        r.seif_fraction,
        r.secondary_channels,
    );
    let n3 = sn3(r.dam_count);
    let n4 = sn4(r.mean_sinuosity);
    let n5 = sn5(
        r.intermittent_variety,
        r.permanent_variety,
        r.if_open_land_fraction,
    );

    if let (Some(a), Some(b), Some(c), Some(d)) = (n2, n3, n4, n5) {
        if let Some(nodes) = SplitNodes::new(a, b, c, d) {
            return Classification::Classified {
                nodes,
                class: nodes.class(),
            };
        }
    }

    let mut missing = Vec::new();
    if n2.is_none() {
        if r.sandbar_hectares.is_none() {
            missing.push(col::SANDBAR_HECTARES);
        }
        if r.refugia_fraction.is_none() {
            missing.push(col::REFUGIA_FRACTION);
        }
        if r.seif_fraction.is_none() {
            missing.push(col::SEIF_FRACTION);
        }
        if r.secondary_channels.is_none() {
            missing.push(col::SECONDARY_CHANNELS);
        }
    }
    if n3.is_none() {
        missing.push(col::DAM_COUNT);
    }
    if n4.is_none() {
        missing.push(col::MEAN_SINUOSITY);
    }
    if n5.is_none() {
        if r.intermittent_variety.is_none() {
            missing.push(col::INTERMITTENT_VARIETY);
        }
        if r.permanent_variety.is_none() {
            missing.push(col::PERMANENT_VARIETY);
        }
        if r.if_open_land_fraction.is_none() {
            missing.push(col::IF_OPEN_LAND_FRACTION);
        }
    }

    Classification::Unclassified {
        sn2: n2,
        sn3: n3,
        sn4: n4,
        sn5: n5,
        missing,
    }
}

/// Write a classification onto its record, replacing any previous result.
pub fn apply(record: &mut UnitRecord, classification: &Classification) {
    record.clear_classification();
    match classification {
        Classification::Classified { nodes, class } => {
            record.sn2 = Some(nodes.sn2());
            record.sn3 = Some(nodes.sn3());
            record.sn4 = Some(nodes.sn4());
            record.sn5 = Some(nodes.sn5());
            record.mbrci = Some(class.get());
        }
        Classification::Unclassified {
            sn2,
            sn3,
            sn4,
            sn5,
            missing,
        } => {
            record.sn2 = *sn2;
            record.sn3 = *sn3;
            record.sn4 = *sn4;
            record.sn5 = *sn5;
            record.unclassified_reason = Some(missing.join(";"));
        }
    }
}

/// Decision-tree stage over a whole batch
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    policy: MissingPolicy,
}

impl Classifier {
    pub fn new(policy: MissingPolicy) -> Self {
        Classifier { policy }
    }

    /// Classify every record. Under `Reject`, the first unclassifiable unit
    /// aborts with `UnclassifiableUnit`.
    pub fn classify_batch(&self, records: Vec<UnitRecord>) -> Result<Vec<UnitRecord>> {
        let mut out = Vec::with_capacity(records.len());
        let mut unclassified = 0usize;

        for mut record in records {
            let classification = classify_record(&record);

            if let Classification::Unclassified { missing, .. } = &classification {
                if self.policy == MissingPolicy::Reject {
                    return Err(MbrciError::UnclassifiableUnit {
                        unit: record.unit_id,
                        missing: missing.iter().map(|m| m.to_string()).collect(),
                    });
                }
                warn!(
                    unit = %record.unit_id,
                    missing = %missing.join(", "),
                    "unit left unclassified"
                );
                unclassified += 1;
            }

            apply(&mut record, &classification);
            out.push(record);
        }

        info!(
            units = out.len(),
            classified = out.len() - unclassified,
            unclassified,
            "classified batch"
        );
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Every row of the field method's combination table, in its order:
    /// (SN2, SN3, SN4, SN5) -> class.
    const COMBINATION_TABLE: [(u8, u8, u8, u8, u8); 32] = [
        (0, 0, 0, 0, 1),
        (0, 0, 0, 1, 2),
        (0, 0, 0, 2, 3),
        (0, 0, 0, 3, 4),
        (0, 0, 1, 0, 5),
        (0, 0, 1, 1, 6),
        (0, 0, 1, 2, 7),
        (0, 0, 1, 3, 8),
        (0, 1, 0, 0, 9),
        (0, 1, 0, 1, 10),
        (0, 1, 0, 2, 11),
        (0, 1, 0, 3, 12),
        (0, 1, 1, 0, 13),
        (0, 1, 1, 1, 14),
        (0, 1, 1, 2, 15),
        (0, 1, 1, 3, 16),
        (1, 0, 0, 0, 17),
        (1, 0, 0, 1, 18),
        (1, 0, 0, 2, 19),
        (1, 0, 0, 3, 20),
        (1, 0, 1, 0, 21),
        (1, 0, 1, 1, 22),
        (1, 0, 1, 2, 23),
        (1, 0, 1, 3, 24),
        (1, 1, 0, 0, 25),
        (1, 1, 0, 1, 26),
        (1, 1, 0, 2, 27),
        (1, 1, 0, 3, 28),
        (1, 1, 1, 0, 29),
        (1, 1, 1, 1, 30),
        (1, 1, 1, 2, 31),
        (1, 1, 1, 3, 32),
    ];

    /// A unit that satisfies every split node.
    fn complete_record() -> UnitRecord {
        UnitRecord {
            sandbar_hectares: Some(60.0),
            refugia_fraction: Some(0.05),
            seif_fraction: Some(0.25),
            secondary_channels: Some(3),
            dam_count: Some(0),
            mean_sinuosity: Some(1.3),
            intermittent_variety: Some(7),
            permanent_variety: Some(5),
            if_open_land_fraction: Some(0.08),
            ..UnitRecord::new("031300110101", 10_000.0)
        }
    }

    #[test]
    fn test_combination_table_matches_formula() {
        for (sn2, sn3, sn4, sn5, class) in COMBINATION_TABLE {
            let nodes = SplitNodes::new(sn2, sn3, sn4, sn5).unwrap();
            assert_eq!(
                nodes.class().get(),
                class,
                "({}, {}, {}, {})",
                sn2,
                sn3,
                sn4,
                sn5
            );
            assert_eq!(MbrciClass::new(class).unwrap().split_nodes(), nodes);
        }
    }

    #[test]
    fn test_combination_table_is_a_bijection() {
        let mut classes: Vec<u8> = COMBINATION_TABLE.iter().map(|row| row.4).collect();
        classes.sort();
        assert_eq!(classes, (1..=32).collect::<Vec<u8>>());
        assert_eq!(MbrciClass::all().count(), 32);
    }

    #[test]
    fn test_class_deserialization_is_range_checked() {
        assert_eq!(serde_json::from_str::<MbrciClass>("23").unwrap().get(), 23);
        assert!(serde_json::from_str::<MbrciClass>("0").is_err());
        assert!(serde_json::from_str::<MbrciClass>("33").is_err());
        assert_eq!(serde_json::to_string(&MbrciClass::new(7).unwrap()).unwrap(), "7");
    }

    #[test]
    fn test_split_nodes_range_checked() {
        assert!(SplitNodes::new(2, 0, 0, 0).is_none());
        assert!(SplitNodes::new(0, 2, 0, 0).is_none());
        assert!(SplitNodes::new(0, 0, 2, 0).is_none());
        assert!(SplitNodes::new(0, 0, 0, 4).is_none());
        assert!(MbrciClass::new(0).is_none());
        assert!(MbrciClass::new(33).is_none());
    }

    #[test]
    fn test_sn2_all_thresholds_met() {
        assert_eq!(sn2(Some(60.0), Some(0.05), Some(0.25), Some(3)), Some(1));
    }

    #[test]
    fn test_sn2_thresholds_are_inclusive() {
        assert_eq!(sn2(Some(50.0), Some(0.02), Some(0.2), Some(2)), Some(1));
        assert_eq!(sn2(Some(49.999), Some(0.02), Some(0.2), Some(2)), Some(0));
        assert_eq!(sn2(Some(50.0), Some(0.0199), Some(0.2), Some(2)), Some(0));
        assert_eq!(sn2(Some(50.0), Some(0.02), Some(0.1999), Some(2)), Some(0));
        assert_eq!(sn2(Some(50.0), Some(0.02), Some(0.2), Some(1)), Some(0));
    }

    #[test]
    fn test_sn2_decided_by_present_failure() {
        // sandbars already below the minimum: the missing metrics cannot matter
        assert_eq!(sn2(Some(10.0), None, None, None), Some(0));
        // everything present passes but one metric is missing
        assert_eq!(sn2(Some(60.0), Some(0.05), None, Some(3)), None);
    }

    #[test]
    fn test_sn3() {
        assert_eq!(sn3(Some(0)), Some(0));
        assert_eq!(sn3(Some(5)), Some(1));
        assert_eq!(sn3(None), None);
    }

    #[test]
    fn test_sn4_boundary() {
        assert_eq!(sn4(Some(1.19)), Some(0));
        assert_eq!(sn4(Some(1.2)), Some(1));
        assert_eq!(sn4(None), None);
    }

    #[test]
    fn test_sn5_table() {
        assert_eq!(sn5(Some(7), Some(5), Some(0.08)), Some(3));
        assert_eq!(sn5(Some(6), Some(4), Some(0.0699)), Some(2));
        assert_eq!(sn5(Some(5), Some(4), Some(0.07)), Some(2));
        assert_eq!(sn5(Some(6), Some(3), Some(0.07)), Some(2));
        assert_eq!(sn5(Some(6), Some(3), Some(0.01)), Some(1));
        assert_eq!(sn5(Some(0), Some(4), Some(0.0)), Some(1));
        assert_eq!(sn5(Some(0), Some(0), Some(1.0)), Some(1));
        assert_eq!(sn5(Some(0), Some(0), Some(0.0)), Some(0));
        assert_eq!(sn5(Some(7), None, Some(0.08)), None);
    }

    #[test]
    fn test_sn5_rules_cover_each_combination_once() {
        for p1 in [false, true] {
            for p2 in [false, true] {
                for p3 in [false, true] {
                    let hits = SN5_RULES
                        .iter()
                        .filter(|(a, b, c, _)| (*a, *b, *c) == (p1, p2, p3))
                        .count();
                    assert_eq!(hits, 1, "({}, {}, {})", p1, p2, p3);

                    // score counts satisfied predicates
                    let expected = [p1, p2, p3].iter().filter(|p| **p).count() as u8;
                    assert_eq!(sn5_score(p1, p2, p3), expected);
                }
            }
        }
    }

    #[test]
    fn test_example_class_23() {
        let nodes = SplitNodes::new(1, 0, 1, 2).unwrap();
        assert_eq!(nodes.class().get(), 23);
    }

    #[test]
    fn test_classify_complete_record() {
        let classification = classify_record(&complete_record());

        match classification {
            Classification::Classified { nodes, class } => {
                assert_eq!((nodes.sn2(), nodes.sn3(), nodes.sn4(), nodes.sn5()), (1, 0, 1, 3));
                assert_eq!(class.get(), 24);
            }
            other => panic!("expected classified, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_dam_count_is_not_zero() {
        let record = UnitRecord {
            dam_count: None,
            ..complete_record()
        };

        match classify_record(&record) {
            Classification::Unclassified { sn3, sn2, missing, .. } => {
                assert_eq!(sn3, None);
                assert_eq!(sn2, Some(1));
                assert_eq!(missing, vec![col::DAM_COUNT]);
            }
            other => panic!("expected unclassified, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_listed_per_undetermined_node() {
        let record = UnitRecord {
            refugia_fraction: None,
            if_open_land_fraction: None,
            mean_sinuosity: None,
            ..complete_record()
        };

        match classify_record(&record) {
            Classification::Unclassified { missing, .. } => {
                assert_eq!(
                    missing,
                    vec![
                        col::REFUGIA_FRACTION,
                        col::MEAN_SINUOSITY,
                        col::IF_OPEN_LAND_FRACTION
                    ]
                );
            }
            other => panic!("expected unclassified, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_metric_irrelevant_when_sn2_decided() {
        let record = UnitRecord {
            sandbar_hectares: Some(1.0),
            refugia_fraction: None,
            ..complete_record()
        };

        let classification = classify_record(&record);
        assert_eq!(classification.class().map(|c| c.get()), Some(8));
    }

    #[test]
    fn test_apply_writes_columns() {
        let mut record = complete_record();
        apply(&mut record, &classify_record(&complete_record()));

        assert_eq!(record.sn2, Some(1));
        assert_eq!(record.sn3, Some(0));
        assert_eq!(record.sn4, Some(1));
        assert_eq!(record.sn5, Some(3));
        assert_eq!(record.mbrci, Some(24));
        assert_eq!(record.unclassified_reason, None);
    }

    #[test]
    fn test_apply_unclassified_never_sets_class() {
        let mut record = UnitRecord {
            permanent_variety: None,
            mbrci: Some(17),
            ..complete_record()
        };
        let classification = classify_record(&record);
        apply(&mut record, &classification);

        assert_eq!(record.mbrci, None);
        assert_eq!(record.sn5, None);
        assert_eq!(record.sn4, Some(1));
        assert_eq!(record.unclassified_reason.as_deref(), Some("Perm_Variety"));
    }

    #[test]
    fn test_batch_propagate() {
        let records = vec![
            complete_record(),
            UnitRecord {
                unit_id: "x".to_string(),
                dam_count: None,
                ..complete_record()
            },
        ];

        let out = Classifier::default().classify_batch(records).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].mbrci, Some(24));
        assert_eq!(out[1].mbrci, None);
        assert_eq!(out[1].unclassified_reason.as_deref(), Some("NID_Dam_Count"));
    }

    #[test]
    fn test_batch_reject() {
        let records = vec![
            complete_record(),
            UnitRecord {
                unit_id: "x".to_string(),
                dam_count: None,
                ..complete_record()
            },
        ];

        let err = Classifier::new(MissingPolicy::Reject)
            .classify_batch(records)
            .unwrap_err();

        match err {
            MbrciError::UnclassifiableUnit { unit, missing } => {
                assert_eq!(unit, "x");
                assert_eq!(missing, vec!["NID_Dam_Count".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_reclassification_is_idempotent() {
        let records = vec![
            complete_record(),
            UnitRecord {
                unit_id: "b".to_string(),
                dam_count: Some(4),
                mean_sinuosity: Some(1.0),
                ..complete_record()
            },
            UnitRecord {
                unit_id: "c".to_string(),
                seif_fraction: None,
                ..complete_record()
            },
        ];

        let classifier = Classifier::default();
        let once = classifier.classify_batch(records).unwrap();
        let twice = classifier.classify_batch(once.clone()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_stale_classification_overwritten() {
        let mut stale = complete_record();
        stale.sn2 = Some(0);
        stale.mbrci = Some(1);
        stale.unclassified_reason = Some("old".to_string());

        let out = Classifier::default().classify_batch(vec![stale]).unwrap();
        assert_eq!(out[0].mbrci, Some(24));
        assert_eq!(out[0].unclassified_reason, None);
    }

    #[test]
    fn test_missing_policy_serde() {
        let policy: MissingPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, MissingPolicy::Reject);
        assert_eq!(MissingPolicy::default(), MissingPolicy::Propagate);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn opt<T: std::fmt::Debug + Clone + 'static>(
            s: impl Strategy<Value = T> + 'static,
        ) -> impl Strategy<Value = Option<T>> {
            prop::option::weighted(0.8, s)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn prop_sn2_branches_are_complementary(
                sandbar in 0.0..120.0f64,
                refugia in 0.0..0.1f64,
                seif in 0.0..0.5f64,
                channels in 0..6u64,
            ) {
                let all_met = sandbar >= 50.0 && refugia >= 0.02 && seif >= 0.2 && channels >= 2;
                let any_below = sandbar < 50.0 || refugia < 0.02 || seif < 0.2 || channels < 2;

                prop_assert!(all_met != any_below);
                let value = sn2(Some(sandbar), Some(refugia), Some(seif), Some(channels));
                prop_assert_eq!(value, Some(if all_met { 1 } else { 0 }));
            }

            #[test]
            fn prop_complete_inputs_always_classify(
                sandbar in 0.0..120.0f64,
                refugia in 0.0..0.1f64,
                seif in 0.0..0.5f64,
                channels in 0..6u64,
                dams in 0..10u64,
                sinuosity in 1.0..2.0f64,
                intermittent in 0..12u64,
                permanent in 0..8u64,
                open_land in 0.0..0.2f64,
            ) {
                let record = UnitRecord {
                    sandbar_hectares: Some(sandbar),
                    refugia_fraction: Some(refugia),
                    seif_fraction: Some(seif),
                    secondary_channels: Some(channels),
                    dam_count: Some(dams),
                    mean_sinuosity: Some(sinuosity),
                    intermittent_variety: Some(intermittent),
                    permanent_variety: Some(permanent),
                    if_open_land_fraction: Some(open_land),
                    ..UnitRecord::new("p", 1000.0)
                };

                let class = classify_record(&record).class();
                prop_assert!(class.is_some());
                let class = class.unwrap();
                prop_assert!((1..=32).contains(&class.get()));

                let nodes = class.split_nodes();
                prop_assert!(nodes.sn2() <= 1 && nodes.sn3() <= 1 && nodes.sn4() <= 1);
                prop_assert!(nodes.sn5() <= 3);
            }

            #[test]
            fn prop_unclassified_units_never_get_a_class(
                sandbar in opt(0.0..120.0f64),
                refugia in opt(0.0..0.1f64),
                dams in opt(0..10u64),
                sinuosity in opt(1.0..2.0f64),
                permanent in opt(0..8u64),
            ) {
                let record = UnitRecord {
                    sandbar_hectares: sandbar,
                    refugia_fraction: refugia,
                    seif_fraction: Some(0.3),
                    secondary_channels: Some(3),
                    dam_count: dams,
                    mean_sinuosity: sinuosity,
                    intermittent_variety: Some(6),
                    permanent_variety: permanent,
                    if_open_land_fraction: Some(0.1),
                    ..UnitRecord::new("p", 1000.0)
                };

                let classification = classify_record(&record);
                let mut applied = record.clone();
                apply(&mut applied, &classification);

                match classification {
                    Classification::Classified { .. } => {
                        prop_assert!(applied.mbrci.is_some());
                        prop_assert!(applied.unclassified_reason.is_none());
                    }
                    Classification::Unclassified { missing, .. } => {
                        prop_assert!(!missing.is_empty());
                        prop_assert!(applied.mbrci.is_none());
                    }
                }
            }
        }
    }
}
