// ➗ Derived Metric Calculator
// Area ratios feeding SN2 and SN5.

use crate::db::UnitRecord;

/// `numerator / denominator`, or `None` when either side is missing, the
/// denominator is zero, or the result is not finite.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    let r = n / d;
    r.is_finite().then_some(r)
}

/// Recompute the three fractions from the normalized areas.
pub fn derive_metrics(records: Vec<UnitRecord>) -> Vec<UnitRecord> {
    records
        .into_iter()
        .map(|mut r| {
            r.if_open_land_fraction = ratio(r.if_openland_acres, r.openland_nlcd_acres);
            r.refugia_fraction = ratio(r.refugia_acres, Some(r.total_area));
            r.seif_fraction = ratio(r.seif_acres, Some(r.total_area));
            r
        })
        .collect()
}
