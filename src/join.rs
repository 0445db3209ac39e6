// 🔗 Table Joiner
// Left outer joins of auxiliary metric tables onto the HUC12 base table.

use crate::error::{MbrciError, Result};
use crate::loader::MetricTable;
use tracing::debug;

/// What a single join matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Base rows found in the auxiliary table
    pub matched: usize,
    /// Base rows absent from the auxiliary table (null- or zero-filled)
    pub unmatched: usize,
    /// Auxiliary rows whose key is not in the base (dropped)
    pub orphans: usize,
}

/// Left outer join: every base row exactly once, in base order, with the
/// auxiliary columns appended.
///
/// Unmatched rows get `fill` for every auxiliary column (`None` = missing).
/// Matched rows keep their own values, nulls included.
pub fn left_join(
    base: &MetricTable,
    aux: &MetricTable,
    fill: Option<f64>,
) -> Result<(MetricTable, JoinStats)> {
    if let Some(column) = aux
        .columns()
        .iter()
        .find(|c| base.column_index(c).is_some() || c.as_str() == base.key_column())
    {
        return Err(MbrciError::malformed(
            aux.name(),
            format!("column {} already present in {}", column, base.name()),
        ));
    }

    let columns: Vec<String> = base
        .columns()
        .iter()
        .chain(aux.columns())
        .cloned()
        .collect();
    let mut joined = MetricTable::new(base.name(), base.key_column(), columns)?;

    let width = aux.columns().len();
    let mut stats = JoinStats::default();

    for row in base.rows() {
        let mut values = row.values.clone();
        match aux.get(&row.key) {
            Some(found) => {
                stats.matched += 1;
                values.extend_from_slice(&found.values);
            }
            None => {
                stats.unmatched += 1;
                values.extend(std::iter::repeat(fill).take(width));
            }
        }
        joined.push_row(row.key.clone(), values)?;
    }

    stats.orphans = aux
        .rows()
        .iter()
        .filter(|r| base.get(&r.key).is_none())
        .count();

    debug!(
        base = base.name(),
        aux = aux.name(),
        matched = stats.matched,
        unmatched = stats.unmatched,
        orphans = stats.orphans,
        "left join"
    );

    Ok((joined, stats))
}
