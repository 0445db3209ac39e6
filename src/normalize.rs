// 📏 Unit Normalizer
// Raster cell counts -> acres (-> hectares for sandbars).
// All source rasters are in Albers metres; cell sizes differ per source.

use crate::db::UnitRecord;
use crate::error::{MbrciError, Result};
use serde::{Deserialize, Serialize};

/// International acre in square metres
pub const SQ_METERS_PER_ACRE: f64 = 4046.8564224;

/// Acres per hectare as used for the sandbar threshold
pub const ACRES_PER_HECTARE: f64 = 2.471;

/// Cell edge length in metres for each counted raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellSizes {
    pub if_openland: f64,
    pub seif: f64,
    pub refugia: f64,
    pub sandbars: f64,
    pub openland_nlcd: f64,
}

impl Default for CellSizes {
    fn default() -> Self {
        CellSizes {
            if_openland: 34.855602,
            seif: 34.855602,
            refugia: 33.578955,
            sandbars: 30.0,
            openland_nlcd: 30.0,
        }
    }
}

impl CellSizes {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("if_openland", self.if_openland),
            ("seif", self.seif),
            ("refugia", self.refugia),
            ("sandbars", self.sandbars),
            ("openland_nlcd", self.openland_nlcd),
        ];
        for (name, size) in sizes {
            if !(size.is_finite() && size > 0.0) {
                return Err(MbrciError::Config(format!(
                    "cell size for {} must be positive, got {}",
                    name, size
                )));
            }
        }
        Ok(())
    }
}

/// `count * cell_size^2 / m2-per-acre`; a missing count stays missing.
pub fn cells_to_acres(count: Option<u64>, cell_size: f64) -> Option<f64> {
    count.map(|n| (n as f64 * cell_size * cell_size) / SQ_METERS_PER_ACRE)
}

pub fn acres_to_hectares(acres: Option<f64>) -> Option<f64> {
    acres.map(|a| a / ACRES_PER_HECTARE)
}

/// Recompute every area column from the raw counts.
pub fn normalize(records: Vec<UnitRecord>, sizes: &CellSizes) -> Vec<UnitRecord> {
    records
        .into_iter()
        .map(|mut r| {
            r.if_openland_acres = cells_to_acres(r.if_openland_cells, sizes.if_openland);
            r.seif_acres = cells_to_acres(r.seif_cells, sizes.seif);
            r.refugia_acres = cells_to_acres(r.refugia_cells, sizes.refugia);
            r.sandbar_acres = cells_to_acres(r.sandbar_cells, sizes.sandbars);
            r.openland_nlcd_acres = cells_to_acres(r.openland_nlcd_cells, sizes.openland_nlcd);
            r.sandbar_hectares = acres_to_hectares(r.sandbar_acres);
            r
        })
        .collect()
}
