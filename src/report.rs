// 📊 Class Frequency Report
// Units per MBRCI class (group by class, count per group).

use crate::classifier::MbrciClass;
use crate::db::UnitRecord;
use crate::error::{MbrciError, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassHistogram {
    /// Index 0 holds class 1
    counts: [usize; 32],
    unclassified: usize,
}

impl ClassHistogram {
    pub fn new() -> Self {
        ClassHistogram {
            counts: [0; 32],
            unclassified: 0,
        }
    }

    /// Records without a valid class land in the unclassified bucket.
    pub fn from_records(records: &[UnitRecord]) -> Self {
        let mut histogram = Self::new();
        for record in records {
            histogram.add(record.mbrci.and_then(MbrciClass::new));
        }
        histogram
    }

    /// Rebuild from stored `(class, count)` groups.
    pub fn from_counts(groups: &[(Option<u8>, usize)]) -> Result<Self> {
        let mut histogram = Self::new();
        for &(class, count) in groups {
            match class {
                None => histogram.unclassified += count,
                Some(value) => {
                    let class = MbrciClass::new(value).ok_or_else(|| {
                        MbrciError::malformed("mbrci_units", format!("stored class {}", value))
                    })?;
                    histogram.counts[class.get() as usize - 1] += count;
                }
            }
        }
        Ok(histogram)
    }

    pub fn add(&mut self, class: Option<MbrciClass>) {
        match class {
            Some(c) => self.counts[c.get() as usize - 1] += 1,
            None => self.unclassified += 1,
        }
    }

    pub fn count(&self, class: MbrciClass) -> usize {
        self.counts[class.get() as usize - 1]
    }

    pub fn unclassified(&self) -> usize {
        self.unclassified
    }

    pub fn classified(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn total(&self) -> usize {
        self.classified() + self.unclassified
    }

    /// All 32 classes in order, zero counts included.
    pub fn iter(&self) -> impl Iterator<Item = (MbrciClass, usize)> + '_ {
        MbrciClass::all().map(move |c| (c, self.count(c)))
    }

    /// Most frequent class; ties go to the lower class.
    pub fn mode(&self) -> Option<MbrciClass> {
        self.iter()
            .filter(|(_, n)| *n > 0)
            .fold(None, |best: Option<(MbrciClass, usize)>, (c, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((c, n)),
            })
            .map(|(c, _)| c)
    }

    pub fn summary(&self) -> String {
        let mode = self
            .mode()
            .map(|c| format!("class {} ({} units)", c, self.count(c)))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{} units: {} classified, {} unclassified, most frequent {}",
            self.total(),
            self.classified(),
            self.unclassified,
            mode
        )
    }

    /// Two columns: `MBRCI,count`, then an `unclassified` row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["MBRCI", "count"])?;
        for (class, count) in self.iter() {
            wtr.write_record([class.to_string(), count.to_string()])?;
        }
        wtr.write_record(["unclassified".to_string(), self.unclassified.to_string()])?;
        wtr.flush()?;
        Ok(())
    }
}

impl Default for ClassHistogram {
    fn default() -> Self {
        Self::new()
    }
}
