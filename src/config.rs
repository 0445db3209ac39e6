// ⚙️ Run Configuration
// Input tables, cell sizes and policies for one MBRCI run, loaded from JSON.

use crate::classifier::MissingPolicy;
use crate::error::{MbrciError, Result};
use crate::loader::{CsvTableSource, SourceKind, DEFAULT_KEY_FIELD};
use crate::normalize::CellSizes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn default_key() -> String {
    DEFAULT_KEY_FIELD.to_string()
}

/// Where one input table lives and how its fields are named
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,

    /// Key field name (default HUC_12)
    #[serde(default = "default_key")]
    pub key: String,

    /// Source field names, replacing the defaults positionally
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub csv: Option<PathBuf>,
    pub sqlite: Option<PathBuf>,
    pub histogram: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub sources: BTreeMap<SourceKind, SourceSpec>,

    #[serde(default)]
    pub cell_sizes: CellSizes,

    #[serde(default)]
    pub missing_policy: MissingPolicy,

    /// Sources where a unit absent from the table means a count of zero
    #[serde(default)]
    pub zero_fill: Vec<SourceKind>,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load from a JSON file. Relative paths resolve against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MbrciError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json_str(&content, Some(base))
    }

    pub fn from_json_str(json: &str, base_dir: Option<&Path>) -> Result<Self> {
        let mut config: PipelineConfig = serde_json::from_str(json)?;

        if let Some(base) = base_dir {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        for spec in self.sources.values_mut() {
            resolve(&mut spec.path);
        }
        for p in [
            &mut self.output.csv,
            &mut self.output.sqlite,
            &mut self.output.histogram,
        ]
        .into_iter()
        .flatten()
        {
            resolve(p);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = SourceKind::JOIN_ORDER
            .iter()
            .filter(|k| !self.sources.contains_key(*k))
            .map(|k| k.name())
            .collect();
        if !missing.is_empty() {
            return Err(MbrciError::Config(format!(
                "missing sources: {}",
                missing.join(", ")
            )));
        }

        if self.zero_fill.contains(&SourceKind::Huc) {
            return Err(MbrciError::Config(
                "zero_fill cannot include the base table".to_string(),
            ));
        }

        for (kind, spec) in &self.sources {
            if let Some(fields) = &spec.fields {
                let expected = kind.source_fields().len();
                if fields.len() != expected {
                    return Err(MbrciError::Config(format!(
                        "source {} takes {} field(s), got {}",
                        kind,
                        expected,
                        fields.len()
                    )));
                }
            }
        }

        self.cell_sizes.validate()
    }

    /// CSV sources in join order
    pub fn table_sources(&self) -> Result<Vec<CsvTableSource>> {
        SourceKind::JOIN_ORDER
            .iter()
            .map(|&kind| {
                let spec = self
                    .sources
                    .get(&kind)
                    .ok_or_else(|| MbrciError::Config(format!("missing source: {}", kind)))?;

                let mut source =
                    CsvTableSource::new(kind, spec.path.clone()).with_key_field(spec.key.clone());
                if let Some(fields) = &spec.fields {
                    source = source.with_fields(fields.clone());
                }
                Ok(source)
            })
            .collect()
    }
}
