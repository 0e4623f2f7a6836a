use std::fmt;
use std::path::PathBuf;

use crate::template::TemplateRef;
use crate::theme::LayerSuppression;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub placements: usize,
    pub discarded: usize,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.placements == 0 {
            write!(f, "scan found no placements under the authoring root")?;
        } else {
            write!(f, "scan found {} placements", self.placements)?;
        }
        if self.discarded > 0 {
            write!(f, " (discarded {} previous)", self.discarded)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub direct: usize,
    pub transitive: usize,
    pub unresolved: usize,
    pub invalidated: usize,
}

impl ResolveReport {
    pub fn resolved(&self) -> usize {
        self.direct + self.transitive
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved == 0 && self.invalidated == 0
    }
}

impl fmt::Display for ResolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "resolved={} (direct={} transitive={}) unresolved={} invalidated={}",
            self.resolved(),
            self.direct,
            self.transitive,
            self.unresolved,
            self.invalidated
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub created: Vec<TemplateRef>,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub theme_id: String,
    pub path: PathBuf,
    pub entries: usize,
    pub resolved: ResolveReport,
    pub materialized: Vec<TemplateRef>,
    pub materialize_failed: usize,
    pub excluded: usize,
    pub fingerprint: String,
}

impl fmt::Display for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "saved theme '{}' to {}: entries={} materialized={} excluded={}",
            self.theme_id,
            self.path.display(),
            self.entries,
            self.materialized.len(),
            self.excluded
        )?;
        if self.materialize_failed > 0 {
            write!(f, " (materialization failed for {})", self.materialize_failed)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub theme_id: String,
    pub path: PathBuf,
    pub updated: usize,
    pub skipped_null_reference: usize,
    pub skipped_no_template: usize,
    pub total_entries: usize,
    pub fingerprint: String,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updated theme '{}': updated={} skipped_null_reference={} skipped_no_template={} total_entries={}",
            self.theme_id,
            self.updated,
            self.skipped_null_reference,
            self.skipped_no_template,
            self.total_entries
        )?;
        if self.skipped_null_reference > 0 {
            write!(
                f,
                "; {} placements lost their scene reference, reload the theme to track them again",
                self.skipped_null_reference
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub theme_id: String,
    pub name: String,
    pub path: PathBuf,
    pub instantiated: usize,
    /// Instances already in the scene that were rebound instead of stamped.
    pub reacquired: usize,
    /// Instances of the previously loaded theme that were despawned.
    pub replaced: usize,
    pub suppression: LayerSuppression,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded theme '{}' ({}) from {}: instantiated={} reacquired={} replaced={} skip_ground={} skip_bench={}",
            self.name,
            self.theme_id,
            self.path.display(),
            self.instantiated,
            self.reacquired,
            self.replaced,
            self.suppression.ground,
            self.suppression.bench
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub theme_id: Option<String>,
    pub released: usize,
    pub despawned: usize,
}

impl fmt::Display for ClearReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.theme_id {
            Some(id) => write!(f, "cleared theme '{id}'")?,
            None => write!(f, "no theme was loaded")?,
        }
        write!(
            f,
            ": released={} despawned={}",
            self.released, self.despawned
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferredReport {
    pub previews_written: usize,
    pub failed: usize,
}
