mod deferred;
mod report;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scanner::{scan, WorkingPlacement};
use crate::scene::{CorrespondenceSource, InstanceHandle, SceneHost};
use crate::template::{
    materialize, resolve, Resolution, ResolutionTier, TemplatePreview, TemplateStore,
};
use crate::theme::{
    self, default_location, load_theme_assets, reapply_theme, ApplyError, ThemeRecord,
    ThemeStoreError,
};
use crate::zone::Zone;

pub use deferred::{DeferredQueue, DeferredTask};
pub use report::{
    ClearReport, DeferredReport, LoadReport, MaterializeReport, ResolveReport, SaveReport,
    ScanReport, UpdateReport,
};

pub const DEFAULT_TEMPLATE_FOLDER: &str = "decor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Scanned,
    ResolvedComplete,
    ResolvedPartial,
    Saved,
    Loaded,
    Editing,
    Updated,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub themes_dir: PathBuf,
    pub template_folder: String,
    pub skip_builtin_layers_for_new_themes: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            themes_dir: PathBuf::from("themes"),
            template_folder: DEFAULT_TEMPLATE_FOLDER.to_string(),
            skip_builtin_layers_for_new_themes: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveLocation {
    /// `<themes_dir>/<id>.theme.json`
    #[default]
    Default,
    At(PathBuf),
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub description: String,
    pub materialize_unresolved: bool,
    pub location: SaveLocation,
    pub overwrite_confirmed: bool,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{reason}")]
    EmptyInput { reason: String },
    #[error(
        "no tracked objects: the loaded theme has no live scene references \
(a host reload clears them); reload the theme and try again"
    )]
    NoTrackedObjects,
    #[error("placement index {index} is out of range ({len} placements)")]
    PlacementOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Store(#[from] ThemeStoreError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl ControllerError {
    fn empty(reason: &str) -> Self {
        ControllerError::EmptyInput {
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct LoadedTheme {
    record: ThemeRecord,
    path: PathBuf,
    /// Instances stamped or rebound by the load, one per entry.
    instances: Vec<InstanceHandle>,
}

/// Owns one editing session: the working placement list, the record loaded
/// for editing (if any) and the deferred work queue.
pub struct ReconciliationController<H, S> {
    host: H,
    templates: S,
    config: ControllerConfig,
    state: ControllerState,
    working: Vec<WorkingPlacement>,
    loaded: Option<LoadedTheme>,
    deferred: DeferredQueue,
}

impl<H, S> ReconciliationController<H, S>
where
    H: SceneHost + CorrespondenceSource,
    S: TemplateStore,
{
    pub fn new(host: H, templates: S, config: ControllerConfig) -> Self {
        Self {
            host,
            templates,
            config,
            state: ControllerState::Idle,
            working: Vec::new(),
            loaded: None,
            deferred: DeferredQueue::default(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn templates(&self) -> &S {
        &self.templates
    }

    pub fn working(&self) -> &[WorkingPlacement] {
        &self.working
    }

    pub fn loaded_record(&self) -> Option<&ThemeRecord> {
        self.loaded.as_ref().map(|loaded| &loaded.record)
    }

    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|loaded| loaded.path.as_path())
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    fn is_editing_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Replaces the working list with a fresh scan. Unsaved zone edits are
    /// discarded.
    pub fn scan(&mut self) -> ScanReport {
        let discarded = self.working.len();
        self.working = scan(&self.host);
        self.state = if self.is_editing_loaded() {
            ControllerState::Editing
        } else {
            ControllerState::Scanned
        };
        let report = ScanReport {
            placements: self.working.len(),
            discarded,
        };
        if report.placements == 0 {
            info!(discarded, "theme_scan_empty");
        }
        report
    }

    pub fn reassign_zone(&mut self, index: usize, zone: Zone) -> Result<(), ControllerError> {
        let len = self.working.len();
        let placement = self
            .working
            .get_mut(index)
            .ok_or(ControllerError::PlacementOutOfRange { index, len })?;
        debug!(
            index,
            object_name = %placement.object_name,
            from = %placement.zone,
            to = %zone,
            "placement_zone_reassigned"
        );
        placement.zone = zone;
        if self.state == ControllerState::Loaded {
            self.state = ControllerState::Editing;
        }
        Ok(())
    }

    /// Re-derives template linkage for every placement. Invalidated
    /// references keep whatever template they already carried.
    pub fn resolve_all(&mut self) -> ResolveReport {
        let mut report = ResolveReport::default();
        for placement in &mut self.working {
            let resolution = match placement.live_reference {
                Some(handle) => resolve(&self.host, &self.templates, handle),
                None => Resolution::Invalidated,
            };
            match resolution {
                Resolution::Resolved { template, tier } => {
                    match tier {
                        ResolutionTier::Direct => report.direct += 1,
                        ResolutionTier::Transitive => report.transitive += 1,
                    }
                    placement.bind_template(template);
                }
                Resolution::Unresolved => {
                    report.unresolved += 1;
                    placement.unbind_template();
                }
                Resolution::Invalidated => {
                    report.invalidated += 1;
                }
            }
        }

        if !self.is_editing_loaded() && !self.working.is_empty() {
            self.state = if report.unresolved == 0 {
                ControllerState::ResolvedComplete
            } else {
                ControllerState::ResolvedPartial
            };
        }
        info!(
            direct = report.direct,
            transitive = report.transitive,
            unresolved = report.unresolved,
            invalidated = report.invalidated,
            "theme_resolve_complete"
        );
        report
    }

    /// Creates templates for placements that still have none. A failure for
    /// one placement is logged and leaves it unbound; the rest carry on.
    pub fn materialize_unresolved(&mut self) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        let folder = self.config.template_folder.as_str();
        for placement in &mut self.working {
            if placement.template.is_some() {
                continue;
            }
            let Some(handle) = placement.live_reference else {
                report.failed += 1;
                warn!(
                    object_name = %placement.object_name,
                    "template_materialize_skipped_no_reference"
                );
                continue;
            };
            match materialize(
                &mut self.host,
                &mut self.templates,
                handle,
                folder,
                &placement.object_name,
            ) {
                Ok(template) => {
                    self.deferred
                        .push(DeferredTask::GeneratePreview(template.clone()));
                    placement.bind_template(template.clone());
                    report.created.push(template);
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        object_name = %placement.object_name,
                        error = %error,
                        "template_materialize_failed"
                    );
                }
            }
        }
        report
    }

    /// Builds and persists a brand-new record from the working list. Never
    /// touches a loaded record.
    pub fn save_as_new(
        &mut self,
        name: &str,
        options: SaveOptions,
    ) -> Result<SaveReport, ControllerError> {
        if self.working.is_empty() {
            return Err(ControllerError::empty(
                "nothing to save: the scan found no placements",
            ));
        }
        if name.trim().is_empty() {
            return Err(ControllerError::empty("theme name cannot be empty"));
        }

        let mut record = ThemeRecord::create(name);
        record.description = options.description;
        record.skip_ground_layer = self.config.skip_builtin_layers_for_new_themes;
        record.skip_bench_layer = self.config.skip_builtin_layers_for_new_themes;

        let path = match options.location {
            SaveLocation::Default => default_location(&self.config.themes_dir, &record),
            SaveLocation::At(path) => path,
            SaveLocation::Cancelled => return Err(ThemeStoreError::Cancelled.into()),
        };
        if !options.overwrite_confirmed && path.exists() {
            return Err(ThemeStoreError::WriteConflict { path }.into());
        }

        let resolved = self.resolve_all();
        let materialized = if resolved.unresolved > 0 && options.materialize_unresolved {
            self.materialize_unresolved()
        } else {
            MaterializeReport::default()
        };

        record.entries = self
            .working
            .iter()
            .filter_map(WorkingPlacement::to_entry)
            .collect();
        let excluded = self.working.len() - record.entries.len();
        for placement in self.working.iter().filter(|p| p.template.is_none()) {
            warn!(
                object_name = %placement.object_name,
                "theme_save_excluded_no_template"
            );
        }
        if record.entries.is_empty() {
            return Err(ControllerError::empty(
                "no valid data: no placement is backed by a template",
            ));
        }

        let path = theme::persist(
            &record,
            Some(path.as_path()),
            options.overwrite_confirmed,
        )?;
        self.state = ControllerState::Saved;

        let report = SaveReport {
            theme_id: record.id.clone(),
            path,
            entries: record.entries.len(),
            resolved,
            materialized: materialized.created,
            materialize_failed: materialized.failed,
            excluded,
            fingerprint: record.fingerprint(),
        };
        info!(
            theme_id = %report.theme_id,
            entries = report.entries,
            materialized = report.materialized.len(),
            excluded = report.excluded,
            "theme_saved_as_new"
        );
        Ok(report)
    }

    /// Rewrites the loaded record from the live scene. Transforms are
    /// re-sampled, zones collapse to `Ground`, and the entry list is replaced
    /// rather than appended to.
    pub fn update_loaded(&mut self) -> Result<UpdateReport, ControllerError> {
        let Some(loaded) = self.loaded.as_ref() else {
            return Err(ControllerError::NoTrackedObjects);
        };
        if self.working.is_empty() {
            return Err(ControllerError::NoTrackedObjects);
        }
        let path = loaded.path.clone();
        let mut record = loaded.record.clone();

        // Work on a copy so an aborted update leaves the session as it was.
        let mut refreshed = self.working.clone();
        let origin = self.host.field_origin();
        let mut entries = Vec::with_capacity(refreshed.len());
        let mut skipped_null_reference = 0usize;
        let mut skipped_no_template = 0usize;
        for placement in &mut refreshed {
            let live = placement
                .live_reference
                .and_then(|handle| self.host.transform(handle));
            let Some(transform) = live else {
                skipped_null_reference += 1;
                debug!(
                    object_name = %placement.object_name,
                    "theme_update_skipped_null_reference"
                );
                continue;
            };
            placement.capture(origin, transform);
            placement.zone = Zone::Ground;
            match placement.to_entry() {
                Some(entry) => entries.push(entry),
                None => {
                    skipped_no_template += 1;
                    warn!(
                        object_name = %placement.object_name,
                        "theme_update_skipped_no_template"
                    );
                }
            }
        }

        if skipped_null_reference == refreshed.len() {
            warn!(
                theme_id = %record.id,
                skipped_null_reference,
                "theme_update_no_tracked_objects"
            );
            return Err(ControllerError::NoTrackedObjects);
        }
        if entries.is_empty() {
            return Err(ControllerError::empty(
                "no valid data: no tracked placement is backed by a template",
            ));
        }

        let updated = entries.len();
        record.entries = entries;
        let path = theme::persist(&record, Some(path.as_path()), true)?;
        let report = UpdateReport {
            theme_id: record.id.clone(),
            path: path.clone(),
            updated,
            skipped_null_reference,
            skipped_no_template,
            total_entries: record.entries.len(),
            fingerprint: record.fingerprint(),
        };
        self.working = refreshed;
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.record = record;
            loaded.path = path;
        }
        self.state = ControllerState::Updated;

        info!(
            theme_id = %report.theme_id,
            updated = report.updated,
            skipped_null_reference = report.skipped_null_reference,
            skipped_no_template = report.skipped_no_template,
            total_entries = report.total_entries,
            "theme_updated_in_place"
        );
        Ok(report)
    }

    /// Loads a record, puts its entries into the scene and seeds the working
    /// list straight from the entries.
    ///
    /// Instances still tracked by a previous load are despawned first.
    /// Instances under the authoring root that already correspond to the
    /// record's templates, such as ones whose handles a host reload
    /// invalidated, are rebound instead of stamped again, so loading never
    /// leaves two copies of an entry in the scene.
    pub fn load_for_editing(&mut self, path: &Path) -> Result<LoadReport, ControllerError> {
        let record = theme::load(path, &self.templates)?;
        let assets = load_theme_assets(&self.templates, &record)?;

        let replaced = self.release_loaded_instances(&record.id);
        let applied = reapply_theme(&mut self.host, &record, &assets);

        self.working = record
            .entries
            .iter()
            .zip(&applied.instances)
            .map(|(entry, handle)| WorkingPlacement::from_entry(entry, Some(*handle)))
            .collect();
        let report = LoadReport {
            theme_id: record.id.clone(),
            name: record.name.clone(),
            path: path.to_path_buf(),
            instantiated: applied.instances.len() - applied.reacquired,
            reacquired: applied.reacquired,
            replaced,
            suppression: applied.suppression,
        };
        self.loaded = Some(LoadedTheme {
            record,
            path: path.to_path_buf(),
            instances: applied.instances,
        });
        self.state = ControllerState::Loaded;
        info!(
            theme_id = %report.theme_id,
            instantiated = report.instantiated,
            reacquired = report.reacquired,
            replaced = report.replaced,
            "theme_loaded_for_editing"
        );
        Ok(report)
    }

    fn release_loaded_instances(&mut self, next: &str) -> usize {
        let Some(previous) = self.loaded.take() else {
            return 0;
        };
        let mut despawned = 0usize;
        for handle in &previous.instances {
            if self.host.despawn(*handle) {
                despawned += 1;
            }
        }
        warn!(
            previous = %previous.record.id,
            next,
            despawned,
            "theme_load_replacing_loaded_theme"
        );
        despawned
    }

    pub fn clear_loaded(&mut self, despawn: bool) -> ClearReport {
        let theme_id = self.loaded.take().map(|loaded| loaded.record.id);
        let released = self.working.len();
        let mut despawned = 0usize;
        for placement in self.working.drain(..) {
            if !despawn {
                continue;
            }
            if let Some(handle) = placement.live_reference {
                if self.host.despawn(handle) {
                    despawned += 1;
                }
            }
        }
        self.state = ControllerState::Idle;
        let report = ClearReport {
            theme_id,
            released,
            despawned,
        };
        info!(
            theme_id = report.theme_id.as_deref().unwrap_or("none"),
            released = report.released,
            despawned = report.despawned,
            "theme_cleared"
        );
        report
    }

    /// Runs the continuations queued during the last operation. Call once the
    /// host has finished its current update cycle.
    pub fn run_deferred(&mut self) -> DeferredReport {
        let mut report = DeferredReport::default();
        for task in self.deferred.take_all() {
            match task {
                DeferredTask::GeneratePreview(template) => {
                    let written = self
                        .templates
                        .load(&template)
                        .map(|asset| TemplatePreview::from_asset(&template, &asset))
                        .and_then(|preview| self.templates.write_preview(&preview));
                    match written {
                        Ok(()) => report.previews_written += 1,
                        Err(error) => {
                            report.failed += 1;
                            warn!(
                                template = %template,
                                error = %error,
                                "template_preview_failed"
                            );
                        }
                    }
                }
            }
        }
        report
    }
}
