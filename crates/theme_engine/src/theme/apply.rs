use thiserror::Error;
use tracing::info;

use crate::scene::{CorrespondenceSource, InstanceHandle, SceneHost, Transform, Vec3};
use crate::template::{TemplateAsset, TemplateRef, TemplateStore, TemplateStoreError};

use super::record::{ThemeEntry, ThemeRecord};

/// Built-in procedural layers a runtime consumer should leave out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerSuppression {
    pub ground: bool,
    pub bench: bool,
}

#[derive(Debug, Clone)]
pub struct AppliedTheme {
    pub theme_id: String,
    /// One handle per entry, in entry order.
    pub instances: Vec<InstanceHandle>,
    /// How many of `instances` were already in the scene and only rebound.
    pub reacquired: usize,
    pub suppression: LayerSuppression,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("theme '{theme_id}' entries[{index}] references unavailable template '{template}': {source}")]
    MissingTemplate {
        theme_id: String,
        index: usize,
        template: TemplateRef,
        #[source]
        source: TemplateStoreError,
    },
}

pub fn entry_transform(origin: Vec3, entry: &ThemeEntry) -> Transform {
    Transform {
        position: origin + entry.position_offset,
        rotation_degrees: entry.rotation,
        scale: entry.scale,
    }
}

/// Loads the template behind every entry, in entry order. Nothing is
/// spawned, so a missing template leaves the scene untouched.
pub fn load_theme_assets<S>(
    templates: &S,
    record: &ThemeRecord,
) -> Result<Vec<TemplateAsset>, ApplyError>
where
    S: TemplateStore + ?Sized,
{
    record
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            templates
                .load(&entry.template)
                .map_err(|source| ApplyError::MissingTemplate {
                    theme_id: record.id.clone(),
                    index,
                    template: entry.template.clone(),
                    source,
                })
        })
        .collect()
}

/// Stamps every entry into the host under its authoring root, relative to
/// the field origin.
pub fn apply_theme<H, S>(
    host: &mut H,
    templates: &S,
    record: &ThemeRecord,
) -> Result<AppliedTheme, ApplyError>
where
    H: SceneHost + ?Sized,
    S: TemplateStore + ?Sized,
{
    let assets = load_theme_assets(templates, record)?;
    Ok(stamp(host, record, &assets, Vec::new()))
}

/// Like [`apply_theme`], but instances already under the authoring root that
/// correspond to one of the record's templates are rebound and moved back to
/// their entry transform instead of being stamped a second time. Each entry
/// claims the nearest unclaimed instance of its template. This is how handles
/// lost to a host reload are recovered.
///
/// `assets` must come from [`load_theme_assets`] for the same record.
pub fn reapply_theme<H>(host: &mut H, record: &ThemeRecord, assets: &[TemplateAsset]) -> AppliedTheme
where
    H: SceneHost + CorrespondenceSource + ?Sized,
{
    let reusable = host
        .children_of(host.authoring_root())
        .into_iter()
        .filter_map(|handle| {
            let template = host.resolve_correspondence(handle)?;
            if !record.entries.iter().any(|entry| entry.template == template) {
                return None;
            }
            let position = host.transform(handle)?.position;
            Some(ReusableInstance {
                handle,
                template,
                position,
            })
        })
        .collect::<Vec<_>>();
    stamp(host, record, assets, reusable)
}

struct ReusableInstance {
    handle: InstanceHandle,
    template: TemplateRef,
    position: Vec3,
}

fn take_nearest(
    reusable: &mut Vec<ReusableInstance>,
    template: &TemplateRef,
    position: Vec3,
) -> Option<InstanceHandle> {
    let index = reusable
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.template == *template)
        .min_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(position)
                .total_cmp(&b.position.distance_squared(position))
        })
        .map(|(index, _)| index)?;
    Some(reusable.remove(index).handle)
}

fn stamp<H>(
    host: &mut H,
    record: &ThemeRecord,
    assets: &[TemplateAsset],
    mut reusable: Vec<ReusableInstance>,
) -> AppliedTheme
where
    H: SceneHost + ?Sized,
{
    let origin = host.field_origin();
    let parent = host.authoring_root();
    let mut instances = Vec::with_capacity(record.entries.len());
    let mut reacquired = 0usize;
    for (entry, asset) in record.entries.iter().zip(assets) {
        let transform = entry_transform(origin, entry);
        let handle = match take_nearest(&mut reusable, &entry.template, transform.position) {
            Some(handle) => {
                host.set_transform(handle, transform);
                reacquired += 1;
                handle
            }
            None => host.instantiate(&entry.template, asset, parent, transform),
        };
        instances.push(handle);
    }

    let suppression = LayerSuppression {
        ground: record.skip_ground_layer,
        bench: record.skip_bench_layer,
    };
    info!(
        theme_id = %record.id,
        instance_count = instances.len(),
        reacquired,
        skip_ground_layer = suppression.ground,
        skip_bench_layer = suppression.bench,
        "theme_applied"
    );
    AppliedTheme {
        theme_id: record.id.clone(),
        instances,
        reacquired,
        suppression,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::scene::SceneWorld;
    use crate::template::{FsTemplateStore, TemplateNode};
    use crate::zone::Zone;

    fn seed(store: &mut FsTemplateStore, path: &str) -> TemplateRef {
        let template = TemplateRef::new(path);
        store
            .create(
                &template,
                &TemplateAsset {
                    name: template.name().to_string(),
                    root: TemplateNode {
                        name: template.name().to_string(),
                        transform: Transform::default(),
                        children: Vec::new(),
                    },
                },
            )
            .expect("seed");
        template
    }

    fn entry(template: &TemplateRef, offset: Vec3) -> ThemeEntry {
        ThemeEntry {
            zone: Zone::FrontRight,
            template: template.clone(),
            position_offset: offset,
            rotation: Vec3::new(0.0, 90.0, 0.0),
            scale: Vec3::ONE,
        }
    }

    #[test]
    fn applies_entries_relative_to_field_origin() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = FsTemplateStore::new(temp.path());
        let rock = seed(&mut store, "decor/Rock");
        let mut world = SceneWorld::new();
        world.set_field_origin(Vec3::new(10.0, 0.0, -5.0));
        let root = world.spawn("Decor", None, Transform::default());
        world.set_authoring_root(Some(root));

        let mut record = ThemeRecord::create("Stadium");
        record.skip_bench_layer = true;
        record.entries.push(entry(&rock, Vec3::new(2.0, 0.0, 1.0)));

        let applied = apply_theme(&mut world, &store, &record).expect("apply");
        assert_eq!(applied.instances.len(), 1);
        assert_eq!(
            applied.suppression,
            LayerSuppression {
                ground: false,
                bench: true
            }
        );
        let placed = world.transform(applied.instances[0]).expect("transform");
        assert_eq!(placed.position, Vec3::new(12.0, 0.0, -4.0));
        assert_eq!(placed.rotation_degrees, Vec3::new(0.0, 90.0, 0.0));
        assert_eq!(world.parent_of(applied.instances[0]), Some(root));
        assert_eq!(
            world.resolve_correspondence(applied.instances[0]),
            Some(rock)
        );
    }

    #[test]
    fn missing_template_spawns_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = FsTemplateStore::new(temp.path());
        let rock = seed(&mut store, "decor/Rock");
        let mut world = SceneWorld::new();

        let mut record = ThemeRecord::create("Stadium");
        record.entries.push(entry(&rock, Vec3::ZERO));
        record
            .entries
            .push(entry(&TemplateRef::new("decor/Gone"), Vec3::ZERO));

        let error = apply_theme(&mut world, &store, &record).expect_err("missing");
        assert!(matches!(error, ApplyError::MissingTemplate { index: 1, .. }));
        assert_eq!(world.instance_count(), 0);
    }

    fn stadium_world() -> (SceneWorld, InstanceHandle) {
        let mut world = SceneWorld::new();
        world.set_field_origin(Vec3::new(0.0, 0.0, 4.0));
        let root = world.spawn("Decor", None, Transform::default());
        world.set_authoring_root(Some(root));
        (world, root)
    }

    #[test]
    fn reapply_rebinds_instances_left_behind_by_a_reload() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = FsTemplateStore::new(temp.path());
        let rock = seed(&mut store, "decor/Rock");
        let tree = seed(&mut store, "decor/Tree");
        let (mut world, _) = stadium_world();

        let mut record = ThemeRecord::create("Stadium");
        record.entries.push(entry(&rock, Vec3::new(-3.0, 0.0, 0.0)));
        record.entries.push(entry(&tree, Vec3::new(0.0, 0.0, 3.0)));
        record.entries.push(entry(&rock, Vec3::new(3.0, 0.0, 0.0)));
        let first = apply_theme(&mut world, &store, &record).expect("apply");
        let nudged = first.instances[2];
        world.set_transform(nudged, Transform::at(Vec3::new(3.5, 0.0, 4.0)));
        world.reload();

        let assets = load_theme_assets(&store, &record).expect("assets");
        let again = reapply_theme(&mut world, &record, &assets);
        assert_eq!(again.reacquired, 3);
        assert_eq!(world.instance_count(), 4);
        let ids = again.instances.iter().map(|h| h.id).collect::<Vec<_>>();
        let original = first.instances.iter().map(|h| h.id).collect::<Vec<_>>();
        assert_eq!(ids, original);
        let restored = world.transform(again.instances[2]).expect("transform");
        assert_eq!(restored.position, Vec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn reapply_stamps_what_it_cannot_find() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = FsTemplateStore::new(temp.path());
        let rock = seed(&mut store, "decor/Rock");
        let (mut world, root) = stadium_world();
        world.spawn("Crate", Some(root), Transform::default());

        let mut record = ThemeRecord::create("Stadium");
        record.entries.push(entry(&rock, Vec3::ZERO));
        record.entries.push(entry(&rock, Vec3::ONE));
        let single = ThemeRecord {
            entries: record.entries[..1].to_vec(),
            ..record.clone()
        };
        apply_theme(&mut world, &store, &single).expect("apply one");

        let assets = load_theme_assets(&store, &record).expect("assets");
        let applied = reapply_theme(&mut world, &record, &assets);
        assert_eq!(applied.reacquired, 1);
        assert_eq!(applied.instances.len(), 2);
        assert_eq!(world.children_of(Some(root)).len(), 3);
    }
}
