use std::io::Write;
use std::path::PathBuf;

use theme_engine::theme::{self, THEME_FILE_SUFFIX};
use theme_engine::{
    apply_theme, list_themes, AppPaths, ControllerConfig, FsTemplateStore, InstanceHandle,
    ReconciliationController, SaveOptions, SceneHost, SceneWorld, TemplateAsset, TemplateNode,
    TemplateRef, TemplateStore, Transform, Vec3, WorkingPlacement, Zone, DEFAULT_TEMPLATE_FOLDER,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    List,
    Show { theme: String },
    Apply { theme: String },
    Demo { name: String, options: DemoOptions },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoOptions {
    pub materialize: bool,
    pub overwrite: bool,
}

const DEMO_TEMPLATES: [&str; 2] = ["Rock", "Tree"];

pub fn run<W: Write>(kind: CommandKind, paths: &AppPaths, stdout: &mut W) -> Result<(), String> {
    match kind {
        CommandKind::List => list(paths, stdout),
        CommandKind::Show { theme } => show(paths, &theme, stdout),
        CommandKind::Apply { theme } => apply(paths, &theme, stdout),
        CommandKind::Demo { name, options } => demo(paths, &name, options, stdout),
    }
}

fn list<W: Write>(paths: &AppPaths, stdout: &mut W) -> Result<(), String> {
    let themes = list_themes(&paths.themes_dir).map_err(|error| error.to_string())?;
    if themes.is_empty() {
        emit(stdout, format!("no themes in {}", paths.themes_dir.display()))?;
    }
    for summary in themes {
        emit(
            stdout,
            format!(
                "{}\t{}\tentries={}",
                summary.id, summary.name, summary.entry_count
            ),
        )?;
    }
    Ok(())
}

fn show<W: Write>(paths: &AppPaths, theme_arg: &str, stdout: &mut W) -> Result<(), String> {
    let templates = FsTemplateStore::new(&paths.templates_dir);
    let path = theme_path(paths, theme_arg);
    let record = theme::load(&path, &templates).map_err(|error| error.to_string())?;
    let json = serde_json::to_string_pretty(&record)
        .map_err(|error| format!("failed to render theme '{}': {error}", record.id))?;
    emit(stdout, json)?;
    emit(stdout, format!("fingerprint: {}", record.fingerprint()))
}

fn apply<W: Write>(paths: &AppPaths, theme_arg: &str, stdout: &mut W) -> Result<(), String> {
    let templates = FsTemplateStore::new(&paths.templates_dir);
    let path = theme_path(paths, theme_arg);
    let record = theme::load(&path, &templates).map_err(|error| error.to_string())?;

    let mut world = SceneWorld::new();
    lay_out_field(&mut world);
    let applied = apply_theme(&mut world, &templates, &record).map_err(|error| error.to_string())?;
    emit(
        stdout,
        format!(
            "applied theme '{}': instances={} skip_ground={} skip_bench={}",
            applied.theme_id,
            applied.instances.len(),
            applied.suppression.ground,
            applied.suppression.bench
        ),
    )
}

/// Walks the whole authoring loop against an in-memory scene: scan, save as
/// new, run deferred previews, load for editing, nudge, update in place.
fn demo<W: Write>(
    paths: &AppPaths,
    name: &str,
    options: DemoOptions,
    stdout: &mut W,
) -> Result<(), String> {
    let mut templates = FsTemplateStore::new(&paths.templates_dir);
    seed_demo_templates(&mut templates)?;

    let mut world = SceneWorld::new();
    lay_out_field(&mut world);
    place_template(&mut world, &templates, "Rock", Vec3::new(-9.0, 0.0, 9.0))?;
    place_template(&mut world, &templates, "Tree", Vec3::new(9.5, 0.0, 8.5))?;
    place_template(&mut world, &templates, "Rock", Vec3::new(0.5, 0.0, -9.0))?;
    let parent = world.authoring_root();
    world.spawn("Fountain", parent, Transform::at(Vec3::new(-12.0, 0.0, 0.0)));

    let config = ControllerConfig {
        themes_dir: paths.themes_dir.clone(),
        ..ControllerConfig::default()
    };
    let mut controller = ReconciliationController::new(world, templates, config);

    emit(stdout, controller.scan().to_string())?;
    let saved = controller
        .save_as_new(
            name,
            SaveOptions {
                description: "composed by theme_studio demo".to_string(),
                materialize_unresolved: options.materialize,
                overwrite_confirmed: options.overwrite,
                ..SaveOptions::default()
            },
        )
        .map_err(|error| error.to_string())?;
    emit(stdout, saved.to_string())?;

    let deferred = controller.run_deferred();
    if deferred.previews_written > 0 || deferred.failed > 0 {
        emit(
            stdout,
            format!(
                "previews written={} failed={}",
                deferred.previews_written, deferred.failed
            ),
        )?;
    }

    controller.clear_loaded(true);
    let loaded = controller
        .load_for_editing(&saved.path)
        .map_err(|error| error.to_string())?;
    emit(stdout, loaded.to_string())?;

    if let Some(handle) = first_tracked(controller.working()) {
        let host = controller.host_mut();
        if let Some(mut transform) = host.transform(handle) {
            transform.position = transform.position + Vec3::new(0.5, 0.0, 0.0);
            transform.rotation_degrees.y += 15.0;
            host.set_transform(handle, transform);
        }
    }
    let updated = controller
        .update_loaded()
        .map_err(|error| error.to_string())?;
    info!(theme_id = %updated.theme_id, "demo_complete");
    emit(stdout, updated.to_string())
}

fn first_tracked(working: &[WorkingPlacement]) -> Option<InstanceHandle> {
    working.iter().find_map(|placement| placement.live_reference)
}

fn theme_path(paths: &AppPaths, theme_arg: &str) -> PathBuf {
    if theme_arg.ends_with(THEME_FILE_SUFFIX) {
        PathBuf::from(theme_arg)
    } else {
        paths
            .themes_dir
            .join(format!("{theme_arg}{THEME_FILE_SUFFIX}"))
    }
}

/// Field origin, one marker per placement region, and an empty `Decor`
/// root for authoring.
fn lay_out_field(world: &mut SceneWorld) {
    world.set_field_origin(Vec3::ZERO);
    let markers = [
        (Zone::BackLeft, -10.0, 10.0),
        (Zone::BackCenter, 0.0, 12.0),
        (Zone::BackRight, 10.0, 10.0),
        (Zone::SideLeft, -14.0, 0.0),
        (Zone::SideRight, 14.0, 0.0),
        (Zone::FrontLeft, -10.0, -10.0),
        (Zone::FrontCenter, 0.0, -12.0),
        (Zone::FrontRight, 10.0, -10.0),
        (Zone::Misc, 18.0, -14.0),
    ];
    for (zone, x, z) in markers {
        world.add_zone_marker(zone, Vec3::new(x, 0.0, z));
    }
    let root = world.spawn("Decor", None, Transform::default());
    world.set_authoring_root(Some(root));
}

fn seed_demo_templates(templates: &mut FsTemplateStore) -> Result<(), String> {
    for name in DEMO_TEMPLATES {
        let template = TemplateRef::in_folder(DEFAULT_TEMPLATE_FOLDER, name);
        if templates.exists(&template) {
            continue;
        }
        let asset = TemplateAsset {
            name: name.to_string(),
            root: TemplateNode {
                name: name.to_string(),
                transform: Transform::default(),
                children: Vec::new(),
            },
        };
        templates
            .create(&template, &asset)
            .map_err(|error| error.to_string())?;
    }
    Ok(())
}

fn place_template(
    world: &mut SceneWorld,
    templates: &FsTemplateStore,
    name: &str,
    position: Vec3,
) -> Result<InstanceHandle, String> {
    let template = TemplateRef::in_folder(DEFAULT_TEMPLATE_FOLDER, name);
    let asset = templates
        .load(&template)
        .map_err(|error| error.to_string())?;
    let parent = world.authoring_root();
    Ok(world.instantiate(&template, &asset, parent, Transform::at(position)))
}

fn emit<W: Write>(stdout: &mut W, line: impl AsRef<str>) -> Result<(), String> {
    writeln!(stdout, "{}", line.as_ref()).map_err(|error| format!("failed to write output: {error}"))
}
