use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod atomic_io;
pub mod controller;
pub mod scanner;
pub mod scene;
pub mod template;
pub mod theme;
pub mod zone;

pub use controller::{
    ClearReport, ControllerConfig, ControllerError, ControllerState, DeferredReport,
    DeferredTask, LoadReport, MaterializeReport, ReconciliationController, ResolveReport,
    SaveLocation, SaveOptions, SaveReport, ScanReport, UpdateReport, DEFAULT_TEMPLATE_FOLDER,
};
pub use scanner::{classify_zone, scan, WorkingPlacement};
pub use scene::{
    CorrespondenceSource, InstanceHandle, InstanceId, SceneHost, SceneWorld, Transform, Vec3,
    ZoneMarker,
};
pub use template::{
    FsTemplateStore, MaterializeError, Resolution, ResolutionTier, TemplateAsset, TemplateNode,
    TemplatePreview, TemplateRef, TemplateStore, TemplateStoreError,
};
pub use theme::{
    apply_theme, list_themes, AppliedTheme, ApplyError, LayerSuppression, ThemeEntry,
    ThemeRecord, ThemeStoreError, ThemeSummary,
};
pub use zone::Zone;

pub const ROOT_ENV_VAR: &str = "THEME_STUDIO_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub themes_dir: PathBuf,
    pub templates_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets = root.join("assets");
        Self {
            themes_dir: assets.join("themes"),
            templates_dir: assets.join("templates"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} points at {path}, which is not a usable directory: {source}")]
    InvalidEnvRoot {
        var: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to locate the theme_studio executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error(
        "no studio root above {start_dir}: expected assets/themes, or a workspace \
with crates/theme_studio. Set {var} to the directory holding assets/."
    )]
    RootNotFound {
        start_dir: PathBuf,
        var: &'static str,
    },
    #[error("failed to create asset directory {path}: {source}")]
    CreateAssetDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves the studio root and makes sure both asset directories exist.
///
/// `THEME_STUDIO_ROOT` wins when set and may name any existing directory.
/// Otherwise the nearest ancestor of the executable that already holds
/// `assets/themes`, or is the studio workspace itself, is used.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::from_root(studio_root()?);

    for dir in [&paths.themes_dir, &paths.templates_dir] {
        fs::create_dir_all(dir).map_err(|source| StartupError::CreateAssetDir {
            path: dir.clone(),
            source,
        })?;
    }

    Ok(paths)
}

fn studio_root() -> Result<PathBuf, StartupError> {
    match env::var_os(ROOT_ENV_VAR) {
        Some(value) => {
            let path = PathBuf::from(value);
            let canonical =
                fs::canonicalize(&path).map_err(|source| StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: path.clone(),
                    source,
                })?;
            if canonical.is_dir() {
                Ok(canonical)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a directory",
                    ),
                })
            }
        }
        None => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let start_dir = exe.parent().unwrap_or(&exe).to_path_buf();
            find_studio_root(&start_dir).ok_or(StartupError::RootNotFound {
                start_dir,
                var: ROOT_ENV_VAR,
            })
        }
    }
}

fn find_studio_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_studio_root(candidate))
        .map(Path::to_path_buf)
}

fn is_studio_root(path: &Path) -> bool {
    let has_themes = path.join("assets").join("themes").is_dir();
    let is_workspace =
        path.join("Cargo.toml").is_file() && path.join("crates").join("theme_studio").is_dir();
    has_themes || is_workspace
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn studio_root_is_found_from_a_nested_build_dir() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested");
        assert_eq!(find_studio_root(&nested), None);

        fs::create_dir_all(temp.path().join("assets").join("themes")).expect("themes");
        assert_eq!(find_studio_root(&nested), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn workspace_checkout_counts_before_assets_exist() {
        let temp = TempDir::new().expect("tempdir");
        assert!(!is_studio_root(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(!is_studio_root(temp.path()));

        fs::create_dir_all(temp.path().join("crates").join("theme_studio")).expect("crate dir");
        assert!(is_studio_root(temp.path()));
    }

    #[test]
    fn asset_dirs_hang_off_the_root() {
        let paths = AppPaths::from_root(PathBuf::from("/studio"));
        assert_eq!(paths.themes_dir, PathBuf::from("/studio/assets/themes"));
        assert_eq!(paths.templates_dir, PathBuf::from("/studio/assets/templates"));
    }
}
