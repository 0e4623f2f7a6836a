use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::atomic_io::write_text_atomic;
use crate::template::{TemplateRef, TemplateStore};

use super::record::ThemeRecord;

pub const THEME_FILE_SUFFIX: &str = ".theme.json";

#[derive(Debug, Error)]
pub enum ThemeStoreError {
    #[error("theme record not found at {path}")]
    NotFound { path: PathBuf },
    #[error("save location selection was cancelled; nothing was written")]
    Cancelled,
    #[error("theme record already exists at {path}; confirm overwrite to replace it")]
    WriteConflict { path: PathBuf },
    #[error("failed to write theme record {path}: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read theme record {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse theme record {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("theme record {path} is corrupt: entries[{index}] references missing template '{template}'")]
    CorruptRecord {
        path: PathBuf,
        index: usize,
        template: TemplateRef,
    },
    #[error("theme record is invalid at {field}: {message}")]
    InvalidRecord { field: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSummary {
    pub id: String,
    pub name: String,
    pub entry_count: usize,
    pub path: PathBuf,
}

pub fn default_location(themes_dir: &Path, record: &ThemeRecord) -> PathBuf {
    themes_dir.join(format!("{}{THEME_FILE_SUFFIX}", record.id))
}

/// Writes the whole record to `location`. `None` means the caller backed out
/// of choosing a location. An existing file is only replaced when
/// `overwrite` is set.
pub fn persist(
    record: &ThemeRecord,
    location: Option<&Path>,
    overwrite: bool,
) -> Result<PathBuf, ThemeStoreError> {
    let path = location.ok_or(ThemeStoreError::Cancelled)?.to_path_buf();
    validate_record(record)?;
    if !overwrite && path.exists() {
        return Err(ThemeStoreError::WriteConflict { path });
    }

    let json = serde_json::to_string_pretty(record).map_err(|error| ThemeStoreError::Parse {
        path: path.clone(),
        message: format!("failed to encode theme json: {error}"),
    })?;
    write_text_atomic(&path, &json).map_err(|source| ThemeStoreError::Unwritable {
        path: path.clone(),
        source,
    })?;

    info!(
        theme_id = %record.id,
        entry_count = record.entries.len(),
        path = %path.display(),
        "theme_record_persisted"
    );
    Ok(path)
}

/// Reads and validates a record. Every entry's template must exist in
/// `templates`; a single dangling reference fails the whole load.
pub fn load<S>(path: &Path, templates: &S) -> Result<ThemeRecord, ThemeStoreError>
where
    S: TemplateStore + ?Sized,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(ThemeStoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ThemeStoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let record = parse_theme_json(&raw, path)?;
    validate_record(&record)?;

    for (index, entry) in record.entries.iter().enumerate() {
        if !templates.exists(&entry.template) {
            return Err(ThemeStoreError::CorruptRecord {
                path: path.to_path_buf(),
                index,
                template: entry.template.clone(),
            });
        }
    }
    Ok(record)
}

pub fn parse_theme_json(raw: &str, path: &Path) -> Result<ThemeRecord, ThemeStoreError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ThemeRecord>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        let source = error.into_inner();
        let message = if field.is_empty() || field == "." {
            source.to_string()
        } else {
            format!("at {field}: {source}")
        };
        ThemeStoreError::Parse {
            path: path.to_path_buf(),
            message,
        }
    })
}

pub fn validate_record(record: &ThemeRecord) -> Result<(), ThemeStoreError> {
    if record.id.trim().is_empty() {
        return Err(invalid("id", "must not be empty"));
    }
    for (index, entry) in record.entries.iter().enumerate() {
        if entry.template.is_empty() {
            return Err(invalid(
                &format!("entries[{index}].template"),
                "must reference a template",
            ));
        }
        let vectors = [
            ("positionOffset", entry.position_offset),
            ("rotation", entry.rotation),
            ("scale", entry.scale),
        ];
        for (name, value) in vectors {
            if !value.is_finite() {
                return Err(invalid(
                    &format!("entries[{index}].{name}"),
                    "expected finite components",
                ));
            }
        }
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ThemeStoreError {
    ThemeStoreError::InvalidRecord {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Summaries of every readable record in `themes_dir`, sorted by id.
pub fn list_themes(themes_dir: &Path) -> Result<Vec<ThemeSummary>, ThemeStoreError> {
    let entries = match fs::read_dir(themes_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ThemeStoreError::Read {
                path: themes_dir.to_path_buf(),
                source,
            });
        }
    };

    let mut summaries = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ThemeStoreError::Read {
            path: themes_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_theme = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(THEME_FILE_SUFFIX));
        if !is_theme {
            continue;
        }

        let parsed = fs::read_to_string(&path)
            .map_err(|source| ThemeStoreError::Read {
                path: path.clone(),
                source,
            })
            .and_then(|raw| parse_theme_json(&raw, &path));
        match parsed {
            Ok(record) => summaries.push(ThemeSummary {
                id: record.id,
                name: record.name,
                entry_count: record.entries.len(),
                path,
            }),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "theme_record_unreadable_skipped");
            }
        }
    }
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::scene::{Transform, Vec3};
    use crate::template::{FsTemplateStore, TemplateAsset, TemplateNode};
    use crate::theme::ThemeEntry;
    use crate::zone::Zone;

    fn seed_template(store: &mut FsTemplateStore, path: &str) -> TemplateRef {
        let template = TemplateRef::new(path);
        let asset = TemplateAsset {
            name: template.name().to_string(),
            root: TemplateNode {
                name: template.name().to_string(),
                transform: Transform::default(),
                children: Vec::new(),
            },
        };
        store.create(&template, &asset).expect("seed template");
        template
    }

    fn record_with(templates: &[&TemplateRef]) -> ThemeRecord {
        let mut record = ThemeRecord::create("Green Meadow");
        for (index, template) in templates.iter().enumerate() {
            record.entries.push(ThemeEntry {
                zone: Zone::SideLeft,
                template: (*template).clone(),
                position_offset: Vec3::new(index as f32 * 1.25, 0.0, -3.5),
                rotation: Vec3::new(0.0, 33.3, 0.0),
                scale: Vec3::new(1.1, 1.1, 1.1),
            });
        }
        record
    }

    #[test]
    fn persist_then_load_round_trips() {
        let temp = TempDir::new().expect("tempdir");
        let mut templates = FsTemplateStore::new(temp.path().join("templates"));
        let rock = seed_template(&mut templates, "decor/Rock");
        let tree = seed_template(&mut templates, "decor/Tree");
        let record = record_with(&[&rock, &tree]);
        let location = default_location(&temp.path().join("themes"), &record);

        let written = persist(&record, Some(&location), false).expect("persist");
        assert!(written.ends_with("green_meadow.theme.json"));
        let loaded = load(&written, &templates).expect("load");
        assert_eq!(loaded, record);
    }

    #[test]
    fn cancelled_location_writes_nothing() {
        let record = ThemeRecord::create("Meadow");
        let error = persist(&record, None, false).expect_err("cancelled");
        assert!(matches!(error, ThemeStoreError::Cancelled));
    }

    #[test]
    fn existing_record_requires_overwrite_confirmation() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("meadow.theme.json");
        let mut record = ThemeRecord::create("Meadow");
        persist(&record, Some(&path), false).expect("first");

        record.description = "second".to_string();
        let error = persist(&record, Some(&path), false).expect_err("conflict");
        assert!(matches!(error, ThemeStoreError::WriteConflict { .. }));
        assert!(!fs::read_to_string(&path).expect("read").contains("second"));

        persist(&record, Some(&path), true).expect("overwrite");
        assert!(fs::read_to_string(&path).expect("read").contains("second"));
    }

    #[test]
    fn unwritable_location_is_reported() {
        let temp = TempDir::new().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not a dir").expect("blocker");
        let record = ThemeRecord::create("Meadow");

        let error =
            persist(&record, Some(&blocker.join("meadow.theme.json")), false).expect_err("io");
        assert!(matches!(error, ThemeStoreError::Unwritable { .. }));
    }

    #[test]
    fn entry_without_template_is_never_persisted() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("bad.theme.json");
        let mut record = record_with(&[&TemplateRef::new("decor/Rock")]);
        record.entries[0].template = TemplateRef::new("");

        let error = persist(&record, Some(&path), false).expect_err("invalid");
        assert!(matches!(error, ThemeStoreError::InvalidRecord { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let templates = FsTemplateStore::new(temp.path());
        let error = load(&temp.path().join("nope.theme.json"), &templates).expect_err("missing");
        assert!(matches!(error, ThemeStoreError::NotFound { .. }));
    }

    #[test]
    fn dangling_template_fails_whole_load() {
        let temp = TempDir::new().expect("tempdir");
        let mut templates = FsTemplateStore::new(temp.path().join("templates"));
        let rock = seed_template(&mut templates, "decor/Rock");
        let ghost = TemplateRef::new("decor/Ghost");
        let record = record_with(&[&rock, &ghost]);
        let path = temp.path().join("meadow.theme.json");
        persist(&record, Some(&path), false).expect("persist");

        let error = load(&path, &templates).expect_err("corrupt");
        let ThemeStoreError::CorruptRecord {
            index, template, ..
        } = error
        else {
            panic!("expected corrupt record error");
        };
        assert_eq!(index, 1);
        assert_eq!(template, ghost);
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let raw = r#"{"id":"m","name":"M","entries":[{"zone":"upstairs","template":"a"}]}"#;
        let error = parse_theme_json(raw, Path::new("m.theme.json")).expect_err("bad zone");
        let ThemeStoreError::Parse { message, .. } = error else {
            panic!("expected parse error");
        };
        assert!(message.contains("entries[0].zone"), "{message}");
    }

    #[test]
    fn list_themes_sorts_and_skips_unreadable() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path();
        for name in ["Zen Garden", "Autumn Park"] {
            let record = ThemeRecord::create(name);
            persist(&record, Some(&default_location(dir, &record)), false).expect("persist");
        }
        fs::write(dir.join("broken.theme.json"), "{").expect("broken");
        fs::write(dir.join("readme.txt"), "ignored").expect("readme");

        let summaries = list_themes(dir).expect("list");
        let ids = summaries.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["autumn_park", "zen_garden"]);
        assert!(list_themes(&dir.join("missing")).expect("list").is_empty());
    }
}
