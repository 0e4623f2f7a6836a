use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::scene::Vec3;
use crate::template::TemplateRef;
use crate::zone::Zone;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeEntry {
    #[serde(default)]
    pub zone: Zone,
    pub template: TemplateRef,
    pub position_offset: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skip_ground_layer: bool,
    #[serde(default)]
    pub skip_bench_layer: bool,
    #[serde(default)]
    pub entries: Vec<ThemeEntry>,
}

impl ThemeRecord {
    /// Empty, unsaved record whose id is the slug of `name`.
    pub fn create(name: &str) -> Self {
        Self {
            id: theme_slug(name),
            name: name.trim().to_string(),
            description: String::new(),
            skip_ground_layer: false,
            skip_bench_layer: false,
            entries: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for text in [&self.id, &self.name, &self.description] {
            hasher.update(text.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([
            u8::from(self.skip_ground_layer),
            u8::from(self.skip_bench_layer),
        ]);
        hasher.update((self.entries.len() as u64).to_le_bytes());
        for entry in &self.entries {
            hasher.update(entry.zone.label().as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.template.as_str().as_bytes());
            hasher.update([0u8]);
            for v in [entry.position_offset, entry.rotation, entry.scale] {
                for component in [v.x, v.y, v.z] {
                    hasher.update(component.to_le_bytes());
                }
            }
        }
        to_hex_lower(&hasher.finalize())
    }
}

pub fn theme_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
