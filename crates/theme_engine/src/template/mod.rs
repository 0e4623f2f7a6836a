mod resolver;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scene::{Transform, Vec3};

pub use resolver::{
    materialize, resolve, sanitize_asset_name, MaterializeError, Resolution, ResolutionTier,
    MAX_NAME_SUFFIX,
};
pub use store::{FsTemplateStore, TemplateStore, TemplateStoreError};

/// Store-relative asset path, `folder/name`, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TemplateRef(String);

impl TemplateRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn in_folder(folder: &str, name: &str) -> Self {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{folder}/{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateNode {
    pub name: String,
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TemplateNode>,
}

impl TemplateNode {
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TemplateNode::node_count)
            .sum::<usize>()
    }

    fn accumulate_extent(&self, extent: &mut Vec3) {
        let p = self.transform.position;
        extent.x = extent.x.max(p.x.abs());
        extent.y = extent.y.max(p.y.abs());
        extent.z = extent.z.max(p.z.abs());
        for child in &self.children {
            child.accumulate_extent(extent);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateAsset {
    pub name: String,
    pub root: TemplateNode,
}

/// Headless stand-in for a thumbnail: enough to size a preview tile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePreview {
    pub template: TemplateRef,
    pub node_count: usize,
    pub half_extent: Vec3,
}

impl TemplatePreview {
    pub fn from_asset(template: &TemplateRef, asset: &TemplateAsset) -> Self {
        let mut half_extent = Vec3::ZERO;
        asset.root.accumulate_extent(&mut half_extent);
        Self {
            template: template.clone(),
            node_count: asset.root.node_count(),
            half_extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_folder_joins_with_forward_slash() {
        assert_eq!(TemplateRef::in_folder("decor/", "Rock").as_str(), "decor/Rock");
        assert_eq!(TemplateRef::in_folder("", "Rock").as_str(), "Rock");
        assert_eq!(TemplateRef::new("decor/trees/Oak").name(), "Oak");
    }

    #[test]
    fn preview_counts_nodes_and_extent() {
        let asset = TemplateAsset {
            name: "Tree".to_string(),
            root: TemplateNode {
                name: "Tree".to_string(),
                transform: Transform::default(),
                children: vec![TemplateNode {
                    name: "Canopy".to_string(),
                    transform: Transform::at(Vec3::new(-1.5, 4.0, 0.5)),
                    children: Vec::new(),
                }],
            },
        };
        let preview = TemplatePreview::from_asset(&TemplateRef::new("decor/Tree"), &asset);
        assert_eq!(preview.node_count, 2);
        assert_eq!(preview.half_extent, Vec3::new(1.5, 4.0, 0.5));
    }
}
