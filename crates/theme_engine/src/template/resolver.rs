use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scene::{CorrespondenceSource, InstanceHandle, SceneHost};

use super::store::{TemplateStore, TemplateStoreError};
use super::{TemplateAsset, TemplateRef};

pub const MAX_NAME_SUFFIX: u32 = 9_999;
const FALLBACK_ASSET_NAME: &str = "Template";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Direct,
    Transitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        template: TemplateRef,
        tier: ResolutionTier,
    },
    Unresolved,
    Invalidated,
}

impl Resolution {
    pub fn template(&self) -> Option<&TemplateRef> {
        match self {
            Resolution::Resolved { template, .. } => Some(template),
            Resolution::Unresolved | Resolution::Invalidated => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("live reference was invalidated before materialization; reload the theme and try again")]
    InvalidatedReference,
    #[error("no free template name for '{base_name}' in '{folder}'")]
    NamesExhausted { folder: String, base_name: String },
    #[error(transparent)]
    Store(#[from] TemplateStoreError),
}

/// Finds the template backing a live instance: the instance's own
/// correspondence first, then the nearest ancestor that has one. A
/// correspondence only counts when the store still holds the template.
pub fn resolve<H, S>(host: &H, store: &S, handle: InstanceHandle) -> Resolution
where
    H: SceneHost + CorrespondenceSource + ?Sized,
    S: TemplateStore + ?Sized,
{
    if !host.is_alive(handle) {
        return Resolution::Invalidated;
    }

    if let Some(template) = known_correspondence(host, store, handle) {
        return Resolution::Resolved {
            template,
            tier: ResolutionTier::Direct,
        };
    }

    let mut visited = HashSet::from([handle.id]);
    let mut cursor = host.parent_of(handle);
    while let Some(ancestor) = cursor {
        if !visited.insert(ancestor.id) {
            break;
        }
        if let Some(template) = known_correspondence(host, store, ancestor) {
            debug!(
                instance = handle.id.0,
                ancestor = ancestor.id.0,
                template = %template,
                "template_resolved_through_ancestor"
            );
            return Resolution::Resolved {
                template,
                tier: ResolutionTier::Transitive,
            };
        }
        cursor = host.parent_of(ancestor);
    }

    Resolution::Unresolved
}

fn known_correspondence<H, S>(host: &H, store: &S, handle: InstanceHandle) -> Option<TemplateRef>
where
    H: CorrespondenceSource + ?Sized,
    S: TemplateStore + ?Sized,
{
    let template = host.resolve_correspondence(handle)?;
    if store.exists(&template) {
        Some(template)
    } else {
        debug!(
            instance = handle.id.0,
            template = %template,
            "template_correspondence_missing_from_store"
        );
        None
    }
}

/// Creates a new template from the live instance under `folder/base_name`,
/// appending `_1`, `_2`, ... when the name is taken, then links the instance
/// to it.
pub fn materialize<H, S>(
    host: &mut H,
    store: &mut S,
    handle: InstanceHandle,
    folder: &str,
    base_name: &str,
) -> Result<TemplateRef, MaterializeError>
where
    H: SceneHost + ?Sized,
    S: TemplateStore + ?Sized,
{
    let root = host
        .snapshot(handle)
        .ok_or(MaterializeError::InvalidatedReference)?;
    let base = sanitize_asset_name(base_name);

    for suffix in 0..=MAX_NAME_SUFFIX {
        let name = if suffix == 0 {
            base.clone()
        } else {
            format!("{base}_{suffix}")
        };
        let template = TemplateRef::in_folder(folder, &name);
        if store.exists(&template) {
            continue;
        }

        if !host.is_alive(handle) {
            return Err(MaterializeError::InvalidatedReference);
        }
        let asset = TemplateAsset {
            name,
            root: root.clone(),
        };
        match store.create(&template, &asset) {
            Ok(()) => {}
            Err(TemplateStoreError::Occupied { .. }) => continue,
            Err(error) => return Err(error.into()),
        }

        if !host.link_template(handle, &template) {
            if let Err(error) = store.remove(&template) {
                warn!(
                    template = %template,
                    error = %error,
                    "template_materialize_rollback_failed"
                );
            }
            return Err(MaterializeError::InvalidatedReference);
        }
        info!(
            instance = handle.id.0,
            template = %template,
            node_count = asset.root.node_count(),
            "template_materialized"
        );
        return Ok(template);
    }

    Err(MaterializeError::NamesExhausted {
        folder: folder.to_string(),
        base_name: base,
    })
}

pub fn sanitize_asset_name(raw: &str) -> String {
    let cleaned = raw
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect::<String>();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_ASSET_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
