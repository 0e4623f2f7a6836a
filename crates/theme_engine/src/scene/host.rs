use crate::template::{TemplateAsset, TemplateNode, TemplateRef};
use crate::zone::Zone;

use super::math::{Transform, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

/// Lookup-only reference to a live instance.
///
/// A handle carries the host epoch it was issued in. A host reload bumps the
/// epoch, so handles taken before it stop resolving even when the instance is
/// still present in the scene. Always go through [`SceneHost::is_alive`] or a
/// host accessor before trusting a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub id: InstanceId,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneMarker {
    pub zone: Zone,
    pub position: Vec3,
}

pub trait SceneHost {
    fn is_alive(&self, handle: InstanceHandle) -> bool;

    /// Root under which authored decoration lives. `None` means the scene's
    /// top level.
    fn authoring_root(&self) -> Option<InstanceHandle>;

    fn children_of(&self, parent: Option<InstanceHandle>) -> Vec<InstanceHandle>;

    fn parent_of(&self, handle: InstanceHandle) -> Option<InstanceHandle>;

    fn instance_name(&self, handle: InstanceHandle) -> Option<&str>;

    fn transform(&self, handle: InstanceHandle) -> Option<Transform>;

    fn set_transform(&mut self, handle: InstanceHandle, transform: Transform) -> bool;

    fn instantiate(
        &mut self,
        template: &TemplateRef,
        asset: &TemplateAsset,
        parent: Option<InstanceHandle>,
        transform: Transform,
    ) -> InstanceHandle;

    fn link_template(&mut self, handle: InstanceHandle, template: &TemplateRef) -> bool;

    /// Captures the instance hierarchy with child transforms relative to the
    /// instance itself.
    fn snapshot(&self, handle: InstanceHandle) -> Option<TemplateNode>;

    fn despawn(&mut self, handle: InstanceHandle) -> bool;

    fn field_origin(&self) -> Vec3;

    fn zone_markers(&self) -> &[ZoneMarker];
}

pub trait CorrespondenceSource {
    fn resolve_correspondence(&self, handle: InstanceHandle) -> Option<TemplateRef>;
}
