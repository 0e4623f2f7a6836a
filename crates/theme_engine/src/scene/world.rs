use crate::template::{TemplateAsset, TemplateNode, TemplateRef};
use crate::zone::Zone;

use super::host::{CorrespondenceSource, InstanceHandle, InstanceId, SceneHost, ZoneMarker};
use super::math::{Transform, Vec3};

#[derive(Debug, Clone)]
struct Instance {
    id: InstanceId,
    name: String,
    parent: Option<InstanceId>,
    transform: Transform,
    template: Option<TemplateRef>,
}

#[derive(Debug, Default)]
pub struct InstanceIdAllocator {
    next: u64,
}

impl InstanceIdAllocator {
    pub fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// In-memory scene host. Transforms are world-space; hierarchies compose by
/// translation only.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: InstanceIdAllocator,
    instances: Vec<Instance>,
    epoch: u64,
    field_origin: Vec3,
    zone_markers: Vec<ZoneMarker>,
    authoring_root: Option<InstanceId>,
}

impl SceneWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        name: &str,
        parent: Option<InstanceHandle>,
        transform: Transform,
    ) -> InstanceHandle {
        let parent = parent.and_then(|handle| self.find(handle)).map(|p| p.id);
        self.spawn_internal(name.to_string(), parent, transform, None)
    }

    fn spawn_internal(
        &mut self,
        name: String,
        parent: Option<InstanceId>,
        transform: Transform,
        template: Option<TemplateRef>,
    ) -> InstanceHandle {
        let id = self.allocator.allocate();
        self.instances.push(Instance {
            id,
            name,
            parent,
            transform,
            template,
        });
        self.handle(id)
    }

    pub fn set_field_origin(&mut self, origin: Vec3) {
        self.field_origin = origin;
    }

    pub fn add_zone_marker(&mut self, zone: Zone, position: Vec3) {
        self.zone_markers.push(ZoneMarker { zone, position });
    }

    pub fn set_authoring_root(&mut self, root: Option<InstanceHandle>) {
        self.authoring_root = root.and_then(|handle| self.find(handle)).map(|i| i.id);
    }

    /// Simulates the host dropping every outstanding reference. Instances stay
    /// in the scene; handles issued before the call no longer resolve.
    pub fn reload(&mut self) {
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<InstanceHandle> {
        self.instances
            .iter()
            .find(|instance| instance.name == name)
            .map(|instance| self.handle(instance.id))
    }

    pub fn template_of(&self, handle: InstanceHandle) -> Option<&TemplateRef> {
        self.find(handle)
            .and_then(|instance| instance.template.as_ref())
    }

    fn handle(&self, id: InstanceId) -> InstanceHandle {
        InstanceHandle {
            id,
            epoch: self.epoch,
        }
    }

    fn find(&self, handle: InstanceHandle) -> Option<&Instance> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.instances
            .iter()
            .find(|instance| instance.id == handle.id)
    }

    fn find_mut(&mut self, handle: InstanceHandle) -> Option<&mut Instance> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.instances
            .iter_mut()
            .find(|instance| instance.id == handle.id)
    }

    fn snapshot_node(&self, instance: &Instance, root_position: Vec3) -> TemplateNode {
        let children = self
            .instances
            .iter()
            .filter(|child| child.parent == Some(instance.id))
            .map(|child| self.snapshot_node(child, root_position))
            .collect();
        TemplateNode {
            name: instance.name.clone(),
            transform: Transform {
                position: instance.transform.position - root_position,
                ..instance.transform
            },
            children,
        }
    }

    fn spawn_node(&mut self, node: &TemplateNode, parent: InstanceId, root_position: Vec3) {
        let handle = self.spawn_internal(
            node.name.clone(),
            Some(parent),
            Transform {
                position: root_position + node.transform.position,
                ..node.transform
            },
            None,
        );
        for child in &node.children {
            self.spawn_node(child, handle.id, root_position);
        }
    }
}

impl SceneHost for SceneWorld {
    fn is_alive(&self, handle: InstanceHandle) -> bool {
        self.find(handle).is_some()
    }

    fn authoring_root(&self) -> Option<InstanceHandle> {
        self.authoring_root.map(|id| self.handle(id))
    }

    fn children_of(&self, parent: Option<InstanceHandle>) -> Vec<InstanceHandle> {
        let parent_id = match parent {
            Some(handle) => match self.find(handle) {
                Some(instance) => Some(instance.id),
                None => return Vec::new(),
            },
            None => None,
        };
        self.instances
            .iter()
            .filter(|instance| instance.parent == parent_id)
            .map(|instance| self.handle(instance.id))
            .collect()
    }

    fn parent_of(&self, handle: InstanceHandle) -> Option<InstanceHandle> {
        self.find(handle)
            .and_then(|instance| instance.parent)
            .map(|id| self.handle(id))
    }

    fn instance_name(&self, handle: InstanceHandle) -> Option<&str> {
        self.find(handle).map(|instance| instance.name.as_str())
    }

    fn transform(&self, handle: InstanceHandle) -> Option<Transform> {
        self.find(handle).map(|instance| instance.transform)
    }

    fn set_transform(&mut self, handle: InstanceHandle, transform: Transform) -> bool {
        match self.find_mut(handle) {
            Some(instance) => {
                instance.transform = transform;
                true
            }
            None => false,
        }
    }

    fn instantiate(
        &mut self,
        template: &TemplateRef,
        asset: &TemplateAsset,
        parent: Option<InstanceHandle>,
        transform: Transform,
    ) -> InstanceHandle {
        let parent = parent.and_then(|handle| self.find(handle)).map(|p| p.id);
        let root = self.spawn_internal(
            asset.name.clone(),
            parent,
            transform,
            Some(template.clone()),
        );
        for child in &asset.root.children {
            self.spawn_node(child, root.id, transform.position);
        }
        root
    }

    fn link_template(&mut self, handle: InstanceHandle, template: &TemplateRef) -> bool {
        match self.find_mut(handle) {
            Some(instance) => {
                instance.template = Some(template.clone());
                true
            }
            None => false,
        }
    }

    fn snapshot(&self, handle: InstanceHandle) -> Option<TemplateNode> {
        let instance = self.find(handle)?;
        let mut root = self.snapshot_node(instance, instance.transform.position);
        root.transform = Transform::default();
        Some(root)
    }

    fn despawn(&mut self, handle: InstanceHandle) -> bool {
        let Some(instance) = self.find(handle) else {
            return false;
        };
        let mut doomed = vec![instance.id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor];
            doomed.extend(
                self.instances
                    .iter()
                    .filter(|candidate| candidate.parent == Some(current))
                    .map(|candidate| candidate.id),
            );
            cursor += 1;
        }
        self.instances
            .retain(|instance| !doomed.contains(&instance.id));
        if self
            .authoring_root
            .is_some_and(|root| doomed.contains(&root))
        {
            self.authoring_root = None;
        }
        true
    }

    fn field_origin(&self) -> Vec3 {
        self.field_origin
    }

    fn zone_markers(&self) -> &[ZoneMarker] {
        &self.zone_markers
    }
}

impl CorrespondenceSource for SceneWorld {
    fn resolve_correspondence(&self, handle: InstanceHandle) -> Option<TemplateRef> {
        self.template_of(handle).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock_asset() -> TemplateAsset {
        TemplateAsset {
            name: "Rock".to_string(),
            root: TemplateNode {
                name: "Rock".to_string(),
                transform: Transform::default(),
                children: vec![TemplateNode {
                    name: "Moss".to_string(),
                    transform: Transform::at(Vec3::new(0.0, 1.0, 0.0)),
                    children: Vec::new(),
                }],
            },
        }
    }

    #[test]
    fn reload_invalidates_handles_but_keeps_instances() {
        let mut world = SceneWorld::new();
        let rock = world.spawn("Rock", None, Transform::default());
        assert!(world.is_alive(rock));

        world.reload();
        assert!(!world.is_alive(rock));
        assert_eq!(world.instance_count(), 1);

        let fresh = world.find_by_name("Rock").expect("rock");
        assert!(world.is_alive(fresh));
        assert_eq!(fresh.id, rock.id);
    }

    #[test]
    fn despawn_removes_descendants() {
        let mut world = SceneWorld::new();
        let root = world.spawn("Root", None, Transform::default());
        let tree = world.spawn("Tree", Some(root), Transform::default());
        world.spawn("Leaf", Some(tree), Transform::default());
        world.spawn("Bench", None, Transform::default());

        assert!(world.despawn(tree));
        assert_eq!(world.instance_count(), 2);
        assert!(world.find_by_name("Leaf").is_none());
        assert!(world.children_of(Some(root)).is_empty());
    }

    #[test]
    fn instantiate_links_root_and_offsets_children() {
        let mut world = SceneWorld::new();
        let template = TemplateRef::new("decor/Rock");
        let handle = world.instantiate(
            &template,
            &rock_asset(),
            None,
            Transform::at(Vec3::new(5.0, 0.0, 2.0)),
        );

        assert_eq!(world.resolve_correspondence(handle), Some(template));
        let children = world.children_of(Some(handle));
        assert_eq!(children.len(), 1);
        let moss = world.transform(children[0]).expect("moss transform");
        assert_eq!(moss.position, Vec3::new(5.0, 1.0, 2.0));
        assert!(world.resolve_correspondence(children[0]).is_none());
    }

    #[test]
    fn snapshot_is_relative_to_instance() {
        let mut world = SceneWorld::new();
        let tree = world.spawn("Tree", None, Transform::at(Vec3::new(3.0, 0.0, 3.0)));
        world.spawn("Leaf", Some(tree), Transform::at(Vec3::new(3.0, 2.0, 4.0)));

        let node = world.snapshot(tree).expect("snapshot");
        assert_eq!(node.name, "Tree");
        assert_eq!(node.transform.position, Vec3::ZERO);
        assert_eq!(node.children[0].transform.position, Vec3::new(0.0, 2.0, 1.0));
    }

    #[test]
    fn stale_handle_cannot_write_transform() {
        let mut world = SceneWorld::new();
        let rock = world.spawn("Rock", None, Transform::default());
        world.reload();
        assert!(!world.set_transform(rock, Transform::at(Vec3::ONE)));
        assert!(!world.link_template(rock, &TemplateRef::new("decor/Rock")));
    }
}
