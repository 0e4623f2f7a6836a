use tracing::{debug, info};

use crate::scene::{InstanceHandle, SceneHost, Transform, Vec3, ZoneMarker};
use crate::template::TemplateRef;
use crate::theme::ThemeEntry;
use crate::zone::Zone;

/// One live instance under editing. Session-scoped, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingPlacement {
    pub object_name: String,
    pub live_reference: Option<InstanceHandle>,
    pub template: Option<TemplateRef>,
    pub is_template_instance: bool,
    pub zone: Zone,
    pub position_offset: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl WorkingPlacement {
    pub fn capture(&mut self, origin: Vec3, transform: Transform) {
        self.position_offset = transform.position - origin;
        self.rotation = transform.rotation_degrees;
        self.scale = transform.scale;
    }

    pub fn bind_template(&mut self, template: TemplateRef) {
        self.template = Some(template);
        self.is_template_instance = true;
    }

    pub fn unbind_template(&mut self) {
        self.template = None;
        self.is_template_instance = false;
    }

    pub fn to_entry(&self) -> Option<ThemeEntry> {
        let template = self.template.clone()?;
        Some(ThemeEntry {
            zone: self.zone,
            template,
            position_offset: self.position_offset,
            rotation: self.rotation,
            scale: self.scale,
        })
    }

    pub fn from_entry(entry: &ThemeEntry, live_reference: Option<InstanceHandle>) -> Self {
        Self {
            object_name: entry.template.name().to_string(),
            live_reference,
            template: Some(entry.template.clone()),
            is_template_instance: true,
            zone: entry.zone,
            position_offset: entry.position_offset,
            rotation: entry.rotation,
            scale: entry.scale,
        }
    }
}

/// Nearest marker wins; on equal distance the earlier marker is kept. No
/// markers means everything lands on the ground.
pub fn classify_zone(markers: &[ZoneMarker], position: Vec3) -> Zone {
    let mut best: Option<(Zone, f32)> = None;
    for marker in markers {
        let distance = marker.position.distance_squared(position);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((marker.zone, distance)),
        }
    }
    best.map(|(zone, _)| zone).unwrap_or_default()
}

/// One placement per direct child of the authoring root, in host order.
/// Templates are left unresolved. An empty result is a valid scan.
pub fn scan<H>(host: &H) -> Vec<WorkingPlacement>
where
    H: SceneHost + ?Sized,
{
    let origin = host.field_origin();
    let markers = host.zone_markers();
    let root = host.authoring_root();

    let placements = host
        .children_of(root)
        .into_iter()
        .filter_map(|handle| {
            let transform = host.transform(handle)?;
            let object_name = host.instance_name(handle)?.to_string();
            let zone = classify_zone(markers, transform.position);
            debug!(
                instance = handle.id.0,
                object_name = %object_name,
                zone = %zone,
                "scan_placement_found"
            );
            let mut placement = WorkingPlacement {
                object_name,
                live_reference: Some(handle),
                template: None,
                is_template_instance: false,
                zone,
                position_offset: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
            };
            placement.capture(origin, transform);
            Some(placement)
        })
        .collect::<Vec<_>>();

    info!(
        placement_count = placements.len(),
        marker_count = markers.len(),
        "theme_scan_complete"
    );
    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneWorld;

    fn marker(zone: Zone, x: f32, z: f32) -> ZoneMarker {
        ZoneMarker {
            zone,
            position: Vec3::new(x, 0.0, z),
        }
    }

    #[test]
    fn nearest_marker_wins_and_ties_keep_first() {
        let markers = [
            marker(Zone::BackLeft, -5.0, 5.0),
            marker(Zone::BackRight, 5.0, 5.0),
            marker(Zone::FrontCenter, 0.0, -5.0),
        ];
        assert_eq!(classify_zone(&markers, Vec3::new(-4.0, 0.0, 4.0)), Zone::BackLeft);
        assert_eq!(classify_zone(&markers, Vec3::new(0.0, 0.0, -3.0)), Zone::FrontCenter);
        assert_eq!(classify_zone(&markers, Vec3::new(0.0, 0.0, 5.0)), Zone::BackLeft);
        assert_eq!(classify_zone(&[], Vec3::ZERO), Zone::Ground);
    }

    #[test]
    fn scan_covers_direct_children_of_authoring_root() {
        let mut world = SceneWorld::new();
        world.set_field_origin(Vec3::new(1.0, 0.0, 1.0));
        world.add_zone_marker(Zone::SideLeft, Vec3::new(-8.0, 0.0, 0.0));
        world.add_zone_marker(Zone::SideRight, Vec3::new(8.0, 0.0, 0.0));
        let root = world.spawn("Decor", None, Transform::default());
        world.set_authoring_root(Some(root));
        let tree = world.spawn("Tree", Some(root), Transform::at(Vec3::new(-6.0, 0.0, 1.0)));
        world.spawn("Branch", Some(tree), Transform::default());
        world.spawn("Flag", Some(root), Transform::at(Vec3::new(7.0, 2.0, 0.0)));
        world.spawn("Camera", None, Transform::default());

        let placements = scan(&world);
        let names = placements
            .iter()
            .map(|p| p.object_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Tree", "Flag"]);
        assert_eq!(placements[0].zone, Zone::SideLeft);
        assert_eq!(placements[0].position_offset, Vec3::new(-7.0, 0.0, 0.0));
        assert_eq!(placements[1].zone, Zone::SideRight);
        assert!(placements.iter().all(|p| p.template.is_none()));
        assert!(placements.iter().all(|p| !p.is_template_instance));
    }

    #[test]
    fn empty_scene_scans_to_empty_list() {
        let world = SceneWorld::new();
        assert!(scan(&world).is_empty());
    }

    #[test]
    fn placement_without_template_has_no_entry() {
        let mut placement = WorkingPlacement {
            object_name: "Rock".to_string(),
            live_reference: None,
            template: None,
            is_template_instance: false,
            zone: Zone::Misc,
            position_offset: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        };
        assert!(placement.to_entry().is_none());

        placement.bind_template(TemplateRef::new("decor/Rock"));
        let entry = placement.to_entry().expect("entry");
        assert_eq!(entry.zone, Zone::Misc);
        assert!(placement.is_template_instance);
    }
}
