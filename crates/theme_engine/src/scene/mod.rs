mod host;
mod math;
mod world;

pub use host::{CorrespondenceSource, InstanceHandle, InstanceId, SceneHost, ZoneMarker};
pub use math::{Transform, Vec3};
pub use world::{InstanceIdAllocator, SceneWorld};
