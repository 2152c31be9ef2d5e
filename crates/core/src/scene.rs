use amazi_scene::{SceneObject, SceneSnapshot, SceneSurface};

use crate::registry::SceneRegistry;
use crate::surface::SurfaceTracker;

pub fn scene_snapshot(registry: &SceneRegistry, surfaces: &SurfaceTracker) -> SceneSnapshot {
    let objects = registry
        .objects()
        .map(|object| SceneObject {
            instance_id: object.id.0,
            definition_name: object.definition_name.clone(),
            transform: object.world_transform(surfaces).to_mat4(),
            selected: object.selected,
            idle_spin: object.idle_spin,
            bounds_min: object.bounds.min.to_array(),
            bounds_max: object.bounds.max.to_array(),
        })
        .collect();
    let anchors = surfaces
        .anchors()
        .map(|anchor| SceneSurface {
            anchor_id: anchor.id.0,
            transform: anchor.world_transform().to_mat4(),
            extent: [anchor.extent_width, anchor.extent_height],
            confirmed: anchor.confirmed,
        })
        .collect();
    SceneSnapshot {
        objects,
        surfaces: anchors,
    }
}
