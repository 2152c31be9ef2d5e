use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assets::{AssetError, AssetSource};
use crate::catalog::ObjectDefinition;
use crate::geometry::{Aabb, Transform};
use crate::surface::{AnchorId, SurfaceTracker};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub id: InstanceId,
    pub definition_name: String,
    pub collection: String,
    /// Relative to `parent_anchor` when set, world space otherwise.
    pub local: Transform,
    pub yaw: f32,
    pub base_rotation: Quat,
    pub parent_anchor: Option<AnchorId>,
    pub bounds: Aabb,
    pub selected: bool,
    pub idle_spin: f32,
}

impl PlacedObject {
    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
        self.local.rotation = (Quat::from_rotation_y(yaw) * self.base_rotation).normalize();
    }

    pub fn parent_transform(&self, surfaces: &SurfaceTracker) -> Transform {
        self.parent_anchor
            .and_then(|id| surfaces.anchor(id))
            .map(|anchor| anchor.world_transform())
            .unwrap_or(Transform::IDENTITY)
    }

    pub fn world_transform(&self, surfaces: &SurfaceTracker) -> Transform {
        self.parent_transform(surfaces) * self.local
    }

    pub fn world_position(&self, surfaces: &SurfaceTracker) -> Vec3 {
        self.parent_transform(surfaces)
            .transform_point(self.local.translation)
    }

    pub fn set_world_position(&mut self, world: Vec3, surfaces: &SurfaceTracker) {
        self.local.translation = self.parent_transform(surfaces).inverse().transform_point(world);
    }
}

#[derive(Debug, Clone)]
pub struct SceneRegistry {
    objects: BTreeMap<InstanceId, PlacedObject>,
    next_id: u64,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.values()
    }

    pub fn get(&self, id: InstanceId) -> Option<&PlacedObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut PlacedObject> {
        self.objects.get_mut(&id)
    }

    /// Builds a live instance from its definition. Geometry is loaded before an
    /// id is allocated, so a failed load leaves the registry untouched.
    pub fn instantiate(
        &mut self,
        definition: &ObjectDefinition,
        collection: &str,
        assets: &dyn AssetSource,
        parent_anchor: Option<AnchorId>,
    ) -> Result<InstanceId, AssetError> {
        let geometry = assets.load(&definition.name)?;
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        let base_rotation = definition.default_rotation();
        let object = PlacedObject {
            id,
            definition_name: definition.name.clone(),
            collection: collection.to_string(),
            local: Transform::from_rotation_translation(
                base_rotation,
                definition.default_local_position,
            ),
            yaw: 0.0,
            base_rotation,
            parent_anchor,
            bounds: geometry.bounds,
            selected: false,
            idle_spin: 0.0,
        };
        debug!("registry: instantiated {:?} from {}", id, definition.name);
        self.objects.insert(id, object);
        Ok(id)
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<PlacedObject> {
        self.objects.remove(&id)
    }

    pub fn selected(&self) -> Option<InstanceId> {
        self.objects
            .values()
            .find(|object| object.selected)
            .map(|object| object.id)
    }

    /// Selects `id`, clearing any prior selection first. Returns the instance that
    /// lost its selection, or `None` when `id` is unknown.
    pub fn select(&mut self, id: InstanceId) -> Option<Option<InstanceId>> {
        if !self.objects.contains_key(&id) {
            return None;
        }
        let previous = self.selected().filter(|prev| *prev != id);
        if let Some(prev) = previous {
            self.clear_selection(prev);
        }
        if let Some(object) = self.objects.get_mut(&id) {
            object.selected = true;
        }
        Some(previous)
    }

    pub fn deselect(&mut self) -> Option<InstanceId> {
        let id = self.selected()?;
        self.clear_selection(id);
        Some(id)
    }

    fn clear_selection(&mut self, id: InstanceId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.selected = false;
            object.idle_spin = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetGeometry, StaticAssets};
    use crate::surface::{AnchorUpdate, PlaneCandidate};

    fn definition(name: &str) -> ObjectDefinition {
        let mut def = ObjectDefinition::new(name);
        def.default_local_position = Vec3::new(0.5, 0.0, 0.0);
        def
    }

    fn registry_with(names: &[&str]) -> (SceneRegistry, Vec<InstanceId>) {
        let assets = StaticAssets::with_fallback(AssetGeometry::unit_box());
        let mut registry = SceneRegistry::new();
        let ids = names
            .iter()
            .map(|name| {
                registry
                    .instantiate(&definition(name), "Well", &assets, None)
                    .unwrap()
            })
            .collect();
        (registry, ids)
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let (mut registry, ids) = registry_with(&["Pump", "Pump", "Tank"]);
        assert_eq!(ids, vec![InstanceId(1), InstanceId(2), InstanceId(3)]);
        registry.remove(ids[1]);
        let assets = StaticAssets::with_fallback(AssetGeometry::unit_box());
        let next = registry
            .instantiate(&definition("Pump"), "Well", &assets, None)
            .unwrap();
        assert_eq!(next, InstanceId(4));
        assert_eq!(registry.get(ids[0]).unwrap().definition_name, "Pump");
    }

    #[test]
    fn failed_load_does_not_insert() {
        let assets = StaticAssets::new();
        let mut registry = SceneRegistry::new();
        let result = registry.instantiate(&definition("Ghost"), "Well", &assets, None);
        assert!(matches!(result, Err(AssetError::NotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn select_clears_previous_selection() {
        let (mut registry, ids) = registry_with(&["A", "B"]);
        assert_eq!(registry.select(ids[0]), Some(None));
        registry.get_mut(ids[0]).unwrap().idle_spin = 1.0;

        assert_eq!(registry.select(ids[1]), Some(Some(ids[0])));
        let a = registry.get(ids[0]).unwrap();
        assert!(!a.selected);
        assert_eq!(a.idle_spin, 0.0);
        assert_eq!(registry.selected(), Some(ids[1]));
        assert_eq!(registry.objects().filter(|o| o.selected).count(), 1);

        assert_eq!(registry.select(InstanceId(99)), None);
        assert_eq!(registry.deselect(), Some(ids[1]));
        assert_eq!(registry.selected(), None);
    }

    #[test]
    fn objects_follow_their_anchor() {
        let assets = StaticAssets::with_fallback(AssetGeometry::unit_box());
        let mut surfaces = SurfaceTracker::new();
        let candidate = PlaneCandidate {
            id: AnchorId(7),
            transform: Transform::from_translation(Vec3::new(0.0, -1.0, -2.0)),
            extent_width: 1.0,
            extent_height: 1.0,
        };
        surfaces.apply(AnchorUpdate::Added(candidate.clone()));
        surfaces.confirm(AnchorId(7));

        let mut registry = SceneRegistry::new();
        let id = registry
            .instantiate(&definition("Pump"), "Well", &assets, Some(AnchorId(7)))
            .unwrap();
        let object = registry.get(id).unwrap();
        assert_eq!(object.world_position(&surfaces), Vec3::new(0.5, -1.0, -2.0));

        let mut moved = candidate;
        moved.transform = Transform::from_translation(Vec3::new(1.0, -1.0, -2.0));
        surfaces.apply(AnchorUpdate::Updated(moved));
        let object = registry.get(id).unwrap();
        assert_eq!(object.world_position(&surfaces), Vec3::new(1.5, -1.0, -2.0));

        let object = registry.get_mut(id).unwrap();
        object.set_world_position(Vec3::new(0.0, -1.0, 0.0), &surfaces);
        assert_eq!(object.local.translation, Vec3::new(-1.0, 0.0, 2.0));
    }
}
