#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub instance_id: u64,
    pub definition_name: String,
    pub transform: glam::Mat4,
    pub selected: bool,
    pub idle_spin: f32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

impl SceneObject {
    pub fn render_transform(&self) -> glam::Mat4 {
        if self.idle_spin == 0.0 {
            return self.transform;
        }
        self.transform * glam::Mat4::from_rotation_y(self.idle_spin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSurface {
    pub anchor_id: u64,
    pub transform: glam::Mat4,
    pub extent: [f32; 2],
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    pub objects: Vec<SceneObject>,
    pub surfaces: Vec<SceneSurface>,
}

impl SceneSnapshot {
    pub fn object(&self, instance_id: u64) -> Option<&SceneObject> {
        self.objects
            .iter()
            .find(|object| object.instance_id == instance_id)
    }

    pub fn selected(&self) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.selected)
    }

    pub fn confirmed_surface(&self) -> Option<&SceneSurface> {
        self.surfaces.iter().find(|surface| surface.confirmed)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: u64, selected: bool) -> SceneObject {
        SceneObject {
            instance_id: id,
            definition_name: format!("obj{id}"),
            transform: glam::Mat4::from_translation(glam::Vec3::new(id as f32, 0.0, 0.0)),
            selected,
            idle_spin: 0.0,
            bounds_min: [-0.5, 0.0, -0.5],
            bounds_max: [0.5, 1.0, 0.5],
        }
    }

    #[test]
    fn finds_selected_object() {
        let snapshot = SceneSnapshot {
            objects: vec![object(1, false), object(2, true)],
            surfaces: Vec::new(),
        };
        assert_eq!(snapshot.selected().map(|o| o.instance_id), Some(2));
        assert_eq!(snapshot.object(1).map(|o| o.definition_name.as_str()), Some("obj1"));
        assert!(snapshot.confirmed_surface().is_none());
    }

    #[test]
    fn render_transform_applies_spin_in_local_frame() {
        let mut obj = object(3, true);
        obj.idle_spin = std::f32::consts::FRAC_PI_2;
        let p = obj.render_transform().transform_point3(glam::Vec3::X);
        assert!((p - glam::Vec3::new(3.0, 0.0, -1.0)).length() < 1.0e-5);
    }
}
