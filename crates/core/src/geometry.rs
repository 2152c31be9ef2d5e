use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale: 1.0,
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (point * self.scale)
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * (vector * self.scale)
    }

    pub fn inverse(&self) -> Self {
        let inv_scale = if self.scale.abs() > 1.0e-8 {
            1.0 / self.scale
        } else {
            0.0
        };
        let inv_rotation = self.rotation.inverse();
        Self {
            translation: inv_rotation * (-self.translation) * inv_scale,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    pub fn up(&self) -> Vec3 {
        (self.rotation * Vec3::Y).normalize_or_zero()
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, child: Transform) -> Transform {
        Transform {
            translation: self.transform_point(child.translation),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self { min, max })
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub fov_y_deg: f32,
    pub viewport: Vec2,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    pub fn new(position: Vec3, rotation: Quat, fov_y_deg: f32, viewport: Vec2) -> Self {
        Self {
            position,
            rotation,
            fov_y_deg,
            viewport,
            near: 0.01,
            far: 1000.0,
        }
    }

    /// Builds a pose from a camera position plus forward/up vectors, the way
    /// tracking frames report them. Degenerate vectors fall back to looking down -Z.
    pub fn looking(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y_deg: f32,
        viewport: Vec2,
    ) -> Self {
        let forward = forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward
            .cross(up)
            .try_normalize()
            .or_else(|| forward.cross(Vec3::Z).try_normalize())
            .unwrap_or(Vec3::X);
        let true_up = right.cross(forward);
        let basis = Mat3::from_cols(right, true_up, -forward);
        Self::new(position, Quat::from_mat3(&basis).normalize(), fov_y_deg, viewport)
    }

    pub fn forward(&self) -> Vec3 {
        (self.rotation * Vec3::NEG_Z).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    pub fn view_proj(&self) -> Mat4 {
        let width = self.viewport.x.max(1.0);
        let height = self.viewport.y.max(1.0);
        let aspect = width / height;
        let projection = Mat4::perspective_rh(
            self.fov_y_deg.clamp(1.0, 179.0).to_radians(),
            aspect,
            self.near.max(1.0e-4),
            self.far.max(self.near + 1.0e-3),
        );
        projection * self.view()
    }

    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_proj() * world.extend(1.0);
        if clip.w <= 1.0e-6 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !ndc.x.is_finite() || !ndc.y.is_finite() || !ndc.z.is_finite() {
            return None;
        }
        let x = (ndc.x * 0.5 + 0.5) * self.viewport.x;
        let y = (0.5 - ndc.y * 0.5) * self.viewport.y;
        Some(Vec2::new(x, y))
    }

    pub fn screen_ray(&self, point: Vec2) -> Option<Ray> {
        let width = self.viewport.x.max(1.0);
        let height = self.viewport.y.max(1.0);
        let inv = self.view_proj().inverse();
        let ndc_x = (point.x / width) * 2.0 - 1.0;
        let ndc_y = 1.0 - (point.y / height) * 2.0;
        let near = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        let dir = (far - near).try_normalize()?;
        if !near.is_finite() {
            return None;
        }
        Some(Ray { origin: near, dir })
    }
}

pub fn ray_plane(ray: &Ray, plane_origin: Vec3, plane_normal: Vec3) -> Option<f32> {
    let denom = plane_normal.dot(ray.dir);
    if denom.abs() <= 1.0e-6 {
        return None;
    }
    let t = (plane_origin - ray.origin).dot(plane_normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(t)
}

pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let inv = ray.dir.recip();
    let t1 = (aabb.min - ray.origin) * inv;
    let t2 = (aabb.max - ray.origin) * inv;
    let t_min = t1.min(t2).max_element();
    let t_max = t1.max(t2).min_element();
    if t_max < 0.0 || t_min > t_max {
        return None;
    }
    Some(t_min.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraPose {
        CameraPose::looking(
            Vec3::new(0.0, 1.0, 2.0),
            Vec3::new(0.0, -1.0, -2.0),
            Vec3::Y,
            60.0,
            Vec2::new(800.0, 600.0),
        )
    }

    #[test]
    fn transform_inverse_round_trips_points() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.7),
            scale: 2.5,
        };
        let p = Vec3::new(-0.3, 0.4, 1.1);
        let back = t.inverse().transform_point(t.transform_point(p));
        assert!((back - p).length() < 1.0e-5);
        let composed = (t * t.inverse()).to_mat4();
        assert!(composed.abs_diff_eq(Mat4::IDENTITY, 1.0e-5));
    }

    #[test]
    fn transform_mul_matches_matrix_product() {
        let parent = Transform {
            translation: Vec3::new(0.5, 0.0, -1.0),
            rotation: Quat::from_rotation_y(1.2),
            scale: 0.5,
        };
        let child = Transform {
            translation: Vec3::new(1.0, 0.2, 0.0),
            rotation: Quat::from_rotation_x(0.3),
            scale: 3.0,
        };
        let expected = parent.to_mat4() * child.to_mat4();
        assert!((parent * child).to_mat4().abs_diff_eq(expected, 1.0e-5));
    }

    #[test]
    fn center_of_screen_projects_along_forward() {
        let camera = camera();
        let ray = camera.screen_ray(Vec2::new(400.0, 300.0)).unwrap();
        assert!(ray.dir.dot(camera.forward()) > 0.9999);
    }

    #[test]
    fn project_inverts_screen_ray() {
        let camera = camera();
        let point = Vec2::new(250.0, 420.0);
        let ray = camera.screen_ray(point).unwrap();
        let t = ray_plane(&ray, Vec3::ZERO, Vec3::Y).unwrap();
        let screen = camera.project(ray.at(t)).unwrap();
        assert!((screen - point).length() < 1.0e-2);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let camera = camera();
        assert!(camera.project(Vec3::new(0.0, 2.0, 4.0)).is_none());
    }

    #[test]
    fn ray_plane_rejects_parallel_and_backward_hits() {
        let ray = Ray {
            origin: Vec3::new(0.0, 1.0, 0.0),
            dir: Vec3::X,
        };
        assert!(ray_plane(&ray, Vec3::ZERO, Vec3::Y).is_none());
        let up = Ray {
            origin: Vec3::new(0.0, 1.0, 0.0),
            dir: Vec3::Y,
        };
        assert!(ray_plane(&up, Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn ray_aabb_hits_front_face() {
        let aabb = Aabb::from_center_size(Vec3::new(0.0, 0.0, -5.0), Vec3::splat(2.0));
        let ray = Ray {
            origin: Vec3::new(0.1, 0.2, 0.0),
            dir: Vec3::NEG_Z,
        };
        let t = ray_aabb(&ray, &aabb).unwrap();
        assert!((t - 4.0).abs() < 1.0e-5);
        let miss = Ray {
            origin: Vec3::new(3.0, 0.0, 0.0),
            dir: Vec3::NEG_Z,
        };
        assert!(ray_aabb(&miss, &aabb).is_none());
    }
}
