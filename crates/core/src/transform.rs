use glam::{Vec2, Vec3};

use crate::geometry::CameraPose;
use crate::gesture::GestureSession;
use crate::hit_test::hit_surface;
use crate::registry::InstanceId;
use crate::settings::PlacementSettings;
use crate::surface::SurfaceAnchor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Tracking point projects inside the surface extent; positions are exact.
    OnPlane,
    /// Tracking point fell off the extent; the infinite plane is used with smoothing.
    OffPlane,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub target: InstanceId,
    pub origin_screen: Vec2,
    pub translation: Vec2,
    pub target_world: Option<Vec3>,
    pub mode: DragMode,
}

impl DragState {
    pub fn new(target: InstanceId, origin_screen: Vec2) -> Self {
        Self {
            target,
            origin_screen,
            translation: Vec2::ZERO,
            target_world: None,
            mode: DragMode::OnPlane,
        }
    }

    pub fn tracking_point(&self) -> Vec2 {
        self.origin_screen + self.translation
    }
}

/// Solves the world point under the drag's tracking point. Returns `None` when
/// even the unbounded plane is missed (ray parallel to it or pointing away).
pub fn resolve_drag_target(
    drag: &DragState,
    camera: &CameraPose,
    anchor: &SurfaceAnchor,
) -> Option<(Vec3, DragMode)> {
    let point = drag.tracking_point();
    if let Some(hit) = hit_surface(point, camera, anchor, true) {
        return Some((hit.world_point, DragMode::OnPlane));
    }
    hit_surface(point, camera, anchor, false).map(|hit| (hit.world_point, DragMode::OffPlane))
}

/// Blend weight toward the target: close to 1 for small jumps, falling toward
/// `min_smoothing` as the jump grows.
pub fn smoothing_factor(distance: f32, settings: &PlacementSettings) -> f32 {
    let factor = 1.0 / (1.0 + distance.max(0.0) / settings.smoothing_distance);
    factor.clamp(settings.min_smoothing, 1.0)
}

pub fn step_toward(
    current: Vec3,
    target: Vec3,
    mode: DragMode,
    settings: &PlacementSettings,
) -> Vec3 {
    match mode {
        DragMode::OnPlane => target,
        DragMode::OffPlane => {
            let offset = target - current;
            current + offset * smoothing_factor(offset.length(), settings)
        }
    }
}

/// Applies the pending per-frame pinch factor to `current_scale`, then resets the
/// factor to 1 so consecutive frames compose multiplicatively.
pub fn apply_pinch(
    session: &mut GestureSession,
    current_scale: f32,
    settings: &PlacementSettings,
) -> f32 {
    let factor = if session.pinch_scale.is_finite() && session.pinch_scale > 0.0 {
        session.pinch_scale
    } else {
        1.0
    };
    session.pinch_scale = 1.0;
    (current_scale * factor).clamp(settings.min_scale, settings.max_scale)
}

pub fn begin_rotation(session: &mut GestureSession, committed: f32) {
    session.accumulated_rotation = committed;
}

/// Working yaw for a rotate sample: the committed angle plus the damped raw rotation.
pub fn rotation_angle(
    session: &GestureSession,
    raw_rotation: f32,
    settings: &PlacementSettings,
) -> f32 {
    session.accumulated_rotation + raw_rotation * settings.rotation_damping
}

pub fn commit_rotation(session: &mut GestureSession, angle: f32) -> f32 {
    session.accumulated_rotation = angle;
    angle
}
