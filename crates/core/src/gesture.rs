use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geometry::Transform;
use crate::registry::InstanceId;
use crate::settings::PlacementSettings;
use crate::surface::AnchorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
    Failed,
}

impl GesturePhase {
    pub fn is_active(self) -> bool {
        matches!(self, GesturePhase::Began | GesturePhase::Changed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Tap,
    Pan,
    Pinch,
    Rotate,
}

/// Raw recognizer output. `Pan::delta` is movement since the previous sample,
/// `Pinch::scale` is the factor since the previous sample and
/// `Rotate::rotation` is the cumulative angle (radians) since the gesture began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum GestureEvent {
    Tap {
        point: Vec2,
    },
    Pan {
        phase: GesturePhase,
        point: Vec2,
        delta: Vec2,
        #[serde(default = "default_touches")]
        touches: usize,
    },
    Pinch {
        phase: GesturePhase,
        point: Vec2,
        scale: f32,
    },
    Rotate {
        phase: GesturePhase,
        point: Vec2,
        rotation: f32,
    },
}

fn default_touches() -> usize {
    1
}

impl GestureEvent {
    pub fn kind(&self) -> GestureKind {
        match self {
            GestureEvent::Tap { .. } => GestureKind::Tap,
            GestureEvent::Pan { .. } => GestureKind::Pan,
            GestureEvent::Pinch { .. } => GestureKind::Pinch,
            GestureEvent::Rotate { .. } => GestureKind::Rotate,
        }
    }

    pub fn point(&self) -> Vec2 {
        match self {
            GestureEvent::Tap { point }
            | GestureEvent::Pan { point, .. }
            | GestureEvent::Pinch { point, .. }
            | GestureEvent::Rotate { point, .. } => *point,
        }
    }

    pub fn phase(&self) -> Option<GesturePhase> {
        match self {
            GestureEvent::Tap { .. } => None,
            GestureEvent::Pan { phase, .. }
            | GestureEvent::Pinch { phase, .. }
            | GestureEvent::Rotate { phase, .. } => Some(*phase),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanSignal {
    /// Still below the movement threshold.
    Pending,
    /// Threshold crossed on this sample; translation was reset to zero.
    Started,
    Moved(Vec2),
    Ended,
    Cancelled,
    /// Gesture finished without ever crossing the threshold.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdPan {
    translation: Vec2,
    threshold_exceeded: bool,
}

impl ThresholdPan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold_exceeded(&self) -> bool {
        self.threshold_exceeded
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    pub fn reset(&mut self) {
        self.translation = Vec2::ZERO;
        self.threshold_exceeded = false;
    }

    pub fn update(
        &mut self,
        phase: GesturePhase,
        delta: Vec2,
        touches: usize,
        settings: &PlacementSettings,
    ) -> PanSignal {
        if !phase.is_active() {
            let exceeded = self.threshold_exceeded;
            self.reset();
            return match (exceeded, phase) {
                (false, _) => PanSignal::Ignored,
                (true, GesturePhase::Ended) => PanSignal::Ended,
                (true, _) => PanSignal::Cancelled,
            };
        }
        if phase == GesturePhase::Began {
            self.reset();
        }

        self.translation += delta;
        if self.threshold_exceeded {
            return PanSignal::Moved(self.translation);
        }
        let threshold = settings.touch_threshold(touches);
        if self.translation.length() > threshold {
            self.threshold_exceeded = true;
            self.translation = Vec2::ZERO;
            return PanSignal::Started;
        }
        PanSignal::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureTarget {
    Object(InstanceId),
    Surface(AnchorId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureSession {
    pub kind: GestureKind,
    pub threshold_exceeded: bool,
    pub target: Option<GestureTarget>,
    pub origin_transform: Option<Transform>,
    /// Working yaw, seeded from the target's last committed rotation.
    pub accumulated_rotation: f32,
    pub pinch_scale: f32,
}

impl GestureSession {
    pub fn new(kind: GestureKind) -> Self {
        Self {
            kind,
            threshold_exceeded: false,
            target: None,
            origin_transform: None,
            accumulated_rotation: 0.0,
            pinch_scale: 1.0,
        }
    }

    pub fn begin(&mut self, target: GestureTarget, origin: Transform) {
        self.target = Some(target);
        self.origin_transform = Some(origin);
        self.pinch_scale = 1.0;
    }

    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }

    pub fn reset(&mut self) {
        self.threshold_exceeded = false;
        self.target = None;
        self.origin_transform = None;
        self.pinch_scale = 1.0;
    }
}
