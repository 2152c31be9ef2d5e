use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub single_touch_threshold: f32,
    pub multi_touch_threshold: f32,
    pub rotation_damping: f32,
    pub smoothing_distance: f32,
    pub min_smoothing: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub idle_spin_speed: f32,
    pub extent_limited_hits: bool,
    pub camera_fov_deg: f32,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            single_touch_threshold: 30.0,
            multi_touch_threshold: 60.0,
            rotation_damping: 1.0,
            smoothing_distance: 0.1,
            min_smoothing: 0.1,
            min_scale: 0.05,
            max_scale: 20.0,
            idle_spin_speed: 0.5,
            extent_limited_hits: true,
            camera_fov_deg: 60.0,
        }
    }
}

impl PlacementSettings {
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read settings {}: {err}", path.display()))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        let settings: Self =
            serde_json::from_str(data).map_err(|err| format!("invalid settings: {err}"))?;
        Ok(settings.sanitized())
    }

    pub fn touch_threshold(&self, touches: usize) -> f32 {
        if touches <= 1 {
            self.single_touch_threshold
        } else {
            self.multi_touch_threshold
        }
    }

    fn sanitized(mut self) -> Self {
        self.single_touch_threshold = self.single_touch_threshold.max(0.0);
        self.multi_touch_threshold = self.multi_touch_threshold.max(0.0);
        self.smoothing_distance = self.smoothing_distance.max(1.0e-4);
        self.min_smoothing = self.min_smoothing.clamp(1.0e-3, 1.0);
        self.min_scale = self.min_scale.max(1.0e-4);
        if self.max_scale < self.min_scale {
            self.max_scale = self.min_scale;
        }
        self
    }
}
