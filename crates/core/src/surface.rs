use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::Transform;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAnchor {
    pub id: AnchorId,
    /// Pose reported by the tracking subsystem.
    pub tracked: Transform,
    /// User adjustment applied while the surface is being confirmed.
    pub adjustment: Transform,
    pub extent_width: f32,
    pub extent_height: f32,
    pub confirmed: bool,
}

impl SurfaceAnchor {
    pub fn new(id: AnchorId, tracked: Transform, extent_width: f32, extent_height: f32) -> Self {
        Self {
            id,
            tracked,
            adjustment: Transform::IDENTITY,
            extent_width,
            extent_height,
            confirmed: false,
        }
    }

    pub fn world_transform(&self) -> Transform {
        self.tracked * self.adjustment
    }

    /// Whether a point in the anchor's tracked frame lies inside the detected extent.
    pub fn within_extent(&self, local: glam::Vec3) -> bool {
        local.x.abs() <= self.extent_width * 0.5 && local.z.abs() <= self.extent_height * 0.5
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneCandidate {
    pub id: AnchorId,
    pub transform: Transform,
    pub extent_width: f32,
    pub extent_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorUpdate {
    Added(PlaneCandidate),
    Updated(PlaneCandidate),
    Removed { id: AnchorId },
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceTracker {
    anchors: BTreeMap<AnchorId, SurfaceAnchor>,
    confirmed: Option<AnchorId>,
}

impl SurfaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detection_enabled(&self) -> bool {
        self.confirmed.is_none()
    }

    pub fn anchors(&self) -> impl Iterator<Item = &SurfaceAnchor> {
        self.anchors.values()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &SurfaceAnchor> {
        self.anchors.values().filter(|anchor| !anchor.confirmed)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&SurfaceAnchor> {
        self.anchors.get(&id)
    }

    pub fn confirmed(&self) -> Option<&SurfaceAnchor> {
        self.confirmed.and_then(|id| self.anchors.get(&id))
    }

    pub fn confirmed_mut(&mut self) -> Option<&mut SurfaceAnchor> {
        let id = self.confirmed?;
        self.anchors.get_mut(&id)
    }

    /// Applies one tracking update. Returns true when the confirmed anchor moved.
    pub fn apply(&mut self, update: AnchorUpdate) -> bool {
        match update {
            AnchorUpdate::Added(candidate) => {
                if !self.detection_enabled() {
                    debug!("surface: ignoring new plane {:?}, detection disabled", candidate.id);
                    return false;
                }
                let anchor = SurfaceAnchor::new(
                    candidate.id,
                    candidate.transform,
                    candidate.extent_width,
                    candidate.extent_height,
                );
                self.anchors.insert(candidate.id, anchor);
                false
            }
            AnchorUpdate::Updated(candidate) => {
                if !self.detection_enabled() && Some(candidate.id) != self.confirmed {
                    return false;
                }
                let Some(anchor) = self.anchors.get_mut(&candidate.id) else {
                    return false;
                };
                anchor.tracked = candidate.transform;
                anchor.extent_width = candidate.extent_width;
                anchor.extent_height = candidate.extent_height;
                anchor.confirmed
            }
            AnchorUpdate::Removed { id } => {
                if Some(id) == self.confirmed {
                    debug!("surface: keeping confirmed anchor {:?} after removal", id);
                    return false;
                }
                self.anchors.remove(&id);
                false
            }
        }
    }

    /// Promotes a candidate to the session's surface. Only the first call succeeds.
    pub fn confirm(&mut self, id: AnchorId) -> Option<&SurfaceAnchor> {
        if self.confirmed.is_some() || !self.anchors.contains_key(&id) {
            return None;
        }
        self.anchors.retain(|anchor_id, _| *anchor_id == id);
        let anchor = self.anchors.get_mut(&id)?;
        anchor.confirmed = true;
        self.confirmed = Some(id);
        info!("surface: confirmed anchor {:?}", id);
        Some(&*anchor)
    }
}
