use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::geometry::CameraPose;
use crate::surface::AnchorUpdate;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingUpdate {
    Camera(CameraPose),
    Anchor(AnchorUpdate),
}

#[derive(Debug, Clone)]
pub struct TrackingSender {
    tx: Sender<TrackingUpdate>,
}

impl TrackingSender {
    /// Returns false once the receiving side is gone.
    pub fn send_camera(&self, pose: CameraPose) -> bool {
        self.tx.send(TrackingUpdate::Camera(pose)).is_ok()
    }

    pub fn send_anchor(&self, update: AnchorUpdate) -> bool {
        self.tx.send(TrackingUpdate::Anchor(update)).is_ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingBatch {
    pub camera: Option<CameraPose>,
    pub anchors: Vec<AnchorUpdate>,
    pub disconnected: bool,
}

#[derive(Debug)]
pub struct TrackingReceiver {
    rx: Receiver<TrackingUpdate>,
}

impl TrackingReceiver {
    /// Drains everything queued so far without blocking. Anchor updates keep
    /// their arrival order; only the newest camera pose is kept.
    pub fn poll(&self) -> TrackingBatch {
        let mut batch = TrackingBatch::default();
        loop {
            match self.rx.try_recv() {
                Ok(TrackingUpdate::Camera(pose)) => batch.camera = Some(pose),
                Ok(TrackingUpdate::Anchor(update)) => batch.anchors.push(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    batch.disconnected = true;
                    break;
                }
            }
        }
        batch
    }
}

pub fn tracking_channel() -> (TrackingSender, TrackingReceiver) {
    let (tx, rx) = mpsc::channel();
    (TrackingSender { tx }, TrackingReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Transform;
    use crate::surface::{AnchorId, PlaneCandidate};
    use glam::{Quat, Vec2, Vec3};

    fn pose(z: f32) -> CameraPose {
        CameraPose::new(Vec3::new(0.0, 1.0, z), Quat::IDENTITY, 60.0, Vec2::new(100.0, 100.0))
    }

    #[test]
    fn poll_keeps_latest_pose_and_all_anchors() {
        let (tx, rx) = tracking_channel();
        assert_eq!(rx.poll(), TrackingBatch::default());

        let sender = tx.clone();
        let handle = std::thread::spawn(move || {
            sender.send_camera(pose(1.0));
            sender.send_anchor(AnchorUpdate::Added(PlaneCandidate {
                id: AnchorId(1),
                transform: Transform::IDENTITY,
                extent_width: 1.0,
                extent_height: 1.0,
            }));
            sender.send_camera(pose(2.0));
            sender.send_anchor(AnchorUpdate::Removed { id: AnchorId(1) });
        });
        handle.join().unwrap();

        let batch = rx.poll();
        assert_eq!(batch.camera, Some(pose(2.0)));
        assert_eq!(batch.anchors.len(), 2);
        assert!(matches!(batch.anchors[1], AnchorUpdate::Removed { .. }));
        assert!(!batch.disconnected);

        drop(tx);
        assert!(rx.poll().disconnected);
    }
}
