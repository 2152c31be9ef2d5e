use std::fmt;

use glam::{Quat, Vec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assets::{AssetError, AssetSource};
use crate::catalog::{Catalog, ObjectDefinition};
use crate::geometry::{CameraPose, Transform};
use crate::gesture::{
    GestureEvent, GestureKind, GesturePhase, GestureSession, GestureTarget, PanSignal,
    ThresholdPan,
};
use crate::hit_test::{hit_surface, hit_test, HitEntity};
use crate::registry::{InstanceId, SceneRegistry};
use crate::scene::scene_snapshot;
use crate::settings::PlacementSettings;
use crate::surface::{AnchorId, AnchorUpdate, SurfaceTracker};
use crate::tracking::TrackingReceiver;
use crate::transform::{
    apply_pinch, begin_rotation, commit_rotation, resolve_drag_target, rotation_angle,
    step_toward, DragState,
};

const MOVE_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Scanning,
    SurfaceConfirming,
    Editing,
    Highlighted,
}

impl InteractionState {
    pub fn catalog_enabled(self) -> bool {
        matches!(self, InteractionState::Editing | InteractionState::Highlighted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlacementEvent {
    StateChanged {
        from: InteractionState,
        to: InteractionState,
    },
    SurfaceConfirmed {
        anchor_id: AnchorId,
        world_transform: Transform,
    },
    SurfaceTransformUpdated {
        anchor_id: AnchorId,
        world_transform: Transform,
    },
    CatalogEnabled {
        collections: Vec<String>,
    },
    SelectionChanged {
        instance_id: InstanceId,
        definition_name: String,
        selected: bool,
    },
    PlacementCommitted {
        instance_id: InstanceId,
        world_transform: Transform,
    },
    ObjectTransformUpdated {
        instance_id: InstanceId,
        world_transform: Transform,
    },
    ObjectRemoved {
        instance_id: InstanceId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    NotEditing(InteractionState),
    NoSurface,
    NoCamera,
    NoHit,
    UnknownDefinition { collection: String, name: String },
    UnknownInstance(InstanceId),
    Asset(AssetError),
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::NotEditing(state) => {
                write!(f, "objects can only be placed while editing (state is {state:?})")
            }
            PlacementError::NoSurface => write!(f, "no surface has been confirmed"),
            PlacementError::NoCamera => write!(f, "no camera pose available"),
            PlacementError::NoHit => write!(f, "point does not hit the confirmed surface"),
            PlacementError::UnknownDefinition { collection, name } => {
                write!(f, "`{name}` is not in collection `{collection}`")
            }
            PlacementError::UnknownInstance(id) => write!(f, "no placed object {}", id.0),
            PlacementError::Asset(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlacementError {}

impl From<AssetError> for PlacementError {
    fn from(err: AssetError) -> Self {
        PlacementError::Asset(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub camera: CameraPose,
    #[serde(default)]
    pub dt: f32,
}

pub struct PlacementController {
    catalog: Catalog,
    assets: Box<dyn AssetSource>,
    settings: PlacementSettings,
    state: InteractionState,
    surfaces: SurfaceTracker,
    registry: SceneRegistry,
    camera: Option<CameraPose>,
    pan: ThresholdPan,
    pan_session: GestureSession,
    pinch_session: GestureSession,
    rotate_session: GestureSession,
    drag: Option<DragState>,
    surface_yaw: f32,
    events: Vec<PlacementEvent>,
}

impl PlacementController {
    pub fn new(
        catalog: Catalog,
        assets: Box<dyn AssetSource>,
        settings: PlacementSettings,
    ) -> Self {
        Self {
            catalog,
            assets,
            settings,
            state: InteractionState::Scanning,
            surfaces: SurfaceTracker::new(),
            registry: SceneRegistry::new(),
            camera: None,
            pan: ThresholdPan::new(),
            pan_session: GestureSession::new(GestureKind::Pan),
            pinch_session: GestureSession::new(GestureKind::Pinch),
            rotate_session: GestureSession::new(GestureKind::Rotate),
            drag: None,
            surface_yaw: 0.0,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn surfaces(&self) -> &SurfaceTracker {
        &self.surfaces
    }

    pub fn camera(&self) -> Option<&CameraPose> {
        self.camera.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn snapshot(&self) -> amazi_scene::SceneSnapshot {
        scene_snapshot(&self.registry, &self.surfaces)
    }

    pub fn drain_events(&mut self) -> Vec<PlacementEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn world_transform(&self, id: InstanceId) -> Option<Transform> {
        self.registry
            .get(id)
            .map(|object| object.world_transform(&self.surfaces))
    }

    /// Catalog entry backing a placed object, for the details panel.
    pub fn details(&self, id: InstanceId) -> Option<&ObjectDefinition> {
        let object = self.registry.get(id)?;
        self.catalog
            .find(&object.collection, &object.definition_name)
    }

    pub fn on_frame(&mut self, frame: FrameUpdate) {
        self.camera = Some(frame.camera);
        self.apply_tracked_drag();
        if self.state == InteractionState::Highlighted {
            let step = self.settings.idle_spin_speed * frame.dt.max(0.0);
            if let Some(object) = self
                .registry
                .selected()
                .and_then(|id| self.registry.get_mut(id))
            {
                object.idle_spin = (object.idle_spin + step).rem_euclid(std::f32::consts::TAU);
            }
        }
    }

    pub fn on_anchor(&mut self, update: AnchorUpdate) {
        if self.surfaces.apply(update) {
            self.emit_surface_update();
        }
    }

    /// Applies whatever the tracking thread has queued, never waiting for more.
    pub fn pump(&mut self, receiver: &TrackingReceiver) {
        let batch = receiver.poll();
        if batch.disconnected {
            warn!("controller: tracking feed disconnected");
        }
        for update in batch.anchors {
            self.on_anchor(update);
        }
        if let Some(camera) = batch.camera {
            self.camera = Some(camera);
            self.apply_tracked_drag();
        }
    }

    pub fn on_gesture(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::Tap { point } => self.handle_tap(point),
            GestureEvent::Pan {
                phase,
                point,
                delta,
                touches,
            } => self.handle_pan(phase, point, delta, touches),
            GestureEvent::Pinch {
                phase,
                point,
                scale,
            } => self.handle_pinch(phase, point, scale),
            GestureEvent::Rotate {
                phase,
                point,
                rotation,
            } => self.handle_rotate(phase, point, rotation),
        }
    }

    /// Freezes the confirmed surface and enables the catalog. Repeated calls are no-ops.
    pub fn confirm(&mut self) -> InteractionState {
        match self.state {
            InteractionState::Scanning => {
                debug!("controller: confirm ignored, no surface yet");
            }
            InteractionState::SurfaceConfirming => {
                self.cancel_surface_gestures();
                self.set_state(InteractionState::Editing);
                let collections = self
                    .catalog
                    .collections()
                    .iter()
                    .map(|collection| collection.name().to_string())
                    .collect();
                self.events
                    .push(PlacementEvent::CatalogEnabled { collections });
            }
            InteractionState::Editing | InteractionState::Highlighted => {
                debug!("controller: already editing");
            }
        }
        self.state
    }

    pub fn done(&mut self) -> InteractionState {
        if self.state == InteractionState::Highlighted {
            self.deselect();
            return self.state;
        }
        self.confirm()
    }

    pub fn select(&mut self, id: InstanceId) -> Result<(), PlacementError> {
        if !self.state.catalog_enabled() {
            return Err(PlacementError::NotEditing(self.state));
        }
        let previous = self
            .registry
            .select(id)
            .ok_or(PlacementError::UnknownInstance(id))?;
        if let Some(previous) = previous {
            self.emit_selection(previous, false);
        }
        if previous.is_some() || self.state != InteractionState::Highlighted {
            self.emit_selection(id, true);
        }
        self.set_state(InteractionState::Highlighted);
        Ok(())
    }

    pub fn deselect(&mut self) -> Option<InstanceId> {
        let id = self.registry.deselect()?;
        self.emit_selection(id, false);
        self.set_state(InteractionState::Editing);
        Some(id)
    }

    pub fn add_object(
        &mut self,
        collection: &str,
        name: &str,
    ) -> Result<InstanceId, PlacementError> {
        let (anchor_id, definition) = self.placement_inputs(collection, name)?;
        let id = self.instantiate(&definition, collection, anchor_id)?;
        self.emit_committed(id);
        Ok(id)
    }

    pub fn add_object_at(
        &mut self,
        collection: &str,
        name: &str,
        point: Vec2,
    ) -> Result<InstanceId, PlacementError> {
        let (anchor_id, definition) = self.placement_inputs(collection, name)?;
        let camera = self.camera.ok_or(PlacementError::NoCamera)?;
        let anchor = self.surfaces.confirmed().ok_or(PlacementError::NoSurface)?;
        let hit = hit_surface(point, &camera, anchor, self.settings.extent_limited_hits)
            .ok_or(PlacementError::NoHit)?;
        let id = self.instantiate(&definition, collection, anchor_id)?;
        if let Some(object) = self.registry.get_mut(id) {
            object.set_world_position(hit.world_point, &self.surfaces);
        }
        self.emit_committed(id);
        Ok(id)
    }

    pub fn remove_object(&mut self, id: InstanceId) -> Result<(), PlacementError> {
        if self.drag.is_some_and(|drag| drag.target == id) {
            self.drag = None;
            self.pan.reset();
            self.pan_session.reset();
        }
        for session in [&mut self.pinch_session, &mut self.rotate_session] {
            if session.target == Some(GestureTarget::Object(id)) {
                session.reset();
            }
        }
        let object = self
            .registry
            .remove(id)
            .ok_or(PlacementError::UnknownInstance(id))?;
        if object.selected {
            self.events.push(PlacementEvent::SelectionChanged {
                instance_id: id,
                definition_name: object.definition_name.clone(),
                selected: false,
            });
            self.set_state(InteractionState::Editing);
        }
        info!("controller: removed {} ({:?})", object.definition_name, id);
        self.events
            .push(PlacementEvent::ObjectRemoved { instance_id: id });
        Ok(())
    }

    fn placement_inputs(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<(AnchorId, ObjectDefinition), PlacementError> {
        if !self.state.catalog_enabled() {
            return Err(PlacementError::NotEditing(self.state));
        }
        let anchor = self.surfaces.confirmed().ok_or(PlacementError::NoSurface)?;
        let definition = self
            .catalog
            .find(collection, name)
            .cloned()
            .ok_or_else(|| PlacementError::UnknownDefinition {
                collection: collection.to_string(),
                name: name.to_string(),
            })?;
        Ok((anchor.id, definition))
    }

    fn instantiate(
        &mut self,
        definition: &ObjectDefinition,
        collection: &str,
        anchor_id: AnchorId,
    ) -> Result<InstanceId, PlacementError> {
        let id = self
            .registry
            .instantiate(definition, collection, self.assets.as_ref(), Some(anchor_id))
            .map_err(|err| {
                warn!("controller: failed to place {}: {err}", definition.name);
                PlacementError::from(err)
            })?;
        info!("controller: placed {} as {:?}", definition.name, id);
        Ok(id)
    }

    fn handle_tap(&mut self, point: Vec2) {
        let Some(camera) = self.camera else {
            debug!("controller: tap ignored, no camera pose");
            return;
        };
        let hit = hit_test(
            point,
            &camera,
            &self.surfaces,
            &self.registry,
            self.settings.extent_limited_hits,
        );
        let Some(hit) = hit else {
            return;
        };
        match (self.state, hit.entity) {
            (InteractionState::Scanning, HitEntity::Surface(anchor_id)) => {
                self.confirm_surface(anchor_id);
            }
            (
                InteractionState::Editing | InteractionState::Highlighted,
                HitEntity::Object(id),
            ) => {
                if self.registry.selected() == Some(id) {
                    self.deselect();
                } else {
                    let _ = self.select(id);
                }
            }
            _ => {}
        }
    }

    fn confirm_surface(&mut self, anchor_id: AnchorId) {
        let Some(anchor) = self.surfaces.confirm(anchor_id) else {
            return;
        };
        let world_transform = anchor.world_transform();
        self.events.push(PlacementEvent::SurfaceConfirmed {
            anchor_id,
            world_transform,
        });
        self.set_state(InteractionState::SurfaceConfirming);
    }

    fn handle_pan(&mut self, phase: GesturePhase, point: Vec2, delta: Vec2, touches: usize) {
        if !self.state.catalog_enabled() {
            self.pan.reset();
            self.pan_session.reset();
            return;
        }
        if phase == GesturePhase::Began {
            self.drag = None;
            self.pan_session.reset();
            if let Some(id) = self.object_at(point) {
                if let Some(object) = self.registry.get(id) {
                    self.pan_session
                        .begin(GestureTarget::Object(id), object.local);
                }
            }
        }

        let signal = self.pan.update(phase, delta, touches, &self.settings);
        self.pan_session.threshold_exceeded = self.pan.threshold_exceeded();
        match signal {
            PanSignal::Pending => {}
            PanSignal::Started => self.start_drag(),
            PanSignal::Moved(translation) => {
                if let Some(drag) = self.drag.as_mut() {
                    drag.translation = translation;
                }
                self.apply_tracked_drag();
            }
            PanSignal::Ended => self.finish_drag(true),
            PanSignal::Cancelled => self.finish_drag(false),
            PanSignal::Ignored => {
                self.drag = None;
                self.pan_session.reset();
            }
        }
    }

    fn start_drag(&mut self) {
        let Some(GestureTarget::Object(id)) = self.pan_session.target else {
            return;
        };
        let (Some(camera), Some(object)) = (self.camera, self.registry.get(id)) else {
            return;
        };
        let Some(origin_screen) = camera.project(object.world_position(&self.surfaces)) else {
            return;
        };
        debug!("controller: drag started on {:?}", id);
        self.drag = Some(DragState::new(id, origin_screen));
        self.apply_tracked_drag();
    }

    /// Moves the dragged object toward the point under its tracking position.
    /// Runs on every pan sample and on every frame, since the camera moves too.
    fn apply_tracked_drag(&mut self) {
        let Some(mut drag) = self.drag else {
            return;
        };
        let (Some(camera), Some(anchor)) = (self.camera, self.surfaces.confirmed()) else {
            return;
        };
        let Some((target, mode)) = resolve_drag_target(&drag, &camera, anchor) else {
            return;
        };
        drag.target_world = Some(target);
        drag.mode = mode;
        self.drag = Some(drag);

        let Some(object) = self.registry.get_mut(drag.target) else {
            self.drag = None;
            return;
        };
        let current = object.world_position(&self.surfaces);
        let next = step_toward(current, target, mode, &self.settings);
        if (next - current).length() <= MOVE_EPSILON {
            return;
        }
        object.set_world_position(next, &self.surfaces);
        self.emit_object_update(drag.target);
    }

    fn finish_drag(&mut self, commit: bool) {
        let drag = self.drag.take();
        let origin = self.pan_session.origin_transform;
        self.pan_session.reset();
        let Some(drag) = drag else {
            return;
        };
        if commit {
            // Smoothing stops with the gesture, so land on the release target.
            if let (Some(object), Some(target)) =
                (self.registry.get_mut(drag.target), drag.target_world)
            {
                let current = object.world_position(&self.surfaces);
                if (target - current).length() > MOVE_EPSILON {
                    object.set_world_position(target, &self.surfaces);
                    self.emit_object_update(drag.target);
                }
            }
            debug!("controller: drag committed on {:?}", drag.target);
            self.emit_committed(drag.target);
            return;
        }
        if let (Some(object), Some(origin)) = (self.registry.get_mut(drag.target), origin) {
            object.local.translation = origin.translation;
            self.emit_object_update(drag.target);
        }
    }

    fn gesture_target(&self, point: Vec2) -> Option<(GestureTarget, Transform)> {
        match self.state {
            InteractionState::SurfaceConfirming => {
                let anchor = self.surfaces.confirmed()?;
                Some((GestureTarget::Surface(anchor.id), anchor.adjustment))
            }
            InteractionState::Editing | InteractionState::Highlighted => {
                let id = self.registry.selected().or_else(|| self.object_at(point))?;
                let object = self.registry.get(id)?;
                Some((GestureTarget::Object(id), object.local))
            }
            InteractionState::Scanning => None,
        }
    }

    fn handle_pinch(&mut self, phase: GesturePhase, point: Vec2, scale: f32) {
        if phase == GesturePhase::Began {
            self.pinch_session.reset();
            if let Some((target, origin)) = self.gesture_target(point) {
                self.pinch_session.begin(target, origin);
            }
        }
        let Some(target) = self.pinch_session.target else {
            return;
        };

        match phase {
            GesturePhase::Began | GesturePhase::Changed | GesturePhase::Ended => {
                self.pinch_session.pinch_scale = scale;
                let current = self.target_scale(target);
                let next = apply_pinch(&mut self.pinch_session, current, &self.settings);
                self.set_target_scale(target, next);
                if phase == GesturePhase::Ended {
                    self.commit_target(target);
                    self.pinch_session.reset();
                }
            }
            GesturePhase::Cancelled | GesturePhase::Failed => {
                if let Some(origin) = self.pinch_session.origin_transform {
                    self.set_target_scale(target, origin.scale);
                }
                self.pinch_session.reset();
            }
        }
    }

    fn handle_rotate(&mut self, phase: GesturePhase, point: Vec2, rotation: f32) {
        if phase == GesturePhase::Began {
            self.rotate_session.reset();
            if let Some((target, origin)) = self.gesture_target(point) {
                self.rotate_session.begin(target, origin);
                let committed = self.target_yaw(target);
                begin_rotation(&mut self.rotate_session, committed);
            }
        }
        let Some(target) = self.rotate_session.target else {
            return;
        };

        match phase {
            GesturePhase::Began | GesturePhase::Changed | GesturePhase::Ended => {
                let angle = rotation_angle(&self.rotate_session, rotation, &self.settings);
                self.set_target_yaw(target, angle);
                if phase == GesturePhase::Ended {
                    commit_rotation(&mut self.rotate_session, angle);
                    self.commit_target(target);
                    self.rotate_session.reset();
                }
            }
            GesturePhase::Cancelled | GesturePhase::Failed => {
                let committed = self.rotate_session.accumulated_rotation;
                self.set_target_yaw(target, committed);
                self.rotate_session.reset();
            }
        }
    }

    fn cancel_surface_gestures(&mut self) {
        for session in [&mut self.pinch_session, &mut self.rotate_session] {
            if matches!(session.target, Some(GestureTarget::Surface(_))) {
                session.reset();
            }
        }
    }

    fn target_scale(&self, target: GestureTarget) -> f32 {
        match target {
            GestureTarget::Object(id) => self.registry.get(id).map_or(1.0, |o| o.local.scale),
            GestureTarget::Surface(_) => self
                .surfaces
                .confirmed()
                .map_or(1.0, |anchor| anchor.adjustment.scale),
        }
    }

    fn set_target_scale(&mut self, target: GestureTarget, scale: f32) {
        match target {
            GestureTarget::Object(id) => {
                if let Some(object) = self.registry.get_mut(id) {
                    object.local.scale = scale;
                    self.emit_object_update(id);
                }
            }
            GestureTarget::Surface(_) => {
                if let Some(anchor) = self.surfaces.confirmed_mut() {
                    anchor.adjustment.scale = scale;
                    self.emit_surface_update();
                }
            }
        }
    }

    fn target_yaw(&self, target: GestureTarget) -> f32 {
        match target {
            GestureTarget::Object(id) => self.registry.get(id).map_or(0.0, |o| o.yaw),
            GestureTarget::Surface(_) => self.surface_yaw,
        }
    }

    fn set_target_yaw(&mut self, target: GestureTarget, yaw: f32) {
        match target {
            GestureTarget::Object(id) => {
                if let Some(object) = self.registry.get_mut(id) {
                    object.set_yaw(yaw);
                    self.emit_object_update(id);
                }
            }
            GestureTarget::Surface(_) => {
                if let Some(anchor) = self.surfaces.confirmed_mut() {
                    anchor.adjustment.rotation = Quat::from_rotation_y(yaw);
                    self.surface_yaw = yaw;
                    self.emit_surface_update();
                }
            }
        }
    }

    fn commit_target(&mut self, target: GestureTarget) {
        match target {
            GestureTarget::Object(id) => self.emit_committed(id),
            GestureTarget::Surface(_) => self.emit_surface_update(),
        }
    }

    fn object_at(&self, point: Vec2) -> Option<InstanceId> {
        let camera = self.camera?;
        let hit = hit_test(
            point,
            &camera,
            &self.surfaces,
            &self.registry,
            self.settings.extent_limited_hits,
        )?;
        match hit.entity {
            HitEntity::Object(id) => Some(id),
            HitEntity::Surface(_) => None,
        }
    }

    fn set_state(&mut self, to: InteractionState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        info!("controller: {:?} -> {:?}", from, to);
        self.events.push(PlacementEvent::StateChanged { from, to });
    }

    fn emit_selection(&mut self, id: InstanceId, selected: bool) {
        let Some(object) = self.registry.get(id) else {
            return;
        };
        self.events.push(PlacementEvent::SelectionChanged {
            instance_id: id,
            definition_name: object.definition_name.clone(),
            selected,
        });
    }

    fn emit_committed(&mut self, id: InstanceId) {
        if let Some(world_transform) = self.world_transform(id) {
            self.events.push(PlacementEvent::PlacementCommitted {
                instance_id: id,
                world_transform,
            });
        }
    }

    fn emit_object_update(&mut self, id: InstanceId) {
        if let Some(world_transform) = self.world_transform(id) {
            self.events.push(PlacementEvent::ObjectTransformUpdated {
                instance_id: id,
                world_transform,
            });
        }
    }

    fn emit_surface_update(&mut self) {
        let Some(anchor) = self.surfaces.confirmed() else {
            return;
        };
        let anchor_id = anchor.id;
        self.events.push(PlacementEvent::SurfaceTransformUpdated {
            anchor_id,
            world_transform: anchor.world_transform(),
        });
        let attached: Vec<InstanceId> = self
            .registry
            .objects()
            .filter(|object| object.parent_anchor == Some(anchor_id))
            .map(|object| object.id)
            .collect();
        for id in attached {
            self.emit_object_update(id);
        }
    }
}
