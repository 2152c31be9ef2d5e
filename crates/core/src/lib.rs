mod assets;
mod catalog;
mod controller;
mod geometry;
mod gesture;
mod registry;
mod scene;
mod settings;
mod surface;
mod tracking;
mod transform;

pub use assets::{
    geometry_from_positions, load_obj_positions_bytes, AssetError, AssetGeometry, AssetSource,
    DirectoryAssets, StaticAssets,
};
pub use catalog::{
    parse_collection, parse_flat_descriptor, Catalog, CatalogError, CatalogLoadReport, Collection,
    ObjectDefinition, SkippedRecord, DEFAULT_COLLECTIONS,
};
pub use controller::{
    FrameUpdate, InteractionState, PlacementController, PlacementError, PlacementEvent,
};
pub use geometry::{ray_aabb, ray_plane, Aabb, CameraPose, Ray, Transform};
pub use gesture::{
    GestureEvent, GestureKind, GesturePhase, GestureSession, GestureTarget, PanSignal,
    ThresholdPan,
};
pub use hit_test::{hit_object, hit_surface, hit_test, Hit, HitEntity};
pub use registry::{InstanceId, PlacedObject, SceneRegistry};
pub use scene::scene_snapshot;
pub use settings::PlacementSettings;
pub use surface::{AnchorId, AnchorUpdate, PlaneCandidate, SurfaceAnchor, SurfaceTracker};
pub use tracking::{
    tracking_channel, TrackingBatch, TrackingReceiver, TrackingSender, TrackingUpdate,
};
pub use transform::{
    apply_pinch, begin_rotation, commit_rotation, resolve_drag_target, rotation_angle,
    smoothing_factor, step_toward, DragMode, DragState,
};
