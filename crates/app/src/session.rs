use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use amazi_core::{
    parse_collection, AnchorId, AnchorUpdate, AssetGeometry, AssetSource, CameraPose, Catalog,
    DirectoryAssets, FrameUpdate, GestureEvent, InstanceId, PlacementController,
    PlacementEvent, PlacementSettings, PlaneCandidate, StaticAssets, Transform,
    DEFAULT_COLLECTIONS,
};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::logging::parse_level;

/// A recorded interaction: optional inline collections plus the ordered steps
/// to feed through the controller.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionScript {
    #[serde(default)]
    pub catalog: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub steps: Vec<SessionStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub(crate) enum SessionStep {
    Frame {
        position: Vec3,
        look_at: Vec3,
        #[serde(default = "default_viewport")]
        viewport: Vec2,
        #[serde(default)]
        dt: f32,
    },
    Anchor {
        update: AnchorUpdate,
    },
    Gesture {
        event: GestureEvent,
    },
    Confirm,
    Done,
    Add {
        collection: String,
        name: String,
        #[serde(default)]
        point: Option<Vec2>,
    },
    Remove {
        instance_id: u64,
    },
    Select {
        instance_id: u64,
    },
    Deselect,
}

fn default_viewport() -> Vec2 {
    Vec2::new(1170.0, 2532.0)
}

/// One line of driver output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum ReplayLine {
    Event(PlacementEvent),
    Rejected { step: usize, error: String },
}

#[derive(Debug, Default)]
pub(crate) struct SessionArgs {
    pub settings_path: Option<PathBuf>,
    pub catalog_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub session_path: Option<PathBuf>,
    pub log_level: Option<LevelFilter>,
}

pub(crate) fn parse_session_args(args: &[String]) -> Result<SessionArgs, String> {
    let mut parsed = SessionArgs::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--settings requires a path".to_string())?;
                parsed.settings_path = Some(PathBuf::from(value));
            }
            "--catalog-dir" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--catalog-dir requires a path".to_string())?;
                parsed.catalog_dir = Some(PathBuf::from(value));
            }
            "--assets" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--assets requires a path".to_string())?;
                parsed.assets_dir = Some(PathBuf::from(value));
            }
            "--session" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--session requires a path".to_string())?;
                parsed.session_path = Some(PathBuf::from(value));
            }
            "--log-level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--log-level requires a level".to_string())?;
                parsed.log_level = Some(parse_level(value)?);
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }

    Ok(parsed)
}

fn print_help() {
    println!(
        "Usage: amazi [options]\n  --settings <path>\n  --catalog-dir <dir>\n  --assets <dir>\n  --session <path>\n  --log-level <off|error|warn|info|debug|trace>"
    );
}

pub(crate) fn run_session(args: &SessionArgs) -> Result<(), String> {
    let settings = match &args.settings_path {
        Some(path) => PlacementSettings::load(path)?,
        None => PlacementSettings::default(),
    };
    let script = match &args.session_path {
        Some(path) => load_script(path)?,
        None => default_script(),
    };
    let catalog = build_catalog(args.catalog_dir.as_deref(), &script)?;
    let assets: Box<dyn AssetSource> = match &args.assets_dir {
        Some(dir) => Box::new(DirectoryAssets::new(dir)),
        None => Box::new(StaticAssets::with_fallback(AssetGeometry::unit_box())),
    };

    let mut controller = PlacementController::new(catalog, assets, settings);
    let lines = replay(&mut controller, &script.steps);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in &lines {
        let json = serde_json::to_string(line).map_err(|err| err.to_string())?;
        writeln!(out, "{json}").map_err(|err| err.to_string())?;
    }

    tracing::info!(
        "session: {} steps, {} output lines, final state {:?}, {} objects",
        script.steps.len(),
        lines.len(),
        controller.state(),
        controller.registry().len()
    );
    Ok(())
}

fn load_script(path: &Path) -> Result<SessionScript, String> {
    let data = std::fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
    serde_json::from_slice(&data).map_err(|err| format!("{}: {err}", path.display()))
}

/// Scans for a floor, confirms it and stops, so a bare run shows the state flow.
fn default_script() -> SessionScript {
    let anchor = AnchorUpdate::Added(PlaneCandidate {
        id: AnchorId(1),
        transform: Transform::IDENTITY,
        extent_width: 2.0,
        extent_height: 2.0,
    });
    let viewport = default_viewport();
    SessionScript {
        catalog: BTreeMap::new(),
        steps: vec![
            SessionStep::Frame {
                position: Vec3::new(0.0, 1.4, 1.5),
                look_at: Vec3::ZERO,
                viewport,
                dt: 0.0,
            },
            SessionStep::Anchor { update: anchor },
            SessionStep::Gesture {
                event: GestureEvent::Tap {
                    point: viewport * 0.5,
                },
            },
            SessionStep::Confirm,
        ],
    }
}

fn build_catalog(dir: Option<&Path>, script: &SessionScript) -> Result<Catalog, String> {
    let mut catalog = match dir {
        Some(dir) => {
            let (catalog, reports) = Catalog::load_dir(dir, &DEFAULT_COLLECTIONS);
            for report in reports.iter().filter(|report| report.error.is_some()) {
                tracing::warn!("catalog {}: not loaded", report.collection);
            }
            catalog
        }
        None => Catalog::with_default_collections(),
    };
    for (name, descriptor) in &script.catalog {
        let (collection, report) = parse_collection(name, &descriptor.to_string())
            .map_err(|err| format!("inline collection {name}: {err}"))?;
        tracing::debug!(
            "session: inline collection {name} with {} definitions",
            report.loaded
        );
        catalog.set_collection(collection);
    }
    Ok(catalog)
}

pub(crate) fn replay(
    controller: &mut PlacementController,
    steps: &[SessionStep],
) -> Vec<ReplayLine> {
    let mut lines = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        if let Err(error) = apply_step(controller, step) {
            tracing::warn!("session: step {index} rejected: {error}");
            lines.push(ReplayLine::Rejected { step: index, error });
        }
        lines.extend(controller.drain_events().into_iter().map(ReplayLine::Event));
    }
    lines
}

fn apply_step(controller: &mut PlacementController, step: &SessionStep) -> Result<(), String> {
    match step {
        SessionStep::Frame {
            position,
            look_at,
            viewport,
            dt,
        } => {
            let fov = controller.settings().camera_fov_deg;
            let forward = *look_at - *position;
            let camera = CameraPose::looking(*position, forward, Vec3::Y, fov, *viewport);
            controller.on_frame(FrameUpdate { camera, dt: *dt });
        }
        SessionStep::Anchor { update } => controller.on_anchor(update.clone()),
        SessionStep::Gesture { event } => controller.on_gesture(*event),
        SessionStep::Confirm => {
            controller.confirm();
        }
        SessionStep::Done => {
            controller.done();
        }
        SessionStep::Add {
            collection,
            name,
            point,
        } => {
            let result = match point {
                Some(point) => controller.add_object_at(collection, name, *point),
                None => controller.add_object(collection, name),
            };
            result.map_err(|err| err.to_string())?;
        }
        SessionStep::Remove { instance_id } => controller
            .remove_object(InstanceId(*instance_id))
            .map_err(|err| err.to_string())?,
        SessionStep::Select { instance_id } => controller
            .select(InstanceId(*instance_id))
            .map_err(|err| err.to_string())?,
        SessionStep::Deselect => {
            controller.deselect();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "catalog": {
            "Well": [
                {
                    "description": { "name": "Hand Pump", "price": "$120", "dimensions": "1m" },
                    "location": { "x": "0", "y": "0", "z": "0" }
                },
                {
                    "description": { "name": "No Location" }
                }
            ]
        },
        "steps": [
            { "step": "frame", "position": [0.0, 1.5, 3.0], "look_at": [0.0, 0.0, 0.0], "viewport": [800.0, 600.0] },
            { "step": "add", "collection": "Well", "name": "Hand Pump" },
            { "step": "anchor", "update": { "kind": "added", "id": 4, "transform": { "translation": [0.0, 0.0, 0.0] }, "extent_width": 4.0, "extent_height": 4.0 } },
            { "step": "gesture", "event": { "gesture": "tap", "point": [400.0, 300.0] } },
            { "step": "done" },
            { "step": "add", "collection": "Well", "name": "Hand Pump", "point": [400.0, 300.0] },
            { "step": "select", "instance_id": 1 },
            { "step": "frame", "position": [0.0, 1.5, 3.0], "look_at": [0.0, 0.0, 0.0], "viewport": [800.0, 600.0], "dt": 0.5 },
            { "step": "remove", "instance_id": 1 },
            { "step": "remove", "instance_id": 1 }
        ]
    }"#;

    fn controller_for(script: &SessionScript) -> PlacementController {
        let catalog = build_catalog(None, script).unwrap();
        PlacementController::new(
            catalog,
            Box::new(StaticAssets::with_fallback(AssetGeometry::unit_box())),
            PlacementSettings::default(),
        )
    }

    #[test]
    fn replays_script_and_reports_rejections() {
        let script: SessionScript = serde_json::from_str(SCRIPT).unwrap();
        let mut controller = controller_for(&script);
        assert_eq!(controller.catalog().collection("Well").unwrap().count(), 1);

        let lines = replay(&mut controller, &script.steps);
        let rejected: Vec<usize> = lines
            .iter()
            .filter_map(|line| match line {
                ReplayLine::Rejected { step, .. } => Some(*step),
                ReplayLine::Event(_) => None,
            })
            .collect();
        assert_eq!(rejected, vec![1, 9]);

        assert!(lines.iter().any(|line| matches!(
            line,
            ReplayLine::Event(PlacementEvent::PlacementCommitted { .. })
        )));
        assert!(matches!(
            lines.last(),
            Some(ReplayLine::Rejected { step: 9, .. })
        ));
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn lines_serialize_as_flat_json() {
        let line = ReplayLine::Rejected {
            step: 2,
            error: "no surface has been confirmed".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"step":2,"error":"no surface has been confirmed"}"#
        );
        let event = ReplayLine::Event(PlacementEvent::ObjectRemoved {
            instance_id: InstanceId(3),
        });
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"object_removed","instance_id":3}"#
        );
    }

    #[test]
    fn default_script_confirms_a_surface() {
        let script = default_script();
        let mut controller = controller_for(&script);
        let lines = replay(&mut controller, &script.steps);
        assert!(lines.iter().all(|line| matches!(line, ReplayLine::Event(_))));
        assert_eq!(controller.state(), amazi_core::InteractionState::Editing);
    }

    #[test]
    fn parses_driver_arguments() {
        let args: Vec<String> = ["amazi", "--session", "run.json", "--log-level", "debug"]
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        let parsed = parse_session_args(&args).unwrap();
        assert_eq!(parsed.session_path, Some(PathBuf::from("run.json")));
        assert_eq!(parsed.log_level, Some(LevelFilter::DEBUG));

        let missing = vec!["amazi".to_string(), "--settings".to_string()];
        assert!(parse_session_args(&missing).is_err());
    }
}
