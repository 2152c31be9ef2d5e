use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::geometry::Aabb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetGeometry {
    pub bounds: Aabb,
    pub vertex_count: usize,
}

impl AssetGeometry {
    pub fn unit_box() -> Self {
        Self {
            bounds: Aabb::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5)),
            vertex_count: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetError {
    NotFound(String),
    Load { name: String, message: String },
    Empty(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound(name) => write!(f, "asset `{name}` not found"),
            AssetError::Load { name, message } => {
                write!(f, "asset `{name}` failed to load: {message}")
            }
            AssetError::Empty(name) => write!(f, "asset `{name}` has no geometry"),
        }
    }
}

impl std::error::Error for AssetError {}

/// Resolves an object definition's name to the geometry used for hit-testing.
pub trait AssetSource {
    fn load(&self, name: &str) -> Result<AssetGeometry, AssetError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticAssets {
    entries: HashMap<String, AssetGeometry>,
    fallback: Option<AssetGeometry>,
}

impl StaticAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: AssetGeometry) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, geometry: AssetGeometry) {
        self.entries.insert(name.into(), geometry);
    }
}

impl AssetSource for StaticAssets {
    fn load(&self, name: &str) -> Result<AssetGeometry, AssetError> {
        self.entries
            .get(name)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        ["obj", "glb", "gltf"]
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl AssetSource for DirectoryAssets {
    fn load(&self, name: &str) -> Result<AssetGeometry, AssetError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))?;
        let positions = match path.extension().and_then(|ext| ext.to_str()) {
            Some("obj") => load_obj_positions(&path),
            _ => load_gltf_positions(&path),
        }
        .map_err(|message| AssetError::Load {
            name: name.to_string(),
            message,
        })?;
        geometry_from_positions(name, &positions)
    }
}

pub fn geometry_from_positions(
    name: &str,
    positions: &[Vec3],
) -> Result<AssetGeometry, AssetError> {
    let bounds = Aabb::from_points(positions.iter().copied())
        .ok_or_else(|| AssetError::Empty(name.to_string()))?;
    Ok(AssetGeometry {
        bounds,
        vertex_count: positions.len(),
    })
}

fn load_obj_positions(path: &Path) -> Result<Vec<Vec3>, String> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _) =
        tobj::load_obj(path, &options).map_err(|err| format!("OBJ load failed: {err}"))?;
    obj_positions(models)
}

pub fn load_obj_positions_bytes(data: &[u8]) -> Result<Vec<Vec3>, String> {
    use std::io::{BufReader, Cursor};

    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let mut reader = BufReader::new(Cursor::new(data));
    let (models, _) = tobj::load_obj_buf(&mut reader, &options, |_path| {
        Ok((Vec::new(), Default::default()))
    })
    .map_err(|err| format!("OBJ load failed: {err}"))?;
    obj_positions(models)
}

fn obj_positions(models: Vec<tobj::Model>) -> Result<Vec<Vec3>, String> {
    let mut positions = Vec::new();
    for model in models {
        let mesh = &model.mesh;
        if mesh.positions.len() % 3 != 0 {
            return Err("OBJ has malformed positions".to_string());
        }
        positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|v| Vec3::new(v[0], v[1], v[2])),
        );
    }
    Ok(positions)
}

fn load_gltf_positions(path: &Path) -> Result<Vec<Vec3>, String> {
    let (document, buffers, _) =
        gltf::import(path).map_err(|err| format!("glTF load failed: {err}"))?;
    let mut positions = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive
                .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            if let Some(iter) = reader.read_positions() {
                positions.extend(iter.map(Vec3::from));
            }
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v -1 0 0\nv 1 0 0\nv 0 2 0.5\nf 1 2 3\n";

    #[test]
    fn obj_bytes_produce_bounds() {
        let positions = load_obj_positions_bytes(TRIANGLE.as_bytes()).unwrap();
        let geometry = geometry_from_positions("tri", &positions).unwrap();
        assert_eq!(geometry.vertex_count, 3);
        assert_eq!(geometry.bounds.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(geometry.bounds.max, Vec3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn empty_geometry_is_an_error() {
        assert_eq!(
            geometry_from_positions("none", &[]),
            Err(AssetError::Empty("none".to_string()))
        );
    }

    #[test]
    fn directory_assets_load_obj_files() {
        let dir = std::env::temp_dir().join(format!("amazi-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Pump.obj"), TRIANGLE).unwrap();

        let assets = DirectoryAssets::new(&dir);
        let geometry = assets.load("Pump").unwrap();
        assert_eq!(geometry.vertex_count, 3);
        assert_eq!(
            assets.load("Missing"),
            Err(AssetError::NotFound("Missing".to_string()))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn static_assets_fall_back() {
        let mut assets = StaticAssets::new();
        assets.insert("Tank", AssetGeometry::unit_box());
        assert!(assets.load("Tank").is_ok());
        assert!(assets.load("Pump").is_err());

        let assets = StaticAssets::with_fallback(AssetGeometry::unit_box());
        assert_eq!(assets.load("Pump").unwrap().vertex_count, 8);
    }
}
