use std::fmt;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_COLLECTIONS: [&str; 3] = ["Well", "Drip", "Solar"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub name: String,
    pub price_label: String,
    pub dimensions_label: String,
    pub default_local_position: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub default_local_orientation: Vec3,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price_label: String::new(),
            dimensions_label: String::new(),
            default_local_position: Vec3::ZERO,
            default_local_orientation: Vec3::ZERO,
        }
    }

    pub fn default_rotation(&self) -> Quat {
        let euler = self.default_local_orientation;
        Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    MissingField(&'static str),
    InvalidNumber { field: String, value: String },
    MalformedRecord(String),
    DuplicateName(String),
    Descriptor(String),
    Io { path: PathBuf, message: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::MissingField(field) => write!(f, "missing field `{field}`"),
            CatalogError::InvalidNumber { field, value } => {
                write!(f, "field `{field}` is not a number: {value:?}")
            }
            CatalogError::MalformedRecord(message) => write!(f, "malformed record: {message}"),
            CatalogError::DuplicateName(name) => write!(f, "duplicate object name `{name}`"),
            CatalogError::Descriptor(message) => write!(f, "invalid descriptor: {message}"),
            CatalogError::Io { path, message } => {
                write!(f, "failed to read {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub index: usize,
    pub error: CatalogError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogLoadReport {
    pub collection: String,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub error: Option<CatalogError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    name: String,
    objects: Vec<ObjectDefinition>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[ObjectDefinition] {
        &self.objects
    }

    pub fn find(&self, name: &str) -> Option<&ObjectDefinition> {
        self.objects.iter().find(|def| def.name == name)
    }

    pub fn insert(&mut self, definition: ObjectDefinition) -> Result<(), CatalogError> {
        if self.find(&definition.name).is_some() {
            return Err(CatalogError::DuplicateName(definition.name));
        }
        self.objects.push(definition);
        Ok(())
    }

    pub fn replace(&mut self, definition: ObjectDefinition) -> bool {
        match self.objects.iter_mut().find(|def| def.name == definition.name) {
            Some(slot) => {
                *slot = definition;
                true
            }
            None => false,
        }
    }

    pub fn upsert(&mut self, definition: ObjectDefinition) {
        if let Err(CatalogError::DuplicateName(_)) = self.insert(definition.clone()) {
            self.replace(definition);
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.objects.iter().position(|def| def.name == name) else {
            return false;
        };
        self.objects.remove(index);
        true
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    description: Option<RawDescription>,
    location: Option<RawVector>,
    orientation: Option<RawVector>,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    name: Option<String>,
    price: Option<String>,
    dimensions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVector {
    x: Option<Value>,
    y: Option<Value>,
    z: Option<Value>,
}

fn parse_component(block: &str, axis: &str, value: Option<&Value>) -> Result<f32, CatalogError> {
    let invalid = |value: String| CatalogError::InvalidNumber {
        field: format!("{block}.{axis}"),
        value,
    };
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| invalid(number.to_string())),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(text.clone()))
        }
        Some(other) => Err(invalid(other.to_string())),
    }
}

fn parse_vector(block: &str, raw: &RawVector) -> Result<Vec3, CatalogError> {
    Ok(Vec3::new(
        parse_component(block, "x", raw.x.as_ref())?,
        parse_component(block, "y", raw.y.as_ref())?,
        parse_component(block, "z", raw.z.as_ref())?,
    ))
}

fn parse_record(value: Value) -> Result<ObjectDefinition, CatalogError> {
    let raw: RawRecord = serde_json::from_value(value)
        .map_err(|err| CatalogError::MalformedRecord(err.to_string()))?;
    let description = raw
        .description
        .ok_or(CatalogError::MissingField("description"))?;
    let name = description
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(CatalogError::MissingField("description.name"))?;
    let location = raw.location.ok_or(CatalogError::MissingField("location"))?;
    let position = parse_vector("location", &location)?;
    let orientation = match raw.orientation {
        Some(orientation) => parse_vector("orientation", &orientation)?,
        None => Vec3::ZERO,
    };
    Ok(ObjectDefinition {
        name,
        price_label: description.price.unwrap_or_default(),
        dimensions_label: description.dimensions.unwrap_or_default(),
        default_local_position: position,
        default_local_orientation: orientation,
    })
}

/// Parses one collection descriptor. Bad records are skipped and listed in the
/// report; only an unreadable document fails as a whole.
pub fn parse_collection(
    collection_name: &str,
    data: &str,
) -> Result<(Collection, CatalogLoadReport), CatalogError> {
    let document: Value =
        serde_json::from_str(data).map_err(|err| CatalogError::Descriptor(err.to_string()))?;
    match document {
        Value::Array(records) => Ok(parse_structured(collection_name, records)),
        Value::Object(_) => parse_flat_descriptor(collection_name, document),
        other => Err(CatalogError::Descriptor(format!(
            "expected an array of records, found {other}"
        ))),
    }
}

fn parse_structured(collection_name: &str, records: Vec<Value>) -> (Collection, CatalogLoadReport) {
    let mut collection = Collection::new(collection_name);
    let mut report = CatalogLoadReport {
        collection: collection_name.to_string(),
        ..Default::default()
    };
    for (index, record) in records.into_iter().enumerate() {
        let result = parse_record(record).and_then(|def| collection.insert(def));
        if let Err(error) = result {
            warn!("catalog {collection_name}: skipping record {index}: {error}");
            report.skipped.push(SkippedRecord { index, error });
        }
    }
    report.loaded = collection.count();
    (collection, report)
}

/// Legacy `name -> price` dictionary form. Every entry gets placeholder
/// zero coordinates.
pub fn parse_flat_descriptor(
    collection_name: &str,
    document: Value,
) -> Result<(Collection, CatalogLoadReport), CatalogError> {
    let Value::Object(entries) = document else {
        return Err(CatalogError::Descriptor(
            "flat descriptor must be an object".to_string(),
        ));
    };
    warn!("catalog {collection_name}: using deprecated flat descriptor format");
    let mut collection = Collection::new(collection_name);
    let mut report = CatalogLoadReport {
        collection: collection_name.to_string(),
        ..Default::default()
    };
    for (index, (name, price)) in entries.into_iter().enumerate() {
        let name = name.trim().to_string();
        if name.is_empty() {
            report.skipped.push(SkippedRecord {
                index,
                error: CatalogError::MissingField("name"),
            });
            continue;
        }
        let mut definition = ObjectDefinition::new(name);
        definition.price_label = match price {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        if let Err(error) = collection.insert(definition) {
            report.skipped.push(SkippedRecord { index, error });
        }
    }
    report.loaded = collection.count();
    Ok((collection, report))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    collections: Vec<Collection>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_collections() -> Self {
        Self {
            collections: DEFAULT_COLLECTIONS
                .iter()
                .map(|name| Collection::new(*name))
                .collect(),
        }
    }

    /// Reads `<dir>/<name>.json` for each collection name. A missing or broken
    /// file yields an empty collection and a report entry instead of an error.
    pub fn load_dir(dir: &Path, names: &[&str]) -> (Self, Vec<CatalogLoadReport>) {
        let mut catalog = Catalog::new();
        let mut reports = Vec::new();
        for name in names {
            let path = dir.join(format!("{name}.json"));
            let loaded = std::fs::read_to_string(&path)
                .map_err(|err| CatalogError::Io {
                    path: path.clone(),
                    message: err.to_string(),
                })
                .and_then(|data| parse_collection(name, &data));
            match loaded {
                Ok((collection, report)) => {
                    info!(
                        "catalog {name}: loaded {} definitions ({} skipped)",
                        report.loaded,
                        report.skipped.len()
                    );
                    catalog.set_collection(collection);
                    reports.push(report);
                }
                Err(error) => {
                    warn!("catalog {name}: {error}");
                    catalog.set_collection(Collection::new(*name));
                    reports.push(CatalogLoadReport {
                        collection: name.to_string(),
                        error: Some(error),
                        ..Default::default()
                    });
                }
            }
        }
        (catalog, reports)
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name() == name)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.name() == name)
    }

    pub fn set_collection(&mut self, collection: Collection) {
        match self
            .collections
            .iter_mut()
            .find(|existing| existing.name() == collection.name())
        {
            Some(slot) => {
                debug!("catalog: replacing collection {}", collection.name());
                *slot = collection;
            }
            None => self.collections.push(collection),
        }
    }

    pub fn find(&self, collection: &str, name: &str) -> Option<&ObjectDefinition> {
        self.collection(collection)?.find(name)
    }

    pub fn definition(&self, name: &str) -> Option<(&Collection, &ObjectDefinition)> {
        self.collections
            .iter()
            .find_map(|collection| collection.find(name).map(|def| (collection, def)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUMPS: &str = r#"[
        {
            "description": { "name": "Hand Pump", "price": "$120", "dimensions": "1m x 0.3m" },
            "location": { "x": "0.1", "y": "0", "z": "-0.2" },
            "orientation": { "x": "0", "y": "1.5707964", "z": "0" }
        },
        {
            "description": { "name": "Borehole", "price": "$900", "dimensions": "3m" },
            "orientation": { "x": "0", "y": "0", "z": "0" }
        },
        {
            "description": { "name": "Tank", "price": "$300" },
            "location": { "x": 0.5, "y": "0.0", "z": "0.25" }
        }
    ]"#;

    #[test]
    fn skips_record_without_location() {
        let (collection, report) = parse_collection("Well", PUMPS).unwrap();
        assert_eq!(collection.count(), 2);
        assert_eq!(collection.objects()[0].name, "Hand Pump");
        assert_eq!(collection.objects()[1].name, "Tank");
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].error, CatalogError::MissingField("location"));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let (collection, _) = parse_collection("Well", PUMPS).unwrap();
        let tank = collection.find("Tank").unwrap();
        assert_eq!(tank.dimensions_label, "");
        assert_eq!(tank.default_local_orientation, Vec3::ZERO);
        assert_eq!(tank.default_local_position, Vec3::new(0.5, 0.0, 0.25));
        let pump = collection.find("Hand Pump").unwrap();
        assert!((pump.default_local_orientation.y - std::f32::consts::FRAC_PI_2).abs() < 1.0e-6);
    }

    #[test]
    fn bad_number_rejects_only_that_record() {
        let data = r#"[
            { "description": { "name": "A" }, "location": { "x": "abc", "y": "0", "z": "0" } },
            { "description": { "name": "B" }, "location": { "x": "1", "y": "2", "z": "3" } },
            42
        ]"#;
        let (collection, report) = parse_collection("Drip", data).unwrap();
        assert_eq!(collection.count(), 1);
        assert_eq!(collection.objects()[0].default_local_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(
            report.skipped[0].error,
            CatalogError::InvalidNumber { .. }
        ));
        assert!(matches!(
            report.skipped[1].error,
            CatalogError::MalformedRecord(_)
        ));
    }

    #[test]
    fn duplicate_names_keep_the_first_record() {
        let data = r#"[
            { "description": { "name": "Pipe", "price": "1" }, "location": {} },
            { "description": { "name": "Pipe", "price": "2" }, "location": {} }
        ]"#;
        let (collection, report) = parse_collection("Drip", data).unwrap();
        assert_eq!(collection.count(), 1);
        assert_eq!(collection.find("Pipe").unwrap().price_label, "1");
        assert_eq!(
            report.skipped[0].error,
            CatalogError::DuplicateName("Pipe".to_string())
        );
    }

    #[test]
    fn flat_descriptor_gets_placeholder_coordinates() {
        let data = r#"{ "Panel": "$50", "Inverter": "$80" }"#;
        let (collection, report) = parse_collection("Solar", data).unwrap();
        assert_eq!(collection.count(), 2);
        assert!(report.skipped.is_empty());
        let names: Vec<&str> = collection
            .objects()
            .iter()
            .map(|definition| definition.name.as_str())
            .collect();
        assert_eq!(names, ["Panel", "Inverter"]);
        let panel = collection.find("Panel").unwrap();
        assert_eq!(panel.price_label, "$50");
        assert_eq!(panel.default_local_position, Vec3::ZERO);
    }

    #[test]
    fn unreadable_document_is_an_error() {
        assert!(matches!(
            parse_collection("Well", "not json"),
            Err(CatalogError::Descriptor(_))
        ));
        assert!(matches!(
            parse_collection("Well", "12"),
            Err(CatalogError::Descriptor(_))
        ));
    }

    #[test]
    fn collection_edits_keep_count_in_sync() {
        let mut collection = Collection::new("Drip");
        collection.insert(ObjectDefinition::new("Emitter")).unwrap();
        collection.insert(ObjectDefinition::new("Valve")).unwrap();
        assert_eq!(collection.count(), 2);

        let err = collection.insert(ObjectDefinition::new("Valve")).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("Valve".to_string()));
        assert_eq!(collection.count(), 2);

        let mut valve = ObjectDefinition::new("Valve");
        valve.price_label = "$4".to_string();
        assert!(collection.replace(valve));
        assert_eq!(collection.find("Valve").unwrap().price_label, "$4");
        assert!(!collection.replace(ObjectDefinition::new("Filter")));

        collection.upsert(ObjectDefinition::new("Filter"));
        assert_eq!(collection.count(), 3);

        assert!(collection.remove("Emitter"));
        assert!(!collection.remove("Emitter"));
        assert_eq!(collection.count(), collection.objects().len());
        assert_eq!(collection.count(), 2);

        collection.set_name("Drip Kit");
        assert_eq!(collection.name(), "Drip Kit");
    }

    #[test]
    fn load_dir_tolerates_missing_files() {
        let dir = std::env::temp_dir().join(format!("amazi-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Well.json"), PUMPS).unwrap();

        let (catalog, reports) = Catalog::load_dir(&dir, &DEFAULT_COLLECTIONS);
        assert_eq!(catalog.collections().len(), 3);
        assert_eq!(catalog.collection("Well").unwrap().count(), 2);
        assert!(catalog.collection("Drip").unwrap().is_empty());
        assert!(reports[1].error.is_some());
        assert_eq!(catalog.definition("Tank").map(|(c, _)| c.name()), Some("Well"));
        assert!(catalog.find("Solar", "Tank").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
