// src/cwl/inputs.rs
//
// =============================================================================
// CTAPROD: INPUT DOCUMENTS & RESOLUTION
// =============================================================================
//
// Responsibilities:
// 1. Load the YAML/JSON input document bound to a tool.
// 2. Merge it against the tool's declared inputs (value > default > null).
// 3. Identify File-class values so they can be staged before binding.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::cwl::{InputType, ToolDescription};
use crate::error::{CwlError, ResolutionError};

/// `class` marker of a CWL File object.
pub const FILE_CLASS: &str = "File";

// ============================================================================
// 1. FILE VALUES
// ============================================================================

/// Returns the logical location of a File-class value.
/// `path` is accepted when `location` is absent.
pub fn file_location(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.get("class").and_then(Value::as_str) != Some(FILE_CLASS) {
        return None;
    }
    obj.get("location")
        .or_else(|| obj.get("path"))
        .and_then(Value::as_str)
}

/// Collects File locations from a value, descending into arrays.
fn collect_file_locations<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    if let Some(location) = file_location(value) {
        out.push(location);
    } else if let Some(items) = value.as_array() {
        for item in items {
            collect_file_locations(item, out);
        }
    }
}

// ============================================================================
// 2. INPUT DOCUMENT
// ============================================================================

/// Raw mapping from input id to provided value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDocument {
    values: BTreeMap<String, Value>,
}

impl InputDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CwlError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CwlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Parses YAML (and therefore JSON) text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, CwlError> {
        Self::parse(raw, Path::new("<inline>"))
    }

    fn parse(raw: &str, origin: &Path) -> Result<Self, CwlError> {
        let doc: Value = serde_yaml::from_str(raw).map_err(|source| CwlError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        match doc {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            _ => Err(CwlError::Invalid(format!(
                "input document {} must be a mapping",
                origin.display()
            ))),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, value: Value) {
        self.values.insert(id.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for InputDocument {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ============================================================================
// 3. RESOLVED INPUTS
// ============================================================================

/// Declared inputs with a concrete value. Nullable inputs left out of the
/// document are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputSet {
    values: BTreeMap<String, Value>,
}

impl ResolvedInputSet {
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Locations of every File value, including Files inside arrays.
    pub fn file_locations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for value in self.values.values() {
            collect_file_locations(value, &mut out);
        }
        out
    }
}

// ============================================================================
// 4. RESOLVER
// ============================================================================

pub struct InputResolver;

impl InputResolver {
    /// Merges `raw` against the inputs `tool` declares, in declared order.
    ///
    /// An explicit `null` in the document counts as absent. Keys the tool
    /// does not declare are dropped. No type checking happens here.
    pub fn resolve(
        tool: &ToolDescription,
        raw: &InputDocument,
    ) -> Result<ResolvedInputSet, ResolutionError> {
        let mut values = BTreeMap::new();

        for input in &tool.inputs {
            match (raw.get(&input.id), &input.ty) {
                (Some(value), _) if !value.is_null() => {
                    values.insert(input.id.clone(), value.clone());
                }
                (_, InputType::Defaulted(_, default)) => {
                    log::debug!("Input '{}' defaulted to {}", input.id, default);
                    values.insert(input.id.clone(), default.clone());
                }
                (_, InputType::Nullable(_)) => {}
                (_, InputType::Required(_)) => {
                    return Err(ResolutionError::MissingInput {
                        id: input.id.clone(),
                    });
                }
            }
        }

        for key in raw.keys() {
            if tool.input(key).is_none() {
                log::debug!("Ignoring undeclared input '{}'", key);
            }
        }

        Ok(ResolvedInputSet { values })
    }
}
