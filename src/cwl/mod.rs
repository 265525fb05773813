//! CWL `CommandLineTool` subset.
//!
//! # Scope
//! Only what is needed to turn one tool description plus one input document
//! into one command line: `baseCommand`, literal `arguments`, and the
//! declared `inputs` with their types, defaults and `inputBinding`s.
//! Requirements, outputs, scatter and JavaScript expressions are not read.
//!
//! Declared types are folded into [`InputType`] at load time so the resolver
//! never has to inspect raw type unions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use crate::error::CwlError;

pub mod command_line;
pub mod inputs;
pub mod quote;
pub mod staging;

pub use command_line::CommandLineSynthesizer;
pub use inputs::{InputDocument, InputResolver, ResolvedInputSet};
pub use staging::{FakeFileStager, StagedFiles};

/// The only CWL document class this loader accepts.
pub const COMMAND_LINE_TOOL: &str = "CommandLineTool";

// =============================================================================
// Types
// =============================================================================

/// A CWL type expression after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum CwlType {
    Null,
    Any,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    File,
    Directory,
    Array(Box<CwlType>),
    Enum(Vec<String>),
    Union(Vec<CwlType>),
}

impl CwlType {
    fn from_name(name: &str) -> Result<Self, CwlError> {
        Ok(match name {
            "null" => CwlType::Null,
            "Any" => CwlType::Any,
            "boolean" => CwlType::Boolean,
            "int" => CwlType::Int,
            "long" => CwlType::Long,
            "float" => CwlType::Float,
            "double" => CwlType::Double,
            "string" => CwlType::String,
            "File" => CwlType::File,
            "Directory" => CwlType::Directory,
            other => return Err(CwlError::Unsupported(format!("type '{other}'"))),
        })
    }

    /// Parses a type expression: a name (with optional `[]` / `?` suffix),
    /// a union list, or an `array` / `enum` schema.
    pub fn parse(expr: &YamlValue) -> Result<Self, CwlError> {
        match expr {
            YamlValue::String(s) => {
                if let Some(inner) = s.strip_suffix('?') {
                    let inner = CwlType::parse(&YamlValue::String(inner.to_string()))?;
                    Ok(CwlType::Union(vec![CwlType::Null, inner]))
                } else if let Some(items) = s.strip_suffix("[]") {
                    Ok(CwlType::Array(Box::new(CwlType::from_name(items)?)))
                } else {
                    CwlType::from_name(s)
                }
            }
            YamlValue::Sequence(alts) => {
                let mut parsed = alts
                    .iter()
                    .map(CwlType::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                match parsed.len() {
                    0 => Err(CwlError::Invalid("empty type union".into())),
                    1 => Ok(parsed.remove(0)),
                    _ => Ok(CwlType::Union(parsed)),
                }
            }
            YamlValue::Mapping(map) => {
                let kind = map.get("type").and_then(|v| v.as_str()).unwrap_or_default();
                match kind {
                    "array" => {
                        let items = map
                            .get("items")
                            .ok_or_else(|| CwlError::Invalid("array type without 'items'".into()))?;
                        Ok(CwlType::Array(Box::new(CwlType::parse(items)?)))
                    }
                    "enum" => {
                        let symbols = map
                            .get("symbols")
                            .and_then(|v| v.as_sequence())
                            .ok_or_else(|| CwlError::Invalid("enum type without 'symbols'".into()))?
                            .iter()
                            .filter_map(|s| s.as_str())
                            .map(|s| s.rsplit(['/', '#']).next().unwrap_or(s).to_string())
                            .collect();
                        Ok(CwlType::Enum(symbols))
                    }
                    other => Err(CwlError::Unsupported(format!("type schema '{other}'"))),
                }
            }
            other => Err(CwlError::Invalid(format!("malformed type expression: {other:?}"))),
        }
    }
}

/// How an input behaves when the input document leaves it out.
#[derive(Debug, Clone, PartialEq)]
pub enum InputType {
    /// No default, not nullable: absence is an error.
    Required(CwlType),
    /// First union alternative is `null`: absence means "no value".
    Nullable(CwlType),
    /// The tool declares a default that fills in for absence.
    Defaulted(CwlType, Value),
}

impl InputType {
    /// Folds a parsed type and an optional default into the resolution rule.
    /// A default wins over nullability; only a leading `null` makes an input
    /// nullable.
    pub fn classify(ty: CwlType, default: Option<Value>) -> Self {
        if let Some(default) = default {
            return InputType::Defaulted(ty, default);
        }
        match ty {
            CwlType::Null => InputType::Nullable(CwlType::Null),
            CwlType::Union(mut alts) if alts.first() == Some(&CwlType::Null) => {
                alts.remove(0);
                let rest = if alts.len() == 1 {
                    alts.remove(0)
                } else {
                    CwlType::Union(alts)
                };
                InputType::Nullable(rest)
            }
            other => InputType::Required(other),
        }
    }

    pub fn cwl_type(&self) -> &CwlType {
        match self {
            InputType::Required(t) | InputType::Nullable(t) | InputType::Defaulted(t, _) => t,
        }
    }
}

/// Command-line placement of an input or argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBinding {
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_separate")]
    pub separate: bool,
    #[serde(default)]
    pub item_separator: Option<String>,
    #[serde(default)]
    pub value_from: Option<String>,
}

fn default_separate() -> bool {
    true
}

impl Default for InputBinding {
    fn default() -> Self {
        Self {
            position: 0,
            prefix: None,
            separate: true,
            item_separator: None,
            value_from: None,
        }
    }
}

/// One declared tool input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameter {
    pub id: String,
    pub ty: InputType,
    pub binding: Option<InputBinding>,
}

/// One entry of the tool's `arguments` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub binding: InputBinding,
}

/// A loaded `CommandLineTool`. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub id: Option<String>,
    pub label: Option<String>,
    pub base_command: Vec<String>,
    pub arguments: Vec<Argument>,
    pub inputs: Vec<InputParameter>,
}

// =============================================================================
// Raw document shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTool {
    class: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    base_command: Option<StringOrList>,
    #[serde(default)]
    arguments: Vec<RawArgument>,
    #[serde(default)]
    inputs: YamlValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArgument {
    Literal(String),
    Binding(InputBinding),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInput {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    ty: YamlValue,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    input_binding: Option<InputBinding>,
}

// =============================================================================
// Public API
// =============================================================================

impl ToolDescription {
    /// Loads and validates a tool description file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CwlError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CwlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tool = Self::parse(&raw, path)?;
        log::debug!(
            "Loaded CWL tool {} ({} inputs)",
            path.display(),
            tool.inputs.len()
        );
        Ok(tool)
    }

    /// Parses a tool description held in memory.
    pub fn from_yaml_str(raw: &str) -> Result<Self, CwlError> {
        Self::parse(raw, Path::new("<inline>"))
    }

    fn parse(raw: &str, origin: &Path) -> Result<Self, CwlError> {
        let doc: RawTool = serde_yaml::from_str(raw).map_err(|source| CwlError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        if doc.class != COMMAND_LINE_TOOL {
            return Err(CwlError::Invalid(format!(
                "expected class {COMMAND_LINE_TOOL}, found '{}'",
                doc.class
            )));
        }

        let base_command = match doc.base_command {
            None => Vec::new(),
            Some(StringOrList::One(cmd)) => vec![cmd],
            Some(StringOrList::Many(cmds)) => cmds,
        };

        let arguments = doc
            .arguments
            .into_iter()
            .map(|arg| match arg {
                RawArgument::Literal(value) => Argument {
                    binding: InputBinding {
                        value_from: Some(value),
                        ..Default::default()
                    },
                },
                RawArgument::Binding(binding) => Argument { binding },
            })
            .collect::<Vec<_>>();

        if base_command.is_empty() && arguments.is_empty() {
            return Err(CwlError::Invalid(
                "tool declares neither baseCommand nor arguments".into(),
            ));
        }

        let inputs = parse_inputs(&doc.inputs)?;

        Ok(Self {
            id: doc.id,
            label: doc.label,
            base_command,
            arguments,
            inputs,
        })
    }

    /// The program this tool invokes, if it has a `baseCommand`.
    pub fn executable(&self) -> Option<&str> {
        self.base_command.first().map(String::as_str)
    }

    pub fn input(&self, id: &str) -> Option<&InputParameter> {
        self.inputs.iter().find(|i| i.id == id)
    }
}

/// Accepts both the list form (`- id: x`) and the map form (`x: type` or
/// `x: {type: ...}`), keeping declaration order.
fn parse_inputs(raw: &YamlValue) -> Result<Vec<InputParameter>, CwlError> {
    let mut out = Vec::new();

    match raw {
        YamlValue::Null => {}
        YamlValue::Sequence(items) => {
            for item in items {
                let input: RawInput = serde_yaml::from_value(item.clone())
                    .map_err(|e| CwlError::Invalid(format!("malformed input: {e}")))?;
                let id = input
                    .id
                    .clone()
                    .ok_or_else(|| CwlError::Invalid("input without 'id'".into()))?;
                out.push(build_input(&id, input)?);
            }
        }
        YamlValue::Mapping(map) => {
            for (key, value) in map {
                let id = key
                    .as_str()
                    .ok_or_else(|| CwlError::Invalid(format!("non-string input id: {key:?}")))?;
                let input = match value {
                    YamlValue::Mapping(_) => serde_yaml::from_value(value.clone())
                        .map_err(|e| CwlError::Invalid(format!("malformed input '{id}': {e}")))?,
                    shorthand => RawInput {
                        id: None,
                        ty: shorthand.clone(),
                        default: None,
                        input_binding: None,
                    },
                };
                out.push(build_input(id, input)?);
            }
        }
        other => {
            return Err(CwlError::Invalid(format!(
                "'inputs' must be a list or a map, found {other:?}"
            )))
        }
    }

    let mut seen = HashSet::new();
    for input in &out {
        if input.id.is_empty() {
            return Err(CwlError::Invalid("input id must not be empty".into()));
        }
        if !seen.insert(input.id.clone()) {
            return Err(CwlError::Invalid(format!("duplicate input id: '{}'", input.id)));
        }
    }

    Ok(out)
}

fn build_input(raw_id: &str, input: RawInput) -> Result<InputParameter, CwlError> {
    let id = short_id(raw_id);
    let ty = CwlType::parse(&input.ty)
        .map_err(|e| CwlError::Invalid(format!("input '{id}': {e}")))?;
    Ok(InputParameter {
        ty: InputType::classify(ty, input.default),
        id,
        binding: input.input_binding,
    })
}

/// `#foo`, `tool.cwl#foo` and `tool.cwl#main/foo` all name input `foo`.
fn short_id(raw: &str) -> String {
    raw.rsplit(['#', '/']).next().unwrap_or(raw).to_string()
}

/// Resolves a path relative to the directory a document lives in.
pub fn resolve_relative(base_dir: &Path, referenced: &Path) -> PathBuf {
    if referenced.is_absolute() {
        referenced.to_path_buf()
    } else {
        base_dir.join(referenced)
    }
}
