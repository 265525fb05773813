// src/cwl/command_line.rs
//
// =============================================================================
// CTAPROD: COMMAND-LINE SYNTHESIS
// =============================================================================
//
// Turns a tool + resolved inputs into one shell command line.
//
// Pipeline:
// 1. Stage placeholders for every File value (scoped guard).
// 2. Bind: baseCommand, then arguments and inputs ordered by
//    (position, arguments first, argument index / input id).
// 3. Rewrite each File token's staged path back to that File's location.
// 4. Quote and join.
// 5. Release the placeholders (also on every error path).

use serde_json::Value;

use crate::cwl::inputs::file_location;
use crate::cwl::{quote, FakeFileStager, InputBinding, ResolvedInputSet, ToolDescription};
use crate::error::{CwlError, StepError};

// ============================================================================
// 1. BOUND COMMAND LINE
// ============================================================================

/// A File value that was rendered as a staged path inside `args[token]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    pub token: usize,
    pub path: String,
    pub location: String,
}

/// Argument tokens in binding order plus the File bindings they contain.
/// Bindings are ordered by token, then left to right within the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundCommandLine {
    pub args: Vec<String>,
    pub files: Vec<FileBinding>,
}

impl BoundCommandLine {
    /// Rewrites each File's staged path to its own location, in its own token.
    ///
    /// Different locations may stage to the same path (`/a`, `a`, `file:///a`),
    /// so substitution walks the bindings of a token in order instead of
    /// replacing path text globally.
    pub fn substitute_locations(&mut self) {
        let mut current = None;
        let mut cursor = 0;

        for file in &self.files {
            if current != Some(file.token) {
                current = Some(file.token);
                cursor = 0;
            }
            let Some(arg) = self.args.get_mut(file.token) else {
                continue;
            };
            let Some(found) = arg[cursor..].find(&file.path) else {
                continue;
            };
            let start = cursor + found;
            arg.replace_range(start..start + file.path.len(), &file.location);
            cursor = start + file.location.len();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    position: i64,
    // 0 = arguments, 1 = inputs
    group: u8,
    index: usize,
    name: String,
}

/// One rendered token and the Files it embeds as (path, location), left to right.
#[derive(Debug, Default)]
struct Rendered {
    text: String,
    files: Vec<(String, String)>,
}

impl Rendered {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
        }
    }
}

// ============================================================================
// 2. BINDING
// ============================================================================

/// Builds the argument list the tool would be invoked with.
/// File inputs must already exist at their staged paths.
pub fn bind(
    tool: &ToolDescription,
    resolved: &ResolvedInputSet,
    stager: &FakeFileStager,
) -> Result<BoundCommandLine, StepError> {
    let mut keyed: Vec<(SortKey, Vec<Rendered>)> = Vec::new();

    for (index, arg) in tool.arguments.iter().enumerate() {
        let tokens = match &arg.binding.value_from {
            Some(value_from) => apply_prefix(&arg.binding, vec![literal(value_from)?]),
            None => arg.binding.prefix.iter().map(Rendered::plain).collect(),
        };
        keyed.push((
            SortKey {
                position: arg.binding.position,
                group: 0,
                index,
                name: String::new(),
            },
            tokens,
        ));
    }

    for input in &tool.inputs {
        let (Some(binding), Some(value)) = (&input.binding, resolved.get(&input.id)) else {
            continue;
        };
        let tokens = render_input(&input.id, value, binding, stager)?;
        keyed.push((
            SortKey {
                position: binding.position,
                group: 1,
                index: 0,
                name: input.id.clone(),
            },
            tokens,
        ));
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut bound = BoundCommandLine {
        args: tool.base_command.clone(),
        files: Vec::new(),
    };
    for token in keyed.into_iter().flat_map(|(_, tokens)| tokens) {
        let index = bound.args.len();
        bound
            .files
            .extend(token.files.into_iter().map(|(path, location)| FileBinding {
                token: index,
                path,
                location,
            }));
        bound.args.push(token.text);
    }
    Ok(bound)
}

fn literal(value_from: &str) -> Result<Rendered, CwlError> {
    if value_from.contains("$(") || value_from.contains("${") {
        return Err(CwlError::Unsupported(format!(
            "expression in valueFrom: '{value_from}'"
        )));
    }
    Ok(Rendered::plain(value_from))
}

fn render_input(
    id: &str,
    value: &Value,
    binding: &InputBinding,
    stager: &FakeFileStager,
) -> Result<Vec<Rendered>, StepError> {
    if let Some(value_from) = &binding.value_from {
        return Ok(apply_prefix(binding, vec![literal(value_from)?]));
    }

    match value {
        Value::Null | Value::Bool(false) => Ok(Vec::new()),
        Value::Bool(true) => Ok(binding.prefix.iter().map(Rendered::plain).collect()),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| render_scalar(id, item, stager))
                .collect::<Result<Vec<_>, _>>()?;
            if rendered.is_empty() {
                return Ok(Vec::new());
            }
            let values = match &binding.item_separator {
                Some(sep) => vec![join_items(rendered, sep)],
                None => rendered,
            };
            Ok(apply_prefix(binding, values))
        }
        other => Ok(apply_prefix(binding, vec![render_scalar(id, other, stager)?])),
    }
}

fn render_scalar(id: &str, value: &Value, stager: &FakeFileStager) -> Result<Rendered, StepError> {
    match value {
        Value::String(s) => Ok(Rendered::plain(s.as_str())),
        Value::Number(n) => Ok(Rendered::plain(n.to_string())),
        Value::Bool(b) => Ok(Rendered::plain(b.to_string())),
        Value::Object(_) => {
            let location = file_location(value).ok_or_else(|| {
                CwlError::Unsupported(format!("non-File object value for input '{id}'"))
            })?;
            let path = stager.staged_path(location)?;
            if !path.exists() {
                return Err(CwlError::MissingFile(path).into());
            }
            let text = path.to_string_lossy().into_owned();
            Ok(Rendered {
                files: vec![(text.clone(), location.to_string())],
                text,
            })
        }
        Value::Null | Value::Array(_) => Err(CwlError::Unsupported(format!(
            "nested or null array item for input '{id}'"
        ))
        .into()),
    }
}

/// `itemSeparator`: the items become one token.
fn join_items(items: Vec<Rendered>, sep: &str) -> Rendered {
    let mut joined = Rendered::default();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            joined.text.push_str(sep);
        }
        joined.text.push_str(&item.text);
        joined.files.extend(item.files);
    }
    joined
}

fn apply_prefix(binding: &InputBinding, mut values: Vec<Rendered>) -> Vec<Rendered> {
    match &binding.prefix {
        None => values,
        Some(prefix) if binding.separate => {
            let mut out = Vec::with_capacity(values.len() + 1);
            out.push(Rendered::plain(prefix.as_str()));
            out.append(&mut values);
            out
        }
        Some(prefix) => {
            if let Some(first) = values.first_mut() {
                first.text.insert_str(0, prefix);
            }
            values
        }
    }
}

// ============================================================================
// 3. SYNTHESIZER
// ============================================================================

pub struct CommandLineSynthesizer<'a> {
    stager: &'a FakeFileStager,
}

impl<'a> CommandLineSynthesizer<'a> {
    pub fn new(stager: &'a FakeFileStager) -> Self {
        Self { stager }
    }

    /// Unquoted tokens, with File tokens carrying their logical locations.
    pub fn tokens(
        &self,
        tool: &ToolDescription,
        resolved: &ResolvedInputSet,
    ) -> Result<Vec<String>, StepError> {
        let staged = self.stager.stage_all(resolved.file_locations())?;

        let mut bound = bind(tool, resolved, self.stager)?;
        bound.substitute_locations();

        staged.release()?;
        Ok(bound.args)
    }

    /// The final, shell-quoted command line.
    pub fn synthesize(
        &self,
        tool: &ToolDescription,
        resolved: &ResolvedInputSet,
    ) -> Result<String, StepError> {
        let tokens = self.tokens(tool, resolved)?;
        Ok(quote::join(&tokens))
    }
}
