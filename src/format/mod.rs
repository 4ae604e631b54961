//! Format descriptors: parsing and widget resolution
//!
//! A descriptor document is a JSON object whose `*_pass` keys hold argument
//! lists. List entries are either literal tokens or widget placeholders.
//! Any other key may itself be a single widget placeholder.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::model::{FormatDescriptor, WidgetValue};
use crate::error::{EncodeError, EncodeResult};
use crate::ports::{bare_format_name, FormatCatalog};

pub mod widgets;

pub use widgets::{WidgetKind, WidgetSlot};

/// One token of a pass argument list
#[derive(Debug, Clone, PartialEq)]
pub enum ArgToken {
    Literal(String),
    Widget(WidgetSlot),
}

/// Value of a non-pass descriptor field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Literal(Value),
    Widget(WidgetSlot),
}

/// A descriptor as loaded from the catalog, before widget resolution
#[derive(Debug, Clone, PartialEq)]
pub struct FormatTemplate {
    pub name: String,
    pub main_pass: Vec<ArgToken>,
    pub pre_pass: Option<Vec<ArgToken>>,
    pub secondary_pass: Option<Vec<ArgToken>>,
    pub audio_pass: Option<Vec<ArgToken>>,
    pub inputs_main_pass: Option<Vec<ArgToken>>,
    pub extension: Option<FieldValue>,
    pub dim_alignment: Option<FieldValue>,
    pub save_metadata: Option<FieldValue>,
    pub environment: HashMap<String, String>,
}

impl FormatTemplate {
    /// Parse a descriptor document
    pub fn from_json(name: &str, document: &Value) -> EncodeResult<Self> {
        let invalid = |message: String| EncodeError::InvalidFormatDescriptor {
            name: name.to_string(),
            message,
        };
        let object = document
            .as_object()
            .ok_or_else(|| invalid("descriptor must be a JSON object".to_string()))?;

        let main_pass = match object.get("main_pass") {
            Some(value) => parse_pass("main_pass", value).map_err(invalid)?,
            None => return Err(invalid("missing required 'main_pass'".to_string())),
        };
        let optional_pass = |key: &str| -> EncodeResult<Option<Vec<ArgToken>>> {
            object
                .get(key)
                .map(|value| parse_pass(key, value))
                .transpose()
                .map_err(invalid)
        };
        let secondary_pass = match optional_pass("secondary_pass")? {
            Some(pass) => Some(pass),
            None => optional_pass("gifski_pass")?,
        };

        let field = |key: &str| -> EncodeResult<Option<FieldValue>> {
            object.get(key).map(parse_field).transpose().map_err(invalid)
        };

        for key in object.keys() {
            if key.ends_with("_pass") && !KNOWN_PASSES.contains(&key.as_str()) {
                debug!("Ignoring unknown pass '{}' in format '{}'", key, name);
            }
        }

        Ok(Self {
            name: bare_format_name(name).to_string(),
            main_pass,
            pre_pass: optional_pass("pre_pass")?,
            secondary_pass,
            audio_pass: optional_pass("audio_pass")?,
            inputs_main_pass: optional_pass("inputs_main_pass")?,
            extension: field("extension")?,
            dim_alignment: field("dim_alignment")?,
            save_metadata: field("save_metadata")?,
            environment: parse_environment(object.get("environment")).map_err(invalid)?,
        })
    }

    /// Every widget slot, in document order
    pub fn widgets(&self) -> Vec<&WidgetSlot> {
        let passes = [
            Some(&self.main_pass),
            self.pre_pass.as_ref(),
            self.secondary_pass.as_ref(),
            self.audio_pass.as_ref(),
            self.inputs_main_pass.as_ref(),
        ];
        let mut slots: Vec<&WidgetSlot> = passes
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|token| match token {
                ArgToken::Widget(slot) => Some(slot),
                ArgToken::Literal(_) => None,
            })
            .collect();
        for field in [&self.extension, &self.dim_alignment, &self.save_metadata] {
            if let Some(FieldValue::Widget(slot)) = field {
                slots.push(slot);
            }
        }
        slots
    }

    /// Declared defaults of every widget that has one
    pub fn widget_defaults(&self) -> BTreeMap<String, WidgetValue> {
        self.widgets()
            .into_iter()
            .filter_map(|slot| slot.default.clone().map(|d| (slot.name.clone(), d)))
            .collect()
    }

    /// Substitute widget values and produce a concrete descriptor
    ///
    /// Caller values win over declared defaults. Widgets the caller omitted
    /// fall back to their defaults with a warning.
    pub fn resolve(&self, values: &HashMap<String, WidgetValue>) -> EncodeResult<FormatDescriptor> {
        let mut resolved: BTreeMap<String, WidgetValue> = BTreeMap::new();
        let mut defaulted: BTreeMap<String, WidgetValue> = BTreeMap::new();

        for slot in self.widgets() {
            if resolved.contains_key(&slot.name) {
                continue;
            }
            let value = match values.get(&slot.name) {
                Some(value) => slot.kind.coerce(value.clone()).map_err(|message| {
                    EncodeError::InvalidWidgetValue {
                        widget: slot.name.clone(),
                        message,
                    }
                })?,
                None => {
                    let default = slot.default.clone().ok_or_else(|| EncodeError::MissingWidgetValue {
                        widget: slot.name.clone(),
                    })?;
                    defaulted.insert(slot.name.clone(), default.clone());
                    default
                }
            };
            resolved.insert(slot.name.clone(), value);
        }

        if !defaulted.is_empty() {
            warn!(
                format_name = %self.name,
                "Extra format values were not provided, the following defaults will be used: {:?}",
                defaulted
            );
        }

        let render_pass = |pass: &[ArgToken]| -> EncodeResult<Vec<String>> {
            pass.iter().map(|token| self.render_token(token, &resolved)).collect()
        };
        let render_optional = |pass: &Option<Vec<ArgToken>>| -> EncodeResult<Option<Vec<String>>> {
            pass.as_deref().map(render_pass).transpose()
        };

        let alignment = match self.field_text(&self.dim_alignment, &resolved)? {
            Some(text) => text.trim().parse::<usize>().ok().filter(|a| *a > 0).ok_or_else(|| {
                self.invalid(format!("dim_alignment must be a positive integer, got '{}'", text))
            })?,
            None => FormatDescriptor::DEFAULT_ALIGNMENT,
        };
        let save_metadata = match self.field_text(&self.save_metadata, &resolved)? {
            Some(text) => !text.eq_ignore_ascii_case("false"),
            None => false,
        };
        let container_ext = match self.field_text(&self.extension, &resolved)? {
            Some(text) => text,
            None => default_extension(&self.name),
        };

        Ok(FormatDescriptor {
            name: self.name.clone(),
            container_ext,
            main_pass_args: render_pass(self.main_pass.as_slice())?,
            pre_pass_args: render_optional(&self.pre_pass)?,
            secondary_pass_args: render_optional(&self.secondary_pass)?,
            audio_pass_args: render_optional(&self.audio_pass)?,
            inputs_main_pass: render_optional(&self.inputs_main_pass)?,
            alignment,
            environment_overrides: self.environment.clone(),
            save_metadata,
            widget_defaults: self.widget_defaults(),
        })
    }

    fn render_token(&self, token: &ArgToken, resolved: &BTreeMap<String, WidgetValue>) -> EncodeResult<String> {
        match token {
            ArgToken::Literal(text) => Ok(text.clone()),
            ArgToken::Widget(slot) => self.render_slot(slot, resolved),
        }
    }

    fn render_slot(&self, slot: &WidgetSlot, resolved: &BTreeMap<String, WidgetValue>) -> EncodeResult<String> {
        let value = resolved.get(&slot.name).ok_or_else(|| EncodeError::MissingWidgetValue {
            widget: slot.name.clone(),
        })?;
        slot.render(value).map_err(|message| self.invalid(message))
    }

    fn field_text(
        &self,
        field: &Option<FieldValue>,
        resolved: &BTreeMap<String, WidgetValue>,
    ) -> EncodeResult<Option<String>> {
        match field {
            None | Some(FieldValue::Literal(Value::Null)) => Ok(None),
            Some(FieldValue::Literal(value)) => widgets::json_scalar_text(value)
                .map(Some)
                .map_err(|message| self.invalid(message)),
            Some(FieldValue::Widget(slot)) => self.render_slot(slot, resolved).map(Some),
        }
    }

    fn invalid(&self, message: String) -> EncodeError {
        EncodeError::InvalidFormatDescriptor {
            name: self.name.clone(),
            message,
        }
    }
}

/// Resolves named formats through a catalog
pub struct FormatResolver {
    catalog: Arc<dyn FormatCatalog>,
}

impl FormatResolver {
    pub fn new(catalog: Arc<dyn FormatCatalog>) -> Self {
        Self { catalog }
    }

    /// Load `format_name` and resolve it against caller widget values
    pub fn resolve(
        &self,
        format_name: &str,
        values: &HashMap<String, WidgetValue>,
    ) -> EncodeResult<FormatDescriptor> {
        self.catalog.load(format_name)?.resolve(values)
    }

    /// Declared widget defaults of `format_name`
    pub fn widget_defaults(&self, format_name: &str) -> EncodeResult<BTreeMap<String, WidgetValue>> {
        Ok(self.catalog.load(format_name)?.widget_defaults())
    }

    pub fn catalog(&self) -> &Arc<dyn FormatCatalog> {
        &self.catalog
    }
}

const KNOWN_PASSES: [&str; 6] = [
    "main_pass",
    "pre_pass",
    "secondary_pass",
    "gifski_pass",
    "audio_pass",
    "inputs_main_pass",
];

fn parse_pass(key: &str, value: &Value) -> Result<Vec<ArgToken>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("'{}' must be a list of arguments", key))?;
    items
        .iter()
        .map(|item| match item {
            Value::Array(_) => WidgetSlot::parse(item).map(ArgToken::Widget),
            scalar => widgets::json_scalar_text(scalar)
                .map(ArgToken::Literal)
                .map_err(|e| format!("'{}': {}", key, e)),
        })
        .collect()
}

fn parse_field(value: &Value) -> Result<FieldValue, String> {
    match value {
        Value::Array(_) => WidgetSlot::parse(value).map(FieldValue::Widget),
        other => Ok(FieldValue::Literal(other.clone())),
    }
}

fn parse_environment(value: Option<&Value>) -> Result<HashMap<String, String>, String> {
    let Some(value) = value else {
        return Ok(HashMap::new());
    };
    let object: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| "'environment' must be an object".to_string())?;
    object
        .iter()
        .map(|(key, value)| {
            widgets::json_scalar_text(value)
                .map(|text| (key.clone(), text))
                .map_err(|e| format!("environment '{}': {}", key, e))
        })
        .collect()
}

/// Container extension implied by a format name, e.g. `h264-mp4` -> `mp4`
fn default_extension(name: &str) -> String {
    match name.rsplit_once('-') {
        Some((_, ext)) if !ext.is_empty() => ext.to_string(),
        _ => name.to_string(),
    }
}
