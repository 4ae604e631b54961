//! Widget placeholders embedded in format descriptors
//!
//! A placeholder is written as `[name, type, {options}, template]` where
//! `type` is one of `BOOLEAN`, `INT`, `FLOAT`, `STRING` or a list of allowed
//! options. Options and template are optional.

use serde_json::Value;
use tracing::warn;

use crate::domain::model::WidgetValue;

/// Declared type of a widget
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    Boolean,
    Int,
    Float,
    String,
    Options(Vec<String>),
}

impl WidgetKind {
    fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(kind) => match kind.as_str() {
                "BOOLEAN" => Ok(WidgetKind::Boolean),
                "INT" => Ok(WidgetKind::Int),
                "FLOAT" => Ok(WidgetKind::Float),
                "STRING" => Ok(WidgetKind::String),
                other => Err(format!("unknown widget type '{}'", other)),
            },
            Value::Array(options) => {
                let options = options.iter().map(json_scalar_text).collect::<Result<Vec<_>, _>>()?;
                if options.is_empty() {
                    return Err("option list is empty".to_string());
                }
                Ok(WidgetKind::Options(options))
            }
            other => Err(format!("widget type must be a string or option list, got {}", other)),
        }
    }

    /// Fallback default when none is declared
    ///
    /// Only option lists have one: their first entry.
    fn implicit_default(&self) -> Option<WidgetValue> {
        match self {
            WidgetKind::Options(options) => options.first().cloned().map(WidgetValue::String),
            _ => None,
        }
    }

    /// Convert a value to this kind
    pub fn coerce(&self, value: WidgetValue) -> Result<WidgetValue, String> {
        match (self, value) {
            (WidgetKind::Boolean, WidgetValue::Bool(v)) => Ok(WidgetValue::Bool(v)),
            (WidgetKind::Boolean, WidgetValue::Int(v)) if v == 0 || v == 1 => Ok(WidgetValue::Bool(v == 1)),
            (WidgetKind::Boolean, WidgetValue::String(v)) => match v.to_ascii_lowercase().as_str() {
                "true" => Ok(WidgetValue::Bool(true)),
                "false" => Ok(WidgetValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", v)),
            },
            (WidgetKind::Int, WidgetValue::Int(v)) => Ok(WidgetValue::Int(v)),
            (WidgetKind::Int, WidgetValue::Float(v)) if v.fract() == 0.0 => Ok(WidgetValue::Int(v as i64)),
            (WidgetKind::Int, WidgetValue::String(v)) => v
                .trim()
                .parse::<i64>()
                .map(WidgetValue::Int)
                .map_err(|_| format!("'{}' is not an integer", v)),
            (WidgetKind::Float, WidgetValue::Float(v)) => Ok(WidgetValue::Float(v)),
            (WidgetKind::Float, WidgetValue::Int(v)) => Ok(WidgetValue::Float(v as f64)),
            (WidgetKind::Float, WidgetValue::String(v)) => v
                .trim()
                .parse::<f64>()
                .map(WidgetValue::Float)
                .map_err(|_| format!("'{}' is not a number", v)),
            (WidgetKind::String, value) => Ok(WidgetValue::String(value.render())),
            (WidgetKind::Options(options), value) => {
                let text = value.render();
                if !options.contains(&text) {
                    warn!("Value '{}' is not one of the declared options {:?}", text, options);
                }
                Ok(WidgetValue::String(text))
            }
            (kind, value) => Err(format!("{:?} value cannot be used for a {:?} widget", value, kind)),
        }
    }
}

/// A named, typed, user-overridable parameter
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSlot {
    pub name: String,
    pub kind: WidgetKind,
    pub default: Option<WidgetValue>,
    pub template: Option<String>,
}

impl WidgetSlot {
    /// Parse a placeholder array
    pub fn parse(value: &Value) -> Result<Self, String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("widget placeholder must be a list, got {}", value))?;
        let name = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| "widget placeholder must start with its name".to_string())?
            .to_string();
        let kind = items
            .get(1)
            .ok_or_else(|| format!("widget '{}' has no type", name))
            .and_then(WidgetKind::parse)
            .map_err(|e| format!("widget '{}': {}", name, e))?;

        let declared_default = match items.get(2) {
            Some(Value::Object(options)) => match options.get("default") {
                Some(raw) => Some(
                    json_to_widget_value(raw)
                        .and_then(|v| kind.coerce(v))
                        .map_err(|e| format!("widget '{}' default: {}", name, e))?,
                ),
                None => None,
            },
            Some(Value::Null) | None => None,
            Some(other) => return Err(format!("widget '{}' options must be an object, got {}", name, other)),
        };
        let default = declared_default.or_else(|| kind.implicit_default());

        let template = match items.get(3) {
            Some(Value::String(template)) => Some(template.clone()),
            Some(Value::Null) | None => None,
            Some(other) => return Err(format!("widget '{}' template must be a string, got {}", name, other)),
        };

        Ok(Self {
            name,
            kind,
            default,
            template,
        })
    }

    /// Turn a resolved value into argument text
    pub fn render(&self, value: &WidgetValue) -> Result<String, String> {
        match &self.template {
            Some(template) => substitute(template, &value.render()),
            None => Ok(value.render()),
        }
    }
}

/// Expand `$val` / `${val}` in a template; `$$` is a literal dollar
pub fn substitute(template: &str, val: &str) -> Result<String, String> {
    let mut out = String::with_capacity(template.len() + val.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(tail) = after.strip_prefix("{val}") {
            out.push_str(val);
            rest = tail;
        } else if after.starts_with("val")
            && !after[3..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        {
            out.push_str(val);
            rest = &after[3..];
        } else {
            return Err(format!("invalid placeholder in template '{}'", template));
        }
    }
    out.push_str(rest);
    Ok(out)
}

pub(crate) fn json_scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => json_to_widget_value(value).map(|v| v.render()),
        other => Err(format!("expected a scalar, got {}", other)),
    }
}

pub(crate) fn json_to_widget_value(value: &Value) -> Result<WidgetValue, String> {
    match value {
        Value::Bool(b) => Ok(WidgetValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(WidgetValue::Int(i)),
            None => n
                .as_f64()
                .map(WidgetValue::Float)
                .ok_or_else(|| format!("unrepresentable number {}", n)),
        },
        Value::String(s) => Ok(WidgetValue::String(s.clone())),
        other => Err(format!("expected a scalar, got {}", other)),
    }
}
