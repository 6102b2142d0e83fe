// ── Attribute registry ──
//
// The device's own schema for an attribute group: declared type, allowed
// values, bounds and read-only flags. Every desired and current value is
// coerced through it before any comparison, so "10", 10 and "010" are the
// same integer and an unparseable value is an error rather than a guess.

use std::collections::HashMap;

use serde_json::Value;
use strum::Display;
use tracing::{debug, warn};

use crate::device::ManagementApi;
use crate::error::CoreError;
use crate::model::{AttributeValue, TypedValue};

/// Declared attribute type after folding Redfish types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AttributeKind {
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "string")]
    String,
}

impl AttributeKind {
    /// Redfish registry `Type` -> kind. Only `Integer` is numeric.
    pub fn from_redfish(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("Integer") {
            Self::Int
        } else {
            Self::String
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
        }
    }
}

/// One attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub kind: AttributeKind,
    /// Empty means unconstrained.
    pub allowed_values: Vec<String>,
    pub lower_bound: Option<i64>,
    pub upper_bound: Option<i64>,
    pub read_only: bool,
}

impl AttributeSpec {
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Int,
            allowed_values: Vec::new(),
            lower_bound: None,
            upper_bound: None,
            read_only: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::String,
            allowed_values: Vec::new(),
            lower_bound: None,
            upper_bound: None,
            read_only: false,
        }
    }

    pub fn enumeration(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            allowed_values: values.iter().map(|v| (*v).to_owned()).collect(),
            ..Self::string(name)
        }
    }

    pub fn with_bounds(mut self, lower: i64, upper: i64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Immutable schema for one reconciliation.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    name: String,
    attributes: HashMap<String, AttributeSpec>,
}

impl AttributeRegistry {
    pub fn new(name: impl Into<String>, specs: impl IntoIterator<Item = AttributeSpec>) -> Self {
        Self {
            name: name.into(),
            attributes: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn spec(&self, attribute: &str) -> Result<&AttributeSpec, CoreError> {
        self.attributes
            .get(attribute)
            .ok_or_else(|| CoreError::UnknownAttribute {
                attribute: attribute.to_owned(),
                registry: self.name.clone(),
            })
    }

    pub fn get_type(&self, attribute: &str) -> Result<AttributeKind, CoreError> {
        self.spec(attribute).map(|s| s.kind)
    }

    /// Coerce a caller-supplied value to the declared type.
    pub fn coerce(&self, attribute: &str, value: &AttributeValue) -> Result<TypedValue, CoreError> {
        let kind = self.get_type(attribute)?;
        match (kind, value) {
            (AttributeKind::Int, AttributeValue::Int(i)) => Ok(TypedValue::Int(*i)),
            (AttributeKind::Int, AttributeValue::Str(s)) => parse_int(attribute, s),
            (AttributeKind::Int, AttributeValue::Bool(b)) => {
                Err(coercion_error(attribute, &b.to_string(), kind))
            }
            (AttributeKind::String, other) => Ok(TypedValue::Str(other.to_string())),
        }
    }

    /// Coerce a value read from the device. `null` means "not set".
    pub fn coerce_current(
        &self,
        attribute: &str,
        value: &Value,
    ) -> Result<Option<TypedValue>, CoreError> {
        let kind = self.get_type(attribute)?;
        let typed = match (kind, value) {
            (_, Value::Null) => return Ok(None),
            (AttributeKind::Int, Value::Number(n)) => n
                .as_i64()
                .map(TypedValue::Int)
                .ok_or_else(|| coercion_error(attribute, &n.to_string(), kind))?,
            (AttributeKind::Int, Value::String(s)) => parse_int(attribute, s)?,
            (AttributeKind::String, Value::String(s)) => TypedValue::Str(s.clone()),
            (AttributeKind::String, Value::Number(n)) => TypedValue::Str(n.to_string()),
            (AttributeKind::String, Value::Bool(b)) => TypedValue::Str(b.to_string()),
            (_, other) => return Err(coercion_error(attribute, &other.to_string(), kind)),
        };
        Ok(Some(typed))
    }

    /// Check a coerced value against the attribute's constraints.
    pub fn check_value(&self, attribute: &str, value: &TypedValue) -> Result<(), CoreError> {
        let spec = self.spec(attribute)?;
        let violation = |message: String| CoreError::ConstraintViolation {
            attribute: attribute.to_owned(),
            message,
        };

        if spec.read_only {
            return Err(violation("attribute is read-only".into()));
        }

        match value {
            TypedValue::Str(s) => {
                if !spec.allowed_values.is_empty() && !spec.allowed_values.contains(s) {
                    return Err(violation(format!(
                        "value {s:?} is not one of [{}]",
                        spec.allowed_values.join(", ")
                    )));
                }
            }
            TypedValue::Int(i) => {
                if let Some(lower) = spec.lower_bound.filter(|lower| i < lower) {
                    return Err(violation(format!("value {i} is below the minimum {lower}")));
                }
                if let Some(upper) = spec.upper_bound.filter(|upper| i > upper) {
                    return Err(violation(format!("value {i} is above the maximum {upper}")));
                }
            }
        }
        Ok(())
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Resolve `name` through `/redfish/v1/Registries` and load it.
    ///
    /// The member may match exactly or differ by a version suffix
    /// (`BiosAttributeRegistry` vs `BiosAttributeRegistry.v1_0_3`).
    pub async fn fetch(api: &dyn ManagementApi, name: &str) -> Result<Self, CoreError> {
        let fetch_err = |source| CoreError::RegistryFetch {
            registry: name.to_owned(),
            source,
        };

        let members = api.list_registries().await.map_err(fetch_err)?;
        let member = pick_member(&members, name).ok_or_else(|| CoreError::RegistryNotFound {
            registry: name.to_owned(),
        })?;

        let file = api.get_registry_file(member).await.map_err(fetch_err)?;
        let document_uri = if let Some(uri) = file.document_uri() {
            uri.to_owned()
        } else {
            warn!(registry = name, member, "registry file has no location, using member URI");
            member.to_owned()
        };

        let document = api
            .get_attribute_registry(&document_uri)
            .await
            .map_err(fetch_err)?;
        let registry = Self::from(document);
        debug!(
            registry = registry.name(),
            attributes = registry.len(),
            "attribute registry loaded"
        );
        Ok(registry)
    }
}

fn pick_member<'a>(members: &'a [String], name: &str) -> Option<&'a str> {
    let exact = members.iter().find(|m| last_segment(m) == name);
    let versioned = || {
        members.iter().find(|m| {
            let seg = last_segment(m);
            seg.strip_prefix(name).is_some_and(|rest| rest.starts_with('.'))
                || name.strip_prefix(seg).is_some_and(|rest| rest.starts_with('.'))
        })
    };
    exact.or_else(versioned).map(String::as_str)
}

fn last_segment(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn parse_int(attribute: &str, raw: &str) -> Result<TypedValue, CoreError> {
    raw.trim()
        .parse::<i64>()
        .map(TypedValue::Int)
        .map_err(|_| coercion_error(attribute, raw, AttributeKind::Int))
}

fn coercion_error(attribute: &str, raw: &str, kind: AttributeKind) -> CoreError {
    CoreError::TypeCoercion {
        attribute: attribute.to_owned(),
        value: raw.to_owned(),
        expected: kind.label(),
    }
}
