//! Declarative value shapes and the validator that checks JSON against them.
//!
//! Every flow declares the shape of its input and of the structured output it
//! expects from the model. [`validate`] is applied on both sides of the model
//! call: it reports *every* offending field (path + reason) and returns a
//! coerced copy of the value on success.
//!
//! ## Coercion
//!
//! - `null` for an optional field is treated as absent and dropped
//! - numeric strings are accepted for `number` / `integer` fields
//! - range and `date-time` constraints are checked, never clamped

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Map, Number, Value};

/// String formats understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// ISO-8601 / RFC 3339 timestamp
    DateTime,
}

/// Shape of a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    String {
        format: Option<StringFormat>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    Array(Box<Kind>),
    Object(ObjectSchema),
}

impl Kind {
    pub fn string() -> Self {
        Kind::String { format: None }
    }

    pub fn date_time() -> Self {
        Kind::String {
            format: Some(StringFormat::DateTime),
        }
    }

    pub fn number() -> Self {
        Kind::Number {
            min: None,
            max: None,
        }
    }

    /// Number constrained to the inclusive range `min..=max`.
    pub fn number_in(min: f64, max: f64) -> Self {
        Kind::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn integer() -> Self {
        Kind::Integer {
            min: None,
            max: None,
        }
    }

    pub fn array(item: Kind) -> Self {
        Kind::Array(Box::new(item))
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Kind::Object(schema)
    }

    /// Short name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Kind::String { .. } => "string",
            Kind::Number { .. } => "number",
            Kind::Integer { .. } => "integer",
            Kind::Boolean => "boolean",
            Kind::Array(_) => "array",
            Kind::Object(_) => "object",
        }
    }

    /// Render this shape as JSON Schema, for providers that accept a response schema.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Kind::String { format } => match format {
                Some(StringFormat::DateTime) => json!({"type": "string", "format": "date-time"}),
                None => json!({"type": "string"}),
            },
            Kind::Number { min, max } => {
                let mut schema = json!({"type": "number"});
                if let Some(min) = min {
                    schema["minimum"] = json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = json!(max);
                }
                schema
            }
            Kind::Integer { min, max } => {
                let mut schema = json!({"type": "integer"});
                if let Some(min) = min {
                    schema["minimum"] = json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = json!(max);
                }
                schema
            }
            Kind::Boolean => json!({"type": "boolean"}),
            Kind::Array(item) => json!({"type": "array", "items": item.to_json_schema()}),
            Kind::Object(object) => object.to_json_schema(),
        }
    }
}

/// A named field inside an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub kind: Kind,
    pub optional: bool,
    /// Documentation only; forwarded to the model as a hint
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: &str, kind: Kind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            optional: false,
            description: description.to_string(),
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, Kind::string(), description)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Ordered set of fields. Closed schemas reject unknown fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub fields: Vec<FieldSchema>,
    pub closed: bool,
}

impl ObjectSchema {
    pub fn closed(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            closed: true,
        }
    }

    pub fn open(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            closed: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that field names are unique at every nesting level.
    pub fn check_unique_names(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field `{}`", field.name));
            }
            check_kind_names(&field.kind)?;
        }
        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut schema = field.kind.to_json_schema();
            if !field.description.is_empty() {
                schema["description"] = json!(field.description);
            }
            properties.insert(field.name.clone(), schema);
            if !field.optional {
                required.push(json!(field.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": !self.closed,
        })
    }
}

fn check_kind_names(kind: &Kind) -> std::result::Result<(), String> {
    match kind {
        Kind::Array(item) => check_kind_names(item),
        Kind::Object(object) => object.check_unique_names(),
        _ => Ok(()),
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted/indexed path, e.g. `tasks[2].priority`; `$` is the root value
    pub path: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// All failures found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self(vec![FieldError::new(path, reason)])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// True if any error is reported at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate `value` against `kind`, returning the coerced value.
pub fn validate(value: &Value, kind: &Kind) -> std::result::Result<Value, ValidationErrors> {
    let mut errors = Vec::new();
    let coerced = check(value, kind, "", &mut errors);
    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, kind: &Kind, value: &Value, errors: &mut Vec<FieldError>) -> Value {
    errors.push(FieldError::new(
        display_path(path),
        format!("expected {}, got {}", kind.type_name(), json_type_name(value)),
    ));
    Value::Null
}

fn check(value: &Value, kind: &Kind, path: &str, errors: &mut Vec<FieldError>) -> Value {
    match kind {
        Kind::String { format } => match value {
            Value::String(s) => {
                if *format == Some(StringFormat::DateTime) && !is_iso_timestamp(s) {
                    errors.push(FieldError::new(
                        display_path(path),
                        format!("expected an ISO-8601 date-time, got {:?}", s),
                    ));
                }
                value.clone()
            }
            other => mismatch(path, kind, other, errors),
        },
        Kind::Number { min, max } => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                _ => None,
            };
            let Some(n) = n else {
                return mismatch(path, kind, value, errors);
            };
            check_range(n, *min, *max, path, errors);
            match value {
                Value::Number(_) => value.clone(),
                _ => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            }
        }
        Kind::Integer { min, max } => {
            let n = match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| is_whole_i64(*f)).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let Some(n) = n else {
                return mismatch(path, kind, value, errors);
            };
            check_range(n as f64, min.map(|m| m as f64), max.map(|m| m as f64), path, errors);
            json!(n)
        }
        Kind::Boolean => match value {
            Value::Bool(_) => value.clone(),
            other => mismatch(path, kind, other, errors),
        },
        Kind::Array(item) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| check(v, item, &format!("{}[{}]", path, i), errors))
                    .collect(),
            ),
            other => mismatch(path, kind, other, errors),
        },
        Kind::Object(object) => match value {
            Value::Object(map) => check_object(map, object, path, errors),
            other => mismatch(path, kind, other, errors),
        },
    }
}

fn check_object(
    map: &Map<String, Value>,
    object: &ObjectSchema,
    path: &str,
    errors: &mut Vec<FieldError>,
) -> Value {
    let mut out = Map::new();

    for field in &object.fields {
        let field_path = join_path(path, &field.name);
        match map.get(&field.name) {
            None | Some(Value::Null) if field.optional => {}
            None => errors.push(FieldError::new(field_path, "required field is missing")),
            Some(Value::Null) => errors.push(FieldError::new(field_path, "required field is null")),
            Some(v) => {
                let coerced = check(v, &field.kind, &field_path, errors);
                out.insert(field.name.clone(), coerced);
            }
        }
    }

    for (key, v) in map {
        if object.field(key).is_some() {
            continue;
        }
        if object.closed {
            errors.push(FieldError::new(join_path(path, key), "unknown field"));
        } else {
            out.insert(key.clone(), v.clone());
        }
    }

    Value::Object(out)
}

fn check_range(n: f64, min: Option<f64>, max: Option<f64>, path: &str, errors: &mut Vec<FieldError>) {
    if let Some(min) = min {
        if n < min {
            errors.push(FieldError::new(
                display_path(path),
                format!("{} is below the minimum {}", n, min),
            ));
        }
    }
    if let Some(max) = max {
        if n > max {
            errors.push(FieldError::new(
                display_path(path),
                format!("{} is above the maximum {}", n, max),
            ));
        }
    }
}

/// A float that converts to `i64` without truncation or saturation.
fn is_whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&f)
}

/// Accepts RFC 3339 timestamps and zone-less `YYYY-MM-DDTHH:MM[:SS[.fff]]`.
pub fn is_iso_timestamp(s: &str) -> bool {
    parse_timestamp(s).is_some()
}

/// Parse a timestamp accepted by [`is_iso_timestamp`]; zone-less values are UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categorize_input() -> Kind {
        Kind::object(ObjectSchema::closed(vec![
            FieldSchema::string("taskContent", "task"),
            FieldSchema::string("context", "context"),
            FieldSchema::new("availableCategories", Kind::array(Kind::string()), "categories"),
        ]))
    }

    #[test]
    fn test_missing_required_field_is_reported_by_path() {
        let value = json!({"context": "grocery list", "availableCategories": ["Shopping"]});
        let err = validate(&value, &categorize_input()).unwrap_err();
        assert!(err.has_path("taskContent"));
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_reports_every_error() {
        let value = json!({"taskContent": 3, "availableCategories": "Shopping", "extra": true});
        let err = validate(&value, &categorize_input()).unwrap_err();
        assert!(err.has_path("taskContent"));
        assert!(err.has_path("context"));
        assert!(err.has_path("availableCategories"));
        assert!(err.has_path("extra"));
    }

    #[test]
    fn test_nested_paths() {
        let kind = Kind::object(ObjectSchema::closed(vec![FieldSchema::new(
            "tasks",
            Kind::array(Kind::object(ObjectSchema::closed(vec![
                FieldSchema::string("id", ""),
                FieldSchema::new("priority", Kind::number_in(1.0, 10.0), ""),
            ]))),
            "",
        )]));
        let value = json!({"tasks": [{"id": "1", "priority": 4}, {"id": "2", "priority": 11}]});
        let err = validate(&value, &kind).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert!(err.has_path("tasks[1].priority"));
    }

    #[test]
    fn test_optional_null_is_dropped() {
        let kind = Kind::object(ObjectSchema::closed(vec![
            FieldSchema::string("title", ""),
            FieldSchema::string("description", "").optional(),
        ]));
        let coerced = validate(&json!({"title": "Plan trip", "description": null}), &kind).unwrap();
        assert_eq!(coerced, json!({"title": "Plan trip"}));
    }

    #[test]
    fn test_range_is_checked_not_clamped() {
        let kind = Kind::number_in(0.0, 1.0);
        assert!(validate(&json!(0.0), &kind).is_ok());
        assert!(validate(&json!(1), &kind).is_ok());
        let err = validate(&json!(1.2), &kind).unwrap_err();
        assert!(err.has_path("$"));
        assert!(validate(&json!(-0.1), &kind).is_err());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        assert_eq!(validate(&json!("0.75"), &Kind::number()).unwrap(), json!(0.75));
        assert_eq!(validate(&json!("7"), &Kind::integer()).unwrap(), json!(7));
        assert!(validate(&json!("seven"), &Kind::integer()).is_err());
        assert!(validate(&json!(7.5), &Kind::integer()).is_err());
    }

    #[test]
    fn test_whole_floats_outside_i64_rejected() {
        assert_eq!(validate(&json!(3.0), &Kind::integer()).unwrap(), json!(3));
        let err = validate(&json!(1e30), &Kind::integer()).unwrap_err();
        assert!(err.has_path("$"));
        assert!(validate(&json!(-1e30), &Kind::integer()).is_err());
    }

    #[test]
    fn test_date_time_format() {
        let kind = Kind::date_time();
        assert!(validate(&json!("2024-05-01T10:00:00.000Z"), &kind).is_ok());
        assert!(validate(&json!("2024-05-01T10:00:00+02:00"), &kind).is_ok());
        assert!(validate(&json!("2024-05-01T10:00:00"), &kind).is_ok());
        assert!(validate(&json!("next tuesday"), &kind).is_err());
    }

    #[test]
    fn test_zone_less_timestamp_is_utc() {
        let ts = parse_timestamp("2024-05-01T10:30").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:30:00+00:00");
        assert_eq!(
            parse_timestamp("2024-05-01T12:30:00+02:00"),
            Some(ts)
        );
    }

    #[test]
    fn test_open_schema_keeps_unknown_fields() {
        let kind = Kind::object(ObjectSchema::open(vec![FieldSchema::string("a", "")]));
        let coerced = validate(&json!({"a": "x", "b": 1}), &kind).unwrap();
        assert_eq!(coerced, json!({"a": "x", "b": 1}));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let schema = ObjectSchema::closed(vec![
            FieldSchema::string("a", ""),
            FieldSchema::string("a", ""),
        ]);
        assert!(schema.check_unique_names().is_err());
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = categorize_input().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["availableCategories"]["items"]["type"], "string");
        assert_eq!(
            schema["required"],
            json!(["taskContent", "context", "availableCategories"])
        );
    }
}
