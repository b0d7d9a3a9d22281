use serde_json::Value;

use super::params::{ParamValue, Params, RawParams};
use super::sanitize::{absint, sanitize_key, sanitize_text_field, sanitize_textarea_field};
use crate::errors::{AppError, AppResult};
use crate::utils::{parse_date, parse_datetime, to_whole_seconds};

/// Field-level predicate run after coercion and sanitization.
pub type Predicate = fn(&ParamValue) -> Result<(), String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Positive integer identifier.
    Id,
    /// Non-negative integer via [`absint`].
    Int,
    Bool,
    /// Single-line free text.
    Text,
    /// Multi-line free text.
    Textarea,
    DateTime,
    /// Calendar day, normalized to midnight UTC.
    Date,
    Enum(&'static [&'static str]),
    /// Array (or comma-separated string) of lowercase keys.
    KeyList,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Id | FieldKind::Int => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::KeyList => "array",
            _ => "string",
        }
    }

    fn coerce(&self, name: &str, raw: &Value) -> Result<ParamValue, String> {
        match self {
            FieldKind::Id => {
                let id = coerce_int(name, raw)?;
                if id == 0 {
                    return Err(format!("{name} must be a positive integer"));
                }
                Ok(ParamValue::Int(id))
            }
            FieldKind::Int => coerce_int(name, raw).map(ParamValue::Int),
            FieldKind::Bool => coerce_bool(name, raw).map(ParamValue::Bool),
            FieldKind::Text => coerce_string(name, raw).map(|s| ParamValue::Text(sanitize_text_field(&s))),
            FieldKind::Textarea => {
                coerce_string(name, raw).map(|s| ParamValue::Text(sanitize_textarea_field(&s)))
            }
            FieldKind::DateTime => {
                let s = coerce_string(name, raw)?;
                parse_datetime(&s)
                    .map(|dt| ParamValue::DateTime(to_whole_seconds(dt)))
                    .ok_or_else(|| format!("{name} must be a valid date-time"))
            }
            FieldKind::Date => {
                let s = coerce_string(name, raw)?;
                parse_date(&s)
                    .or_else(|| parse_datetime(&s))
                    .map(ParamValue::DateTime)
                    .ok_or_else(|| format!("{name} must be a valid date (YYYY-MM-DD)"))
            }
            FieldKind::Enum(allowed) => {
                let s = sanitize_text_field(&coerce_string(name, raw)?);
                if allowed.contains(&s.as_str()) {
                    Ok(ParamValue::Text(s))
                } else {
                    Err(format!("{name} must be one of: {}", allowed.join(", ")))
                }
            }
            FieldKind::KeyList => coerce_key_list(name, raw).map(ParamValue::List),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Int(i64),
    Bool(bool),
    Text(&'static str),
}

impl DefaultValue {
    fn to_param(self) -> ParamValue {
        match self {
            DefaultValue::Int(v) => ParamValue::Int(v),
            DefaultValue::Bool(v) => ParamValue::Bool(v),
            DefaultValue::Text(v) => ParamValue::Text(v.to_string()),
        }
    }
}

/// Declarative description of one request parameter.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub validate: Option<Predicate>,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: false,
            default: None,
            validate: None,
            description: "",
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn validate(mut self, predicate: Predicate) -> Self {
        self.validate = Some(predicate);
        self
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Rule over several fields. `check` sees the request parameters laid over
/// the persisted entity, so partial updates compare against stored values.
#[derive(Debug, Clone, Copy)]
pub struct CrossRule {
    /// Parameter named in the error.
    pub param: &'static str,
    /// The rule only runs when the request supplies at least one of these.
    pub triggers: &'static [&'static str],
    /// Error code for violations; `None` reports a plain `invalid_param`.
    pub code: Option<&'static str>,
    pub check: fn(&Params) -> Result<(), String>,
}

impl CrossRule {
    fn violation(&self, reason: String) -> AppError {
        match self.code {
            Some(code) => AppError::bad_request(code, reason),
            None => AppError::validation(self.param, reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
    pub cross: &'static [CrossRule],
}

impl Schema {
    pub const EMPTY: Schema = Schema {
        fields: &[],
        cross: &[],
    };

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Coerce, sanitize and validate every declared field. Undeclared input is dropped.
    pub fn normalize(&self, raw: &RawParams) -> AppResult<Params> {
        let mut params = Params::new();

        for field in self.fields {
            let value = match raw.get(field.name) {
                Some(value) if !is_blank(value) => value,
                Some(_) if field.nullable => {
                    params.insert(field.name, ParamValue::Null);
                    continue;
                }
                _ => {
                    if let Some(default) = field.default {
                        params.insert(field.name, default.to_param());
                    } else if field.required {
                        return Err(AppError::validation(
                            field.name,
                            format!("{} is required", field.name),
                        ));
                    }
                    continue;
                }
            };

            let coerced = field
                .kind
                .coerce(field.name, value)
                .map_err(|reason| AppError::validation(field.name, reason))?;

            if let Some(predicate) = field.validate {
                predicate(&coerced).map_err(|reason| AppError::validation(field.name, reason))?;
            }

            params.insert(field.name, coerced);
        }

        Ok(params)
    }

    pub fn check_cross(&self, params: &Params, persisted: Option<&Params>) -> AppResult<()> {
        let view = match persisted {
            Some(base) => params.overlay(base),
            None => params.clone(),
        };

        for rule in self.cross {
            if !rule.triggers.iter().any(|name| params.contains(name)) {
                continue;
            }
            (rule.check)(&view).map_err(|reason| rule.violation(reason))?;
        }

        Ok(())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_int(name: &str, raw: &Value) -> Result<i64, String> {
    let exact = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if let Some(int) = exact {
        return Ok(int.saturating_abs());
    }

    // fractional or out-of-range input goes through absint
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .map(absint)
        .ok_or_else(|| format!("{name} must be an integer"))
}

fn coerce_bool(name: &str, raw: &Value) -> Result<bool, String> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(format!("{name} must be a boolean")),
        },
        _ => Err(format!("{name} must be a boolean")),
    }
}

fn coerce_string(name: &str, raw: &Value) -> Result<String, String> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(format!("{name} must be a string")),
    }
}

fn coerce_key_list(name: &str, raw: &Value) -> Result<Vec<String>, String> {
    let items: Vec<String> = match raw {
        Value::Array(values) => values
            .iter()
            .map(|v| coerce_string(name, v))
            .collect::<Result<_, _>>()?,
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => return Err(format!("{name} must be a list of strings")),
    };

    let mut keys: Vec<String> = Vec::with_capacity(items.len());
    for key in items.iter().map(|item| sanitize_key(item)) {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Predicate: text must be non-empty after sanitization.
pub fn not_empty(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Text(s) if s.is_empty() => Err("must not be empty".to_string()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SAMPLE: Schema = Schema {
        fields: &[
            FieldSpec::new("name", FieldKind::Text).required().validate(not_empty),
            FieldSpec::new("capacity", FieldKind::Int).nullable(),
            FieldSpec::new("is_active", FieldKind::Bool).default(DefaultValue::Bool(true)),
            FieldSpec::new("status", FieldKind::Enum(&["pending", "draft"])),
            FieldSpec::new("roles", FieldKind::KeyList),
            FieldSpec::new("org_id", FieldKind::Id),
        ],
        cross: &[],
    };

    #[test]
    fn missing_required_field_names_the_parameter() {
        let err = SAMPLE.normalize(&RawParams::new()).unwrap_err();
        match err {
            AppError::Validation { param, .. } => assert_eq!(param, "name"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn absent_optional_fields_are_omitted_unless_defaulted() {
        let params = SAMPLE
            .normalize(&RawParams::new().with("name", "Desk"))
            .expect("valid");
        assert!(!params.contains("capacity"));
        assert!(!params.contains("status"));
        assert_eq!(params.bool("is_active"), Some(true));
    }

    #[test]
    fn integers_are_coerced_to_absolute_values() {
        let params = SAMPLE
            .normalize(&RawParams::new().with("name", "Desk").with("capacity", "-3.6"))
            .expect("valid");
        assert_eq!(params.int("capacity"), Some(4));
    }

    #[test]
    fn explicit_null_clears_nullable_fields() {
        let params = SAMPLE
            .normalize(&RawParams::new().with("name", "Desk").with("capacity", json!(null)))
            .expect("valid");
        assert_eq!(params.get("capacity"), Some(&ParamValue::Null));
    }

    #[test]
    fn enum_violation_is_rejected() {
        let err = SAMPLE
            .normalize(&RawParams::new().with("name", "Desk").with("status", "archived"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref param, .. } if param == "status"));
    }

    #[test]
    fn markup_only_name_fails_predicate() {
        let err = SAMPLE
            .normalize(&RawParams::new().with("name", "<b></b>"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref param, .. } if param == "name"));
    }

    #[test]
    fn key_lists_accept_arrays_and_comma_strings() {
        let from_array = SAMPLE
            .normalize(&RawParams::new().with("name", "x").with("roles", json!(["Scheduler", "employee", "scheduler"])))
            .expect("valid");
        assert_eq!(from_array.list("roles"), Some(&["scheduler".to_string(), "employee".to_string()][..]));

        let from_string = SAMPLE
            .normalize(&RawParams::new().with("name", "x").with("roles", "scheduler, employee"))
            .expect("valid");
        assert_eq!(from_array.list("roles"), from_string.list("roles"));
    }

    #[test]
    fn zero_is_not_an_identifier() {
        let err = SAMPLE
            .normalize(&RawParams::new().with("name", "x").with("org_id", "0"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref param, .. } if param == "org_id"));
    }

    #[test]
    fn cross_rules_fall_back_to_persisted_values() {
        fn ordered(view: &Params) -> Result<(), String> {
            match (view.int("low"), view.int("high")) {
                (Some(low), Some(high)) if high <= low => Err("high must exceed low".into()),
                _ => Ok(()),
            }
        }
        let schema = Schema {
            fields: &[],
            cross: &[CrossRule {
                param: "high",
                triggers: &["low", "high"],
                code: None,
                check: ordered,
            }],
        };

        let persisted = Params::new().with("low", ParamValue::Int(5)).with("high", ParamValue::Int(9));
        let update = Params::new().with("high", ParamValue::Int(3));
        assert!(schema.check_cross(&update, Some(&persisted)).is_err());

        let untouched = Params::new().with("other", ParamValue::Int(1));
        assert!(schema.check_cross(&untouched, Some(&persisted)).is_ok());
    }

    #[test]
    fn coded_cross_rules_keep_their_code() {
        fn distinct(view: &Params) -> Result<(), String> {
            if view.int("a") == view.int("b") {
                return Err("a and b must differ".into());
            }
            Ok(())
        }
        let schema = Schema {
            fields: &[],
            cross: &[CrossRule {
                param: "b",
                triggers: &["b"],
                code: Some("same_value"),
                check: distinct,
            }],
        };

        let params = Params::new().with("a", ParamValue::Int(2)).with("b", ParamValue::Int(2));
        let err = schema.check_cross(&params, None).unwrap_err();
        assert_eq!(err.code(), "same_value");
    }

    #[test]
    fn large_identifiers_survive_coercion() {
        let id = 9_007_199_254_740_993_i64;
        let from_number = SAMPLE
            .normalize(&RawParams::new().with("name", "x").with("org_id", json!(id)))
            .expect("valid");
        assert_eq!(from_number.int("org_id"), Some(id));

        let from_string = SAMPLE
            .normalize(&RawParams::new().with("name", "x").with("org_id", id.to_string()))
            .expect("valid");
        assert_eq!(from_string.int("org_id"), Some(id));
    }

    #[test]
    fn datetimes_are_truncated_to_whole_seconds() {
        static SCHEMA: Schema = Schema {
            fields: &[FieldSpec::new("at", FieldKind::DateTime)],
            cross: &[],
        };
        let params = SCHEMA
            .normalize(&RawParams::new().with("at", "2025-06-01T09:00:00.700Z"))
            .expect("valid");
        let expected = parse_datetime("2025-06-01T09:00:00Z").expect("parse");
        assert_eq!(params.datetime("at"), Some(expected));
    }
}
