use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// Raw, untyped request input merged from query string, JSON body and path.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    values: BTreeMap<String, Value>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the three request sources. Later sources win: query < body < path.
    pub fn from_request(
        path: HashMap<String, String>,
        query: HashMap<String, String>,
        body: &[u8],
    ) -> AppResult<Self> {
        let mut raw = Self::new();

        for (key, value) in query {
            raw.values.insert(key, Value::String(value));
        }

        if !body.iter().all(u8::is_ascii_whitespace) {
            let parsed: Value = serde_json::from_slice(body)
                .map_err(|err| AppError::bad_request("invalid_json", format!("Request body is not valid JSON: {err}")))?;
            match parsed {
                Value::Object(map) => raw.values.extend(map),
                Value::Null => {}
                _ => {
                    return Err(AppError::bad_request(
                        "invalid_json",
                        "Request body must be a JSON object.",
                    ))
                }
            }
        }

        for (key, value) in path {
            raw.values.insert(key, Value::String(value));
        }

        Ok(raw)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Text(String),
    DateTime(DateTime<Utc>),
    List(Vec<String>),
    /// Explicit request to clear a nullable field.
    Null,
}

/// Normalized, typed parameters produced by a [`super::Schema`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.values.insert(key.into(), value);
    }

    pub fn with(mut self, key: &str, value: ParamValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values from `self` laid over `base`; keys missing here fall back to `base`.
    pub fn overlay(&self, base: &Params) -> Params {
        let mut merged = base.clone();
        for (key, value) in &self.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(ParamValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key) {
            Some(ParamValue::DateTime(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.get(key) {
            Some(ParamValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Parsed enum value. The schema has already checked membership.
    pub fn parsed<T: FromStr<Err = AppError>>(&self, key: &str) -> AppResult<Option<T>> {
        self.text(key).map(str::parse).transpose()
    }

    pub fn require_int(&self, key: &str) -> AppResult<i64> {
        self.int(key)
            .ok_or_else(|| AppError::validation(key, format!("{key} is required")))
    }

    pub fn require_text(&self, key: &str) -> AppResult<String> {
        self.text(key)
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(key, format!("{key} is required")))
    }

    pub fn require_datetime(&self, key: &str) -> AppResult<DateTime<Utc>> {
        self.datetime(key)
            .ok_or_else(|| AppError::validation(key, format!("{key} is required")))
    }

    /// Tri-state for nullable integer columns: absent, cleared, or set.
    pub fn patch_int(&self, key: &str) -> Option<Option<i64>> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Some(Some(*v)),
            Some(ParamValue::Null) => Some(None),
            _ => None,
        }
    }

    /// Tri-state for nullable text columns: absent, cleared, or set.
    pub fn patch_text(&self, key: &str) -> Option<Option<String>> {
        match self.get(key) {
            Some(ParamValue::Text(v)) => Some(Some(v.clone())),
            Some(ParamValue::Null) => Some(None),
            _ => None,
        }
    }
}
