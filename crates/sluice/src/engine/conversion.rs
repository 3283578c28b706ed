// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("No converter registered for type '{0}'")]
    UnsupportedType(String),
    #[error("Cannot convert {value} to {target_type}")]
    InvalidValue { value: String, target_type: String },
}
pub trait ConversionService: Send + Sync {
    fn convert(&self, value: Value, target_type: &str) -> Result<Value, ConversionError>;
    fn supports(&self, target_type: &str) -> bool;
}
pub type Converter = fn(Value) -> Result<Value, ConversionError>;
pub struct DefaultConversionService {
    converters: HashMap<String, Converter>,
}
impl Default for DefaultConversionService {
    fn default() -> Self {
        Self::new()
    }
}
impl DefaultConversionService {
    pub fn new() -> Self {
        let mut service = Self {
            converters: HashMap::new(),
        };
        service.add_converter("string", to_string);
        service.add_converter("integer", to_integer);
        service.add_converter("int", to_integer);
        service.add_converter("long", to_integer);
        service.add_converter("number", to_number);
        service.add_converter("float", to_number);
        service.add_converter("double", to_number);
        service.add_converter("boolean", to_boolean);
        service.add_converter("bool", to_boolean);
        service
    }
    pub fn add_converter(&mut self, type_name: &str, converter: Converter) {
        self.converters
            .insert(type_name.to_ascii_lowercase(), converter);
    }
}
impl ConversionService for DefaultConversionService {
    fn convert(&self, value: Value, target_type: &str) -> Result<Value, ConversionError> {
        let converter = self
            .converters
            .get(&target_type.to_ascii_lowercase())
            .ok_or_else(|| ConversionError::UnsupportedType(target_type.to_string()))?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        converter(value)
    }
    fn supports(&self, target_type: &str) -> bool {
        self.converters
            .contains_key(&target_type.to_ascii_lowercase())
    }
}
fn invalid(value: &Value, target_type: &str) -> ConversionError {
    ConversionError::InvalidValue {
        value: value.to_string(),
        target_type: target_type.to_string(),
    }
}
fn to_string(value: Value) -> Result<Value, ConversionError> {
    Ok(match value {
        Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    })
}
fn to_integer(value: Value) -> Result<Value, ConversionError> {
    match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Value::from)
            .ok_or_else(|| invalid(&value, "integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(&value, "integer")),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        _ => Err(invalid(&value, "integer")),
    }
}
fn to_number(value: Value) -> Result<Value, ConversionError> {
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| invalid(&value, "number"))
}
fn to_boolean(value: Value) -> Result<Value, ConversionError> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(&value, "boolean")),
        },
        Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        _ => Err(invalid(&value, "boolean")),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_common_types() {
        let service = DefaultConversionService::new();
        assert_eq!(service.convert(json!("42"), "integer").unwrap(), json!(42));
        assert_eq!(service.convert(json!(4.0), "int").unwrap(), json!(4));
        assert_eq!(service.convert(json!("2.5"), "double").unwrap(), json!(2.5));
        assert_eq!(service.convert(json!("yes"), "boolean").unwrap(), json!(true));
        assert_eq!(service.convert(json!(7), "string").unwrap(), json!("7"));
        assert_eq!(service.convert(Value::Null, "integer").unwrap(), Value::Null);
    }

    #[test]
    fn rejects_bad_values_and_unknown_types() {
        let service = DefaultConversionService::new();
        assert!(matches!(
            service.convert(json!("abc"), "integer"),
            Err(ConversionError::InvalidValue { .. })
        ));
        assert!(matches!(
            service.convert(json!(1), "date"),
            Err(ConversionError::UnsupportedType(_))
        ));
    }
}
