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

pub mod parser;
pub use parser::{is_template, SimpleExpressionParser};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
/// Something expressions can read from and write to. Paths are split on `.`.
pub trait PropertyResolver {
    fn get_property(&self, path: &[String]) -> Option<Value>;
    fn set_property(&mut self, path: &[String], value: Value) -> Result<(), EvaluationError>;
}
pub trait Expression: Send + Sync + fmt::Debug {
    fn get_value(&self, context: &dyn PropertyResolver) -> Result<Value, EvaluationError>;
    fn set_value(
        &self,
        context: &mut dyn PropertyResolver,
        value: Value,
    ) -> Result<(), EvaluationError>;
    fn expression_string(&self) -> &str;
    fn is_settable(&self) -> bool {
        false
    }
}
pub trait ExpressionParser: Send + Sync {
    fn parse_expression(
        &self,
        expression: &str,
        context: &ParserContext,
    ) -> Result<Arc<dyn Expression>, ExpressionParseError>;
}
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserContext {
    /// `text ${expr} text` instead of a bare expression.
    pub template: bool,
}
impl ParserContext {
    pub fn eval() -> Self {
        Self { template: false }
    }
    pub fn template() -> Self {
        Self { template: true }
    }
}
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Expression '{expression}' is not settable")]
    NotSettable { expression: String },
    #[error("Property '{path}' is read-only")]
    ReadOnlyProperty { path: String },
    #[error("Cannot assign '{path}': {reason}")]
    InvalidAssignment { path: String, reason: String },
    #[error("Expression '{expression}' produced an unusable result: {reason}")]
    InvalidResult { expression: String, reason: String },
}
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionParseError {
    InvalidFormat { message: String, expression: String },
    UnexpectedToken { token: String, expression: String },
    UnterminatedString(String),
    UnterminatedTemplate(String),
}
impl fmt::Display for ExpressionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionParseError::InvalidFormat {
                message,
                expression,
            } => {
                write!(f, "Invalid expression '{expression}': {message}")
            }
            ExpressionParseError::UnexpectedToken { token, expression } => {
                write!(
                    f,
                    "Unexpected token '{token}' in '{expression}'. Supported: ==, !=, >, <, >=, <=, contains, and, or, not"
                )
            }
            ExpressionParseError::UnterminatedString(expression) => {
                write!(f, "Unterminated string literal in '{expression}'")
            }
            ExpressionParseError::UnterminatedTemplate(expression) => {
                write!(f, "Unterminated '${{' in template '{expression}'")
            }
        }
    }
}
impl std::error::Error for ExpressionParseError {}
/// Booleans are themselves, null is false, anything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => true,
    }
}
pub fn lookup_path<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
/// Writes `value` below `root` at `path`, creating intermediate objects.
pub fn assign_path(root: &mut Value, path: &[String], value: Value) -> Result<(), EvaluationError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut current = root;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            _ => {
                return Err(EvaluationError::InvalidAssignment {
                    path: path.join("."),
                    reason: format!("'{segment}' is not an object"),
                })
            }
        };
    }
    if current.is_null() {
        *current = Value::Object(serde_json::Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        _ => Err(EvaluationError::InvalidAssignment {
            path: path.join("."),
            reason: format!("parent of '{last}' is not an object"),
        }),
    }
}
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
pub fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
