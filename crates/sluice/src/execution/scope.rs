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

use crate::expression::{assign_path, lookup_path, EvaluationError, PropertyResolver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Request,
    Flash,
    View,
    Flow,
    Conversation,
}
impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Request => "requestScope",
            ScopeType::Flash => "flashScope",
            ScopeType::View => "viewScope",
            ScopeType::Flow => "flowScope",
            ScopeType::Conversation => "conversationScope",
        }
    }
    pub fn from_variable(name: &str) -> Option<Self> {
        match name {
            "requestScope" => Some(ScopeType::Request),
            "flashScope" => Some(ScopeType::Flash),
            "viewScope" => Some(ScopeType::View),
            "flowScope" => Some(ScopeType::Flow),
            "conversationScope" => Some(ScopeType::Conversation),
            _ => None,
        }
    }
    /// Order in which unqualified names are searched.
    pub const SEARCH_ORDER: [ScopeType; 5] = [
        ScopeType::Request,
        ScopeType::Flash,
        ScopeType::View,
        ScopeType::Flow,
        ScopeType::Conversation,
    ];
}
impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
/// A named bucket of JSON attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    attributes: HashMap<String, Value>,
}
impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).and_then(Value::as_i64)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
    pub fn put(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(name.into(), value)
    }
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.put(name, value);
        self
    }
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
    pub fn clear(&mut self) {
        self.attributes.clear();
    }
    pub fn len(&self) -> usize {
        self.attributes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }
    pub fn extend(&mut self, other: &AttributeMap) {
        for (name, value) in other.iter() {
            self.attributes.insert(name.clone(), value.clone());
        }
    }
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        lookup_path(self.attributes.get(first)?, rest)
    }
    pub fn set_path(&mut self, path: &[String], value: Value) -> Result<(), EvaluationError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(EvaluationError::InvalidAssignment {
                path: String::new(),
                reason: "empty path".to_string(),
            });
        };
        let slot = self
            .attributes
            .entry(first.clone())
            .or_insert(Value::Null);
        assign_path(slot, rest, value)
    }
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
impl From<HashMap<String, Value>> for AttributeMap {
    fn from(attributes: HashMap<String, Value>) -> Self {
        Self { attributes }
    }
}
impl FromIterator<(String, Value)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}
impl PropertyResolver for AttributeMap {
    fn get_property(&self, path: &[String]) -> Option<Value> {
        self.get_path(path).cloned()
    }
    fn set_property(&mut self, path: &[String], value: Value) -> Result<(), EvaluationError> {
        self.set_path(path, value)
    }
}
