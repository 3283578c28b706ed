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

use super::scope::AttributeMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
pub const SUCCESS_EVENT: &str = "success";
pub const ERROR_EVENT: &str = "error";
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeMap,
}
impl Event {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: AttributeMap::new(),
        }
    }
    pub fn success() -> Self {
        Self::new(SUCCESS_EVENT)
    }
    pub fn error() -> Self {
        Self::new(ERROR_EVENT)
    }
    pub fn yes_or_no(value: bool) -> Self {
        Self::new(if value { "yes" } else { "no" })
    }
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.put(name, value);
        self
    }
    pub fn with_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }
    /// `success`, `yes` and `true` all count as a successful action result.
    pub fn is_success(&self) -> bool {
        matches!(self.id.as_str(), "success" | "yes" | "true")
    }
    pub fn to_value(&self) -> Value {
        json!({ "id": self.id, "attributes": self.attributes.to_value() })
    }
}
/// The caller's side of a request. The request id doubles as the lock owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalContext {
    request_id: String,
    parameters: AttributeMap,
}
impl Default for ExternalContext {
    fn default() -> Self {
        Self::new()
    }
}
impl ExternalContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            parameters: AttributeMap::new(),
        }
    }
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.put(name, value);
        self
    }
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
    pub fn parameters(&self) -> &AttributeMap {
        &self.parameters
    }
}
