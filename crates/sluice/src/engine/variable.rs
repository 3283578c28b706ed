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

use crate::expression::{EvaluationError, Expression, PropertyResolver};
use serde_json::Value;
use std::sync::Arc;
#[derive(Debug, Clone)]
pub enum VariableValue {
    Literal(Value),
    Expression(Arc<dyn Expression>),
}
/// A flow or view variable, created when its scope starts.
#[derive(Debug, Clone)]
pub struct FlowVariable {
    name: String,
    initial: VariableValue,
}
impl FlowVariable {
    pub fn new(name: impl Into<String>, initial: VariableValue) -> Self {
        Self {
            name: name.into(),
            initial,
        }
    }
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, VariableValue::Literal(value))
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn create_value(&self, context: &dyn PropertyResolver) -> Result<Value, EvaluationError> {
        match &self.initial {
            VariableValue::Literal(value) => Ok(value.clone()),
            VariableValue::Expression(expression) => expression.get_value(context),
        }
    }
}
