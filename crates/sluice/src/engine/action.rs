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

use super::conversion::{ConversionError, ConversionService};
use crate::execution::{Event, RequestContext};
use crate::expression::{EvaluationError, Expression};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
/// A failure raised by an action. `kind` is what exception handlers match on,
/// dotted kinds such as `payment.declined` also match the handler `payment`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ActionError {
    pub kind: String,
    pub message: String,
}
impl ActionError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
impl From<EvaluationError> for ActionError {
    fn from(error: EvaluationError) -> Self {
        Self::new("evaluation", error.to_string())
    }
}
impl From<ConversionError> for ActionError {
    fn from(error: ConversionError) -> Self {
        Self::new("conversion", error.to_string())
    }
}
/// Unit of work invoked at state entry and exit, inside action states, as a
/// transition guard and at flow start and end.
pub trait Action: Send + Sync {
    fn execute(&self, context: &mut RequestContext<'_>) -> Result<Event, ActionError>;
}
type ActionFn = dyn Fn(&mut RequestContext<'_>) -> Result<Event, ActionError> + Send + Sync;
pub struct FnAction {
    name: String,
    f: Box<ActionFn>,
}
impl FnAction {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut RequestContext<'_>) -> Result<Event, ActionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}
impl Action for FnAction {
    fn execute(&self, context: &mut RequestContext<'_>) -> Result<Event, ActionError> {
        (self.f)(context)
    }
}
#[derive(Clone)]
pub struct TypeConversion {
    pub target_type: String,
    pub service: Arc<dyn ConversionService>,
}
impl TypeConversion {
    pub fn apply(&self, value: Value) -> Result<Value, ConversionError> {
        self.service.convert(value, &self.target_type)
    }
}
impl fmt::Debug for TypeConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_type)
    }
}
/// Evaluates an expression and optionally stores its result.
#[derive(Debug)]
pub struct EvaluateAction {
    expression: Arc<dyn Expression>,
    result: Option<Arc<dyn Expression>>,
    result_type: Option<TypeConversion>,
}
impl EvaluateAction {
    pub fn new(expression: Arc<dyn Expression>) -> Self {
        Self {
            expression,
            result: None,
            result_type: None,
        }
    }
    pub fn with_result(mut self, result: Arc<dyn Expression>) -> Self {
        self.result = Some(result);
        self
    }
    pub fn with_result_type(mut self, conversion: TypeConversion) -> Self {
        self.result_type = Some(conversion);
        self
    }
}
/// Booleans signal `yes`/`no`, non-empty strings signal themselves.
fn result_event(value: &Value) -> Event {
    match value {
        Value::Bool(b) => Event::yes_or_no(*b),
        Value::String(s) if !s.is_empty() => Event::new(s.clone()),
        _ => Event::success(),
    }
}
impl Action for EvaluateAction {
    fn execute(&self, context: &mut RequestContext<'_>) -> Result<Event, ActionError> {
        let mut value = self.expression.get_value(&*context)?;
        if let Some(conversion) = &self.result_type {
            value = conversion.apply(value)?;
        }
        let event = result_event(&value);
        if let Some(result) = &self.result {
            result.set_value(context, value)?;
        }
        Ok(event)
    }
}
#[derive(Debug)]
pub struct SetAction {
    target: Arc<dyn Expression>,
    value: Arc<dyn Expression>,
    conversion: Option<TypeConversion>,
}
impl SetAction {
    pub fn new(target: Arc<dyn Expression>, value: Arc<dyn Expression>) -> Self {
        Self {
            target,
            value,
            conversion: None,
        }
    }
    pub fn with_conversion(mut self, conversion: TypeConversion) -> Self {
        self.conversion = Some(conversion);
        self
    }
}
impl Action for SetAction {
    fn execute(&self, context: &mut RequestContext<'_>) -> Result<Event, ActionError> {
        let mut value = self.value.get_value(&*context)?;
        if let Some(conversion) = &self.conversion {
            value = conversion.apply(value)?;
        }
        self.target.set_value(context, value)?;
        Ok(Event::success())
    }
}
