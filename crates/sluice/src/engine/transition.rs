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

use super::action::{Action, ActionError};
use crate::execution::{AttributeMap, RequestContext};
use crate::expression::{is_truthy, value_to_string, EvaluationError, Expression};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
/// Decides whether a transition applies to the current event.
#[derive(Debug, Clone)]
pub enum TransitionCriteria {
    Event(String),
    Wildcard,
    Expression(Arc<dyn Expression>),
    Always,
}
impl TransitionCriteria {
    pub fn for_event(on: &str) -> Self {
        if on == "*" {
            TransitionCriteria::Wildcard
        } else {
            TransitionCriteria::Event(on.to_string())
        }
    }
    pub fn test(&self, context: &RequestContext<'_>) -> Result<bool, EvaluationError> {
        match self {
            TransitionCriteria::Event(id) => {
                Ok(context.current_event().is_some_and(|event| event.id == *id))
            }
            TransitionCriteria::Wildcard | TransitionCriteria::Always => Ok(true),
            TransitionCriteria::Expression(expression) => {
                Ok(is_truthy(&expression.get_value(context)?))
            }
        }
    }
}
impl fmt::Display for TransitionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionCriteria::Event(id) => f.write_str(id),
            TransitionCriteria::Wildcard => f.write_str("*"),
            TransitionCriteria::Expression(expression) => {
                write!(f, "${{{}}}", expression.expression_string())
            }
            TransitionCriteria::Always => f.write_str("<always>"),
        }
    }
}
#[derive(Debug, Clone)]
pub enum TargetStateResolver {
    Static(String),
    /// Evaluated when the transition fires; checked against the flow then.
    Dynamic(Arc<dyn Expression>),
}
impl TargetStateResolver {
    pub fn resolve(&self, context: &RequestContext<'_>) -> Result<String, EvaluationError> {
        match self {
            TargetStateResolver::Static(id) => Ok(id.clone()),
            TargetStateResolver::Dynamic(expression) => {
                let target = value_to_string(&expression.get_value(context)?);
                if target.is_empty() {
                    return Err(EvaluationError::InvalidResult {
                        expression: expression.expression_string().to_string(),
                        reason: "target state id is empty".to_string(),
                    });
                }
                Ok(target)
            }
        }
    }
    pub fn static_target(&self) -> Option<&str> {
        match self {
            TargetStateResolver::Static(id) => Some(id),
            TargetStateResolver::Dynamic(_) => None,
        }
    }
}
/// What happens to earlier snapshots when a transition fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum History {
    #[default]
    Preserve,
    /// Drop the snapshot the request resumed from.
    Discard,
    /// Drop every earlier snapshot of the conversation.
    Invalidate,
}
#[derive(Clone)]
pub struct Transition {
    criteria: TransitionCriteria,
    execution_criteria: Vec<Arc<dyn Action>>,
    target: Option<TargetStateResolver>,
    history: History,
    attributes: AttributeMap,
}
impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("on", &self.criteria.to_string())
            .field("target", &self.target)
            .field("guards", &self.execution_criteria.len())
            .field("history", &self.history)
            .finish()
    }
}
impl Transition {
    pub(crate) fn new(
        criteria: TransitionCriteria,
        execution_criteria: Vec<Arc<dyn Action>>,
        target: Option<TargetStateResolver>,
        history: History,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            criteria,
            execution_criteria,
            target,
            history,
            attributes,
        }
    }
    pub fn criteria(&self) -> &TransitionCriteria {
        &self.criteria
    }
    pub fn target(&self) -> Option<&TargetStateResolver> {
        self.target.as_ref()
    }
    pub fn history(&self) -> History {
        self.history
    }
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    pub fn matches(&self, context: &RequestContext<'_>) -> Result<bool, EvaluationError> {
        self.criteria.test(context)
    }
    /// Runs the guard chain in order; the first non-success result vetoes.
    pub fn can_execute(&self, context: &mut RequestContext<'_>) -> Result<bool, ActionError> {
        for action in &self.execution_criteria {
            if !action.execute(context)?.is_success() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
