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

use crate::engine::action::ActionError;
use crate::engine::mapping::MappingError;
use crate::expression::{EvaluationError, ExpressionParseError};
use thiserror::Error;
/// Raised while a flow is being assembled. Never recoverable for that attempt.
#[derive(Error, Debug)]
pub enum FlowBuilderError {
    #[error("Flow artifact not found: {kind} '{id}'")]
    ArtifactNotFound { kind: String, id: String },
    #[error("Builder phase out of order: expected {expected}, got {actual}")]
    PhaseOrder { expected: String, actual: String },
    #[error("Builder has no flow under construction during phase {0}")]
    NotInitialized(String),
    #[error("Malformed flow model '{resource}': {reason}")]
    MalformedModel { resource: String, reason: String },
    #[error("Flow '{flow_id}' has no states")]
    EmptyFlow { flow_id: String },
    #[error("Duplicate state '{state_id}' in flow '{flow_id}'")]
    DuplicateState { flow_id: String, state_id: String },
    #[error("Start state '{state_id}' not found in flow '{flow_id}'")]
    StartStateNotFound { flow_id: String, state_id: String },
    #[error("State '{state_id}' of flow '{flow_id}' targets unknown state '{target}'")]
    InvalidTarget {
        flow_id: String,
        state_id: String,
        target: String,
    },
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionParseError),
    #[error("Flow resource error: {0}")]
    Io(#[from] std::io::Error),
}
/// Raised while an execution processes a request. Offered to the exception
/// handler chain before it reaches the caller.
#[derive(Error, Debug)]
pub enum FlowExecutionError {
    #[error("Action failed in flow '{flow_id}' state '{}': {source}", .state_id.as_deref().unwrap_or("<none>"))]
    ActionExecution {
        flow_id: String,
        state_id: Option<String>,
        #[source]
        source: ActionError,
    },
    #[error("No transition in flow '{flow_id}' state '{state_id}' matches event '{event_id}'")]
    NoMatchingTransition {
        flow_id: String,
        state_id: String,
        event_id: String,
    },
    #[error("No action result of state '{state_id}' in flow '{flow_id}' matched a transition (signaled {events:?})")]
    NoMatchingActionResult {
        flow_id: String,
        state_id: String,
        events: Vec<String>,
    },
    #[error("Transition on '{event_id}' from state '{state_id}' of flow '{flow_id}' was vetoed")]
    TransitionVetoed {
        flow_id: String,
        state_id: String,
        event_id: String,
    },
    #[error("Target state '{target}' from state '{state_id}' not found in flow '{flow_id}'")]
    TargetStateNotFound {
        flow_id: String,
        state_id: String,
        target: String,
    },
    #[error("Attribute mapping failed in flow '{flow_id}' with {} error(s)", .errors.len())]
    Mapping {
        flow_id: String,
        errors: Vec<MappingError>,
    },
    #[error("Expression evaluation failed in flow '{flow_id}': {source}")]
    Evaluation {
        flow_id: String,
        #[source]
        source: EvaluationError,
    },
    #[error("Subflow of state '{state_id}' in flow '{flow_id}' could not be resolved: {source}")]
    SubflowNotFound {
        flow_id: String,
        state_id: String,
        #[source]
        source: FlowLocatorError,
    },
    #[error("Illegal execution state: {0}")]
    IllegalState(String),
}
impl FlowExecutionError {
    /// Kind names used by exception handlers, most specific first.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds = match self {
            Self::ActionExecution { source, .. } => {
                vec![source.kind.clone(), "action_execution".to_string()]
            }
            Self::NoMatchingTransition { .. } => vec!["no_matching_transition".to_string()],
            Self::NoMatchingActionResult { .. } => vec!["no_matching_action_result".to_string()],
            Self::TransitionVetoed { .. } => vec!["transition_vetoed".to_string()],
            Self::TargetStateNotFound { .. } => vec!["target_state_not_found".to_string()],
            Self::Mapping { .. } => vec!["mapping".to_string()],
            Self::Evaluation { .. } => vec!["evaluation".to_string()],
            Self::SubflowNotFound { .. } => vec!["subflow_not_found".to_string()],
            Self::IllegalState(_) => vec!["illegal_state".to_string()],
        };
        kinds.push("flow_execution".to_string());
        kinds
    }
    /// False when the session stack may have been left inconsistent.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, Self::IllegalState(_))
    }
    pub fn flow_id(&self) -> Option<&str> {
        match self {
            Self::ActionExecution { flow_id, .. }
            | Self::NoMatchingTransition { flow_id, .. }
            | Self::NoMatchingActionResult { flow_id, .. }
            | Self::TransitionVetoed { flow_id, .. }
            | Self::TargetStateNotFound { flow_id, .. }
            | Self::Mapping { flow_id, .. }
            | Self::Evaluation { flow_id, .. }
            | Self::SubflowNotFound { flow_id, .. } => Some(flow_id),
            Self::IllegalState(_) => None,
        }
    }
}
#[derive(Error, Debug)]
pub enum FlowLocatorError {
    #[error("No flow definition '{flow_id}' found")]
    NoSuchFlowDefinition { flow_id: String },
    #[error("Flow definition '{flow_id}' could not be assembled: {source}")]
    Assembly {
        flow_id: String,
        #[source]
        source: FlowBuilderError,
    },
}
/// Storage and locking failures. Callers typically restart the flow.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("No flow execution found for key '{key}'")]
    NoSuchFlowExecution { key: String },
    #[error("Flow execution '{key}' has expired")]
    FlowExecutionExpired { key: String },
    #[error("Bad flow execution key '{key}': {reason}")]
    BadFlowExecutionKey { key: String, reason: String },
    #[error("Timed out after {waited_ms}ms waiting for lock on conversation '{conversation}' held by {owner}")]
    LockTimeout {
        conversation: String,
        owner: String,
        waited_ms: u64,
    },
    #[error("Invalid lock owner: expected={expected}, actual={actual}")]
    InvalidLockOwner { expected: String, actual: String },
    #[error("Lock on conversation '{conversation}' is not held")]
    LockNotHeld { conversation: String },
    #[error("Snapshot for '{key}' could not be processed: {source}")]
    Snapshot {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Flow definition error: {0}")]
    FlowDefinition(#[from] FlowLocatorError),
}
#[derive(Error, Debug)]
pub enum FlowExecutorError {
    #[error(transparent)]
    Locator(#[from] FlowLocatorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Execution(#[from] FlowExecutionError),
}
impl FlowExecutorError {
    /// Everything except a definition that fails to assemble can be answered
    /// with a restart or an error view.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Locator(FlowLocatorError::Assembly { .. }))
    }
    pub fn is_no_such_execution(&self) -> bool {
        matches!(
            self,
            Self::Repository(
                RepositoryError::NoSuchFlowExecution { .. }
                    | RepositoryError::FlowExecutionExpired { .. }
            )
        )
    }
}
