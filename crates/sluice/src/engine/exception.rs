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

use crate::errors::FlowExecutionError;
use crate::execution::RequestContext;
use serde_json::json;
use std::sync::Arc;
pub const FLOW_EXECUTION_EXCEPTION_ATTRIBUTE: &str = "flowExecutionException";
pub const ROOT_CAUSE_EXCEPTION_ATTRIBUTE: &str = "rootCauseException";
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionHandling {
    /// The handler dealt with the error itself and the request completes.
    Handled,
    /// Exit the current state and enter the named one.
    EnterState(String),
}
pub trait FlowExecutionExceptionHandler: Send + Sync {
    fn can_handle(&self, error: &FlowExecutionError) -> bool;
    fn handle(
        &self,
        error: &FlowExecutionError,
        context: &mut RequestContext<'_>,
    ) -> Result<ExceptionHandling, FlowExecutionError>;
    /// Statically known state this handler routes to, checked at assembly.
    fn target_state(&self) -> Option<&str> {
        None
    }
}
/// `*` matches anything; otherwise an exact kind or a dotted prefix of it.
pub fn kind_matches(pattern: &str, kind: &str) -> bool {
    pattern == "*"
        || pattern == kind
        || kind
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('.'))
}
/// Routes matching errors to a state, exposing the error in flash scope.
#[derive(Debug, Clone)]
pub struct TransitionExecutingHandler {
    kinds: Vec<String>,
    target_state: String,
}
impl TransitionExecutingHandler {
    pub fn new(target_state: impl Into<String>) -> Self {
        Self {
            kinds: Vec::new(),
            target_state: target_state.into(),
        }
    }
    pub fn on(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }
}
impl FlowExecutionExceptionHandler for TransitionExecutingHandler {
    fn can_handle(&self, error: &FlowExecutionError) -> bool {
        let kinds = error.kinds();
        self.kinds
            .iter()
            .any(|pattern| kinds.iter().any(|kind| kind_matches(pattern, kind)))
    }
    fn handle(
        &self,
        error: &FlowExecutionError,
        context: &mut RequestContext<'_>,
    ) -> Result<ExceptionHandling, FlowExecutionError> {
        let mut root: &dyn std::error::Error = error;
        while let Some(cause) = root.source() {
            root = cause;
        }
        let kinds = error.kinds();
        let flash = context.flash_scope_mut();
        flash.put(
            FLOW_EXECUTION_EXCEPTION_ATTRIBUTE,
            json!({ "kind": kinds.first(), "message": error.to_string() }),
        );
        flash.put(ROOT_CAUSE_EXCEPTION_ATTRIBUTE, json!(root.to_string()));
        Ok(ExceptionHandling::EnterState(self.target_state.clone()))
    }
    fn target_state(&self) -> Option<&str> {
        Some(&self.target_state)
    }
}
/// Handlers in declaration order; the first one that accepts an error wins.
#[derive(Clone, Default)]
pub struct ExceptionHandlerSet {
    handlers: Vec<Arc<dyn FlowExecutionExceptionHandler>>,
}
impl ExceptionHandlerSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add(&mut self, handler: Arc<dyn FlowExecutionExceptionHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FlowExecutionExceptionHandler>> {
        self.handlers.iter()
    }
    pub fn find(&self, error: &FlowExecutionError) -> Option<&Arc<dyn FlowExecutionExceptionHandler>> {
        self.handlers.iter().find(|handler| handler.can_handle(error))
    }
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
impl From<Vec<Arc<dyn FlowExecutionExceptionHandler>>> for ExceptionHandlerSet {
    fn from(handlers: Vec<Arc<dyn FlowExecutionExceptionHandler>>) -> Self {
        Self { handlers }
    }
}
