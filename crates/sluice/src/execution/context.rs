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

use super::event::{Event, ExternalContext};
use super::execution::FlowExecution;
use super::listener::FlowExecutionListener;
use super::scope::{AttributeMap, ScopeType};
use crate::engine::{Flow, RenderedView};
use crate::expression::{lookup_path, EvaluationError, PropertyResolver};
use crate::logging;
use crate::registry::FlowDefinitionLocator;
use serde_json::Value;
use std::sync::Arc;
/// Everything an action or expression may touch while one request is being
/// processed. Passed explicitly; it lives exactly as long as the request.
pub struct RequestContext<'a> {
    pub(crate) execution: &'a mut FlowExecution,
    external: &'a ExternalContext,
    request_scope: AttributeMap,
    current_event: Option<Event>,
    current_transition: Option<String>,
}
impl<'a> RequestContext<'a> {
    pub(crate) fn new(execution: &'a mut FlowExecution, external: &'a ExternalContext) -> Self {
        execution.rendered_view = None;
        Self {
            execution,
            external,
            request_scope: AttributeMap::new(),
            current_event: None,
            current_transition: None,
        }
    }
    pub fn execution(&self) -> &FlowExecution {
        &*self.execution
    }
    pub fn external_context(&self) -> &ExternalContext {
        self.external
    }
    pub fn request_parameters(&self) -> &AttributeMap {
        self.external.parameters()
    }
    pub fn current_event(&self) -> Option<&Event> {
        self.current_event.as_ref()
    }
    pub fn current_transition(&self) -> Option<&str> {
        self.current_transition.as_deref()
    }
    pub fn flow_definition_locator(&self) -> Option<&Arc<dyn FlowDefinitionLocator>> {
        self.execution.locator.as_ref()
    }
    pub fn active_flow(&self) -> Option<&Arc<Flow>> {
        self.execution.sessions.last().map(|session| session.definition())
    }
    pub fn current_state_id(&self) -> Option<&str> {
        self.execution.sessions.last().and_then(|session| session.state_id())
    }
    pub fn scope(&self, scope: ScopeType) -> Option<&AttributeMap> {
        match scope {
            ScopeType::Request => Some(&self.request_scope),
            ScopeType::Flash => Some(&self.execution.flash_scope),
            ScopeType::Conversation => Some(&self.execution.conversation_scope),
            ScopeType::Flow => self.execution.sessions.last().map(|s| s.scope()),
            ScopeType::View => self.execution.sessions.last().map(|s| s.view_scope()),
        }
    }
    /// `None` for flow and view scope while no flow session is active.
    pub fn scope_mut(&mut self, scope: ScopeType) -> Option<&mut AttributeMap> {
        match scope {
            ScopeType::Request => Some(&mut self.request_scope),
            ScopeType::Flash => Some(&mut self.execution.flash_scope),
            ScopeType::Conversation => Some(&mut self.execution.conversation_scope),
            ScopeType::Flow => self.execution.sessions.last_mut().map(|s| s.scope_mut()),
            ScopeType::View => self
                .execution
                .sessions
                .last_mut()
                .map(|s| s.view_scope_mut()),
        }
    }
    pub fn request_scope(&self) -> &AttributeMap {
        &self.request_scope
    }
    pub fn request_scope_mut(&mut self) -> &mut AttributeMap {
        &mut self.request_scope
    }
    pub fn flash_scope(&self) -> &AttributeMap {
        &self.execution.flash_scope
    }
    pub fn flash_scope_mut(&mut self) -> &mut AttributeMap {
        &mut self.execution.flash_scope
    }
    pub fn conversation_scope(&self) -> &AttributeMap {
        &self.execution.conversation_scope
    }
    pub fn conversation_scope_mut(&mut self) -> &mut AttributeMap {
        &mut self.execution.conversation_scope
    }
    pub fn flow_scope(&self) -> Option<&AttributeMap> {
        self.scope(ScopeType::Flow)
    }
    pub fn flow_scope_mut(&mut self) -> Option<&mut AttributeMap> {
        self.scope_mut(ScopeType::Flow)
    }
    pub fn view_scope(&self) -> Option<&AttributeMap> {
        self.scope(ScopeType::View)
    }
    pub fn view_scope_mut(&mut self) -> Option<&mut AttributeMap> {
        self.scope_mut(ScopeType::View)
    }
    pub fn set_rendered_view(&mut self, view: RenderedView) {
        self.execution.rendered_view = Some(view);
    }
    pub(crate) fn signal_event(&mut self, event: Event) {
        let flow_id = self.active_flow().map(|f| f.id().to_string()).unwrap_or_default();
        logging::log_event_signaled(&flow_id, self.current_state_id(), &event.id);
        self.current_event = Some(event);
        if let Some(event) = &self.current_event {
            self.notify(|listener, context| listener.event_signaled(context, event));
        }
    }
    pub(crate) fn set_current_transition(&mut self, description: String) {
        self.current_transition = Some(description);
    }
    pub(crate) fn notify(&self, f: impl Fn(&dyn FlowExecutionListener, &Self)) {
        for listener in &self.execution.listeners {
            f(listener.as_ref(), self);
        }
    }
    fn has_active_session(&self) -> bool {
        !self.execution.sessions.is_empty()
    }
}
impl PropertyResolver for RequestContext<'_> {
    fn get_property(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        if let Some(scope) = ScopeType::from_variable(first) {
            let attributes = self.scope(scope)?;
            return if rest.is_empty() {
                Some(attributes.to_value())
            } else {
                attributes.get_path(rest).cloned()
            };
        }
        match first.as_str() {
            "currentEvent" => {
                let event = self.current_event()?.to_value();
                lookup_path(&event, rest).cloned()
            }
            "requestParameters" => {
                let parameters = self.request_parameters();
                if rest.is_empty() {
                    Some(parameters.to_value())
                } else {
                    parameters.get_path(rest).cloned()
                }
            }
            "currentState" if rest.is_empty() => self
                .current_state_id()
                .map(|id| Value::String(id.to_string())),
            _ => ScopeType::SEARCH_ORDER
                .iter()
                .filter_map(|scope| self.scope(*scope))
                .find(|attributes| attributes.contains(first))
                .and_then(|attributes| attributes.get_path(path).cloned()),
        }
    }
    /// Unqualified names are written where they already live, otherwise
    /// into flow scope.
    fn set_property(&mut self, path: &[String], value: Value) -> Result<(), EvaluationError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(EvaluationError::InvalidAssignment {
                path: String::new(),
                reason: "empty path".to_string(),
            });
        };
        let no_session = || EvaluationError::InvalidAssignment {
            path: path.join("."),
            reason: "no active flow session".to_string(),
        };
        if let Some(scope) = ScopeType::from_variable(first) {
            if rest.is_empty() {
                return Err(EvaluationError::ReadOnlyProperty {
                    path: first.clone(),
                });
            }
            return self
                .scope_mut(scope)
                .ok_or_else(no_session)?
                .set_path(rest, value);
        }
        if matches!(
            first.as_str(),
            "currentEvent" | "requestParameters" | "currentState"
        ) {
            return Err(EvaluationError::ReadOnlyProperty {
                path: path.join("."),
            });
        }
        let fallback = if self.has_active_session() {
            ScopeType::Flow
        } else {
            ScopeType::Request
        };
        let scope = ScopeType::SEARCH_ORDER
            .into_iter()
            .find(|scope| self.scope(*scope).is_some_and(|a| a.contains(first)))
            .unwrap_or(fallback);
        self.scope_mut(scope)
            .ok_or_else(no_session)?
            .set_path(path, value)
    }
}
