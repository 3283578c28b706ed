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

use super::context::RequestContext;
use super::event::{Event, ExternalContext};
use super::listener::FlowExecutionListener;
use super::scope::AttributeMap;
use super::session::{FlowSession, FlowSessionStatus};
use crate::engine::{Flow, History, RenderedView};
use crate::errors::FlowExecutionError;
use crate::registry::FlowDefinitionLocator;
use crate::repository::FlowExecutionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowExecutionStatus {
    NotStarted,
    Active,
    Ended,
}
/// How the root flow ended: the end state's id and the mapped output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowExecutionOutcome {
    pub id: String,
    pub output: AttributeMap,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSessionSnapshot {
    pub flow_id: String,
    pub state_id: Option<String>,
    pub status: FlowSessionStatus,
    pub scope: AttributeMap,
    pub view_scope: AttributeMap,
}
/// Serializable copy of an execution. Conversation scope is stored beside
/// it by the repository, so it is shared by every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowExecutionSnapshot {
    pub flow_id: String,
    pub status: FlowExecutionStatus,
    pub sessions: Vec<FlowSessionSnapshot>,
    pub flash_scope: AttributeMap,
}
/// One running instance of a flow. The session stack holds one entry per
/// active flow, the last being the one currently executing.
pub struct FlowExecution {
    flow: Arc<Flow>,
    pub(crate) sessions: Vec<FlowSession>,
    pub(crate) conversation_scope: AttributeMap,
    pub(crate) flash_scope: AttributeMap,
    pub(crate) rendered_view: Option<RenderedView>,
    pub(crate) history: History,
    pub(crate) listeners: Vec<Arc<dyn FlowExecutionListener>>,
    pub(crate) locator: Option<Arc<dyn FlowDefinitionLocator>>,
    status: FlowExecutionStatus,
    outcome: Option<FlowExecutionOutcome>,
    key: Option<FlowExecutionKey>,
}
impl fmt::Debug for FlowExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowExecution")
            .field("flow", &self.flow.id())
            .field("status", &self.status)
            .field("key", &self.key)
            .field("sessions", &self.sessions)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
impl FlowExecution {
    pub(crate) fn new(
        flow: Arc<Flow>,
        listeners: Vec<Arc<dyn FlowExecutionListener>>,
        locator: Option<Arc<dyn FlowDefinitionLocator>>,
    ) -> Self {
        Self {
            flow,
            sessions: Vec::new(),
            conversation_scope: AttributeMap::new(),
            flash_scope: AttributeMap::new(),
            rendered_view: None,
            history: History::Preserve,
            listeners,
            locator,
            status: FlowExecutionStatus::NotStarted,
            outcome: None,
            key: None,
        }
    }
    pub(crate) fn restore(
        mut self,
        sessions: Vec<FlowSession>,
        status: FlowExecutionStatus,
        flash_scope: AttributeMap,
        conversation_scope: AttributeMap,
        key: FlowExecutionKey,
    ) -> Self {
        self.sessions = sessions;
        self.status = status;
        self.flash_scope = flash_scope;
        self.conversation_scope = conversation_scope;
        self.key = Some(key);
        self
    }
    pub fn definition(&self) -> &Arc<Flow> {
        &self.flow
    }
    pub fn status(&self) -> FlowExecutionStatus {
        self.status
    }
    pub fn is_active(&self) -> bool {
        self.status == FlowExecutionStatus::Active
    }
    pub fn has_ended(&self) -> bool {
        self.status == FlowExecutionStatus::Ended
    }
    pub fn outcome(&self) -> Option<&FlowExecutionOutcome> {
        self.outcome.as_ref()
    }
    pub fn key(&self) -> Option<FlowExecutionKey> {
        self.key
    }
    pub(crate) fn set_key(&mut self, key: FlowExecutionKey) {
        self.key = Some(key);
    }
    pub fn active_session(&self) -> Option<&FlowSession> {
        self.sessions.last()
    }
    pub fn sessions(&self) -> &[FlowSession] {
        &self.sessions
    }
    pub fn current_state_id(&self) -> Option<&str> {
        self.active_session().and_then(FlowSession::state_id)
    }
    pub fn conversation_scope(&self) -> &AttributeMap {
        &self.conversation_scope
    }
    pub fn flash_scope(&self) -> &AttributeMap {
        &self.flash_scope
    }
    /// View produced by the last request, if it rendered one.
    pub fn rendered_view(&self) -> Option<&RenderedView> {
        self.rendered_view.as_ref()
    }
    pub fn history_policy(&self) -> History {
        self.history
    }
    /// Whether the execution is paused in a view state that asked for a redirect.
    pub fn redirect_on_pause(&self) -> bool {
        self.active_session()
            .and_then(|session| {
                let state = session.definition().state(session.state_id()?)?;
                match state.kind() {
                    crate::engine::StateKind::View(view) => Some(view.redirect()),
                    _ => None,
                }
            })
            .unwrap_or(false)
    }
    pub(crate) fn finish(&mut self, outcome: FlowExecutionOutcome) {
        self.status = FlowExecutionStatus::Ended;
        self.outcome = Some(outcome);
    }
    /// Starts the root flow, running until the first view state or end state.
    #[instrument(skip(self, input, external), fields(flow_id = %self.flow.id()))]
    pub fn start(
        &mut self,
        input: AttributeMap,
        external: &ExternalContext,
    ) -> Result<(), FlowExecutionError> {
        if self.status != FlowExecutionStatus::NotStarted {
            return Err(FlowExecutionError::IllegalState(format!(
                "execution of flow '{}' has already been started",
                self.flow.id()
            )));
        }
        self.status = FlowExecutionStatus::Active;
        self.history = History::Preserve;
        let flow = Arc::clone(&self.flow);
        let mut context = RequestContext::new(self, external);
        let result = context.start_session(flow, input);
        context.complete(result)
    }
    /// Signals `event` against the paused view state, or re-renders it when
    /// no event is given.
    #[instrument(skip(self, event, external), fields(flow_id = %self.flow.id(), event = event.as_ref().map_or("<refresh>", |e| e.id.as_str())))]
    pub fn resume(
        &mut self,
        event: Option<Event>,
        external: &ExternalContext,
    ) -> Result<(), FlowExecutionError> {
        if !self.is_active() {
            return Err(FlowExecutionError::IllegalState(format!(
                "execution of flow '{}' is not active",
                self.flow.id()
            )));
        }
        self.history = History::Preserve;
        let mut context = RequestContext::new(self, external);
        context.notify(|listener, context| listener.resuming(context));
        let result = match event {
            Some(event) => context.handle_event(event),
            None => context.refresh(),
        };
        context.complete(result)
    }
    pub fn snapshot(&self) -> FlowExecutionSnapshot {
        FlowExecutionSnapshot {
            flow_id: self.flow.id().to_string(),
            status: self.status,
            sessions: self
                .sessions
                .iter()
                .map(|session| FlowSessionSnapshot {
                    flow_id: session.definition().id().to_string(),
                    state_id: session.state_id().map(str::to_string),
                    status: session.status(),
                    scope: session.scope().clone(),
                    view_scope: session.view_scope().clone(),
                })
                .collect(),
            flash_scope: self.flash_scope.clone(),
        }
    }
}
