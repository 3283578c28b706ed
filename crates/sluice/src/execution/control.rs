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

//! The state machine proper: entering states, selecting and executing
//! transitions, ending sessions and routing errors to exception handlers.

use super::context::RequestContext;
use super::event::Event;
use super::execution::FlowExecutionOutcome;
use super::scope::AttributeMap;
use super::session::{FlowSession, FlowSessionStatus};
use crate::engine::{
    Action, ActionError, ActionState, EndState, ExceptionHandling, Flow, MappingResults, State,
    StateKind, SubflowRef, SubflowState, Transition, ViewState,
};
use crate::errors::{FlowExecutionError, FlowLocatorError};
use crate::expression::{value_to_string, EvaluationError};
use crate::logging;
use std::sync::Arc;
use tracing::debug;
fn action_failed(flow: &Flow, state: Option<&State>, source: ActionError) -> FlowExecutionError {
    FlowExecutionError::ActionExecution {
        flow_id: flow.id().to_string(),
        state_id: state.map(|s| s.id().to_string()),
        source,
    }
}
fn evaluation_failed(flow: &Flow, source: EvaluationError) -> FlowExecutionError {
    FlowExecutionError::Evaluation {
        flow_id: flow.id().to_string(),
        source,
    }
}
fn mapping_failed(flow: &Flow, results: MappingResults) -> FlowExecutionError {
    FlowExecutionError::Mapping {
        flow_id: flow.id().to_string(),
        errors: results.into_errors(),
    }
}
impl RequestContext<'_> {
    /// Finishes a request: unhandled errors go through the exception handler
    /// chain once, and an execution still active afterwards is paused.
    pub(crate) fn complete(
        mut self,
        result: Result<(), FlowExecutionError>,
    ) -> Result<(), FlowExecutionError> {
        let result = match result {
            Ok(()) => Ok(()),
            Err(error) => self.handle_exception(error),
        };
        match &result {
            Ok(()) if self.execution.is_active() => {
                if let Some(session) = self.execution.sessions.last_mut() {
                    session.set_status(FlowSessionStatus::Paused);
                }
                self.notify(|listener, context| listener.paused(context));
            }
            Ok(()) => {}
            Err(error) => logging::log_error("flow execution request", error),
        }
        result
    }
    pub(crate) fn start_session(
        &mut self,
        flow: Arc<Flow>,
        input: AttributeMap,
    ) -> Result<(), FlowExecutionError> {
        self.notify(|listener, context| listener.session_starting(context, &flow, &input));
        self.execution.sessions.push(FlowSession::new(Arc::clone(&flow)));
        for variable in flow.variables() {
            let value = variable
                .create_value(&*self)
                .map_err(|source| evaluation_failed(&flow, source))?;
            if let Some(scope) = self.flow_scope_mut() {
                scope.put(variable.name(), value);
            }
        }
        if let Some(mapper) = flow.input_mapper() {
            let results = mapper.map(&input, self);
            if results.has_errors() {
                return Err(mapping_failed(&flow, results));
            }
        }
        self.run_actions(&flow, None, flow.start_actions())?;
        if let Some(session) = self.execution.sessions.last_mut() {
            session.set_status(FlowSessionStatus::Active);
        }
        self.notify(|listener, context| listener.session_started(context, &flow));
        self.enter_state(&flow, flow.start_state())
    }
    /// Signals a user event against the state the active session paused in.
    pub(crate) fn handle_event(&mut self, event: Event) -> Result<(), FlowExecutionError> {
        self.execution.flash_scope.clear();
        self.signal_event(event);
        let (flow, state_id) = self.paused_position()?;
        let state = flow.state(&state_id).ok_or_else(|| {
            FlowExecutionError::IllegalState(format!(
                "state '{}' no longer exists in flow '{}'",
                state_id,
                flow.id()
            ))
        })?;
        if let Some(session) = self.execution.sessions.last_mut() {
            session.set_status(FlowSessionStatus::Active);
        }
        self.take_transition(&flow, state)
    }
    /// Re-renders the paused view without signaling an event.
    pub(crate) fn refresh(&mut self) -> Result<(), FlowExecutionError> {
        let (flow, state_id) = self.paused_position()?;
        match flow.state(&state_id).map(|state| (state, state.kind())) {
            Some((state, StateKind::View(view))) => self.render_view(&flow, state, view),
            _ => Err(FlowExecutionError::IllegalState(format!(
                "flow '{}' is not paused in a view state",
                flow.id()
            ))),
        }
    }
    fn paused_position(&self) -> Result<(Arc<Flow>, String), FlowExecutionError> {
        let session = self.execution.sessions.last().ok_or_else(|| {
            FlowExecutionError::IllegalState("no active flow session".to_string())
        })?;
        let state_id = session.state_id().ok_or_else(|| {
            FlowExecutionError::IllegalState(format!(
                "flow '{}' has not entered a state",
                session.definition().id()
            ))
        })?;
        Ok((Arc::clone(session.definition()), state_id.to_string()))
    }
    fn run_actions(
        &mut self,
        flow: &Flow,
        state: Option<&State>,
        actions: &[Arc<dyn Action>],
    ) -> Result<(), FlowExecutionError> {
        for action in actions {
            action
                .execute(self)
                .map_err(|source| action_failed(flow, state, source))?;
        }
        Ok(())
    }
    pub(crate) fn enter_state(
        &mut self,
        flow: &Arc<Flow>,
        state_id: &str,
    ) -> Result<(), FlowExecutionError> {
        let state = flow.state(state_id).ok_or_else(|| FlowExecutionError::TargetStateNotFound {
            flow_id: flow.id().to_string(),
            state_id: self.current_state_id().unwrap_or("<start>").to_string(),
            target: state_id.to_string(),
        })?;
        self.notify(|listener, context| listener.state_entering(context, state));
        let previous = match self.execution.sessions.last_mut() {
            Some(session) => session.set_state(state_id),
            None => {
                return Err(FlowExecutionError::IllegalState(
                    "no active flow session".to_string(),
                ))
            }
        };
        logging::log_state_entered(flow.id(), state_id);
        self.run_actions(flow, Some(state), state.entry_actions())?;
        self.notify(|listener, context| {
            listener.state_entered(context, previous.as_deref(), state)
        });
        match state.kind() {
            StateKind::Action(action_state) => self.enter_action_state(flow, state, action_state),
            StateKind::View(view) => self.enter_view_state(flow, state, view),
            StateKind::Decision(_) => self.take_transition(flow, state),
            StateKind::Subflow(subflow) => self.enter_subflow_state(flow, state, subflow),
            StateKind::End(end) => self.enter_end_state(flow, state, end),
        }
    }
    /// Executes actions in order; the first signaled event that matches a
    /// transition is taken and the remaining actions are skipped.
    fn enter_action_state(
        &mut self,
        flow: &Arc<Flow>,
        state: &State,
        action_state: &ActionState,
    ) -> Result<(), FlowExecutionError> {
        let mut signaled = Vec::new();
        for action in action_state.actions() {
            let event = action
                .execute(self)
                .map_err(|source| action_failed(flow, Some(state), source))?;
            signaled.push(event.id.clone());
            self.signal_event(event);
            if let Some(transition) = self.find_transition(flow, state)? {
                return self.execute_transition(flow, state, transition);
            }
        }
        Err(FlowExecutionError::NoMatchingActionResult {
            flow_id: flow.id().to_string(),
            state_id: state.id().to_string(),
            events: signaled,
        })
    }
    fn enter_view_state(
        &mut self,
        flow: &Arc<Flow>,
        state: &State,
        view: &ViewState,
    ) -> Result<(), FlowExecutionError> {
        if let Some(scope) = self.view_scope_mut() {
            scope.clear();
        }
        for variable in view.variables() {
            let value = variable
                .create_value(&*self)
                .map_err(|source| evaluation_failed(flow, source))?;
            if let Some(scope) = self.view_scope_mut() {
                scope.put(variable.name(), value);
            }
        }
        self.render_view(flow, state, view)
    }
    fn render_view(
        &mut self,
        flow: &Flow,
        state: &State,
        view: &ViewState,
    ) -> Result<(), FlowExecutionError> {
        self.run_actions(flow, Some(state), view.render_actions())?;
        let rendered = view
            .view_factory()
            .create_view(self)
            .map_err(|source| action_failed(flow, Some(state), source))?;
        debug!(flow_id = %flow.id(), state_id = %state.id(), view_id = %rendered.view_id, "View rendered");
        self.set_rendered_view(rendered);
        Ok(())
    }
    fn enter_subflow_state(
        &mut self,
        flow: &Arc<Flow>,
        state: &State,
        subflow_state: &SubflowState,
    ) -> Result<(), FlowExecutionError> {
        let subflow = self.resolve_subflow(flow, state, subflow_state)?;
        let mut input = AttributeMap::new();
        if let Some(mapper) = subflow_state.input_mapper() {
            let results = mapper.map(&*self, &mut input);
            if results.has_errors() {
                return Err(mapping_failed(flow, results));
            }
        }
        debug!(flow_id = %flow.id(), subflow_id = %subflow.id(), "Spawning subflow");
        self.start_session(subflow, input)
    }
    fn resolve_subflow(
        &self,
        flow: &Flow,
        state: &State,
        subflow_state: &SubflowState,
    ) -> Result<Arc<Flow>, FlowExecutionError> {
        let subflow_id = match subflow_state.subflow() {
            SubflowRef::Static(id) => id.clone(),
            SubflowRef::Dynamic(expression) => value_to_string(
                &expression
                    .get_value(self)
                    .map_err(|source| evaluation_failed(flow, source))?,
            ),
        };
        let not_found = |source: FlowLocatorError| FlowExecutionError::SubflowNotFound {
            flow_id: flow.id().to_string(),
            state_id: state.id().to_string(),
            source,
        };
        let locator = self.execution.locator.clone().ok_or_else(|| {
            not_found(FlowLocatorError::NoSuchFlowDefinition {
                flow_id: subflow_id.clone(),
            })
        })?;
        locator.get_flow_definition(&subflow_id).map_err(not_found)
    }
    /// Ends the active session. A root session ends the execution; a
    /// subflow session hands its output back to the parent's subflow state,
    /// which then transitions on the end state's id.
    fn enter_end_state(
        &mut self,
        flow: &Arc<Flow>,
        state: &State,
        end: &EndState,
    ) -> Result<(), FlowExecutionError> {
        let root = self.execution.sessions.len() == 1;
        if root {
            if let Some(action) = end.final_response() {
                action
                    .execute(self)
                    .map_err(|source| action_failed(flow, Some(state), source))?;
            }
        }
        let mut output = AttributeMap::new();
        if let Some(mapper) = end.output_mapper() {
            let results = mapper.map(&*self, &mut output);
            if results.has_errors() {
                return Err(mapping_failed(flow, results));
            }
        }
        self.notify(|listener, context| listener.session_ending(context, state.id(), &output));
        self.run_actions(flow, Some(state), flow.end_actions())?;
        if let Some(mapper) = flow.output_mapper() {
            let results = mapper.map(&*self, &mut output);
            if results.has_errors() {
                return Err(mapping_failed(flow, results));
            }
        }
        self.execution.sessions.pop();
        logging::log_session_ended(flow.id(), state.id(), root);
        self.notify(|listener, context| listener.session_ended(context, flow, &output));
        if root {
            self.execution.finish(FlowExecutionOutcome {
                id: state.id().to_string(),
                output,
            });
            return Ok(());
        }
        self.resume_parent(state.id(), output)
    }
    fn resume_parent(
        &mut self,
        end_state_id: &str,
        output: AttributeMap,
    ) -> Result<(), FlowExecutionError> {
        let (parent, parent_state_id) = match self.execution.sessions.last() {
            Some(session) => (
                Arc::clone(session.definition()),
                session.state_id().map(str::to_string),
            ),
            None => {
                return Err(FlowExecutionError::IllegalState(
                    "subflow ended without a parent session".to_string(),
                ))
            }
        };
        let parent_state = parent_state_id
            .as_deref()
            .and_then(|id| parent.state(id))
            .ok_or_else(|| {
                FlowExecutionError::IllegalState(format!(
                    "flow '{}' has no current state to resume",
                    parent.id()
                ))
            })?;
        let StateKind::Subflow(subflow_state) = parent_state.kind() else {
            return Err(FlowExecutionError::IllegalState(format!(
                "state '{}' of flow '{}' is not a subflow state",
                parent_state.id(),
                parent.id()
            )));
        };
        if let Some(mapper) = subflow_state.output_mapper() {
            let results = mapper.map(&output, self);
            if results.has_errors() {
                return Err(mapping_failed(&parent, results));
            }
        }
        if let Some(session) = self.execution.sessions.last_mut() {
            session.set_status(FlowSessionStatus::Active);
        }
        self.signal_event(Event::new(end_state_id).with_attributes(output));
        self.take_transition(&parent, parent_state)
    }
    fn take_transition(&mut self, flow: &Arc<Flow>, state: &State) -> Result<(), FlowExecutionError> {
        match self.find_transition(flow, state)? {
            Some(transition) => self.execute_transition(flow, state, transition),
            None => Err(FlowExecutionError::NoMatchingTransition {
                flow_id: flow.id().to_string(),
                state_id: state.id().to_string(),
                event_id: self.current_event_id(),
            }),
        }
    }
    /// State transitions are consulted before global ones; the first whose
    /// criteria match wins.
    fn find_transition<'f>(
        &self,
        flow: &'f Flow,
        state: &'f State,
    ) -> Result<Option<&'f Transition>, FlowExecutionError> {
        for transition in state.transitions().iter().chain(flow.global_transitions()) {
            if transition
                .matches(self)
                .map_err(|source| evaluation_failed(flow, source))?
            {
                return Ok(Some(transition));
            }
        }
        Ok(None)
    }
    fn current_event_id(&self) -> String {
        self.current_event()
            .map_or_else(|| "<none>".to_string(), |event| event.id.clone())
    }
    fn execute_transition(
        &mut self,
        flow: &Arc<Flow>,
        state: &State,
        transition: &Transition,
    ) -> Result<(), FlowExecutionError> {
        self.set_current_transition(format!("{} on {}", state.id(), transition.criteria()));
        self.notify(|listener, context| listener.transition_executing(context, transition));
        let allowed = transition
            .can_execute(self)
            .map_err(|source| action_failed(flow, Some(state), source))?;
        if !allowed {
            return Err(FlowExecutionError::TransitionVetoed {
                flow_id: flow.id().to_string(),
                state_id: state.id().to_string(),
                event_id: self.current_event_id(),
            });
        }
        let Some(resolver) = transition.target() else {
            return match state.kind() {
                StateKind::View(view) => self.render_view(flow, state, view),
                _ => Err(FlowExecutionError::TargetStateNotFound {
                    flow_id: flow.id().to_string(),
                    state_id: state.id().to_string(),
                    target: "<none>".to_string(),
                }),
            };
        };
        let target = resolver
            .resolve(self)
            .map_err(|source| evaluation_failed(flow, source))?;
        if flow.state(&target).is_none() {
            return Err(FlowExecutionError::TargetStateNotFound {
                flow_id: flow.id().to_string(),
                state_id: state.id().to_string(),
                target,
            });
        }
        logging::log_transition(flow.id(), state.id(), &target);
        self.execution.history = transition.history();
        self.exit_state(flow, state)?;
        self.enter_state(flow, &target)
    }
    fn exit_state(&mut self, flow: &Flow, state: &State) -> Result<(), FlowExecutionError> {
        self.run_actions(flow, Some(state), state.exit_actions())?;
        if state.is_view_state() {
            if let Some(scope) = self.view_scope_mut() {
                scope.clear();
            }
        }
        Ok(())
    }
    /// Offers `error` to the current state's handlers, then the flow's. The
    /// first handler that can handle it does so exclusively; errors raised
    /// while handling are returned as-is.
    fn handle_exception(&mut self, error: FlowExecutionError) -> Result<(), FlowExecutionError> {
        self.notify(|listener, context| listener.exception_thrown(context, &error));
        let Some(session) = self.execution.sessions.last() else {
            return Err(error);
        };
        let flow = Arc::clone(session.definition());
        let state_id = session.state_id().map(str::to_string);
        let state = state_id.as_deref().and_then(|id| flow.state(id));
        let handler = state
            .and_then(|state| state.exception_handlers().find(&error))
            .or_else(|| flow.exception_handlers().find(&error))
            .cloned();
        let Some(handler) = handler else {
            return Err(error);
        };
        debug!(flow_id = %flow.id(), kinds = ?error.kinds(), "Exception handler found");
        match handler.handle(&error, self)? {
            ExceptionHandling::Handled => Ok(()),
            ExceptionHandling::EnterState(target) => {
                if flow.state(&target).is_none() {
                    return Err(FlowExecutionError::TargetStateNotFound {
                        flow_id: flow.id().to_string(),
                        state_id: state_id.unwrap_or_default(),
                        target,
                    });
                }
                if let Some(state) = state {
                    self.exit_state(&flow, state)?;
                }
                self.enter_state(&flow, &target)
            }
        }
    }
}
