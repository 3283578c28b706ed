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

use super::action::Action;
use super::exception::{ExceptionHandlerSet, FlowExecutionExceptionHandler};
use super::mapping::Mapper;
use super::state::State;
use super::transition::Transition;
use super::variable::FlowVariable;
use crate::errors::FlowBuilderError;
use crate::execution::AttributeMap;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
const GLOBAL_SCOPE: &str = "<global>";
/// An assembled flow graph. Populated by a builder, then frozen behind an
/// `Arc` and shared by every execution of the flow.
pub struct Flow {
    id: String,
    start_state: Option<String>,
    states: IndexMap<String, State>,
    global_transitions: Vec<Transition>,
    variables: Vec<FlowVariable>,
    input_mapper: Option<Mapper>,
    output_mapper: Option<Mapper>,
    start_actions: Vec<Arc<dyn Action>>,
    end_actions: Vec<Arc<dyn Action>>,
    exception_handlers: ExceptionHandlerSet,
    attributes: AttributeMap,
}
impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("id", &self.id)
            .field("start_state", &self.start_state)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .field("global_transitions", &self.global_transitions)
            .finish_non_exhaustive()
    }
}
impl Flow {
    pub(crate) fn new(id: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            id: id.into(),
            start_state: None,
            states: IndexMap::new(),
            global_transitions: Vec::new(),
            variables: Vec::new(),
            input_mapper: None,
            output_mapper: None,
            start_actions: Vec::new(),
            end_actions: Vec::new(),
            exception_handlers: ExceptionHandlerSet::new(),
            attributes,
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    /// Empty until a start state is set or the first state is added.
    pub fn start_state(&self) -> &str {
        self.start_state.as_deref().unwrap_or_default()
    }
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }
    pub fn state_ids(&self) -> Vec<&str> {
        self.states.keys().map(String::as_str).collect()
    }
    pub fn global_transitions(&self) -> &[Transition] {
        &self.global_transitions
    }
    pub fn variables(&self) -> &[FlowVariable] {
        &self.variables
    }
    pub fn input_mapper(&self) -> Option<&Mapper> {
        self.input_mapper.as_ref()
    }
    pub fn output_mapper(&self) -> Option<&Mapper> {
        self.output_mapper.as_ref()
    }
    pub fn start_actions(&self) -> &[Arc<dyn Action>] {
        &self.start_actions
    }
    pub fn end_actions(&self) -> &[Arc<dyn Action>] {
        &self.end_actions
    }
    pub fn exception_handlers(&self) -> &ExceptionHandlerSet {
        &self.exception_handlers
    }
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    pub fn add_state(&mut self, state: State) -> Result<(), FlowBuilderError> {
        if self.states.contains_key(state.id()) {
            return Err(FlowBuilderError::DuplicateState {
                flow_id: self.id.clone(),
                state_id: state.id().to_string(),
            });
        }
        if self.start_state.is_none() {
            self.start_state = Some(state.id().to_string());
        }
        self.states.insert(state.id().to_string(), state);
        Ok(())
    }
    pub fn set_start_state(&mut self, state_id: impl Into<String>) {
        self.start_state = Some(state_id.into());
    }
    pub fn add_global_transition(&mut self, transition: Transition) {
        self.global_transitions.push(transition);
    }
    pub fn add_variable(&mut self, variable: FlowVariable) {
        self.variables.push(variable);
    }
    pub fn set_input_mapper(&mut self, mapper: Mapper) {
        self.input_mapper = Some(mapper);
    }
    pub fn set_output_mapper(&mut self, mapper: Mapper) {
        self.output_mapper = Some(mapper);
    }
    pub fn add_start_action(&mut self, action: Arc<dyn Action>) {
        self.start_actions.push(action);
    }
    pub fn add_end_action(&mut self, action: Arc<dyn Action>) {
        self.end_actions.push(action);
    }
    pub fn add_exception_handler(&mut self, handler: Arc<dyn FlowExecutionExceptionHandler>) {
        self.exception_handlers.add(handler);
    }
    fn check_target(&self, from: &str, target: &str) -> Result<(), FlowBuilderError> {
        if self.states.contains_key(target) {
            Ok(())
        } else {
            Err(FlowBuilderError::InvalidTarget {
                flow_id: self.id.clone(),
                state_id: from.to_string(),
                target: target.to_string(),
            })
        }
    }
    /// Every static transition target and handler target must name a state
    /// of this flow.
    pub fn validate(&self) -> Result<(), FlowBuilderError> {
        if self.states.is_empty() {
            return Err(FlowBuilderError::EmptyFlow {
                flow_id: self.id.clone(),
            });
        }
        let start = self.start_state();
        if !self.states.contains_key(start) {
            return Err(FlowBuilderError::StartStateNotFound {
                flow_id: self.id.clone(),
                state_id: start.to_string(),
            });
        }
        for state in self.states.values() {
            for transition in state.transitions() {
                if let Some(target) = transition.target().and_then(|t| t.static_target()) {
                    self.check_target(state.id(), target)?;
                }
            }
            for handler in state.exception_handlers().iter() {
                if let Some(target) = handler.target_state() {
                    self.check_target(state.id(), target)?;
                }
            }
        }
        for transition in &self.global_transitions {
            if let Some(target) = transition.target().and_then(|t| t.static_target()) {
                self.check_target(GLOBAL_SCOPE, target)?;
            }
        }
        for handler in self.exception_handlers.iter() {
            if let Some(target) = handler.target_state() {
                self.check_target(GLOBAL_SCOPE, target)?;
            }
        }
        Ok(())
    }
}
