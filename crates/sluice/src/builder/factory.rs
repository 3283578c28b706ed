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

use crate::engine::{
    Action, ActionState, DecisionState, EndState, Flow, FlowVariable, History, Mapper, State,
    StateKind, StateParts, SubflowRef, SubflowState, TargetStateResolver, Transition,
    TransitionCriteria, ViewFactory, ViewState,
};
use crate::errors::FlowBuilderError;
use crate::execution::AttributeMap;
use std::sync::Arc;
/// Optional parts of a view state.
#[derive(Clone, Default)]
pub struct ViewOptions {
    pub render_actions: Vec<Arc<dyn Action>>,
    pub variables: Vec<FlowVariable>,
    pub redirect: bool,
    pub popup: bool,
}
/// Creates the runtime nodes of a flow. Each `create_*_state` adds the new
/// state to `flow`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowArtifactFactory;
impl FlowArtifactFactory {
    pub fn create_flow(&self, id: &str, attributes: AttributeMap) -> Flow {
        Flow::new(id, attributes)
    }
    pub fn create_action_state(
        &self,
        flow: &mut Flow,
        parts: StateParts,
        actions: Vec<Arc<dyn Action>>,
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        let kind = StateKind::Action(ActionState {
            actions,
            transitions,
        });
        flow.add_state(State::new(parts, kind))
    }
    pub fn create_view_state(
        &self,
        flow: &mut Flow,
        parts: StateParts,
        view_factory: Arc<dyn ViewFactory>,
        options: ViewOptions,
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        let kind = StateKind::View(ViewState {
            view_factory,
            render_actions: options.render_actions,
            variables: options.variables,
            redirect: options.redirect,
            popup: options.popup,
            transitions,
        });
        flow.add_state(State::new(parts, kind))
    }
    pub fn create_decision_state(
        &self,
        flow: &mut Flow,
        parts: StateParts,
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        flow.add_state(State::new(
            parts,
            StateKind::Decision(DecisionState { transitions }),
        ))
    }
    pub fn create_subflow_state(
        &self,
        flow: &mut Flow,
        parts: StateParts,
        subflow: SubflowRef,
        mappers: (Option<Mapper>, Option<Mapper>),
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        let (input_mapper, output_mapper) = mappers;
        let kind = StateKind::Subflow(SubflowState {
            subflow,
            input_mapper,
            output_mapper,
            transitions,
        });
        flow.add_state(State::new(parts, kind))
    }
    pub fn create_end_state(
        &self,
        flow: &mut Flow,
        parts: StateParts,
        final_response: Option<Arc<dyn Action>>,
        output_mapper: Option<Mapper>,
    ) -> Result<(), FlowBuilderError> {
        let kind = StateKind::End(EndState {
            final_response,
            output_mapper,
        });
        flow.add_state(State::new(parts, kind))
    }
    pub fn create_transition(
        &self,
        criteria: TransitionCriteria,
        execution_criteria: Vec<Arc<dyn Action>>,
        target: Option<TargetStateResolver>,
        history: History,
        attributes: AttributeMap,
    ) -> Transition {
        Transition::new(criteria, execution_criteria, target, history, attributes)
    }
}
