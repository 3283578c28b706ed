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

use super::factory::ViewOptions;
use super::{BuildPhase, FlowBuilder, FlowBuilderContext, FlowBuilderServices, PhaseTracker};
use crate::engine::{
    Action, Flow, FlowExecutionExceptionHandler, History, Mapper, Mapping,
    RenderAction, StateParts, SubflowRef, TargetStateResolver, Transition, TransitionCriteria,
    TransitionExecutingHandler, ViewFactory,
};
use crate::errors::FlowBuilderError;
use crate::execution::AttributeMap;
use crate::expression::{is_template, Expression};
use std::sync::Arc;
/// A flow under construction plus the services that turn strings into
/// artifacts. Shared by the model-driven and programmatic builders.
pub struct FlowAuthoring {
    context: FlowBuilderContext,
    flow: Flow,
}
impl FlowAuthoring {
    pub(crate) fn new(context: FlowBuilderContext, attributes: AttributeMap) -> Self {
        let flow = context.factory().create_flow(context.flow_id(), attributes);
        Self { context, flow }
    }
    pub fn context(&self) -> &FlowBuilderContext {
        &self.context
    }
    pub fn services(&self) -> &FlowBuilderServices {
        self.context.services()
    }
    pub fn flow(&self) -> &Flow {
        &self.flow
    }
    pub fn flow_mut(&mut self) -> &mut Flow {
        &mut self.flow
    }
    pub(crate) fn into_flow(self) -> Flow {
        self.flow
    }
    pub fn expression(&self, source: &str) -> Result<Arc<dyn Expression>, FlowBuilderError> {
        self.services().parse(source)
    }
    pub fn action(&self, name: &str) -> Result<Arc<dyn Action>, FlowBuilderError> {
        self.services().action(name)
    }
    /// No `on` matches every event, `*` any event id, `${...}` an expression.
    pub fn criteria(&self, on: Option<&str>) -> Result<TransitionCriteria, FlowBuilderError> {
        match on {
            None => Ok(TransitionCriteria::Always),
            Some(on) if is_template(on) => Ok(TransitionCriteria::Expression(self.expression(on)?)),
            Some(on) => Ok(TransitionCriteria::for_event(on)),
        }
    }
    pub fn target(&self, to: Option<&str>) -> Result<Option<TargetStateResolver>, FlowBuilderError> {
        match to {
            None => Ok(None),
            Some(to) if is_template(to) => Ok(Some(TargetStateResolver::Dynamic(
                self.services().parse_template(to)?,
            ))),
            Some(to) => Ok(Some(TargetStateResolver::Static(to.to_string()))),
        }
    }
    pub fn transition(&self, on: Option<&str>, to: Option<&str>) -> Result<Transition, FlowBuilderError> {
        self.transition_with(on, to, Vec::new(), History::Preserve, AttributeMap::new())
    }
    pub fn transition_with(
        &self,
        on: Option<&str>,
        to: Option<&str>,
        guards: Vec<Arc<dyn Action>>,
        history: History,
        attributes: AttributeMap,
    ) -> Result<Transition, FlowBuilderError> {
        Ok(self.context.factory().create_transition(
            self.criteria(on)?,
            guards,
            self.target(to)?,
            history,
            attributes,
        ))
    }
    pub fn mapping(
        &self,
        source: &str,
        target: &str,
        type_conversion: Option<&str>,
        required: bool,
    ) -> Result<Mapping, FlowBuilderError> {
        let mut mapping =
            Mapping::new(self.expression(source)?, self.expression(target)?).required(required);
        if let Some(target_type) = type_conversion {
            mapping = mapping.with_conversion(self.services().conversion(target_type)?);
        }
        Ok(mapping)
    }
    /// `kinds` is a comma separated list of error kinds.
    pub fn exception_handler(&self, kinds: &str, to: &str) -> Arc<dyn FlowExecutionExceptionHandler> {
        let handler = kinds
            .split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .fold(TransitionExecutingHandler::new(to), |handler, kind| handler.on(kind));
        Arc::new(handler)
    }
    pub fn view_factory(&self, view: &str) -> Result<Arc<dyn ViewFactory>, FlowBuilderError> {
        let view_id = self.services().parse_template(view)?;
        Ok(self.services().view_factory_creator().create_view_factory(view_id))
    }
    pub fn add_action_state(
        &mut self,
        parts: StateParts,
        actions: Vec<Arc<dyn Action>>,
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        self.context
            .factory()
            .create_action_state(&mut self.flow, parts, actions, transitions)
    }
    pub fn add_view_state(
        &mut self,
        parts: StateParts,
        view: &str,
        options: ViewOptions,
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        let factory = self.view_factory(view)?;
        self.context
            .factory()
            .create_view_state(&mut self.flow, parts, factory, options, transitions)
    }
    /// An if/else-if chain: each `(test, then)` in order, then `otherwise`.
    pub fn add_decision_state(
        &mut self,
        parts: StateParts,
        branches: &[(&str, &str)],
        otherwise: Option<&str>,
    ) -> Result<(), FlowBuilderError> {
        let mut transitions = Vec::with_capacity(branches.len() + 1);
        for (test, then) in branches {
            let criteria = TransitionCriteria::Expression(self.expression(test)?);
            transitions.push(self.context.factory().create_transition(
                criteria,
                Vec::new(),
                self.target(Some(then))?,
                History::Preserve,
                AttributeMap::new(),
            ));
        }
        if let Some(otherwise) = otherwise {
            transitions.push(self.transition(None, Some(otherwise))?);
        }
        self.context
            .factory()
            .create_decision_state(&mut self.flow, parts, transitions)
    }
    pub fn add_subflow_state(
        &mut self,
        parts: StateParts,
        subflow: &str,
        mappers: (Option<Mapper>, Option<Mapper>),
        transitions: Vec<Transition>,
    ) -> Result<(), FlowBuilderError> {
        let subflow = if is_template(subflow) {
            SubflowRef::Dynamic(self.services().parse_template(subflow)?)
        } else {
            SubflowRef::Static(subflow.to_string())
        };
        self.context
            .factory()
            .create_subflow_state(&mut self.flow, parts, subflow, mappers, transitions)
    }
    /// A `view` becomes the final response rendered when the root flow ends.
    pub fn add_end_state(
        &mut self,
        parts: StateParts,
        view: Option<&str>,
        output_mapper: Option<Mapper>,
    ) -> Result<(), FlowBuilderError> {
        let final_response = match view {
            Some(view) => Some(Arc::new(RenderAction::new(self.view_factory(view)?)) as Arc<dyn Action>),
            None => None,
        };
        self.context
            .factory()
            .create_end_state(&mut self.flow, parts, final_response, output_mapper)
    }
}
/// A flow written in code. Each method populates one assembly phase; only
/// `states` is mandatory.
#[allow(unused_variables)]
pub trait FlowProgram: Send + Sync {
    fn variables(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn input_mapper(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn start_actions(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn states(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError>;
    fn global_transitions(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn end_actions(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn output_mapper(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
    fn exception_handlers(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        Ok(())
    }
}
pub struct ProgramFlowBuilder {
    program: Arc<dyn FlowProgram>,
    tracker: PhaseTracker,
    authoring: Option<FlowAuthoring>,
}
impl ProgramFlowBuilder {
    pub fn new(program: Arc<dyn FlowProgram>) -> Self {
        Self {
            program,
            tracker: PhaseTracker::default(),
            authoring: None,
        }
    }
    fn phase(
        &mut self,
        phase: BuildPhase,
        build: impl FnOnce(&dyn FlowProgram, &mut FlowAuthoring) -> Result<(), FlowBuilderError>,
    ) -> Result<(), FlowBuilderError> {
        self.tracker.advance(phase)?;
        let authoring = self
            .authoring
            .as_mut()
            .ok_or_else(|| FlowBuilderError::NotInitialized(phase.to_string()))?;
        build(self.program.as_ref(), authoring)
    }
}
impl FlowBuilder for ProgramFlowBuilder {
    fn init(&mut self, context: &FlowBuilderContext) -> Result<(), FlowBuilderError> {
        self.tracker.advance(BuildPhase::Init)?;
        self.authoring = Some(FlowAuthoring::new(
            context.clone(),
            context.attributes().clone(),
        ));
        Ok(())
    }
    fn build_variables(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::Variables, |program, flow| program.variables(flow))
    }
    fn build_input_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::InputMapper, |program, flow| program.input_mapper(flow))
    }
    fn build_start_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::StartActions, |program, flow| program.start_actions(flow))
    }
    fn build_states(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::States, |program, flow| program.states(flow))
    }
    fn build_global_transitions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::GlobalTransitions, |program, flow| {
            program.global_transitions(flow)
        })
    }
    fn build_end_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::EndActions, |program, flow| program.end_actions(flow))
    }
    fn build_output_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::OutputMapper, |program, flow| program.output_mapper(flow))
    }
    fn build_exception_handlers(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::ExceptionHandlers, |program, flow| {
            program.exception_handlers(flow)
        })
    }
    fn get_flow(&mut self) -> Result<Flow, FlowBuilderError> {
        self.tracker.advance(BuildPhase::GetFlow)?;
        let flow = self
            .authoring
            .take()
            .ok_or_else(|| FlowBuilderError::NotInitialized(BuildPhase::GetFlow.to_string()))?
            .into_flow();
        flow.validate()?;
        Ok(flow)
    }
    fn dispose(&mut self) {
        self.tracker.reset();
        self.authoring = None;
    }
}
