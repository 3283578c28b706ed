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
use super::program::FlowAuthoring;
use super::{BuildPhase, FlowBuilder, FlowBuilderContext, PhaseTracker};
use crate::engine::{
    Action, EvaluateAction, ExceptionHandlerSet, Flow, FlowExecutionExceptionHandler,
    FlowVariable, Mapper, SetAction, StateParts, Transition, VariableValue,
};
use crate::errors::FlowBuilderError;
use crate::model::{
    ActionModel, ExceptionHandlerModel, FlowModel, MappingModel, StateKindModel, StateModel,
    TransitionModel, VarModel,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
/// Source of the model a `ModelFlowBuilder` reads.
pub trait FlowModelHolder: Send {
    fn flow_model(&mut self) -> Result<FlowModel, FlowBuilderError>;
    /// Compares the backing resource's last-modified signal with the one
    /// seen at the last load.
    fn has_flow_model_changed(&self) -> bool;
    fn resource_description(&self) -> String;
    /// Called once the last loaded model assembled into a valid flow.
    fn model_accepted(&mut self) {}
}
#[derive(Debug, Clone)]
pub struct StaticFlowModelHolder {
    model: FlowModel,
}
impl StaticFlowModelHolder {
    pub fn new(model: FlowModel) -> Self {
        Self { model }
    }
}
impl FlowModelHolder for StaticFlowModelHolder {
    fn flow_model(&mut self) -> Result<FlowModel, FlowBuilderError> {
        Ok(self.model.clone())
    }
    fn has_flow_model_changed(&self) -> bool {
        false
    }
    fn resource_description(&self) -> String {
        format!("static model '{}'", self.model.id.as_deref().unwrap_or("<anonymous>"))
    }
}
/// Reads a JSON, YAML or TOML model file, chosen by extension.
#[derive(Debug, Clone)]
pub struct FileFlowModelHolder {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    loaded: Option<SystemTime>,
}
impl FileFlowModelHolder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_modified: None,
            loaded: None,
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
impl FlowModelHolder for FileFlowModelHolder {
    fn flow_model(&mut self) -> Result<FlowModel, FlowBuilderError> {
        let modified = self.modified();
        let model = FlowModel::from_file(&self.path)?;
        self.loaded = modified;
        Ok(model)
    }
    /// A model that fails any phase stays marked as changed, so every lookup
    /// retries it until the file is fixed.
    fn model_accepted(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            self.last_modified = Some(loaded);
        }
    }
    fn has_flow_model_changed(&self) -> bool {
        match self.last_modified {
            None => true,
            Some(seen) => self.modified().is_some_and(|now| now != seen),
        }
    }
    fn resource_description(&self) -> String {
        self.path.display().to_string()
    }
}
/// Builds a flow from a declarative `FlowModel`.
pub struct ModelFlowBuilder {
    holder: Box<dyn FlowModelHolder>,
    tracker: PhaseTracker,
    model: Option<FlowModel>,
    authoring: Option<FlowAuthoring>,
}
impl ModelFlowBuilder {
    pub fn new(holder: Box<dyn FlowModelHolder>) -> Self {
        Self {
            holder,
            tracker: PhaseTracker::default(),
            model: None,
            authoring: None,
        }
    }
    pub fn from_model(model: FlowModel) -> Self {
        Self::new(Box::new(StaticFlowModelHolder::new(model)))
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(Box::new(FileFlowModelHolder::new(path)))
    }
    fn phase(
        &mut self,
        phase: BuildPhase,
        build: impl FnOnce(&FlowModel, &mut FlowAuthoring) -> Result<(), FlowBuilderError>,
    ) -> Result<(), FlowBuilderError> {
        self.tracker.advance(phase)?;
        match (self.model.as_ref(), self.authoring.as_mut()) {
            (Some(model), Some(authoring)) => build(model, authoring),
            _ => Err(FlowBuilderError::NotInitialized(phase.to_string())),
        }
    }
}
fn action(flow: &FlowAuthoring, model: &ActionModel) -> Result<Arc<dyn Action>, FlowBuilderError> {
    match model {
        ActionModel::Named(name) | ActionModel::Bean { bean: name } => flow.action(name),
        ActionModel::Evaluate {
            evaluate,
            result,
            result_type,
        } => {
            let mut action = EvaluateAction::new(flow.expression(evaluate)?);
            if let Some(result) = result {
                action = action.with_result(flow.expression(result)?);
            }
            if let Some(target_type) = result_type {
                action = action.with_result_type(flow.services().conversion(target_type)?);
            }
            Ok(Arc::new(action))
        }
        ActionModel::Set {
            set,
            value,
            type_conversion,
        } => {
            let mut action = SetAction::new(flow.expression(set)?, flow.expression(value)?);
            if let Some(target_type) = type_conversion {
                action = action.with_conversion(flow.services().conversion(target_type)?);
            }
            Ok(Arc::new(action))
        }
    }
}
fn actions(flow: &FlowAuthoring, models: &[ActionModel]) -> Result<Vec<Arc<dyn Action>>, FlowBuilderError> {
    models.iter().map(|model| action(flow, model)).collect()
}
fn variable(flow: &FlowAuthoring, model: &VarModel) -> Result<FlowVariable, FlowBuilderError> {
    let initial = match (&model.expression, &model.value) {
        (Some(expression), _) => VariableValue::Expression(flow.expression(expression)?),
        (None, Some(value)) => VariableValue::Literal(value.clone()),
        (None, None) => VariableValue::Literal(Value::Null),
    };
    Ok(FlowVariable::new(model.name.clone(), initial))
}
/// Which side of a mapping the model's `name` stands for.
#[derive(Clone, Copy)]
enum MappingDirection {
    /// `name` is read from the incoming map; `value` (default
    /// `flowScope.<name>`) is written.
    Inbound,
    /// `value` (default `name`) is read; `name` is written to the outgoing map.
    Outbound,
}
fn mapper(
    flow: &FlowAuthoring,
    models: &[MappingModel],
    direction: MappingDirection,
) -> Result<Option<Mapper>, FlowBuilderError> {
    if models.is_empty() {
        return Ok(None);
    }
    let mut mapper = Mapper::new();
    for model in models {
        let (source, target) = match direction {
            MappingDirection::Inbound => (
                model.name.clone(),
                model
                    .value
                    .clone()
                    .unwrap_or_else(|| format!("flowScope.{}", model.name)),
            ),
            MappingDirection::Outbound => (
                model.value.clone().unwrap_or_else(|| model.name.clone()),
                model.name.clone(),
            ),
        };
        mapper.add_mapping(flow.mapping(
            &source,
            &target,
            model.type_conversion.as_deref(),
            model.required,
        )?);
    }
    Ok(Some(mapper))
}
fn handlers(
    flow: &FlowAuthoring,
    models: &[ExceptionHandlerModel],
    transitions: &[TransitionModel],
) -> Vec<Arc<dyn FlowExecutionExceptionHandler>> {
    let declared = models
        .iter()
        .map(|model| (model.on_exception.as_str(), model.to.as_str()));
    let from_transitions = transitions.iter().filter_map(|model| {
        Some((model.on_exception.as_deref()?, model.to.as_deref()?))
    });
    declared
        .chain(from_transitions)
        .map(|(kinds, to)| flow.exception_handler(kinds, to))
        .collect()
}
/// Transitions with `on_exception` become exception handlers instead.
fn transitions(flow: &FlowAuthoring, models: &[TransitionModel]) -> Result<Vec<Transition>, FlowBuilderError> {
    models
        .iter()
        .filter(|model| model.on_exception.is_none())
        .map(|model| {
            flow.transition_with(
                model.on.as_deref(),
                model.to.as_deref(),
                actions(flow, &model.actions)?,
                model.history.unwrap_or_default(),
                model.attributes.clone(),
            )
        })
        .collect()
}
fn state_transitions(kind: &StateKindModel) -> &[TransitionModel] {
    match kind {
        StateKindModel::View { transitions, .. }
        | StateKindModel::Action { transitions, .. }
        | StateKindModel::Subflow { transitions, .. } => transitions,
        StateKindModel::Decision { .. } | StateKindModel::End { .. } => &[],
    }
}
fn build_state(flow: &mut FlowAuthoring, model: &StateModel) -> Result<(), FlowBuilderError> {
    let parts = StateParts {
        id: model.id.clone(),
        entry_actions: actions(flow, &model.on_entry)?,
        exit_actions: actions(flow, &model.on_exit)?,
        exception_handlers: ExceptionHandlerSet::from(handlers(
            flow,
            &model.exception_handlers,
            state_transitions(&model.kind),
        )),
        attributes: model.attributes.clone(),
    };
    debug!(state_id = %model.id, "Building state");
    match &model.kind {
        StateKindModel::View {
            view,
            redirect,
            popup,
            vars,
            on_render,
            transitions: models,
        } => {
            let options = ViewOptions {
                render_actions: actions(flow, on_render)?,
                variables: vars
                    .iter()
                    .map(|var| variable(flow, var))
                    .collect::<Result<_, _>>()?,
                redirect: *redirect,
                popup: *popup,
            };
            let transitions = transitions(flow, models)?;
            let view = view.as_deref().unwrap_or(&model.id);
            flow.add_view_state(parts, view, options, transitions)
        }
        StateKindModel::Action {
            actions: action_models,
            transitions: models,
        } => {
            let actions = actions(flow, action_models)?;
            let transitions = transitions(flow, models)?;
            flow.add_action_state(parts, actions, transitions)
        }
        StateKindModel::Decision { ifs } => match ifs.as_slice() {
            [] => Err(FlowBuilderError::MalformedModel {
                resource: flow.context().flow_id().to_string(),
                reason: format!("decision state '{}' has no branches", model.id),
            }),
            ifs => {
                // An `else` closes the chain; branches after it are unreachable.
                let end = ifs
                    .iter()
                    .position(|branch| branch.otherwise.is_some())
                    .map_or(ifs.len(), |i| i + 1);
                if end < ifs.len() {
                    warn!(state_id = %model.id, unreachable = ifs.len() - end, "Decision branches after an else are never evaluated");
                }
                let branches: Vec<(&str, &str)> = ifs[..end]
                    .iter()
                    .map(|branch| (branch.test.as_str(), branch.then.as_str()))
                    .collect();
                let otherwise = ifs[end - 1].otherwise.as_deref();
                flow.add_decision_state(parts, &branches, otherwise)
            }
        },
        StateKindModel::Subflow {
            subflow,
            inputs,
            outputs,
            transitions: models,
        } => {
            let input_mapper = mapper(flow, inputs, MappingDirection::Outbound)?;
            let output_mapper = mapper(flow, outputs, MappingDirection::Inbound)?;
            let transitions = transitions(flow, models)?;
            flow.add_subflow_state(parts, subflow, (input_mapper, output_mapper), transitions)
        }
        StateKindModel::End { view, outputs } => {
            let output_mapper = mapper(flow, outputs, MappingDirection::Outbound)?;
            flow.add_end_state(parts, view.as_deref(), output_mapper)
        }
    }
}
impl FlowBuilder for ModelFlowBuilder {
    fn init(&mut self, context: &FlowBuilderContext) -> Result<(), FlowBuilderError> {
        self.tracker.advance(BuildPhase::Init)?;
        let model = self.holder.flow_model()?;
        let mut attributes = context.attributes().clone();
        attributes.extend(&model.attributes);
        debug!(
            flow_id = %context.flow_id(),
            resource = %self.holder.resource_description(),
            states = model.states.len(),
            "Flow model loaded"
        );
        self.authoring = Some(FlowAuthoring::new(context.clone(), attributes));
        self.model = Some(model);
        Ok(())
    }
    fn build_variables(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::Variables, |model, flow| {
            for var in &model.vars {
                let variable = variable(flow, var)?;
                flow.flow_mut().add_variable(variable);
            }
            Ok(())
        })
    }
    fn build_input_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::InputMapper, |model, flow| {
            if let Some(mapper) = mapper(flow, &model.inputs, MappingDirection::Inbound)? {
                flow.flow_mut().set_input_mapper(mapper);
            }
            Ok(())
        })
    }
    fn build_start_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::StartActions, |model, flow| {
            for action in actions(flow, &model.on_start)? {
                flow.flow_mut().add_start_action(action);
            }
            Ok(())
        })
    }
    fn build_states(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::States, |model, flow| {
            for state in &model.states {
                build_state(flow, state)?;
            }
            if let Some(start) = &model.start_state {
                flow.flow_mut().set_start_state(start.clone());
            }
            Ok(())
        })
    }
    fn build_global_transitions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::GlobalTransitions, |model, flow| {
            for transition in transitions(flow, &model.global_transitions)? {
                flow.flow_mut().add_global_transition(transition);
            }
            Ok(())
        })
    }
    fn build_end_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::EndActions, |model, flow| {
            for action in actions(flow, &model.on_end)? {
                flow.flow_mut().add_end_action(action);
            }
            Ok(())
        })
    }
    fn build_output_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::OutputMapper, |model, flow| {
            if let Some(mapper) = mapper(flow, &model.outputs, MappingDirection::Outbound)? {
                flow.flow_mut().set_output_mapper(mapper);
            }
            Ok(())
        })
    }
    fn build_exception_handlers(&mut self) -> Result<(), FlowBuilderError> {
        self.phase(BuildPhase::ExceptionHandlers, |model, flow| {
            for handler in handlers(flow, &model.exception_handlers, &model.global_transitions) {
                flow.flow_mut().add_exception_handler(handler);
            }
            Ok(())
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
        self.model = None;
        self.authoring = None;
    }
    fn has_flow_changed(&self) -> bool {
        self.holder.has_flow_model_changed()
    }
    fn flow_assembled(&mut self) {
        self.holder.model_accepted();
    }
}
