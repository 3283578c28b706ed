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

pub mod assembler;
pub mod factory;
pub mod model_builder;
pub mod program;
pub mod services;
pub use assembler::FlowAssembler;
pub use factory::{FlowArtifactFactory, ViewOptions};
pub use model_builder::{
    FileFlowModelHolder, FlowModelHolder, ModelFlowBuilder, StaticFlowModelHolder,
};
pub use program::{FlowAuthoring, FlowProgram, ProgramFlowBuilder};
pub use services::{ActionRegistry, FlowBuilderServices};
use crate::engine::Flow;
use crate::errors::FlowBuilderError;
use crate::execution::AttributeMap;
use std::fmt;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Init,
    Variables,
    InputMapper,
    StartActions,
    States,
    GlobalTransitions,
    EndActions,
    OutputMapper,
    ExceptionHandlers,
    GetFlow,
}
impl BuildPhase {
    pub const SEQUENCE: [BuildPhase; 10] = [
        BuildPhase::Init,
        BuildPhase::Variables,
        BuildPhase::InputMapper,
        BuildPhase::StartActions,
        BuildPhase::States,
        BuildPhase::GlobalTransitions,
        BuildPhase::EndActions,
        BuildPhase::OutputMapper,
        BuildPhase::ExceptionHandlers,
        BuildPhase::GetFlow,
    ];
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Init => "init",
            BuildPhase::Variables => "build_variables",
            BuildPhase::InputMapper => "build_input_mapper",
            BuildPhase::StartActions => "build_start_actions",
            BuildPhase::States => "build_states",
            BuildPhase::GlobalTransitions => "build_global_transitions",
            BuildPhase::EndActions => "build_end_actions",
            BuildPhase::OutputMapper => "build_output_mapper",
            BuildPhase::ExceptionHandlers => "build_exception_handlers",
            BuildPhase::GetFlow => "get_flow",
        }
    }
    fn next(self) -> Option<BuildPhase> {
        let index = Self::SEQUENCE.iter().position(|phase| *phase == self)?;
        Self::SEQUENCE.get(index + 1).copied()
    }
}
impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
/// Rejects phase calls made out of order. `dispose` resets it.
#[derive(Debug, Default, Clone)]
pub struct PhaseTracker {
    last: Option<BuildPhase>,
}
impl PhaseTracker {
    pub fn advance(&mut self, phase: BuildPhase) -> Result<(), FlowBuilderError> {
        let expected = match self.last {
            None => Some(BuildPhase::Init),
            Some(last) => last.next(),
        };
        if expected != Some(phase) {
            return Err(FlowBuilderError::PhaseOrder {
                expected: expected.map_or("dispose", |p| p.as_str()).to_string(),
                actual: phase.as_str().to_string(),
            });
        }
        self.last = Some(phase);
        Ok(())
    }
    pub fn last(&self) -> Option<BuildPhase> {
        self.last
    }
    pub fn reset(&mut self) {
        self.last = None;
    }
}
/// What a builder needs from its environment: the id to give the flow,
/// assembly attributes and the services that create artifacts.
#[derive(Clone)]
pub struct FlowBuilderContext {
    flow_id: String,
    attributes: AttributeMap,
    services: FlowBuilderServices,
    factory: FlowArtifactFactory,
}
impl fmt::Debug for FlowBuilderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowBuilderContext")
            .field("flow_id", &self.flow_id)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
impl FlowBuilderContext {
    pub fn new(flow_id: impl Into<String>, services: FlowBuilderServices) -> Self {
        Self {
            flow_id: flow_id.into(),
            attributes: AttributeMap::new(),
            services,
            factory: FlowArtifactFactory,
        }
    }
    pub fn with_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    pub fn services(&self) -> &FlowBuilderServices {
        &self.services
    }
    pub fn factory(&self) -> &FlowArtifactFactory {
        &self.factory
    }
}
/// Multi-phase flow construction. `FlowAssembler` calls the phases in
/// declaration order and always finishes with `dispose`.
pub trait FlowBuilder: Send {
    fn init(&mut self, context: &FlowBuilderContext) -> Result<(), FlowBuilderError>;
    fn build_variables(&mut self) -> Result<(), FlowBuilderError>;
    fn build_input_mapper(&mut self) -> Result<(), FlowBuilderError>;
    fn build_start_actions(&mut self) -> Result<(), FlowBuilderError>;
    fn build_states(&mut self) -> Result<(), FlowBuilderError>;
    fn build_global_transitions(&mut self) -> Result<(), FlowBuilderError>;
    fn build_end_actions(&mut self) -> Result<(), FlowBuilderError>;
    fn build_output_mapper(&mut self) -> Result<(), FlowBuilderError>;
    fn build_exception_handlers(&mut self) -> Result<(), FlowBuilderError>;
    /// Hands over the validated flow.
    fn get_flow(&mut self) -> Result<Flow, FlowBuilderError>;
    fn dispose(&mut self);
    /// Whether the backing definition changed since the last assembly.
    fn has_flow_changed(&self) -> bool {
        false
    }
    /// Called after `get_flow` succeeded and before `dispose`.
    fn flow_assembled(&mut self) {}
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn tracker_accepts_the_full_sequence() {
        let mut tracker = PhaseTracker::default();
        for phase in BuildPhase::SEQUENCE {
            tracker.advance(phase).unwrap();
        }
        assert!(tracker.advance(BuildPhase::Init).is_err());
        tracker.reset();
        tracker.advance(BuildPhase::Init).unwrap();
    }
    #[test]
    fn tracker_rejects_skipped_phase() {
        let mut tracker = PhaseTracker::default();
        tracker.advance(BuildPhase::Init).unwrap();
        let error = tracker.advance(BuildPhase::States).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Builder phase out of order: expected build_variables, got build_states"
        );
    }
}
