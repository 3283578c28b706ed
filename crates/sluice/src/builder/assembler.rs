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

use super::{BuildPhase, FlowBuilder, FlowBuilderContext};
use crate::engine::Flow;
use crate::errors::FlowBuilderError;
use crate::logging;
use std::sync::Arc;
use tracing::{info, instrument};
/// Drives one builder through the phase sequence. Reusable: every call to
/// `assemble_flow` produces a fresh graph.
pub struct FlowAssembler {
    builder: Box<dyn FlowBuilder>,
    context: FlowBuilderContext,
}
impl FlowAssembler {
    pub fn new(builder: Box<dyn FlowBuilder>, context: FlowBuilderContext) -> Self {
        Self { builder, context }
    }
    pub fn flow_builder_context(&self) -> &FlowBuilderContext {
        &self.context
    }
    pub fn has_flow_changed(&self) -> bool {
        self.builder.has_flow_changed()
    }
    /// A failing phase aborts assembly; `dispose` runs either way and no
    /// partially built flow is returned.
    #[instrument(skip(self), fields(flow_id = %self.context.flow_id()))]
    pub fn assemble_flow(&mut self) -> Result<Arc<Flow>, FlowBuilderError> {
        let result = self.direct_assembly();
        if result.is_ok() {
            self.builder.flow_assembled();
        }
        self.builder.dispose();
        match &result {
            Ok(flow) => info!(states = flow.state_ids().len(), "Flow assembled"),
            Err(error) => logging::log_error("flow assembly", error),
        }
        result.map(Arc::new)
    }
    fn direct_assembly(&mut self) -> Result<Flow, FlowBuilderError> {
        let flow_id = self.context.flow_id();
        let builder = &mut self.builder;
        logging::log_assembly_phase(flow_id, BuildPhase::Init.as_str());
        builder.init(&self.context)?;
        logging::log_assembly_phase(flow_id, BuildPhase::Variables.as_str());
        builder.build_variables()?;
        logging::log_assembly_phase(flow_id, BuildPhase::InputMapper.as_str());
        builder.build_input_mapper()?;
        logging::log_assembly_phase(flow_id, BuildPhase::StartActions.as_str());
        builder.build_start_actions()?;
        logging::log_assembly_phase(flow_id, BuildPhase::States.as_str());
        builder.build_states()?;
        logging::log_assembly_phase(flow_id, BuildPhase::GlobalTransitions.as_str());
        builder.build_global_transitions()?;
        logging::log_assembly_phase(flow_id, BuildPhase::EndActions.as_str());
        builder.build_end_actions()?;
        logging::log_assembly_phase(flow_id, BuildPhase::OutputMapper.as_str());
        builder.build_output_mapper()?;
        logging::log_assembly_phase(flow_id, BuildPhase::ExceptionHandlers.as_str());
        builder.build_exception_handlers()?;
        logging::log_assembly_phase(flow_id, BuildPhase::GetFlow.as_str());
        builder.get_flow()
    }
}
