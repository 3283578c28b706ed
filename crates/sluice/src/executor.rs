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

use crate::config::RepositoryConfigSection;
use crate::engine::RenderedView;
use crate::errors::{FlowExecutionError, FlowExecutorError};
use crate::execution::{
    AttributeMap, Event, ExternalContext, FlowExecution, FlowExecutionFactory, FlowExecutionOutcome,
};
use crate::registry::FlowDefinitionLocator;
use crate::repository::{DefaultFlowExecutionRepository, FlowExecutionKey, FlowExecutionRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
/// What a caller gets back from one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowExecutionResult {
    Paused {
        key: FlowExecutionKey,
        flow_id: String,
        state_id: String,
        view: Option<RenderedView>,
        redirect: bool,
    },
    Ended {
        flow_id: String,
        outcome: FlowExecutionOutcome,
    },
}
impl FlowExecutionResult {
    pub fn is_paused(&self) -> bool {
        matches!(self, FlowExecutionResult::Paused { .. })
    }
    pub fn key(&self) -> Option<FlowExecutionKey> {
        match self {
            FlowExecutionResult::Paused { key, .. } => Some(*key),
            FlowExecutionResult::Ended { .. } => None,
        }
    }
    pub fn state_id(&self) -> Option<&str> {
        match self {
            FlowExecutionResult::Paused { state_id, .. } => Some(state_id),
            FlowExecutionResult::Ended { .. } => None,
        }
    }
    pub fn outcome(&self) -> Option<&FlowExecutionOutcome> {
        match self {
            FlowExecutionResult::Paused { .. } => None,
            FlowExecutionResult::Ended { outcome, .. } => Some(outcome),
        }
    }
}
/// Request front door: launches new executions and resumes paused ones
/// under the conversation lock.
pub struct FlowExecutor {
    locator: Arc<dyn FlowDefinitionLocator>,
    factory: FlowExecutionFactory,
    repository: Arc<dyn FlowExecutionRepository>,
}
impl FlowExecutor {
    pub fn new(
        locator: Arc<dyn FlowDefinitionLocator>,
        factory: FlowExecutionFactory,
        repository: Arc<dyn FlowExecutionRepository>,
    ) -> Self {
        Self {
            locator,
            factory,
            repository,
        }
    }
    /// Wires a `DefaultFlowExecutionRepository` over `locator`.
    pub fn with_defaults(
        locator: Arc<dyn FlowDefinitionLocator>,
        config: &RepositoryConfigSection,
    ) -> Self {
        let factory = FlowExecutionFactory::new(Arc::clone(&locator));
        let repository = Arc::new(DefaultFlowExecutionRepository::new(
            factory.clone(),
            config.clone(),
        ));
        Self::new(locator, factory, repository)
    }
    pub fn repository(&self) -> &Arc<dyn FlowExecutionRepository> {
        &self.repository
    }
    #[instrument(skip(self, input, external))]
    pub fn launch_execution(
        &self,
        flow_id: &str,
        input: AttributeMap,
        external: &ExternalContext,
    ) -> Result<FlowExecutionResult, FlowExecutorError> {
        let flow = self.locator.get_flow_definition(flow_id)?;
        let mut execution = self.factory.create(flow);
        execution.start(input, external)?;
        self.finish(execution)
    }
    /// The lock is held from loading through storing and released on every
    /// path out of this call. A failed request leaves the stored snapshot as
    /// it was.
    #[instrument(skip(self, event, external), fields(request_id = %external.request_id()))]
    pub fn resume_execution(
        &self,
        encoded_key: &str,
        event: Option<Event>,
        external: &ExternalContext,
    ) -> Result<FlowExecutionResult, FlowExecutorError> {
        let key = self.repository.parse_flow_execution_key(encoded_key)?;
        let lock = self.repository.get_lock(&key)?;
        let _guard = lock.lock(external.request_id())?;
        let mut execution = self.repository.get_flow_execution(&key)?;
        execution.resume(event, external)?;
        self.finish(execution)
    }
    fn finish(&self, mut execution: FlowExecution) -> Result<FlowExecutionResult, FlowExecutorError> {
        if execution.has_ended() {
            if execution.key().is_some() {
                self.repository.remove_flow_execution(&execution)?;
            }
            let outcome = execution.outcome().cloned().ok_or_else(|| {
                FlowExecutionError::IllegalState("ended execution has no outcome".to_string())
            })?;
            info!(flow_id = %execution.definition().id(), outcome = %outcome.id, "Flow execution ended");
            return Ok(FlowExecutionResult::Ended {
                flow_id: execution.definition().id().to_string(),
                outcome,
            });
        }
        let key = self.repository.put_flow_execution(&mut execution)?;
        let flow_id = execution
            .active_session()
            .map_or(execution.definition().id(), |session| session.definition().id())
            .to_string();
        Ok(FlowExecutionResult::Paused {
            key,
            flow_id,
            state_id: execution.current_state_id().unwrap_or_default().to_string(),
            view: execution.rendered_view().cloned(),
            redirect: execution.redirect_on_pause(),
        })
    }
}
