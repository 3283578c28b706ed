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

use super::execution::{FlowExecution, FlowExecutionSnapshot};
use super::listener::FlowExecutionListenerLoader;
use super::scope::AttributeMap;
use super::session::FlowSession;
use crate::engine::Flow;
use crate::errors::FlowLocatorError;
use crate::registry::FlowDefinitionLocator;
use crate::repository::FlowExecutionKey;
use std::sync::Arc;
/// Creates new executions and rebuilds stored ones, wiring in listeners and
/// the locator used to spawn subflows.
#[derive(Clone)]
pub struct FlowExecutionFactory {
    locator: Arc<dyn FlowDefinitionLocator>,
    listener_loader: Option<Arc<dyn FlowExecutionListenerLoader>>,
}
impl FlowExecutionFactory {
    pub fn new(locator: Arc<dyn FlowDefinitionLocator>) -> Self {
        Self {
            locator,
            listener_loader: None,
        }
    }
    pub fn with_listener_loader(mut self, loader: Arc<dyn FlowExecutionListenerLoader>) -> Self {
        self.listener_loader = Some(loader);
        self
    }
    pub fn locator(&self) -> &Arc<dyn FlowDefinitionLocator> {
        &self.locator
    }
    pub fn create(&self, flow: Arc<Flow>) -> FlowExecution {
        let listeners = self
            .listener_loader
            .as_ref()
            .map(|loader| loader.listeners(&flow))
            .unwrap_or_default();
        FlowExecution::new(flow, listeners, Some(Arc::clone(&self.locator)))
    }
    /// Rebuilds an execution from a snapshot. Flow definitions are looked up
    /// again, so a refreshed definition is picked up on the next request.
    pub fn restore(
        &self,
        snapshot: FlowExecutionSnapshot,
        conversation_scope: AttributeMap,
        key: FlowExecutionKey,
    ) -> Result<FlowExecution, FlowLocatorError> {
        let flow = self.locator.get_flow_definition(&snapshot.flow_id)?;
        let sessions = snapshot
            .sessions
            .into_iter()
            .map(|session| {
                let definition = if session.flow_id == flow.id() {
                    Arc::clone(&flow)
                } else {
                    self.locator.get_flow_definition(&session.flow_id)?
                };
                Ok(FlowSession::restore(
                    definition,
                    session.state_id,
                    session.status,
                    session.scope,
                    session.view_scope,
                ))
            })
            .collect::<Result<Vec<_>, FlowLocatorError>>()?;
        Ok(self.create(flow).restore(
            sessions,
            snapshot.status,
            snapshot.flash_scope,
            conversation_scope,
            key,
        ))
    }
}
