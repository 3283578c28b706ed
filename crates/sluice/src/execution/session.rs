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

use super::scope::AttributeMap;
use crate::engine::Flow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSessionStatus {
    Starting,
    Active,
    Paused,
    Suspended,
    Ended,
}
/// One activation record on the subflow stack.
#[derive(Clone)]
pub struct FlowSession {
    flow: Arc<Flow>,
    state_id: Option<String>,
    status: FlowSessionStatus,
    scope: AttributeMap,
    view_scope: AttributeMap,
}
impl std::fmt::Debug for FlowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSession")
            .field("flow", &self.flow.id())
            .field("state_id", &self.state_id)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
impl FlowSession {
    pub(crate) fn new(flow: Arc<Flow>) -> Self {
        Self {
            flow,
            state_id: None,
            status: FlowSessionStatus::Starting,
            scope: AttributeMap::new(),
            view_scope: AttributeMap::new(),
        }
    }
    pub(crate) fn restore(
        flow: Arc<Flow>,
        state_id: Option<String>,
        status: FlowSessionStatus,
        scope: AttributeMap,
        view_scope: AttributeMap,
    ) -> Self {
        Self {
            flow,
            state_id,
            status,
            scope,
            view_scope,
        }
    }
    pub fn definition(&self) -> &Arc<Flow> {
        &self.flow
    }
    pub fn state_id(&self) -> Option<&str> {
        self.state_id.as_deref()
    }
    pub fn status(&self) -> FlowSessionStatus {
        self.status
    }
    pub fn scope(&self) -> &AttributeMap {
        &self.scope
    }
    pub fn view_scope(&self) -> &AttributeMap {
        &self.view_scope
    }
    pub(crate) fn scope_mut(&mut self) -> &mut AttributeMap {
        &mut self.scope
    }
    pub(crate) fn view_scope_mut(&mut self) -> &mut AttributeMap {
        &mut self.view_scope
    }
    pub(crate) fn set_state(&mut self, state_id: &str) -> Option<String> {
        self.state_id.replace(state_id.to_string())
    }
    pub(crate) fn set_status(&mut self, status: FlowSessionStatus) {
        self.status = status;
    }
}
