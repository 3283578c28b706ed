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

use super::context::RequestContext;
use super::event::Event;
use super::scope::AttributeMap;
use crate::engine::{Flow, State, Transition};
use crate::errors::FlowExecutionError;
use std::sync::Arc;
/// Observes an execution's lifecycle. Every hook defaults to a no-op.
#[allow(unused_variables)]
pub trait FlowExecutionListener: Send + Sync {
    fn session_starting(&self, context: &RequestContext<'_>, flow: &Flow, input: &AttributeMap) {}
    fn session_started(&self, context: &RequestContext<'_>, flow: &Flow) {}
    fn state_entering(&self, context: &RequestContext<'_>, state: &State) {}
    fn state_entered(&self, context: &RequestContext<'_>, previous: Option<&str>, state: &State) {}
    fn event_signaled(&self, context: &RequestContext<'_>, event: &Event) {}
    fn transition_executing(&self, context: &RequestContext<'_>, transition: &Transition) {}
    fn paused(&self, context: &RequestContext<'_>) {}
    fn resuming(&self, context: &RequestContext<'_>) {}
    fn session_ending(&self, context: &RequestContext<'_>, end_state: &str, output: &AttributeMap) {}
    fn session_ended(&self, context: &RequestContext<'_>, flow: &Flow, output: &AttributeMap) {}
    fn exception_thrown(&self, context: &RequestContext<'_>, error: &FlowExecutionError) {}
}
pub trait FlowExecutionListenerLoader: Send + Sync {
    fn listeners(&self, flow: &Flow) -> Vec<Arc<dyn FlowExecutionListener>>;
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowIdCriteria {
    Any,
    Ids(Vec<String>),
}
impl FlowIdCriteria {
    /// `*` for every flow, otherwise a comma separated list of flow ids.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source == "*" {
            return FlowIdCriteria::Any;
        }
        FlowIdCriteria::Ids(
            source
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
    pub fn applies_to(&self, flow_id: &str) -> bool {
        match self {
            FlowIdCriteria::Any => true,
            FlowIdCriteria::Ids(ids) => ids.iter().any(|id| id == flow_id),
        }
    }
}
#[derive(Default, Clone)]
pub struct StaticFlowExecutionListenerLoader {
    entries: Vec<(FlowIdCriteria, Arc<dyn FlowExecutionListener>)>,
}
impl StaticFlowExecutionListenerLoader {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_listener(
        &mut self,
        criteria: FlowIdCriteria,
        listener: Arc<dyn FlowExecutionListener>,
    ) -> &mut Self {
        self.entries.push((criteria, listener));
        self
    }
}
impl FlowExecutionListenerLoader for StaticFlowExecutionListenerLoader {
    fn listeners(&self, flow: &Flow) -> Vec<Arc<dyn FlowExecutionListener>> {
        self.entries
            .iter()
            .filter(|(criteria, _)| criteria.applies_to(flow.id()))
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}
