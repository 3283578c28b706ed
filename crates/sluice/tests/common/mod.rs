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

#![allow(dead_code)]
use sluice::builder::FlowBuilderServices;
use sluice::config::RepositoryConfigSection;
use sluice::engine::{Action, ActionError, ExceptionHandling, FlowExecutionExceptionHandler, FnAction};
use sluice::execution::FlowExecutionFactory;
use sluice::model::ModelFormat;
use sluice::{
    DefaultFlowExecutionRepository, Event, Flow, FlowAssembler, FlowBuilderContext,
    FlowDefinitionRegistry, FlowExecutionError, FlowExecutionResult, FlowExecutor, FlowModel,
    ModelFlowBuilder, RequestContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
pub fn services(actions: Vec<(&str, Arc<dyn Action>)>) -> FlowBuilderServices {
    let services = FlowBuilderServices::default();
    for (name, action) in actions {
        services.actions().register(name, action);
    }
    services
}
pub fn assemble_yaml(source: &str, services: &FlowBuilderServices) -> Arc<Flow> {
    let model = FlowModel::parse(source, ModelFormat::Yaml, "test.yaml").expect("parse model");
    let flow_id = model.id.clone().expect("model id");
    let context = FlowBuilderContext::new(flow_id, services.clone());
    FlowAssembler::new(Box::new(ModelFlowBuilder::from_model(model)), context)
        .assemble_flow()
        .expect("assemble flow")
}
/// Action returning `success` that counts its invocations.
pub fn counting_action(name: &str) -> (Arc<dyn Action>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let action = FnAction::new(name, move |_context: &mut RequestContext<'_>| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Event::success())
    });
    (Arc::new(action), calls)
}
pub fn signaling_action(name: &str, event: &'static str) -> Arc<dyn Action> {
    Arc::new(FnAction::new(name, move |_context: &mut RequestContext<'_>| {
        Ok(Event::new(event))
    }))
}
pub fn failing_action(name: &str, kind: &'static str) -> Arc<dyn Action> {
    Arc::new(FnAction::new(name, move |_context: &mut RequestContext<'_>| {
        Err(ActionError::new(kind, "simulated failure"))
    }))
}
pub fn registry(flows: Vec<Arc<Flow>>) -> Arc<FlowDefinitionRegistry> {
    let registry = FlowDefinitionRegistry::new();
    for flow in flows {
        registry.register_flow(flow);
    }
    Arc::new(registry)
}
pub fn executor(
    flows: Vec<Arc<Flow>>,
    config: RepositoryConfigSection,
) -> (FlowExecutor, Arc<DefaultFlowExecutionRepository>) {
    let locator = registry(flows);
    let factory = FlowExecutionFactory::new(locator.clone());
    let repository = Arc::new(DefaultFlowExecutionRepository::new(factory.clone(), config));
    let executor = FlowExecutor::new(locator, factory, repository.clone());
    (executor, repository)
}
pub fn paused_state(result: &FlowExecutionResult) -> &str {
    result.state_id().expect("execution should be paused")
}
/// Routes errors of one kind to a state and records how often it was used.
pub struct RecordingHandler {
    kind: &'static str,
    target: &'static str,
    pub handled: AtomicUsize,
}
impl RecordingHandler {
    pub fn new(kind: &'static str, target: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            target,
            handled: AtomicUsize::new(0),
        })
    }
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }
}
impl FlowExecutionExceptionHandler for RecordingHandler {
    fn can_handle(&self, error: &FlowExecutionError) -> bool {
        error.kinds().iter().any(|kind| kind == self.kind)
    }
    fn handle(
        &self,
        _error: &FlowExecutionError,
        _context: &mut RequestContext<'_>,
    ) -> Result<ExceptionHandling, FlowExecutionError> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(ExceptionHandling::EnterState(self.target.to_string()))
    }
    fn target_state(&self) -> Option<&str> {
        Some(self.target)
    }
}
