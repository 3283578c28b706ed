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

pub mod holder;
pub use holder::{AssemblingFlowDefinitionHolder, FlowDefinitionHolder, StaticFlowDefinitionHolder};
use crate::builder::{FlowAssembler, FlowBuilderContext, FlowBuilderServices, ModelFlowBuilder};
use crate::engine::Flow;
use crate::errors::FlowLocatorError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
/// Looks flow definitions up by id, e.g. to spawn a subflow.
pub trait FlowDefinitionLocator: Send + Sync {
    fn get_flow_definition(&self, flow_id: &str) -> Result<Arc<Flow>, FlowLocatorError>;
}
/// Holders keyed by flow id, falling back to an optional parent registry.
#[derive(Default)]
pub struct FlowDefinitionRegistry {
    holders: RwLock<IndexMap<String, Arc<dyn FlowDefinitionHolder>>>,
    parent: Option<Arc<dyn FlowDefinitionLocator>>,
}
impl FlowDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_parent(parent: Arc<dyn FlowDefinitionLocator>) -> Self {
        Self {
            holders: RwLock::new(IndexMap::new()),
            parent: Some(parent),
        }
    }
    /// Replaces any holder already registered under the same id.
    pub fn register(&self, holder: Arc<dyn FlowDefinitionHolder>) {
        let flow_id = holder.flow_definition_id().to_string();
        if self.holders.write().insert(flow_id.clone(), holder).is_some() {
            warn!(flow_id = %flow_id, "Replaced flow definition holder");
        } else {
            debug!(flow_id = %flow_id, "Registered flow definition");
        }
    }
    pub fn register_flow(&self, flow: Arc<Flow>) {
        self.register(Arc::new(StaticFlowDefinitionHolder::new(flow)));
    }
    /// Registers a model file, assembled lazily on first lookup.
    pub fn register_model_file<P: AsRef<Path>>(
        &self,
        flow_id: impl Into<String>,
        path: P,
        services: FlowBuilderServices,
        refresh_on_change: bool,
    ) {
        let context = FlowBuilderContext::new(flow_id, services);
        let assembler = FlowAssembler::new(Box::new(ModelFlowBuilder::from_file(path)), context);
        self.register(Arc::new(AssemblingFlowDefinitionHolder::new(
            assembler,
            refresh_on_change,
        )));
    }
    pub fn contains(&self, flow_id: &str) -> bool {
        self.holders.read().contains_key(flow_id)
    }
    pub fn flow_definition_ids(&self) -> Vec<String> {
        self.holders.read().keys().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.holders.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.holders.read().is_empty()
    }
    /// Reassembles every holder. Stops at the first failure.
    pub fn refresh(&self) -> Result<(), FlowLocatorError> {
        let holders: Vec<_> = self.holders.read().values().cloned().collect();
        for holder in holders {
            holder.refresh()?;
        }
        info!(flows = self.len(), "Flow definitions refreshed");
        Ok(())
    }
}
impl FlowDefinitionLocator for FlowDefinitionRegistry {
    fn get_flow_definition(&self, flow_id: &str) -> Result<Arc<Flow>, FlowLocatorError> {
        let holder = self.holders.read().get(flow_id).cloned();
        match (holder, &self.parent) {
            (Some(holder), _) => holder.flow_definition(),
            (None, Some(parent)) => parent.get_flow_definition(flow_id),
            (None, None) => Err(FlowLocatorError::NoSuchFlowDefinition {
                flow_id: flow_id.to_string(),
            }),
        }
    }
}
