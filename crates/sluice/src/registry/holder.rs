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

use crate::builder::FlowAssembler;
use crate::engine::Flow;
use crate::errors::FlowLocatorError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};
pub trait FlowDefinitionHolder: Send + Sync {
    fn flow_definition_id(&self) -> &str;
    fn flow_definition(&self) -> Result<Arc<Flow>, FlowLocatorError>;
    fn refresh(&self) -> Result<(), FlowLocatorError>;
}
#[derive(Debug, Clone)]
pub struct StaticFlowDefinitionHolder {
    flow: Arc<Flow>,
}
impl StaticFlowDefinitionHolder {
    pub fn new(flow: Arc<Flow>) -> Self {
        Self { flow }
    }
}
impl FlowDefinitionHolder for StaticFlowDefinitionHolder {
    fn flow_definition_id(&self) -> &str {
        self.flow.id()
    }
    fn flow_definition(&self) -> Result<Arc<Flow>, FlowLocatorError> {
        Ok(Arc::clone(&self.flow))
    }
    fn refresh(&self) -> Result<(), FlowLocatorError> {
        Ok(())
    }
}
/// Assembles on first use and again whenever the builder reports that its
/// backing definition changed. The cached graph is swapped, never mutated.
pub struct AssemblingFlowDefinitionHolder {
    flow_id: String,
    assembler: Mutex<FlowAssembler>,
    cached: RwLock<Option<Arc<Flow>>>,
    refresh_on_change: bool,
}
impl AssemblingFlowDefinitionHolder {
    pub fn new(assembler: FlowAssembler, refresh_on_change: bool) -> Self {
        Self {
            flow_id: assembler.flow_builder_context().flow_id().to_string(),
            assembler: Mutex::new(assembler),
            cached: RwLock::new(None),
            refresh_on_change,
        }
    }
    fn assemble(&self, assembler: &mut FlowAssembler) -> Result<Arc<Flow>, FlowLocatorError> {
        match assembler.assemble_flow() {
            Ok(flow) => {
                *self.cached.write() = Some(Arc::clone(&flow));
                Ok(flow)
            }
            Err(source) => {
                if self.cached.read().is_some() {
                    warn!(flow_id = %self.flow_id, "Reassembly failed, keeping previous definition");
                }
                Err(FlowLocatorError::Assembly {
                    flow_id: self.flow_id.clone(),
                    source,
                })
            }
        }
    }
}
impl FlowDefinitionHolder for AssemblingFlowDefinitionHolder {
    fn flow_definition_id(&self) -> &str {
        &self.flow_id
    }
    fn flow_definition(&self) -> Result<Arc<Flow>, FlowLocatorError> {
        let mut assembler = self.assembler.lock();
        let cached = self.cached.read().clone();
        match cached {
            Some(flow) if !(self.refresh_on_change && assembler.has_flow_changed()) => Ok(flow),
            Some(_) => {
                debug!(flow_id = %self.flow_id, "Flow definition changed, reassembling");
                self.assemble(&mut assembler)
            }
            None => self.assemble(&mut assembler),
        }
    }
    fn refresh(&self) -> Result<(), FlowLocatorError> {
        let mut assembler = self.assembler.lock();
        self.assemble(&mut assembler).map(|_| ())
    }
}
